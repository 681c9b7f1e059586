//! Command handlers for the HDF4 CLI

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Row, Table};
use hdf4_reader::Reader;

fn open_reader(path: &str) -> Result<Reader<BufReader<File>>> {
    if !Path::new(path).exists() {
        bail!("File not found: {}", path);
    }
    hdf4_reader::open(path).with_context(|| format!("Failed to open '{}'", path))
}

pub fn info(path: &str) -> Result<()> {
    let reader = open_reader(path)?;
    let tags = reader.header().tags();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(Row::from(vec![Cell::new("File"), Cell::new(path)]));
    table.add_row(Row::from(vec![
        Cell::new("Type"),
        Cell::new(reader.file_type_id()),
    ]));
    table.add_row(Row::from(vec![
        Cell::new("Descriptors"),
        Cell::new(tags.len()),
    ]));

    let mut by_name: BTreeMap<&str, usize> = BTreeMap::new();
    for t in tags {
        *by_name.entry(t.tag_name()).or_default() += 1;
    }
    let summary = by_name
        .iter()
        .map(|(name, count)| format!("{} x{}", name, count))
        .collect::<Vec<_>>()
        .join(", ");
    table.add_row(Row::from(vec![Cell::new("Tag kinds"), Cell::new(summary)]));

    println!("{}", table);
    Ok(())
}

pub fn tags(path: &str, only: Option<u16>) -> Result<()> {
    let reader = open_reader(path)?;

    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_HORIZONTAL_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Tag", "Name", "Ref", "Offset", "Length"]);

    for (i, t) in reader
        .header()
        .tags()
        .iter()
        .filter(|t| only.map_or(true, |n| t.tag == n))
        .enumerate()
    {
        table.add_row(Row::from(vec![
            Cell::new(i),
            Cell::new(t.tag),
            Cell::new(t.tag_name()),
            Cell::new(t.ref_no),
            Cell::new(t.offset),
            Cell::new(t.length),
        ]));
    }

    println!("{}", table);
    Ok(())
}
