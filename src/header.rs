//! File directory.
//!
//! HDF4 files open with a 4-byte magic number followed by a chain of
//! data-descriptor (DD) blocks; every object in the file is a tagged
//! `(tag, ref, offset, length)` record in that chain. This module checks
//! the magic, walks the DD chain into a raw tag list, and owns the
//! [`Directory`]: an arena of named variables (each a
//! [`StorageDescriptor`]) and global attributes. Synthesizing variables
//! from real tag graphs is the directory builder's job; the read path only
//! consumes the arena.

use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::Error;
use crate::models::{DType, StorageDescriptor};

/// The HDF4 magic number at offset 0.
pub const MAGIC: [u8; 4] = [0x0E, 0x03, 0x13, 0x01];

/// Empty DD slot.
const TAG_NULL: u16 = 1;

const MAX_DD_BLOCKS: usize = 100_000;

/// Object a seekable handle can stand in for.
pub trait FileSource: Read + Seek {}

impl<T: Read + Seek> FileSource for T {}

/// Whether the handle points at an HDF4 file. Short files are simply not
/// HDF4; I/O failures propagate.
pub fn is_valid_file<R: Read + Seek>(file: &mut R) -> Result<bool, Error> {
    file.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

// ---- Raw tags ----

/// One data descriptor from the DD chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTag {
    pub tag: u16,
    pub ref_no: u16,
    pub offset: u32,
    pub length: u32,
}

impl RawTag {
    /// Human-readable name of well-known HDF4 tags.
    pub fn tag_name(&self) -> &'static str {
        match self.tag {
            1 => "DFTAG_NULL",
            20 => "DFTAG_LINKED",
            30 => "DFTAG_VERSION",
            40 => "DFTAG_COMPRESSED",
            61 => "DFTAG_CHUNK",
            100 => "DFTAG_FID",
            101 => "DFTAG_FD",
            104 => "DFTAG_DIL",
            105 => "DFTAG_DIA",
            106 => "DFTAG_NT",
            306 => "DFTAG_RIG",
            701 => "DFTAG_SDD",
            702 => "DFTAG_SD",
            704 => "DFTAG_SDL",
            720 => "DFTAG_NDG",
            731 => "DFTAG_CAL",
            732 => "DFTAG_FV",
            1962 => "DFTAG_VH",
            1963 => "DFTAG_VS",
            1965 => "DFTAG_VG",
            _ => "unknown",
        }
    }
}

/// Validates the magic and walks the DD-block chain.
///
/// Each block is `ndds: u16, next: u32` followed by `ndds` 12-byte
/// descriptors, all big-endian; `next == 0` terminates the chain. Null
/// descriptors (empty slots) are dropped.
pub fn scan_tags<R: Read + Seek>(file: &mut R) -> Result<Vec<RawTag>, Error> {
    if !is_valid_file(file)? {
        return Err(Error::InvalidFileStructure(
            "missing HDF4 magic number".to_string(),
        ));
    }

    let mut tags = Vec::new();
    let mut visited = HashSet::new();
    let mut block = MAGIC.len() as u64;
    for _ in 0..MAX_DD_BLOCKS {
        if !visited.insert(block) {
            return Err(Error::InvalidFileStructure(format!(
                "DD block chain loops back to offset {}",
                block
            )));
        }
        file.seek(SeekFrom::Start(block))?;
        let ndds = file.read_u16::<BigEndian>()?;
        let next = file.read_u32::<BigEndian>()?;
        for _ in 0..ndds {
            let tag = file.read_u16::<BigEndian>()?;
            let ref_no = file.read_u16::<BigEndian>()?;
            let offset = file.read_u32::<BigEndian>()?;
            let length = file.read_u32::<BigEndian>()?;
            if tag == TAG_NULL {
                continue;
            }
            tags.push(RawTag {
                tag,
                ref_no,
                offset,
                length,
            });
        }
        if next == 0 {
            return Ok(tags);
        }
        block = next as u64;
    }
    Err(Error::InvalidFileStructure(
        "DD block chain exceeds block limit".to_string(),
    ))
}

// ---- Attributes ----

/// Charset applied when decoding attribute byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueCharset {
    #[default]
    Utf8,
    Latin1,
}

/// A named attribute with its raw on-disk value.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub dtype: DType,
    pub value: Vec<u8>,
}

impl Attribute {
    /// Decodes a character-valued attribute with the given charset.
    pub fn decode(&self, charset: ValueCharset) -> String {
        match charset {
            ValueCharset::Utf8 => String::from_utf8_lossy(&self.value).into_owned(),
            ValueCharset::Latin1 => self.value.iter().map(|&b| b as char).collect(),
        }
    }
}

// ---- Directory ----

/// Handle to a variable in the directory arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarHandle(pub(crate) usize);

/// Hook that lazily populates on-demand descriptor fields (chunk lists)
/// from the file; invoked once per read before the storage is inspected.
pub type PrepareFn = Box<dyn FnMut(&mut dyn FileSource, &mut StorageDescriptor) -> Result<(), Error> + Send>;

pub(crate) struct VariableEntry {
    pub(crate) name: String,
    pub(crate) descriptor: StorageDescriptor,
    pub(crate) prepare: Option<PrepareFn>,
}

/// Arena of variables and attributes describing one file's contents.
///
/// Built once at open time; descriptors are read-only afterwards (apart
/// from their prepare hooks). Variables are addressed by name or by the
/// [`VarHandle`] returned when they were added.
#[derive(Default)]
pub struct Directory {
    tags: Vec<RawTag>,
    variables: Vec<VariableEntry>,
    attributes: Vec<Attribute>,
    eos: bool,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tags(tags: Vec<RawTag>) -> Self {
        Directory {
            tags,
            ..Self::default()
        }
    }

    /// Raw tags from the DD chain, in file order.
    pub fn tags(&self) -> &[RawTag] {
        &self.tags
    }

    /// Whether this file carries the EOS profile marker.
    pub fn is_eos(&self) -> bool {
        self.eos
    }

    pub fn set_eos(&mut self, eos: bool) {
        self.eos = eos;
    }

    /// Adds a variable after validating its descriptor.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        descriptor: StorageDescriptor,
    ) -> Result<VarHandle, Error> {
        let name = name.into();
        descriptor.validate()?;
        if self.find(&name).is_some() {
            return Err(Error::InvalidFileStructure(format!(
                "duplicate variable '{}'",
                name
            )));
        }
        self.variables.push(VariableEntry {
            name,
            descriptor,
            prepare: None,
        });
        Ok(VarHandle(self.variables.len() - 1))
    }

    /// Installs the lazy-population hook for a variable.
    pub fn set_prepare(&mut self, handle: VarHandle, prepare: PrepareFn) {
        self.variables[handle.0].prepare = Some(prepare);
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn find(&self, name: &str) -> Option<VarHandle> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(VarHandle)
    }

    pub fn descriptor(&self, handle: VarHandle) -> &StorageDescriptor {
        &self.variables[handle.0].descriptor
    }

    pub(crate) fn entry_mut(&mut self, handle: VarHandle) -> &mut VariableEntry {
        &mut self.variables[handle.0]
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("tags", &self.tags.len())
            .field("variables", &self.variables.len())
            .field("attributes", &self.attributes.len())
            .field("eos", &self.eos)
            .finish()
    }
}
