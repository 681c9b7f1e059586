//! # hdf4-reader
//!
//! Read-only access to HDF4 and HDF-EOS scientific data files, exposing
//! file contents as typed multidimensional arrays.
//!
//! The crate centers on the data-materialization pipeline: given a
//! variable's storage descriptor (contiguous, linked-segmented or chunked,
//! optionally DEFLATE-compressed) and a requested hyperslab, it produces
//! the selected elements in row-major order, stitching segments, inflating
//! streams and filling holes with the variable's fill value.
//!
//! ## Reading
//!
//! ```no_run
//! use hdf4_reader::Section;
//!
//! let mut reader = hdf4_reader::open("MOD021KM.hdf")?;
//! println!("{}", reader.file_type_id()); // "HDF4" or "HDF4-EOS"
//!
//! let radiance = reader
//!     .read_data("EV_1KM_RefSB", Some(&Section::slice(&[0..1, 0..203, 0..135])))?
//!     .into_array()?;
//! let values: Vec<u16> = radiance.values()?;
//! # Ok::<(), hdf4_reader::Error>(())
//! ```
//!
//! ## Structure variables
//!
//! Fixed-size record variables are read whole-record; members convert
//! from big-endian at access time:
//!
//! ```no_run
//! # fn read(mut reader: hdf4_reader::Reader<std::fs::File>) -> Result<(), hdf4_reader::Error> {
//! let records = reader.read_data("scan_line_metadata", None)?.into_records()?;
//! let times: Vec<i32> = records.member_values("scan_time")?;
//! # Ok(())
//! # }
//! ```
//!
//! The directory of variables is built at open time and read-only
//! afterwards; reads never mutate it apart from per-variable prepare
//! hooks that lazily load chunk lists.

pub mod cancel;
pub mod copy;
pub mod error;
pub mod header;
pub mod layout;
pub mod models;
pub mod reader;
pub mod section;
pub mod source;
mod utils;

pub use cancel::CancelToken;
pub use error::Error;
pub use header::{Attribute, Directory, FileSource, PrepareFn, RawTag, ValueCharset, VarHandle};
pub use models::{
    Array, Chunk, ChunkData, CompressionKind, CompressionSpec, DType, Data, DataLocation, Element,
    RecordArray, Segment, Storage, StorageDescriptor, StructMember,
};
pub use reader::{Reader, ReaderOptions};
pub use section::{DimRange, Section};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Opens the HDF4 file at `path`.
pub fn open(path: impl AsRef<Path>) -> Result<Reader<BufReader<File>>, Error> {
    Reader::open_path(path)
}

/// Whether the file at `path` starts with the HDF4 magic number.
pub fn is_hdf4_file(path: impl AsRef<Path>) -> Result<bool, Error> {
    let mut file = BufReader::new(File::open(path)?);
    header::is_valid_file(&mut file)
}
