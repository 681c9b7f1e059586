//! Reference writer for synthetic HDF4 data.
//!
//! Lays raw big-endian data regions into an in-memory file image and
//! builds the matching [`Directory`], standing in for the real header
//! parser. Readers are bound with [`Reader::with_directory`], which skips
//! the magic check.

use std::io::{Cursor, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use hdf4_reader::{
    Directory, DType, Reader, Storage, StorageDescriptor, StructMember,
};

/// An in-memory file image data regions are placed into.
#[derive(Default)]
pub struct FileImage {
    bytes: Vec<u8>,
}

impl FileImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `data` at `offset`, growing the image as needed.
    pub fn place(&mut self, offset: u64, data: &[u8]) -> u64 {
        let offset = offset as usize;
        if self.bytes.len() < offset + data.len() {
            self.bytes.resize(offset + data.len(), 0);
        }
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        offset as u64
    }

    /// Appends `data` at the current end, returning its offset.
    pub fn append(&mut self, data: &[u8]) -> u64 {
        let offset = self.bytes.len() as u64;
        self.bytes.extend_from_slice(data);
        offset
    }

    pub fn reader(self, directory: Directory) -> Reader<Cursor<Vec<u8>>> {
        Reader::with_directory(Cursor::new(self.bytes), directory)
    }
}

/// zlib-deflates a byte slice.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// A scalar-variable descriptor with defaults for the optional fields.
pub fn scalar_desc(dtype: DType, shape: &[u64], storage: Storage) -> StorageDescriptor {
    StorageDescriptor {
        element_size: dtype.byte_size(),
        dtype,
        shape: shape.to_vec(),
        fill_value: None,
        has_no_data: false,
        storage,
        compression: None,
        members: Vec::new(),
    }
}

/// A record-variable descriptor.
pub fn struct_desc(
    shape: &[u64],
    record_size: usize,
    members: Vec<StructMember>,
    storage: Storage,
) -> StorageDescriptor {
    StorageDescriptor {
        dtype: DType::Struct,
        shape: shape.to_vec(),
        element_size: record_size,
        fill_value: None,
        has_no_data: false,
        storage,
        compression: None,
        members,
    }
}

/// A directory holding a single variable named `name`.
pub fn single_var(name: &str, desc: StorageDescriptor) -> Directory {
    let mut dir = Directory::new();
    dir.add_variable(name, desc).unwrap();
    dir
}

macro_rules! be_fn {
    ($name:ident, $t:ty) => {
        /// Big-endian encoding of a slice, as written on disk.
        pub fn $name(values: &[$t]) -> Vec<u8> {
            values.iter().flat_map(|v| v.to_be_bytes()).collect()
        }
    };
}

be_fn!(be_i16, i16);
be_fn!(be_u16, u16);
be_fn!(be_i32, i32);
be_fn!(be_u32, u32);
be_fn!(be_i64, i64);
be_fn!(be_f32, f32);
be_fn!(be_f64, f64);
