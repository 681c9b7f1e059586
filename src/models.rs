//! Core data model.
//!
//! [`StorageDescriptor`] and its companions describe where a variable's
//! bytes live on disk; the directory layer builds them at open time and the
//! read path consumes them without mutation. [`Array`] and [`RecordArray`]
//! are the materialized outputs handed back to the caller.

use crate::error::Error;
use crate::utils::num_elements;

// ---- Element types ----

/// On-disk element type of a variable.
///
/// `Char` is stored as unsigned bytes on disk and surfaced as character
/// data at the reader boundary; `Struct` marks fixed-size record variables
/// whose record size comes from [`StorageDescriptor::element_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    F32,
    F64,
    Char,
    Struct,
}

impl DType {
    /// Size of one scalar element in bytes. Zero for `Struct`, whose record
    /// size is carried by the descriptor instead.
    pub fn byte_size(&self) -> usize {
        match self {
            DType::I64 | DType::F64 => 8,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I16 | DType::U16 => 2,
            DType::I8 | DType::U8 | DType::Char => 1,
            DType::Struct => 0,
        }
    }

    pub fn is_multi_byte(&self) -> bool {
        self.byte_size() > 1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DType::I8 => "i8",
            DType::U8 => "u8",
            DType::I16 => "i16",
            DType::U16 => "u16",
            DType::I32 => "i32",
            DType::U32 => "u32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::Char => "char",
            DType::Struct => "struct",
        }
    }
}

// ---- Storage layout ----

/// One linked block: a byte range in the file.
///
/// Zero-length segments are legal in HDF4 linked-block lists and are
/// skipped wherever segments are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub offset: u64,
    pub length: u64,
}

impl Segment {
    pub fn new(offset: u64, length: u64) -> Self {
        Segment { offset, length }
    }
}

/// Where a run of raw bytes lives in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLocation {
    Contiguous { offset: u64, length: u64 },
    Linked { segments: Vec<Segment> },
}

/// Compression applied to a byte payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// Stored verbatim (HDF4 comp code 0).
    None,
    /// zlib-framed DEFLATE, RFC 1950/1951 (HDF4 comp code 4).
    Deflate,
    /// Any other HDF4 compression code; reads fail with `Unsupported`.
    Other(u16),
}

impl CompressionKind {
    /// Maps an HDF4 compression code to a kind.
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => CompressionKind::None,
            4 => CompressionKind::Deflate,
            other => CompressionKind::Other(other),
        }
    }
}

/// Compression descriptor for a variable or chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSpec {
    pub kind: CompressionKind,
    /// Exact byte length of the payload once decompressed.
    pub uncompressed_length: u64,
}

/// Data of a single chunk of a chunked variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkData {
    /// Raw chunk bytes at a file offset.
    Raw { offset: u64, length: u64 },
    /// Compressed chunk; the payload may itself be linked-segmented.
    Compressed {
        spec: CompressionSpec,
        data: DataLocation,
    },
}

/// A tile of a chunked variable, identified by its lower-corner origin in
/// element space. Origins are element-aligned: each component is a
/// multiple of the corresponding chunk-shape component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub origin: Vec<u64>,
    pub data: ChunkData,
}

/// Storage layout of a variable's data bytes.
///
/// When [`StorageDescriptor::compression`] is set, the bytes addressed by
/// `Contiguous` / `Linked` are the compressed payload; chunked variables
/// carry compression per chunk instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    Contiguous {
        start: u64,
        length: u64,
    },
    Linked {
        segments: Vec<Segment>,
    },
    Chunked {
        chunk_shape: Vec<u64>,
        chunks: Vec<Chunk>,
    },
}

// ---- Structure members ----

/// One member of a fixed-size record variable.
#[derive(Debug, Clone, PartialEq)]
pub struct StructMember {
    pub name: String,
    /// Byte offset of this member within each record.
    pub offset: usize,
    pub dtype: DType,
    /// Shape of the member within one record; empty for a scalar member.
    pub shape: Vec<u64>,
}

impl StructMember {
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Total byte span of this member within a record.
    pub fn byte_len(&self) -> usize {
        self.num_elements() as usize * self.dtype.byte_size()
    }
}

// ---- Storage descriptor ----

/// Per-variable storage description, produced by the directory layer at
/// open time and read-only to the materialization pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageDescriptor {
    pub dtype: DType,
    /// Extents per dimension; empty for a scalar variable.
    pub shape: Vec<u64>,
    /// Bytes per element; for `Struct`, the record size.
    pub element_size: usize,
    /// Byte pattern of length `element_size` written into cells not backed
    /// by data. Absent means zero-fill.
    pub fill_value: Option<Vec<u8>>,
    /// No data bytes exist; reads synthesize a fill-only array.
    pub has_no_data: bool,
    pub storage: Storage,
    /// Variable-level compression; the storage's raw bytes are the
    /// compressed payload.
    pub compression: Option<CompressionSpec>,
    /// Record members; non-empty exactly when `dtype` is `Struct`.
    pub members: Vec<StructMember>,
}

impl StorageDescriptor {
    pub fn num_elements(&self) -> Result<u64, Error> {
        num_elements(&self.shape)
    }

    /// Checks the descriptor's internal invariants. The directory runs
    /// this when a variable is added.
    pub fn validate(&self) -> Result<(), Error> {
        if self.element_size == 0 {
            return Err(Error::InvalidFileStructure(
                "element size must be positive".to_string(),
            ));
        }
        if self.shape.iter().any(|&d| d == 0) {
            return Err(Error::InvalidFileStructure(format!(
                "shape extents must be positive, got {:?}",
                self.shape
            )));
        }
        match self.dtype {
            DType::Struct => {
                if self.members.is_empty() {
                    return Err(Error::InvalidFileStructure(
                        "structure variable has no members".to_string(),
                    ));
                }
                for m in &self.members {
                    if m.dtype == DType::Struct {
                        return Err(Error::InvalidFileStructure(format!(
                            "nested structure member '{}'",
                            m.name
                        )));
                    }
                    if m.offset + m.byte_len() > self.element_size {
                        return Err(Error::InvalidFileStructure(format!(
                            "member '{}' extends past the {}-byte record",
                            m.name, self.element_size
                        )));
                    }
                }
            }
            dt => {
                if self.element_size != dt.byte_size() {
                    return Err(Error::InvalidFileStructure(format!(
                        "element size {} does not match {}",
                        self.element_size,
                        dt.as_str()
                    )));
                }
                if !self.members.is_empty() {
                    return Err(Error::InvalidFileStructure(
                        "non-structure variable carries members".to_string(),
                    ));
                }
            }
        }
        if let Some(fill) = &self.fill_value {
            if fill.len() != self.element_size {
                return Err(Error::InvalidFileStructure(format!(
                    "fill value is {} bytes, element size is {}",
                    fill.len(),
                    self.element_size
                )));
            }
        }
        if let Storage::Chunked { chunk_shape, .. } = &self.storage {
            if chunk_shape.len() != self.shape.len() {
                return Err(Error::InvalidFileStructure(format!(
                    "chunk shape rank {} does not match variable rank {}",
                    chunk_shape.len(),
                    self.shape.len()
                )));
            }
            if chunk_shape.iter().any(|&d| d == 0) {
                return Err(Error::InvalidFileStructure(
                    "chunk extents must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ---- Typed element access ----

/// Scalar types an [`Array`] can be viewed as.
pub trait Element: Copy {
    const DTYPE: DType;
    const SIZE: usize;

    fn from_ne_bytes(bytes: &[u8]) -> Self;
    fn from_be_bytes(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($t:ty, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_ne_bytes(bytes: &[u8]) -> Self {
                <$t>::from_ne_bytes(bytes.try_into().expect("element byte width"))
            }

            fn from_be_bytes(bytes: &[u8]) -> Self {
                <$t>::from_be_bytes(bytes.try_into().expect("element byte width"))
            }
        }
    };
}

impl_element!(i8, DType::I8);
impl_element!(u8, DType::U8);
impl_element!(i16, DType::I16);
impl_element!(u16, DType::U16);
impl_element!(i32, DType::I32);
impl_element!(u32, DType::U32);
impl_element!(i64, DType::I64);
impl_element!(f32, DType::F32);
impl_element!(f64, DType::F64);

// ---- Output arrays ----

/// A dense row-major array of scalar elements in host byte order.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    dtype: DType,
    shape: Vec<u64>,
    data: Vec<u8>,
}

impl Array {
    pub(crate) fn new(dtype: DType, shape: Vec<u64>, data: Vec<u8>) -> Self {
        Array { dtype, shape, data }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Raw host-endian bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The elements as a typed vector.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # fn read(mut reader: hdf4_reader::Reader<std::fs::File>) -> Result<(), hdf4_reader::Error> {
    /// let array = reader.read_data("temperature", None)?.into_array()?;
    /// let values: Vec<f32> = array.values()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn values<T: Element>(&self) -> Result<Vec<T>, Error> {
        if self.dtype != T::DTYPE {
            return Err(Error::TypeMismatch {
                expected: self.dtype.as_str().to_string(),
                found: T::DTYPE.as_str().to_string(),
            });
        }
        Ok(self
            .data
            .chunks_exact(T::SIZE)
            .map(T::from_ne_bytes)
            .collect())
    }

    /// Character view of a `Char` array.
    pub fn chars(&self) -> Result<Vec<char>, Error> {
        if self.dtype != DType::Char {
            return Err(Error::TypeMismatch {
                expected: "char".to_string(),
                found: self.dtype.as_str().to_string(),
            });
        }
        Ok(self.data.iter().map(|&b| b as char).collect())
    }
}

/// A dense row-major array of fixed-size records.
///
/// Record bytes are kept exactly as laid out on disk (big-endian,
/// member-by-member); endian conversion happens at member access.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordArray {
    shape: Vec<u64>,
    record_size: usize,
    members: Vec<StructMember>,
    data: Vec<u8>,
}

impl RecordArray {
    pub(crate) fn new(
        shape: Vec<u64>,
        record_size: usize,
        members: Vec<StructMember>,
        data: Vec<u8>,
    ) -> Self {
        RecordArray {
            shape,
            record_size,
            members,
            data,
        }
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn num_records(&self) -> u64 {
        self.shape.iter().product()
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn members(&self) -> &[StructMember] {
        &self.members
    }

    /// Raw record bytes in disk order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn find_member(&self, name: &str) -> Result<&StructMember, Error> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::VariableNotFound(name.to_string()))
    }

    /// All values of one member across every record, host-endian,
    /// flattened record-major.
    pub fn member_values<T: Element>(&self, name: &str) -> Result<Vec<T>, Error> {
        let member = self.find_member(name)?;
        if member.dtype != T::DTYPE {
            return Err(Error::TypeMismatch {
                expected: member.dtype.as_str().to_string(),
                found: T::DTYPE.as_str().to_string(),
            });
        }
        let per_record = member.num_elements() as usize;
        let mut out = Vec::with_capacity(self.num_records() as usize * per_record);
        for record in self.data.chunks_exact(self.record_size) {
            for k in 0..per_record {
                let at = member.offset + k * T::SIZE;
                out.push(T::from_be_bytes(&record[at..at + T::SIZE]));
            }
        }
        Ok(out)
    }
}

/// Result of a read: a scalar-element array or a record array.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Array(Array),
    Records(RecordArray),
}

impl Data {
    pub fn into_array(self) -> Result<Array, Error> {
        match self {
            Data::Array(a) => Ok(a),
            Data::Records(_) => Err(Error::TypeMismatch {
                expected: "array".to_string(),
                found: "records".to_string(),
            }),
        }
    }

    pub fn into_records(self) -> Result<RecordArray, Error> {
        match self {
            Data::Records(r) => Ok(r),
            Data::Array(_) => Err(Error::TypeMismatch {
                expected: "records".to_string(),
                found: "array".to_string(),
            }),
        }
    }
}
