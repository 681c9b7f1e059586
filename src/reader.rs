//! The HDF4 reader.
//!
//! [`Reader`] binds a seekable file handle to a [`Directory`] and exposes
//! hyperslab reads over its variables. Dispatch composes the layout
//! enumerators, byte sources and the copy engine according to each
//! variable's storage descriptor:
//!
//! | compression | storage    | path                                        |
//! |-------------|------------|---------------------------------------------|
//! | none        | contiguous | regular layout, positioned                  |
//! | none        | linked     | segmented layout, positioned                |
//! | none        | chunked    | tiled layout, per-chunk positioned          |
//! | DEFLATE     | contiguous | regular layout over the stream, streaming   |
//! | DEFLATE     | linked     | regular layout over the stream, streaming   |
//! | per chunk   | chunked    | tiled layout, per-chunk inflate to memory   |

use std::io::{Cursor, Read, Seek};

use crate::cancel::CancelToken;
use crate::copy::{copy_from_buffer, copy_positioned, copy_streaming, make_fill};
use crate::error::Error;
use crate::header::{Directory, ValueCharset, VarHandle};
use crate::layout::{RegularLayout, SegmentedLayout, TiledLayout};
use crate::models::{
    Array, Chunk, ChunkData, Data, DType, RecordArray, Storage, StorageDescriptor,
};
use crate::section::Section;
use crate::source::{decompress, materialize_compressed, read_extent, SegmentStream};
use crate::utils::{byte_len, swap_endianness_in_place};

/// Reader-scoped options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Log the layout chosen for each read at debug level.
    pub trace_layout: bool,
}

/// Reader for one HDF4 / HDF-EOS file.
///
/// Reads are synchronous and hold the file handle for their duration;
/// callers sharing a reader across threads must serialize access.
///
/// # Examples
///
/// ```no_run
/// use hdf4_reader::Section;
///
/// let mut reader = hdf4_reader::open("granule.hdf")?;
/// let sst = reader
///     .read_data("sea_surface_temperature", Some(&Section::slice(&[0..100, 0..100])))?
///     .into_array()?;
/// let values: Vec<i16> = sst.values()?;
/// # Ok::<(), hdf4_reader::Error>(())
/// ```
pub struct Reader<R> {
    file: R,
    directory: Directory,
    options: ReaderOptions,
    value_charset: ValueCharset,
}

impl<R: Read + Seek> Reader<R> {
    /// Opens a file handle: validates the magic number and scans the
    /// DD-block chain. The directory starts empty apart from the raw tag
    /// list; use [`Reader::with_directory`] to attach a populated one.
    pub fn open(mut file: R) -> Result<Self, Error> {
        let tags = crate::header::scan_tags(&mut file)?;
        Ok(Reader {
            file,
            directory: Directory::from_tags(tags),
            options: ReaderOptions::default(),
            value_charset: ValueCharset::default(),
        })
    }

    /// Binds a handle to an already-built directory. No magic check is
    /// performed; the directory's builder vouches for the handle.
    pub fn with_directory(file: R, directory: Directory) -> Self {
        Reader {
            file,
            directory,
            options: ReaderOptions::default(),
            value_charset: ValueCharset::default(),
        }
    }

    /// `"HDF4-EOS"` when the directory carries the EOS profile flag,
    /// `"HDF4"` otherwise.
    pub fn file_type_id(&self) -> &'static str {
        if self.directory.is_eos() {
            "HDF4-EOS"
        } else {
            "HDF4"
        }
    }

    pub fn header(&self) -> &Directory {
        &self.directory
    }

    pub fn header_mut(&mut self) -> &mut Directory {
        &mut self.directory
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ReaderOptions) {
        self.options = options;
    }

    /// Charset used by [`Reader::attribute_text`].
    pub fn value_charset(&self) -> ValueCharset {
        self.value_charset
    }

    pub fn set_value_charset(&mut self, charset: ValueCharset) {
        self.value_charset = charset;
    }

    /// Decoded text of a character-valued attribute.
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        self.directory
            .attribute(name)
            .map(|a| a.decode(self.value_charset))
    }

    /// Rebinds the file handle after an external reopen, returning the old
    /// handle. All directory descriptors remain valid.
    pub fn reacquire(&mut self, file: R) -> R {
        std::mem::replace(&mut self.file, file)
    }

    /// Reads a variable, or the given section of it. `None` reads the
    /// whole variable; a partial section is completed against its shape.
    pub fn read_data(&mut self, name: &str, section: Option<&Section>) -> Result<Data, Error> {
        self.read_data_cancellable(name, section, None)
    }

    /// [`Reader::read_data`] with a cancellation token, consulted between
    /// outer-dimension iterations and between chunks.
    pub fn read_data_cancellable(
        &mut self,
        name: &str,
        section: Option<&Section>,
        cancel: Option<&CancelToken>,
    ) -> Result<Data, Error> {
        let handle = self
            .directory
            .find(name)
            .ok_or_else(|| Error::VariableNotFound(name.to_string()))?;
        self.prepare(handle)?;

        let desc = self.directory.descriptor(handle);
        if desc.dtype == DType::Struct {
            read_structure(&mut self.file, desc, section, cancel, self.options).map(Data::Records)
        } else {
            read_array(&mut self.file, desc, section, cancel, self.options).map(Data::Array)
        }
    }

    /// Runs the variable's prepare hook, populating on-demand descriptor
    /// fields such as chunk lists.
    fn prepare(&mut self, handle: VarHandle) -> Result<(), Error> {
        let entry = self.directory.entry_mut(handle);
        if let Some(prepare) = entry.prepare.as_mut() {
            prepare(&mut self.file, &mut entry.descriptor)?;
        }
        Ok(())
    }
}

impl Reader<std::io::BufReader<std::fs::File>> {
    /// Opens the file at `path`.
    pub fn open_path(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::open(std::io::BufReader::new(file))
    }
}

// ---- Scalar variables ----

fn read_array<R: Read + Seek>(
    file: &mut R,
    desc: &StorageDescriptor,
    section: Option<&Section>,
    cancel: Option<&CancelToken>,
    options: ReaderOptions,
) -> Result<Array, Error> {
    let section = Section::complete(section, &desc.shape)?;
    let out_shape = section.shape();
    let esize = desc.element_size;
    let nbytes = byte_len(section.num_elements(), esize)?;
    let fill = desc.fill_value.as_deref();

    if desc.has_no_data {
        let data = make_fill(nbytes / esize, esize, fill);
        return Ok(finish_array(desc.dtype, out_shape, data, esize));
    }

    let mut out;
    match (&desc.compression, &desc.storage) {
        (None, Storage::Contiguous { start, .. }) => {
            trace_layout(options, desc, "regular/positioned");
            out = vec![0u8; nbytes];
            let layout = RegularLayout::new(*start, esize, &desc.shape, &section)?;
            copy_positioned(file, layout, &mut out, cancel)?;
        }
        (None, Storage::Linked { segments }) => {
            trace_layout(options, desc, "segmented/positioned");
            out = vec![0u8; nbytes];
            let layout = SegmentedLayout::new(segments, esize, &desc.shape, &section)?;
            copy_positioned(file, layout, &mut out, cancel)?;
        }
        (None, Storage::Chunked { chunk_shape, chunks }) => {
            trace_layout(options, desc, "tiled");
            out = make_fill(nbytes / esize, esize, fill);
            read_tiled(file, chunk_shape, chunks, esize, &section, &mut out, cancel)?;
        }
        (Some(spec), Storage::Contiguous { start, length }) => {
            trace_layout(options, desc, "regular/inflate-stream");
            out = vec![0u8; nbytes];
            let payload = read_extent(file, *start, *length)?;
            let mut source = decompress(spec.kind, Cursor::new(payload))?;
            let layout = RegularLayout::new(0, esize, &desc.shape, &section)?;
            copy_streaming(&mut source, layout, &mut out, cancel)?;
        }
        (Some(spec), Storage::Linked { segments }) => {
            trace_layout(options, desc, "linked/inflate-stream");
            out = vec![0u8; nbytes];
            let mut source = decompress(spec.kind, SegmentStream::new(file, segments))?;
            let layout = RegularLayout::new(0, esize, &desc.shape, &section)?;
            copy_streaming(&mut source, layout, &mut out, cancel)?;
        }
        (Some(_), Storage::Chunked { .. }) => {
            return Err(Error::Internal(
                "chunked storage carries its compression per chunk".to_string(),
            ));
        }
    }

    Ok(finish_array(desc.dtype, out_shape, out, esize))
}

/// Tiled read: intersect each chunk with the section, then copy either
/// straight from the file (raw chunks) or out of a buffer inflated for
/// the duration of that chunk's spans.
fn read_tiled<R: Read + Seek>(
    file: &mut R,
    chunk_shape: &[u64],
    chunks: &[Chunk],
    element_size: usize,
    section: &Section,
    out: &mut [u8],
    cancel: Option<&CancelToken>,
) -> Result<(), Error> {
    let layout = TiledLayout::new(chunk_shape, element_size, section)?;
    for chunk in chunks {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
        let spans = match layout.chunk_spans(&chunk.origin)? {
            Some(spans) => spans,
            None => continue,
        };
        match &chunk.data {
            ChunkData::Raw { offset, .. } => {
                let base = *offset;
                let shifted = spans.map(|mut s| {
                    s.src_pos += base;
                    s
                });
                copy_positioned(file, shifted, out, cancel)?;
            }
            ChunkData::Compressed { spec, data } => {
                let buffer = materialize_compressed(file, spec, data)?;
                copy_from_buffer(&buffer, spans, out)?;
            }
        }
    }
    Ok(())
}

/// Final surface step: one endian pass over the whole buffer, then the
/// typed array. `Char` stays byte-sized and is surfaced as characters by
/// [`Array::chars`].
fn finish_array(dtype: DType, shape: Vec<u64>, mut data: Vec<u8>, element_size: usize) -> Array {
    if dtype.is_multi_byte() && cfg!(target_endian = "little") {
        swap_endianness_in_place(&mut data, element_size);
    }
    Array::new(dtype, shape, data)
}

// ---- Structure variables ----

/// Whole-record reads of a fixed-size structure variable. The output
/// keeps the records byte-exact as on disk; members convert endianness
/// at access time.
fn read_structure<R: Read + Seek>(
    file: &mut R,
    desc: &StorageDescriptor,
    section: Option<&Section>,
    cancel: Option<&CancelToken>,
    options: ReaderOptions,
) -> Result<RecordArray, Error> {
    let section = Section::complete(section, &desc.shape)?;
    let out_shape = section.shape();
    let recsize = desc.element_size;
    let nbytes = byte_len(section.num_elements(), recsize)?;

    if desc.has_no_data {
        let data = make_fill(nbytes / recsize, recsize, desc.fill_value.as_deref());
        return Ok(RecordArray::new(out_shape, recsize, desc.members.clone(), data));
    }

    let mut out = vec![0u8; nbytes];
    match (&desc.compression, &desc.storage) {
        (None, Storage::Contiguous { start, .. }) => {
            trace_layout(options, desc, "records/regular/positioned");
            let layout = RegularLayout::new(*start, recsize, &desc.shape, &section)?;
            copy_positioned(file, layout, &mut out, cancel)?;
        }
        (None, Storage::Linked { segments }) => {
            trace_layout(options, desc, "records/linked-stream");
            let mut source = SegmentStream::new(file, segments);
            let layout = RegularLayout::new(0, recsize, &desc.shape, &section)?;
            copy_streaming(&mut source, layout, &mut out, cancel)?;
        }
        (Some(spec), Storage::Contiguous { start, length }) => {
            trace_layout(options, desc, "records/inflate-stream");
            let payload = read_extent(file, *start, *length)?;
            let mut source = decompress(spec.kind, Cursor::new(payload))?;
            let layout = RegularLayout::new(0, recsize, &desc.shape, &section)?;
            copy_streaming(&mut source, layout, &mut out, cancel)?;
        }
        (Some(spec), Storage::Linked { segments }) => {
            trace_layout(options, desc, "records/linked-inflate-stream");
            let mut source = decompress(spec.kind, SegmentStream::new(file, segments))?;
            let layout = RegularLayout::new(0, recsize, &desc.shape, &section)?;
            copy_streaming(&mut source, layout, &mut out, cancel)?;
        }
        (_, Storage::Chunked { .. }) => {
            return Err(Error::Unsupported(
                "chunked structure variables".to_string(),
            ));
        }
    }

    Ok(RecordArray::new(out_shape, recsize, desc.members.clone(), out))
}

fn trace_layout(options: ReaderOptions, desc: &StorageDescriptor, which: &str) {
    if options.trace_layout {
        log::debug!(
            "layout {} for {} variable of shape {:?}",
            which,
            desc.dtype.as_str(),
            desc.shape
        );
    }
}
