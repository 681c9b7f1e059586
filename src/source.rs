//! Byte sources.
//!
//! [`SegmentStream`] presents a linked-block list as one forward-only
//! stream; [`decompress`] wraps any stream in DEFLATE inflation; and
//! [`materialize_compressed`] inflates a chunk's payload into memory for
//! the duration of that chunk's copies.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use flate2::read::ZlibDecoder;

use crate::error::Error;
use crate::models::{CompressionKind, CompressionSpec, DataLocation, Segment};

// ---- Linked-segment stream ----

/// Reads the concatenation of linked segments as one stream.
///
/// Holds one segment's bytes at a time; zero-length segments are skipped.
/// The stream is single-pass and non-restartable.
pub struct SegmentStream<'a, R: Read + Seek> {
    file: &'a mut R,
    segments: &'a [Segment],
    /// Next segment to load.
    index: usize,
    buf: Vec<u8>,
    pos: usize,
}

impl<'a, R: Read + Seek> SegmentStream<'a, R> {
    pub fn new(file: &'a mut R, segments: &'a [Segment]) -> Self {
        SegmentStream {
            file,
            segments,
            index: 0,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Loads the next non-empty segment. Returns false at end of stream.
    fn load_next_segment(&mut self) -> io::Result<bool> {
        loop {
            let seg = match self.segments.get(self.index) {
                Some(seg) => *seg,
                None => return Ok(false),
            };
            self.index += 1;
            if seg.length == 0 {
                continue;
            }
            self.file.seek(SeekFrom::Start(seg.offset))?;
            self.buf.resize(seg.length as usize, 0);
            self.file.read_exact(&mut self.buf)?;
            self.pos = 0;
            return Ok(true);
        }
    }
}

impl<R: Read + Seek> Read for SegmentStream<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.pos == self.buf.len() {
            if !self.load_next_segment()? {
                return Ok(0);
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// ---- Decompression ----

/// Wraps a byte source according to the compression kind.
pub fn decompress<'a, S: Read + 'a>(
    kind: CompressionKind,
    source: S,
) -> Result<Box<dyn Read + 'a>, Error> {
    match kind {
        CompressionKind::None => Ok(Box::new(source)),
        CompressionKind::Deflate => Ok(Box::new(ZlibDecoder::new(source))),
        CompressionKind::Other(code) => Err(Error::Unsupported(format!(
            "compression code {} (only NONE and DEFLATE are readable)",
            code
        ))),
    }
}

/// Reads a contiguous extent of the file into memory.
pub fn read_extent<R: Read + Seek>(file: &mut R, offset: u64, length: u64) -> Result<Vec<u8>, Error> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; length as usize];
    file.read_exact(&mut buf).map_err(|e| map_eof(e, offset))?;
    Ok(buf)
}

/// Fetches and fully inflates a compressed payload to exactly
/// `uncompressed_length` bytes. Short streams are reported as
/// [`Error::Truncated`]; bytes past the expected length are ignored.
pub fn materialize_compressed<R: Read + Seek>(
    file: &mut R,
    spec: &CompressionSpec,
    data: &DataLocation,
) -> Result<Vec<u8>, Error> {
    let expected = spec.uncompressed_length;
    let mut out = Vec::with_capacity(expected as usize);
    let n = match data {
        DataLocation::Contiguous { offset, length } => {
            let payload = read_extent(file, *offset, *length)?;
            let src = decompress(spec.kind, Cursor::new(payload))?;
            src.take(expected)
                .read_to_end(&mut out)
                .map_err(|e| map_eof(e, 0))?
        }
        DataLocation::Linked { segments } => {
            let src = decompress(spec.kind, SegmentStream::new(file, segments))?;
            src.take(expected)
                .read_to_end(&mut out)
                .map_err(|e| map_eof(e, 0))?
        }
    };
    if (n as u64) < expected {
        return Err(Error::Truncated {
            offset: n as u64,
            needed: expected - n as u64,
        });
    }
    Ok(out)
}

/// Maps an unexpected end-of-file to the truncated-stream error; other
/// I/O failures pass through.
pub(crate) fn map_eof(e: io::Error, offset: u64) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated { offset, needed: 0 }
    } else {
        Error::Io(e)
    }
}
