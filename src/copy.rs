//! Copy engine.
//!
//! Executes [`CopySpan`] directives against a positioned file, a
//! forward-only byte stream, or an in-memory chunk buffer. Output buffers
//! are filled with raw on-disk (big-endian) bytes; the reader performs one
//! endian pass over the whole buffer afterwards.

use std::io::{Read, Seek, SeekFrom};

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::layout::CopySpan;
use crate::source::map_eof;

/// Builds a buffer of `nelems` elements, each `element_size` bytes,
/// initialized from the fill pattern (zeroed when absent).
pub fn make_fill(nelems: usize, element_size: usize, fill: Option<&[u8]>) -> Vec<u8> {
    match fill {
        Some(pattern) if pattern.iter().any(|&b| b != 0) => {
            let mut out = Vec::with_capacity(nelems * element_size);
            for _ in 0..nelems {
                out.extend_from_slice(pattern);
            }
            out
        }
        _ => vec![0u8; nelems * element_size],
    }
}

fn check_cancel(cancel: Option<&CancelToken>) -> Result<(), Error> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Positioned mode: seek to each span's source position and read it
/// directly into the output buffer.
pub fn copy_positioned<R: Read + Seek>(
    file: &mut R,
    spans: impl Iterator<Item = CopySpan>,
    out: &mut [u8],
    cancel: Option<&CancelToken>,
) -> Result<(), Error> {
    for span in spans {
        check_cancel(cancel)?;
        file.seek(SeekFrom::Start(span.src_pos))?;
        let dst = span_dst(out, &span)?;
        file.read_exact(dst).map_err(|e| map_eof(e, span.src_pos))?;
    }
    Ok(())
}

/// Streaming mode: spans must arrive in non-decreasing source order; the
/// gap before each span is consumed and discarded.
pub fn copy_streaming<S: Read>(
    source: &mut S,
    spans: impl Iterator<Item = CopySpan>,
    out: &mut [u8],
    cancel: Option<&CancelToken>,
) -> Result<(), Error> {
    let mut cursor = 0u64;
    let mut scratch = [0u8; 4096];
    for span in spans {
        check_cancel(cancel)?;
        if span.src_pos < cursor {
            return Err(Error::Internal(format!(
                "directive at {} behind stream cursor {}",
                span.src_pos, cursor
            )));
        }
        let mut skip = span.src_pos - cursor;
        while skip > 0 {
            let n = skip.min(scratch.len() as u64) as usize;
            source
                .read_exact(&mut scratch[..n])
                .map_err(|e| map_eof(e, cursor))?;
            skip -= n as u64;
            cursor += n as u64;
        }
        let dst = span_dst(out, &span)?;
        source.read_exact(dst).map_err(|e| map_eof(e, cursor))?;
        cursor += span.len;
    }
    Ok(())
}

/// Buffer mode: copy spans out of a materialized chunk buffer.
pub fn copy_from_buffer(
    buf: &[u8],
    spans: impl Iterator<Item = CopySpan>,
    out: &mut [u8],
) -> Result<(), Error> {
    for span in spans {
        let end = span.src_pos + span.len;
        if end > buf.len() as u64 {
            return Err(Error::Truncated {
                offset: buf.len() as u64,
                needed: end - buf.len() as u64,
            });
        }
        let dst = span_dst(out, &span)?;
        dst.copy_from_slice(&buf[span.src_pos as usize..end as usize]);
    }
    Ok(())
}

fn span_dst<'a>(out: &'a mut [u8], span: &CopySpan) -> Result<&'a mut [u8], Error> {
    let start = span.dst_pos as usize;
    let end = start + span.len as usize;
    if end > out.len() {
        return Err(Error::Internal(format!(
            "directive writes {}..{} past output of {} bytes",
            start,
            end,
            out.len()
        )));
    }
    Ok(&mut out[start..end])
}
