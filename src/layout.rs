//! Layout enumerators.
//!
//! An enumerator turns `(storage geometry, section)` into a lazy sequence
//! of [`CopySpan`] directives that, executed in order, write exactly the
//! requested elements into a dense row-major output buffer. Outer
//! dimensions vary slowest; when the innermost stride is 1 a whole
//! innermost run is emitted as one span, otherwise spans are per-element.
//!
//! Three producers cover the storage kinds:
//! [`RegularLayout`] for one contiguous address space (a file extent or a
//! logical decompressed stream), [`SegmentedLayout`] for linked blocks,
//! and [`TiledLayout`] for chunked variables.

use crate::error::Error;
use crate::models::Segment;
use crate::section::{DimRange, Section};

/// One copy directive: `len` bytes from `src_pos` in the source address
/// space to `dst_pos` in the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopySpan {
    pub src_pos: u64,
    pub dst_pos: u64,
    pub len: u64,
}

/// Row-major element strides for a shape.
fn strides(shape: &[u64]) -> Vec<u64> {
    let mut out = vec![1u64; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        out[d] = out[d + 1] * shape[d + 1];
    }
    out
}

#[derive(Debug)]
struct OdoDim {
    index: u64,
    count: u64,
    src_step: u64,
}

// ---- Regular ----

/// Enumerates a section of a variable stored as one contiguous run of
/// elements starting at `base`.
#[derive(Debug)]
pub struct RegularLayout {
    base: u64,
    element_size: u64,
    dims: Vec<OdoDim>,
    run_elems: u64,
    total_elems: u64,
    emitted_elems: u64,
    src_elem: u64,
}

impl RegularLayout {
    /// `section` must be completed against `shape`.
    pub fn new(
        base: u64,
        element_size: usize,
        shape: &[u64],
        section: &Section,
    ) -> Result<Self, Error> {
        let rank = shape.len();
        if section.rank() != rank {
            return Err(Error::Internal(format!(
                "section rank {} does not match shape rank {}",
                section.rank(),
                rank
            )));
        }
        let ranges = section.ranges();
        let astride = strides(shape);

        let (run_elems, odo_rank) = match ranges.last() {
            Some(last) if last.stride == 1 => (last.len, rank - 1),
            Some(_) => (1, rank),
            None => (1, 0),
        };

        let dims = (0..odo_rank)
            .map(|d| OdoDim {
                index: 0,
                count: ranges[d].len,
                src_step: ranges[d].stride * astride[d],
            })
            .collect();

        let src_elem = ranges
            .iter()
            .zip(&astride)
            .map(|(r, s)| r.start * s)
            .sum();

        Ok(RegularLayout {
            base,
            element_size: element_size as u64,
            dims,
            run_elems,
            total_elems: section.num_elements(),
            emitted_elems: 0,
            src_elem,
        })
    }
}

impl Iterator for RegularLayout {
    type Item = CopySpan;

    fn next(&mut self) -> Option<CopySpan> {
        if self.emitted_elems >= self.total_elems {
            return None;
        }
        let span = CopySpan {
            src_pos: self.base + self.src_elem * self.element_size,
            dst_pos: self.emitted_elems * self.element_size,
            len: self.run_elems * self.element_size,
        };
        self.emitted_elems += self.run_elems;

        for d in (0..self.dims.len()).rev() {
            let dim = &mut self.dims[d];
            dim.index += 1;
            self.src_elem += dim.src_step;
            if dim.index < dim.count {
                break;
            }
            self.src_elem -= dim.src_step * dim.count;
            dim.index = 0;
        }
        Some(span)
    }
}

// ---- Segmented ----

/// Enumerates a section of a variable whose bytes are the concatenation of
/// linked segments. Emitted `src_pos` values are raw file offsets; a span
/// crossing a segment boundary is split at the boundary.
#[derive(Debug)]
pub struct SegmentedLayout {
    inner: RegularLayout,
    /// (logical start, file offset, length) of each non-empty segment.
    segs: Vec<(u64, u64, u64)>,
    seg_idx: usize,
    pending: Option<CopySpan>,
}

impl SegmentedLayout {
    pub fn new(
        segments: &[Segment],
        element_size: usize,
        shape: &[u64],
        section: &Section,
    ) -> Result<Self, Error> {
        let inner = RegularLayout::new(0, element_size, shape, section)?;

        let mut segs = Vec::with_capacity(segments.len());
        let mut logical = 0u64;
        for s in segments {
            if s.length == 0 {
                continue;
            }
            segs.push((logical, s.offset, s.length));
            logical += s.length;
        }

        // The section's byte demand must be covered by the segment list.
        let demand = max_logical_demand(shape, section, element_size);
        if demand > logical {
            return Err(Error::Truncated {
                offset: logical,
                needed: demand - logical,
            });
        }

        Ok(SegmentedLayout {
            inner,
            segs,
            seg_idx: 0,
            pending: None,
        })
    }
}

/// Exclusive upper bound of the logical byte range the section touches.
fn max_logical_demand(shape: &[u64], section: &Section, element_size: usize) -> u64 {
    let astride = strides(shape);
    let last_elem: u64 = section
        .ranges()
        .iter()
        .zip(&astride)
        .map(|(r, s)| (r.start + r.len.saturating_sub(1) * r.stride) * s)
        .sum();
    if section.num_elements() == 0 {
        0
    } else {
        (last_elem + 1) * element_size as u64
    }
}

impl Iterator for SegmentedLayout {
    type Item = CopySpan;

    fn next(&mut self) -> Option<CopySpan> {
        let span = match self.pending.take() {
            Some(s) => s,
            None => self.inner.next()?,
        };
        // Spans arrive in ascending logical order, so the cursor only
        // moves forward.
        while self.seg_idx < self.segs.len() {
            let (lstart, _, len) = self.segs[self.seg_idx];
            if span.src_pos < lstart + len {
                break;
            }
            self.seg_idx += 1;
        }
        let (lstart, foff, len) = self.segs[self.seg_idx];
        let avail = lstart + len - span.src_pos;
        let take = span.len.min(avail);
        if take < span.len {
            self.pending = Some(CopySpan {
                src_pos: span.src_pos + take,
                dst_pos: span.dst_pos + take,
                len: span.len - take,
            });
        }
        Some(CopySpan {
            src_pos: foff + (span.src_pos - lstart),
            dst_pos: span.dst_pos,
            len: take,
        })
    }
}

// ---- Tiled ----

/// Enumerates a section of a chunked variable, one chunk at a time.
///
/// [`TiledLayout::chunk_spans`] intersects a chunk's element-space box
/// with the section; chunks disjoint from the section yield `None` and
/// are never read. Emitted `src_pos` values are byte offsets into the
/// chunk's own data.
#[derive(Debug)]
pub struct TiledLayout {
    chunk_shape: Vec<u64>,
    element_size: u64,
    ranges: Vec<DimRange>,
    out_strides: Vec<u64>,
    chunk_strides: Vec<u64>,
}

impl TiledLayout {
    pub fn new(chunk_shape: &[u64], element_size: usize, section: &Section) -> Result<Self, Error> {
        if section.rank() != chunk_shape.len() {
            return Err(Error::Internal(format!(
                "chunk rank {} does not match section rank {}",
                chunk_shape.len(),
                section.rank()
            )));
        }
        Ok(TiledLayout {
            chunk_shape: chunk_shape.to_vec(),
            element_size: element_size as u64,
            ranges: section.ranges().to_vec(),
            out_strides: strides(&section.shape()),
            chunk_strides: strides(chunk_shape),
        })
    }

    /// Spans copying the intersection of the chunk at `origin` with the
    /// section, or `None` when the chunk is disjoint from it.
    pub fn chunk_spans(&self, origin: &[u64]) -> Result<Option<ChunkSpans>, Error> {
        let rank = self.chunk_shape.len();
        if origin.len() != rank {
            return Err(Error::Internal(format!(
                "chunk origin rank {} does not match variable rank {}",
                origin.len(),
                rank
            )));
        }
        for d in 0..rank {
            if origin[d] % self.chunk_shape[d] != 0 {
                return Err(Error::Internal(format!(
                    "chunk origin {:?} is not aligned to chunk shape {:?}",
                    origin, self.chunk_shape
                )));
            }
        }

        // Per dimension: output indices k with start + k*stride inside
        // [origin, origin + chunk_extent).
        let mut k_lo = vec![0u64; rank];
        let mut counts = vec![0u64; rank];
        for d in 0..rank {
            let r = self.ranges[d];
            let o = origin[d];
            let c = self.chunk_shape[d];
            if r.len == 0 {
                return Ok(None);
            }
            let lo = if r.start >= o {
                0
            } else {
                (o - r.start).div_ceil(r.stride)
            };
            if lo >= r.len {
                return Ok(None);
            }
            if r.start + lo * r.stride >= o + c {
                return Ok(None);
            }
            let hi = ((o + c - 1 - r.start) / r.stride).min(r.len - 1);
            k_lo[d] = lo;
            counts[d] = hi - lo + 1;
        }

        let (run_elems, odo_rank) = match self.ranges.last() {
            Some(last) if last.stride == 1 => (counts[rank - 1], rank - 1),
            Some(_) => (1, rank),
            None => (1, 0),
        };

        let mut src_elem = 0u64;
        let mut dst_elem = 0u64;
        for d in 0..rank {
            let r = self.ranges[d];
            src_elem += (r.start + k_lo[d] * r.stride - origin[d]) * self.chunk_strides[d];
            dst_elem += k_lo[d] * self.out_strides[d];
        }

        let mut remaining = 1u64;
        let dims = (0..odo_rank)
            .map(|d| {
                remaining *= counts[d];
                TiledDim {
                    index: 0,
                    count: counts[d],
                    src_step: self.ranges[d].stride * self.chunk_strides[d],
                    dst_step: self.out_strides[d],
                }
            })
            .collect();

        Ok(Some(ChunkSpans {
            element_size: self.element_size,
            run_elems,
            dims,
            src_elem,
            dst_elem,
            remaining,
        }))
    }
}

#[derive(Debug)]
struct TiledDim {
    index: u64,
    count: u64,
    src_step: u64,
    dst_step: u64,
}

/// Span iterator for one chunk's intersection with the section.
#[derive(Debug)]
pub struct ChunkSpans {
    element_size: u64,
    run_elems: u64,
    dims: Vec<TiledDim>,
    src_elem: u64,
    dst_elem: u64,
    remaining: u64,
}

impl Iterator for ChunkSpans {
    type Item = CopySpan;

    fn next(&mut self) -> Option<CopySpan> {
        if self.remaining == 0 {
            return None;
        }
        let span = CopySpan {
            src_pos: self.src_elem * self.element_size,
            dst_pos: self.dst_elem * self.element_size,
            len: self.run_elems * self.element_size,
        };
        self.remaining -= 1;

        for d in (0..self.dims.len()).rev() {
            let dim = &mut self.dims[d];
            dim.index += 1;
            self.src_elem += dim.src_step;
            self.dst_elem += dim.dst_step;
            if dim.index < dim.count {
                break;
            }
            self.src_elem -= dim.src_step * dim.count;
            self.dst_elem -= dim.dst_step * dim.count;
            dim.index = 0;
        }
        Some(span)
    }
}
