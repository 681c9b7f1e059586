use crate::error::Error;

/// Swaps byte order of a buffer of multi-byte elements in place.
/// Assumes all elements in the buffer are of the same size.
pub(crate) fn swap_endianness_in_place(buffer: &mut [u8], element_size: usize) {
    if element_size <= 1 {
        return;
    }
    for chunk in buffer.chunks_exact_mut(element_size) {
        chunk.reverse();
    }
}

/// Number of elements described by a shape, with overflow checking.
pub(crate) fn num_elements(shape: &[u64]) -> Result<u64, Error> {
    shape.iter().try_fold(1u64, |acc, &d| {
        acc.checked_mul(d)
            .ok_or_else(|| Error::Internal(format!("element count overflow for shape {:?}", shape)))
    })
}

/// Byte length of `nelems` elements of `element_size` bytes, as usize.
pub(crate) fn byte_len(nelems: u64, element_size: usize) -> Result<usize, Error> {
    nelems
        .checked_mul(element_size as u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            Error::Internal(format!(
                "byte length overflow: {} elements of {} bytes",
                nelems, element_size
            ))
        })
}
