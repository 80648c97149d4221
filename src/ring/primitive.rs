//! Wrap-around byte copies over a fixed-size array.
//!
//! Offsets are always in `[0, buf.len())` on return. Callers guarantee
//! `n <= buf.len()`; occupancy accounting lives in the layer above.

/// Copies `src` into `buf` starting at `offset`, wrapping at the end.
/// Returns the offset following the last written byte.
pub fn copy_in(buf: &mut [u8], offset: usize, src: &[u8]) -> usize {
    let cap = buf.len();
    if cap == 0 || src.is_empty() {
        return offset;
    }
    let first = src.len().min(cap - offset);
    buf[offset..offset + first].copy_from_slice(&src[..first]);
    let rest = src.len() - first;
    if rest > 0 {
        buf[..rest].copy_from_slice(&src[first..]);
    }
    (offset + src.len()) % cap
}

/// Copies `n` bytes out of `buf` starting at `offset`, wrapping at the end.
///
/// With `dst == None` the bytes are skipped (advance and discard). With
/// `Some(dst)`, `dst` must hold at least `n` bytes.
pub fn copy_out(buf: &[u8], offset: usize, dst: Option<&mut [u8]>, n: usize) -> usize {
    let cap = buf.len();
    if cap == 0 || n == 0 {
        return offset;
    }
    if let Some(dst) = dst {
        let first = n.min(cap - offset);
        dst[..first].copy_from_slice(&buf[offset..offset + first]);
        let rest = n - first;
        if rest > 0 {
            dst[first..n].copy_from_slice(&buf[..rest]);
        }
    }
    (offset + n) % cap
}

/// Borrows `n` bytes at `offset` as up to two contiguous slices.
pub fn slices_at(buf: &[u8], offset: usize, n: usize) -> (&[u8], &[u8]) {
    let cap = buf.len();
    if cap == 0 || n == 0 {
        return (&[], &[]);
    }
    let first = n.min(cap - offset);
    (&buf[offset..offset + first], &buf[..n - first])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_in_wraps() {
        let mut buf = [0u8; 8];
        let next = copy_in(&mut buf, 6, &[1, 2, 3, 4]);
        assert_eq!(next, 2);
        assert_eq!(buf, [3, 4, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn copy_in_ending_exactly_at_capacity_returns_zero() {
        let mut buf = [0u8; 4];
        assert_eq!(copy_in(&mut buf, 2, &[9, 9]), 0);
    }

    #[test]
    fn copy_out_wraps_and_skips() {
        let buf = [3u8, 4, 0, 0, 0, 0, 1, 2];
        let mut dst = [0u8; 4];
        assert_eq!(copy_out(&buf, 6, Some(&mut dst), 4), 2);
        assert_eq!(dst, [1, 2, 3, 4]);

        assert_eq!(copy_out(&buf, 6, None, 4), 2);
    }

    #[test]
    fn slices_split_at_wrap() {
        let buf = [3u8, 4, 0, 0, 0, 0, 1, 2];
        let (a, b) = slices_at(&buf, 6, 4);
        assert_eq!(a, &[1, 2]);
        assert_eq!(b, &[3, 4]);

        let (a, b) = slices_at(&buf, 2, 3);
        assert_eq!(a, &[0, 0, 0]);
        assert!(b.is_empty());
    }
}
