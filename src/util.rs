/*
MIT License

Copyright (c) 2025 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/
//! Small helpers for alignment and NUL-byte handling.

/// Returns the index of the first null byte in the given slice.
///
/// If this returns `None`, the slice doesn't contain a NUL byte.
pub fn get_null_index(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == 0)
}

/// Rounds `val` up to the next multiple of `align`.
///
/// Returns `None` on overflow. `align` must be a power of two.
pub const fn checked_align_up(val: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    match val.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Rounds `val` down to the previous multiple of `align`.
///
/// `align` must be a power of two.
pub const fn align_down(val: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    val & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_null_index() {
        assert_eq!(get_null_index(b"hello\0world"), Some(5));
        assert_eq!(get_null_index(b"hello\0b\0"), Some(5));
        assert_eq!(get_null_index(b"\0\0"), Some(0));
        assert_eq!(get_null_index(b"1\0\0"), Some(1));
        assert_eq!(get_null_index(b""), None);
        assert_eq!(get_null_index(b"abc"), None);
    }

    #[test]
    fn test_align() {
        assert_eq!(checked_align_up(0, 8), Some(0));
        assert_eq!(checked_align_up(1, 8), Some(8));
        assert_eq!(checked_align_up(8, 8), Some(8));
        assert_eq!(checked_align_up(13, 4), Some(16));
        assert_eq!(checked_align_up(u64::MAX, 8), None);

        assert_eq!(align_down(0, 8), 0);
        assert_eq!(align_down(7, 8), 0);
        assert_eq!(align_down(0x1009, 4), 0x1008);
        assert_eq!(align_down(u64::MAX, 8), u64::MAX - 7);
    }
}
