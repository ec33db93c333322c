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
//! Module for [`GuestAddr`] and [`StackRegion`].

use crate::util::{align_down, checked_align_up};
use core::fmt::{Debug, Display, Formatter, LowerHex};

/// An address in the translated (guest) address space.
///
/// The value is never dereferenced on the host. All accesses are routed
/// through a [`GuestMemory`]. Arithmetic is checked; an overflow yields
/// `None` instead of silently wrapping around.
///
/// [`GuestMemory`]: crate::GuestMemory
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct GuestAddr(u64);

impl GuestAddr {
    /// The null pointer of the guest.
    pub const NULL: Self = Self(0);

    /// Creates a new address.
    #[must_use]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn val(self) -> u64 {
        self.0
    }

    /// Returns `true` for the null pointer.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Adds `bytes`. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, bytes: u64) -> Option<Self> {
        match self.0.checked_add(bytes) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Subtracts `bytes`. Returns `None` on underflow.
    #[must_use]
    pub const fn checked_sub(self, bytes: u64) -> Option<Self> {
        match self.0.checked_sub(bytes) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Rounds down to a multiple of `align` (power of two).
    #[must_use]
    pub const fn align_down(self, align: u64) -> Self {
        Self(align_down(self.0, align))
    }

    /// Rounds up to a multiple of `align` (power of two). Returns `None` on
    /// overflow.
    #[must_use]
    pub const fn align_up(self, align: u64) -> Option<Self> {
        match checked_align_up(self.0, align) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Returns `true` if the address is a multiple of `align`.
    #[must_use]
    pub const fn is_aligned(self, align: u64) -> bool {
        self.0 % align == 0
    }
}

impl From<u64> for GuestAddr {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<GuestAddr> for u64 {
    fn from(value: GuestAddr) -> Self {
        value.0
    }
}

impl Debug for GuestAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "GuestAddr({:#x})", self.0)
    }
}

impl Display for GuestAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl LowerHex for GuestAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        LowerHex::fmt(&self.0, f)
    }
}

/// The reserved guest address range `[base, base + size)` that becomes the
/// initial stack of the guest process.
///
/// The region must already be mapped and writable. The stack image is built
/// from [`Self::top`] downwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StackRegion {
    base: GuestAddr,
    size: u64,
}

impl StackRegion {
    /// Creates a new region. Returns `None` if `base + size` overflows.
    #[must_use]
    pub const fn new(base: GuestAddr, size: u64) -> Option<Self> {
        match base.checked_add(size) {
            Some(_) => Some(Self { base, size }),
            None => None,
        }
    }

    /// Lowest address of the region.
    #[must_use]
    pub const fn base(&self) -> GuestAddr {
        self.base
    }

    /// Size of the region in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// First address above the region; the initial cursor of the builder.
    #[must_use]
    pub const fn top(&self) -> GuestAddr {
        GuestAddr(self.base.0 + self.size)
    }

    /// Returns `true` if `[addr, addr + len)` lies entirely inside the region.
    #[must_use]
    pub const fn contains(&self, addr: GuestAddr, len: u64) -> bool {
        match addr.0.checked_add(len) {
            Some(end) => addr.0 >= self.base.0 && end <= self.top().0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_addr_arithmetic() {
        let addr = GuestAddr::new(0x1000);
        assert_eq!(addr.checked_sub(0x10), Some(GuestAddr::new(0xff0)));
        assert_eq!(addr.checked_sub(0x1001), None);
        assert_eq!(GuestAddr::new(u64::MAX).checked_add(1), None);
        assert_eq!(GuestAddr::new(0x1003).align_down(8), GuestAddr::new(0x1000));
        assert_eq!(GuestAddr::new(0x1003).align_up(8), Some(GuestAddr::new(0x1008)));
        assert!(GuestAddr::new(0x1008).is_aligned(8));
        assert!(!GuestAddr::new(0x1004).is_aligned(8));
        assert!(GuestAddr::NULL.is_null());
    }

    #[test]
    fn test_stack_region() {
        let region = StackRegion::new(GuestAddr::new(0x1000), 0x1000).unwrap();
        assert_eq!(region.top(), GuestAddr::new(0x2000));
        assert!(region.contains(GuestAddr::new(0x1000), 0x1000));
        assert!(region.contains(GuestAddr::new(0x1ff8), 8));
        assert!(!region.contains(GuestAddr::new(0x1ff8), 9));
        assert!(!region.contains(GuestAddr::new(0xfff), 1));
        assert!(!region.contains(GuestAddr::new(u64::MAX), 2));

        assert!(StackRegion::new(GuestAddr::new(u64::MAX), 1).is_none());
    }
}
