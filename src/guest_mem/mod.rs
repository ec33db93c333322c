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
//! Access to the translated address space of the guest.
//!
//! [`GuestMemory`] is the raw byte-level boundary that an emulator
//! implements on top of its address translation. [`GuestWriter`] adds the
//! target data model on top of it: word-sized and 32-bit scalar writes in
//! target byte order, and bounds checks against the [`StackRegion`] that is
//! currently being initialized.

mod flat;

pub use flat::{FlatGuestMemory, MemProt};

use crate::arch::TargetAbi;
use crate::{GuestAddr, StackRegion};
use core::fmt::Debug;

/// Why a guest memory access failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// No mapping covers the whole range.
    Unmapped,
    /// The mapping doesn't permit the access.
    ReadOnly,
    /// The range is not inside the stack region under construction.
    OutsideRegion,
    /// A word access is not aligned to the word size.
    Misaligned,
    /// The value doesn't fit into a target word.
    Unrepresentable,
}

/// A failed access to guest memory.
///
/// Accesses are all-or-nothing: when this is returned, no byte of the
/// access was transferred.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[error("guest memory fault at {addr} (+{len:#x} bytes): {kind:?}")]
pub struct GuestFault {
    /// First address of the failed access.
    pub addr: GuestAddr,
    /// Length of the failed access.
    pub len: u64,
    /// Reason.
    pub kind: FaultKind,
}

impl GuestFault {
    /// Creates a new fault.
    #[must_use]
    pub const fn new(addr: GuestAddr, len: u64, kind: FaultKind) -> Self {
        Self { addr, len, kind }
    }
}

/// Byte-level access to the guest address space.
///
/// Implementations translate guest addresses to host memory. An access
/// either completes entirely or fails with a [`GuestFault`] without side
/// effects.
pub trait GuestMemory: Debug {
    /// Copies `buf.len()` bytes starting at `addr` into `buf`.
    fn read_bytes(&self, addr: GuestAddr, buf: &mut [u8]) -> Result<(), GuestFault>;

    /// Copies `bytes` to guest memory starting at `addr`.
    fn write_bytes(&mut self, addr: GuestAddr, bytes: &[u8]) -> Result<(), GuestFault>;
}

/// Writes scalars and byte strings into a [`StackRegion`] of a
/// [`GuestMemory`], converting scalars to the byte order and width of the
/// target.
#[derive(Debug)]
pub struct GuestWriter<'m> {
    mem: &'m mut dyn GuestMemory,
    abi: TargetAbi,
    region: StackRegion,
}

impl<'m> GuestWriter<'m> {
    /// Creates a new writer for `region`.
    pub const fn new(mem: &'m mut dyn GuestMemory, abi: TargetAbi, region: StackRegion) -> Self {
        Self { mem, abi, region }
    }

    /// The data model of the target.
    #[must_use]
    pub const fn abi(&self) -> TargetAbi {
        self.abi
    }

    /// The region all writes are confined to.
    #[must_use]
    pub const fn region(&self) -> StackRegion {
        self.region
    }

    fn check_region(&self, addr: GuestAddr, len: u64) -> Result<(), GuestFault> {
        if self.region.contains(addr, len) {
            Ok(())
        } else {
            Err(GuestFault::new(addr, len, FaultKind::OutsideRegion))
        }
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, addr: GuestAddr, bytes: &[u8]) -> Result<(), GuestFault> {
        self.check_region(addr, bytes.len() as u64)?;
        self.mem.write_bytes(addr, bytes)
    }

    /// Writes one target word (`abi_ulong`) in target byte order.
    ///
    /// The address must be word aligned.
    pub fn write_word(&mut self, addr: GuestAddr, value: u64) -> Result<(), GuestFault> {
        let len = self.abi.word_bytes();
        if !addr.is_aligned(len) {
            return Err(GuestFault::new(addr, len, FaultKind::Misaligned));
        }
        let bytes = self
            .abi
            .encode_word(value)
            .ok_or(GuestFault::new(addr, len, FaultKind::Unrepresentable))?;
        self.write_bytes(addr, bytes.as_slice())
    }

    /// Writes a guest pointer. Same as [`Self::write_word`].
    pub fn write_ptr(&mut self, addr: GuestAddr, ptr: GuestAddr) -> Result<(), GuestFault> {
        self.write_word(addr, ptr.val())
    }

    /// Writes a 32-bit scalar in target byte order.
    pub fn write_u32(&mut self, addr: GuestAddr, value: u32) -> Result<(), GuestFault> {
        if !addr.is_aligned(4) {
            return Err(GuestFault::new(addr, 4, FaultKind::Misaligned));
        }
        let bytes = self.abi.encode_u32(value);
        self.write_bytes(addr, &bytes)
    }
}

/// Reads one target word from `mem`.
pub fn read_word(
    mem: &dyn GuestMemory,
    abi: TargetAbi,
    addr: GuestAddr,
) -> Result<u64, GuestFault> {
    let mut buf = [0; 8];
    let buf = &mut buf[..abi.word_bytes() as usize];
    mem.read_bytes(addr, buf)?;
    Ok(abi.decode_word(buf))
}

/// Reads a 32-bit scalar from `mem`.
pub fn read_u32(mem: &dyn GuestMemory, abi: TargetAbi, addr: GuestAddr) -> Result<u32, GuestFault> {
    let mut buf = [0; 4];
    mem.read_bytes(addr, &mut buf)?;
    Ok(abi.decode_u32(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Endianness, WordSize};

    const BASE: u64 = 0x7000_0000;

    fn mem() -> FlatGuestMemory {
        let mut mem = FlatGuestMemory::new();
        mem.map(GuestAddr::new(BASE), 0x100, MemProt::READ | MemProt::WRITE);
        mem
    }

    #[test]
    fn test_write_word_byte_order() {
        let mut mem = mem();
        let region = StackRegion::new(GuestAddr::new(BASE), 0x100).unwrap();
        let be32 = TargetAbi::new(WordSize::Bits32, Endianness::Big);
        let mut writer = GuestWriter::new(&mut mem, be32, region);
        writer.write_word(GuestAddr::new(BASE), 0xdead_beef).unwrap();
        writer.write_u32(GuestAddr::new(BASE + 4), 7).unwrap();

        let mut buf = [0; 8];
        mem.read_bytes(GuestAddr::new(BASE), &mut buf).unwrap();
        assert_eq!(buf, [0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 7]);
        assert_eq!(read_word(&mem, be32, GuestAddr::new(BASE)), Ok(0xdead_beef));
        assert_eq!(read_u32(&mem, be32, GuestAddr::new(BASE + 4)), Ok(7));
    }

    #[test]
    fn test_writer_rejects_bad_writes() {
        let mut mem = mem();
        // the region is only the upper half of the mapping
        let region = StackRegion::new(GuestAddr::new(BASE + 0x80), 0x80).unwrap();
        let le32 = TargetAbi::new(WordSize::Bits32, Endianness::Little);
        let mut writer = GuestWriter::new(&mut mem, le32, region);

        assert_eq!(
            writer.write_word(GuestAddr::new(BASE), 1).unwrap_err().kind,
            FaultKind::OutsideRegion
        );
        assert_eq!(
            writer.write_bytes(GuestAddr::new(BASE + 0xfc), b"abcde").unwrap_err().kind,
            FaultKind::OutsideRegion
        );
        assert_eq!(
            writer.write_word(GuestAddr::new(BASE + 0x82), 1).unwrap_err().kind,
            FaultKind::Misaligned
        );
        assert_eq!(
            writer
                .write_word(GuestAddr::new(BASE + 0x80), 0x1_0000_0000)
                .unwrap_err()
                .kind,
            FaultKind::Unrepresentable
        );

        let mut buf = [0xff; 0x100];
        mem.read_bytes(GuestAddr::new(BASE), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0), "nothing must be written");
    }
}
