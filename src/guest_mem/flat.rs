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
//! Module for [`FlatGuestMemory`].

use super::{FaultKind, GuestFault, GuestMemory};
use crate::GuestAddr;
use alloc::vec::Vec;

bitflags::bitflags! {
    /// Access permissions of a guest mapping.
    #[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
    pub struct MemProt: u8 {
        /// Mapping may be read.
        const READ = 1;
        /// Mapping may be written.
        const WRITE = 2;
    }
}

#[derive(Debug)]
struct Mapping {
    base: GuestAddr,
    prot: MemProt,
    bytes: Vec<u8>,
}

impl Mapping {
    /// Returns the offset of `[addr, addr + len)` inside this mapping, if
    /// the whole range is covered.
    fn offset_of(&self, addr: GuestAddr, len: u64) -> Option<usize> {
        let offset = addr.val().checked_sub(self.base.val())?;
        let end = offset.checked_add(len)?;
        (end <= self.bytes.len() as u64).then_some(offset as usize)
    }
}

/// [`GuestMemory`] backed by zero-initialized host buffers, one per
/// mapping.
///
/// Useful as the guest address space of a simple emulator and in tests. An
/// access must fall entirely into one mapping and requires the matching
/// [`MemProt`] bit.
#[derive(Debug, Default)]
pub struct FlatGuestMemory {
    mappings: Vec<Mapping>,
}

impl FlatGuestMemory {
    /// Creates an empty address space.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mappings: vec![],
        }
    }

    /// Maps `len` zeroed bytes at `base`.
    ///
    /// # Panics
    /// If the new mapping overlaps an existing one.
    pub fn map(&mut self, base: GuestAddr, len: u64, prot: MemProt) {
        let end = base.checked_add(len).expect("mapping must not wrap around");
        assert!(
            self.mappings.iter().all(|m| {
                let m_end = GuestAddr::new(m.base.val() + m.bytes.len() as u64);
                end <= m.base || base >= m_end
            }),
            "mappings must not overlap"
        );
        let len = usize::try_from(len).expect("mapping must fit into host memory");
        self.mappings.push(Mapping {
            base,
            prot,
            bytes: vec![0; len],
        });
    }

    /// Changes the permissions of the mapping starting at `base`.
    ///
    /// Returns `false` if no mapping starts at `base`.
    pub fn protect(&mut self, base: GuestAddr, prot: MemProt) -> bool {
        if let Some(mapping) = self.mappings.iter_mut().find(|m| m.base == base) {
            mapping.prot = prot;
            true
        } else {
            false
        }
    }

    fn lookup(
        &self,
        addr: GuestAddr,
        len: u64,
        needed: MemProt,
    ) -> Result<(usize, usize), GuestFault> {
        let (idx, offset) = self
            .mappings
            .iter()
            .enumerate()
            .find_map(|(i, m)| m.offset_of(addr, len).map(|off| (i, off)))
            .ok_or(GuestFault::new(addr, len, FaultKind::Unmapped))?;
        if self.mappings[idx].prot.contains(needed) {
            Ok((idx, offset))
        } else {
            Err(GuestFault::new(addr, len, FaultKind::ReadOnly))
        }
    }
}

impl GuestMemory for FlatGuestMemory {
    fn read_bytes(&self, addr: GuestAddr, buf: &mut [u8]) -> Result<(), GuestFault> {
        let (idx, offset) = self.lookup(addr, buf.len() as u64, MemProt::READ)?;
        buf.copy_from_slice(&self.mappings[idx].bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_bytes(&mut self, addr: GuestAddr, bytes: &[u8]) -> Result<(), GuestFault> {
        let (idx, offset) = self.lookup(addr, bytes.len() as u64, MemProt::WRITE)?;
        self.mappings[idx].bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_memory_access() {
        let mut mem = FlatGuestMemory::new();
        mem.map(GuestAddr::new(0x1000), 0x10, MemProt::READ | MemProt::WRITE);
        mem.map(GuestAddr::new(0x2000), 0x10, MemProt::READ);

        mem.write_bytes(GuestAddr::new(0x100c), b"abcd").unwrap();
        let mut buf = [0; 4];
        mem.read_bytes(GuestAddr::new(0x100c), &mut buf).unwrap();
        assert_eq!(&buf, b"abcd");

        // crosses the end of the mapping
        assert_eq!(
            mem.write_bytes(GuestAddr::new(0x100d), b"abcd"),
            Err(GuestFault::new(GuestAddr::new(0x100d), 4, FaultKind::Unmapped))
        );
        assert_eq!(
            mem.write_bytes(GuestAddr::new(0x2000), b"a").unwrap_err().kind,
            FaultKind::ReadOnly
        );
        assert_eq!(
            mem.read_bytes(GuestAddr::new(0x3000), &mut buf).unwrap_err().kind,
            FaultKind::Unmapped
        );

        assert!(mem.protect(GuestAddr::new(0x2000), MemProt::READ | MemProt::WRITE));
        assert!(!mem.protect(GuestAddr::new(0x2001), MemProt::READ));
        mem.write_bytes(GuestAddr::new(0x2000), b"a").unwrap();
    }

    #[test]
    #[should_panic(expected = "mappings must not overlap")]
    fn test_overlapping_mappings() {
        let mut mem = FlatGuestMemory::new();
        mem.map(GuestAddr::new(0x1000), 0x1000, MemProt::READ);
        mem.map(GuestAddr::new(0x1800), 0x1000, MemProt::READ);
    }
}
