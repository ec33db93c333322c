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
//! Module for [`PsStrings`].

use crate::arch::TargetAbi;
use crate::guest_mem::{FaultKind, GuestFault, GuestMemory, GuestWriter, read_u32, read_word};
use crate::GuestAddr;

/// The `struct ps_strings` record at the very top of the initial stack.
///
/// Tools like `ps(1)` and the runtime linker use it to find the argument
/// and environment pointer tables of a process. In the target's memory it
/// looks like this (one word slot per field; the counts are `u32` and
/// padded to a full word on 64-bit targets):
///
/// ```text
/// char   **ps_argvstr;   // slot 0
/// u_int    ps_nargvstr;  // slot 1
/// char   **ps_envstr;    // slot 2
/// u_int    ps_nenvstr;   // slot 3
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PsStrings {
    /// Address of the argument pointer table.
    pub argv: GuestAddr,
    /// Number of arguments.
    pub argc: u32,
    /// Address of the environment pointer table.
    pub envv: GuestAddr,
    /// Number of environment variables.
    pub envc: u32,
}

impl PsStrings {
    /// Size of the record for the given target.
    #[must_use]
    pub const fn size(abi: TargetAbi) -> u64 {
        4 * abi.word_bytes()
    }

    /// Writes the record to `addr` in a single access.
    pub fn write(&self, writer: &mut GuestWriter<'_>, addr: GuestAddr) -> Result<(), GuestFault> {
        let abi = writer.abi();
        let size = Self::size(abi);
        let word = abi.word_bytes() as usize;
        let unrepresentable = GuestFault::new(addr, size, FaultKind::Unrepresentable);

        let mut buf = [0_u8; 32];
        let argv = abi.encode_word(self.argv.val()).ok_or(unrepresentable)?;
        let envv = abi.encode_word(self.envv.val()).ok_or(unrepresentable)?;
        buf[..word].copy_from_slice(argv.as_slice());
        buf[word..word + 4].copy_from_slice(&abi.encode_u32(self.argc));
        buf[2 * word..3 * word].copy_from_slice(envv.as_slice());
        buf[3 * word..3 * word + 4].copy_from_slice(&abi.encode_u32(self.envc));

        writer.write_bytes(addr, &buf[..size as usize])
    }

    /// Reads the record from `addr`.
    pub fn read(mem: &dyn GuestMemory, abi: TargetAbi, addr: GuestAddr) -> Result<Self, GuestFault> {
        let word = abi.word_bytes();
        let slot = |i: u64| GuestAddr::new(addr.val() + i * word);
        Ok(Self {
            argv: GuestAddr::new(read_word(mem, abi, slot(0))?),
            argc: read_u32(mem, abi, slot(1))?,
            envv: GuestAddr::new(read_word(mem, abi, slot(2))?),
            envc: read_u32(mem, abi, slot(3))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Endianness, WordSize};
    use crate::guest_mem::{FlatGuestMemory, MemProt};
    use crate::StackRegion;

    #[test]
    fn test_ps_strings_layout_be64() {
        let abi = TargetAbi::new(WordSize::Bits64, Endianness::Big);
        assert_eq!(PsStrings::size(abi), 32);

        let mut mem = FlatGuestMemory::new();
        mem.map(GuestAddr::new(0x1000), 0x20, MemProt::READ | MemProt::WRITE);
        let region = StackRegion::new(GuestAddr::new(0x1000), 0x20).unwrap();
        let record = PsStrings {
            argv: GuestAddr::new(0x0102),
            argc: 3,
            envv: GuestAddr::new(0x0304),
            envc: 5,
        };
        record
            .write(&mut GuestWriter::new(&mut mem, abi, region), GuestAddr::new(0x1000))
            .unwrap();

        let mut buf = [0; 32];
        mem.read_bytes(GuestAddr::new(0x1000), &mut buf).unwrap();
        assert_eq!(
            buf,
            [
                0, 0, 0, 0, 0, 0, 1, 2, // ps_argvstr
                0, 0, 0, 3, 0, 0, 0, 0, // ps_nargvstr + padding
                0, 0, 0, 0, 0, 0, 3, 4, // ps_envstr
                0, 0, 0, 5, 0, 0, 0, 0, // ps_nenvstr + padding
            ]
        );
        assert_eq!(PsStrings::read(&mem, abi, GuestAddr::new(0x1000)), Ok(record));
    }

    #[test]
    fn test_ps_strings_layout_le32() {
        let abi = TargetAbi::new(WordSize::Bits32, Endianness::Little);
        assert_eq!(PsStrings::size(abi), 16);

        let mut mem = FlatGuestMemory::new();
        mem.map(GuestAddr::new(0x1000), 0x10, MemProt::READ | MemProt::WRITE);
        let region = StackRegion::new(GuestAddr::new(0x1000), 0x10).unwrap();
        let record = PsStrings {
            argv: GuestAddr::new(0xbfff_0000),
            argc: 1,
            envv: GuestAddr::new(0xbfff_0008),
            envc: 0,
        };
        record
            .write(&mut GuestWriter::new(&mut mem, abi, region), GuestAddr::new(0x1000))
            .unwrap();

        let mut buf = [0; 16];
        mem.read_bytes(GuestAddr::new(0x1000), &mut buf).unwrap();
        assert_eq!(
            buf,
            [0, 0, 0xff, 0xbf, 1, 0, 0, 0, 8, 0, 0xff, 0xbf, 0, 0, 0, 0]
        );
    }
}
