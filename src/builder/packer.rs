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
//! Module for [`pack_strings`].

use crate::guest_mem::{FaultKind, GuestFault, GuestWriter};
use crate::GuestAddr;
use alloc::ffi::CString;

/// Advances a cursor, failing like a write past the end of the address
/// space would.
fn advance(addr: GuestAddr, bytes: u64) -> Result<GuestAddr, GuestFault> {
    addr.checked_add(bytes)
        .ok_or(GuestFault::new(addr, bytes, FaultKind::OutsideRegion))
}

/// Copies `strings` (including their NUL bytes) one after another to
/// `data` and stores the guest address of each copy in the pointer table
/// at `table`, followed by a null pointer.
///
/// Returns the data cursor behind the last string and the table cursor
/// behind the null pointer.
pub fn pack_strings(
    writer: &mut GuestWriter<'_>,
    strings: &[CString],
    mut data: GuestAddr,
    mut table: GuestAddr,
) -> Result<(GuestAddr, GuestAddr), GuestFault> {
    let word = writer.abi().word_bytes();
    for string in strings {
        let bytes = string.as_bytes_with_nul();
        writer.write_bytes(data, bytes)?;
        writer.write_ptr(table, data)?;
        log::trace!("{table}: {data} -> {string:?}");

        data = advance(data, bytes.len() as u64)?;
        table = advance(table, word)?;
    }
    writer.write_ptr(table, GuestAddr::NULL)?;
    table = advance(table, word)?;
    Ok((data, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Endianness, TargetAbi, WordSize};
    use crate::guest_mem::{FlatGuestMemory, GuestMemory, MemProt, read_word};
    use crate::StackRegion;
    use alloc::borrow::ToOwned;
    use std::vec::Vec;

    const BASE: u64 = 0x4000;

    fn setup() -> (FlatGuestMemory, StackRegion) {
        let mut mem = FlatGuestMemory::new();
        mem.map(GuestAddr::new(BASE), 0x100, MemProt::READ | MemProt::WRITE);
        (mem, StackRegion::new(GuestAddr::new(BASE), 0x100).unwrap())
    }

    #[test]
    fn test_pack_strings() {
        let (mut mem, region) = setup();
        let abi = TargetAbi::new(WordSize::Bits64, Endianness::Little);
        let strings = [c"one".to_owned(), c"".to_owned(), c"three".to_owned()];
        let data = GuestAddr::new(BASE);
        let table = GuestAddr::new(BASE + 0x80);

        let (data_end, table_end) = {
            let mut writer = GuestWriter::new(&mut mem, abi, region);
            pack_strings(&mut writer, &strings, data, table).unwrap()
        };
        // "one\0" + "\0" + "three\0"
        assert_eq!(data_end, GuestAddr::new(BASE + 11));
        // three entries + null
        assert_eq!(table_end, GuestAddr::new(BASE + 0x80 + 4 * 8));

        let ptrs = (0..4)
            .map(|i| read_word(&mem, abi, GuestAddr::new(BASE + 0x80 + i * 8)).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(ptrs, [BASE, BASE + 4, BASE + 5, 0]);

        let mut buf = [0; 11];
        mem.read_bytes(data, &mut buf).unwrap();
        assert_eq!(&buf, b"one\0\0three\0");
    }

    #[test]
    fn test_pack_no_strings() {
        let (mut mem, region) = setup();
        let abi = TargetAbi::new(WordSize::Bits32, Endianness::Big);
        let mut writer = GuestWriter::new(&mut mem, abi, region);
        let data = GuestAddr::new(BASE);
        let table = GuestAddr::new(BASE + 0x10);
        assert_eq!(
            pack_strings(&mut writer, &[], data, table),
            Ok((data, GuestAddr::new(BASE + 0x14)))
        );
    }

    #[test]
    fn test_pack_fault() {
        let (mut mem, region) = setup();
        let abi = TargetAbi::new(WordSize::Bits64, Endianness::Little);
        let mut writer = GuestWriter::new(&mut mem, abi, region);
        // the string runs over the end of the region
        let err = pack_strings(
            &mut writer,
            &[c"overflow".to_owned()],
            GuestAddr::new(BASE + 0xfc),
            GuestAddr::new(BASE),
        )
        .unwrap_err();
        assert_eq!(err.kind, FaultKind::OutsideRegion);
        assert_eq!(err.addr, GuestAddr::new(BASE + 0xfc));
    }
}
