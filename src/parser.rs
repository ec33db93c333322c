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
//! Module for [`StackImageRef`].

use crate::arch::{DEFAULT_ARG_MAX, TargetAbi};
use crate::guest_mem::{GuestFault, GuestMemory, read_word};
use crate::{GuestAddr, ParseStackError, PsStrings, StackRegion};
use alloc::ffi::CString;
use alloc::vec::Vec;

/// Read-only view on an initial stack in guest memory, starting from its
/// [`PsStrings`] record.
///
/// This is what `ps(1)` or a runtime linker does to find the arguments
/// and the environment of a process. Every access goes through the
/// [`GuestMemory`]; no guest pointer is ever dereferenced on the host, so
/// a broken image results in errors rather than memory unsafety.
#[derive(Debug)]
pub struct StackImageRef<'m> {
    mem: &'m dyn GuestMemory,
    abi: TargetAbi,
    ps_strings: GuestAddr,
    max_str_len: u64,
}

impl<'m> StackImageRef<'m> {
    /// Creates a view on the image whose `ps_strings` record is at
    /// `ps_strings`.
    #[must_use]
    pub const fn new(mem: &'m dyn GuestMemory, abi: TargetAbi, ps_strings: GuestAddr) -> Self {
        Self {
            mem,
            abi,
            ps_strings,
            max_str_len: DEFAULT_ARG_MAX,
        }
    }

    /// Creates a view on the image at the top of `region`.
    #[must_use]
    pub const fn from_region(mem: &'m dyn GuestMemory, abi: TargetAbi, region: StackRegion) -> Self {
        let top = region.top().align_down(abi.word_bytes());
        let ps_strings = GuestAddr::new(top.val().saturating_sub(PsStrings::size(abi)));
        Self::new(mem, abi, ps_strings)
    }

    /// Sets the maximum length of a single string. Reading a longer string
    /// fails with [`ParseStackError::Unterminated`].
    #[must_use]
    pub const fn max_str_len(mut self, len: u64) -> Self {
        self.max_str_len = len;
        self
    }

    /// Reads the [`PsStrings`] record.
    pub fn ps_strings(&self) -> Result<PsStrings, ParseStackError> {
        Ok(PsStrings::read(self.mem, self.abi, self.ps_strings)?)
    }

    /// Iterates over the pointers of the argument table up to the null
    /// pointer. See [`PtrTableIter`].
    pub fn argv_ptr_iter(&self) -> Result<PtrTableIter<'m>, ParseStackError> {
        let ps = self.ps_strings()?;
        Ok(PtrTableIter::new(self.mem, self.abi, ps.argv))
    }

    /// Iterates over the pointers of the environment table up to the null
    /// pointer. See [`PtrTableIter`].
    pub fn envv_ptr_iter(&self) -> Result<PtrTableIter<'m>, ParseStackError> {
        let ps = self.ps_strings()?;
        Ok(PtrTableIter::new(self.mem, self.abi, ps.envv))
    }

    /// Reads all arguments.
    pub fn argv(&self) -> Result<Vec<CString>, ParseStackError> {
        self.read_strings(self.argv_ptr_iter()?)
    }

    /// Reads all environment variables.
    pub fn envv(&self) -> Result<Vec<CString>, ParseStackError> {
        self.read_strings(self.envv_ptr_iter()?)
    }

    fn read_strings(&self, iter: PtrTableIter<'_>) -> Result<Vec<CString>, ParseStackError> {
        iter.map(|ptr| self.read_cstr(ptr?)).collect()
    }

    /// Reads the NUL-terminated string at `addr`.
    pub fn read_cstr(&self, addr: GuestAddr) -> Result<CString, ParseStackError> {
        let mut bytes = Vec::new();
        let mut pos = addr;
        while (bytes.len() as u64) < self.max_str_len {
            let mut byte = [0];
            self.mem.read_bytes(pos, &mut byte)?;
            if byte[0] == 0 {
                // No NUL byte inside, this can't fail.
                return Ok(CString::new(bytes).unwrap_or_default());
            }
            bytes.push(byte[0]);
            pos = pos
                .checked_add(1)
                .ok_or(ParseStackError::Unterminated { addr })?;
        }
        Err(ParseStackError::Unterminated { addr })
    }
}

/// Iterator over a table of guest pointers that is terminated by a null
/// pointer. It only returns the pointers themselves, the referenced data
/// is not read.
///
/// After the first error, the iterator is exhausted.
#[derive(Debug)]
pub struct PtrTableIter<'m> {
    mem: &'m dyn GuestMemory,
    abi: TargetAbi,
    pos: GuestAddr,
    done: bool,
}

impl<'m> PtrTableIter<'m> {
    /// Creates an iterator over the table at `table`.
    #[must_use]
    pub const fn new(mem: &'m dyn GuestMemory, abi: TargetAbi, table: GuestAddr) -> Self {
        Self {
            mem,
            abi,
            pos: table,
            done: false,
        }
    }
}

impl Iterator for PtrTableIter<'_> {
    type Item = Result<GuestAddr, GuestFault>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_word(self.mem, self.abi, self.pos) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(ptr) => {
                self.pos = GuestAddr::new(self.pos.val().wrapping_add(self.abi.word_bytes()));
                Some(Ok(GuestAddr::new(ptr)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
