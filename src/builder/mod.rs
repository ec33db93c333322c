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
//! Module for [`StackImageBuilder`].

mod packer;

pub use packer::pack_strings;

use crate::arch::{ArchConfig, DEFAULT_PAGE_SIZE};
use crate::guest_mem::{FaultKind, GuestFault, GuestMemory, GuestWriter};
use crate::{GuestAddr, LaunchRequest, PsStrings, StackError, StackRegion};
use rand_core::CryptoRngCore;

/// Downward-growing allocation cursor inside a [`StackRegion`].
///
/// Every reservation is rounded up to the word size, so the cursor stays
/// word aligned.
#[derive(Debug)]
struct StackCursor {
    pos: GuestAddr,
    region: StackRegion,
    word: u64,
}

impl StackCursor {
    const fn new(region: StackRegion, word: u64) -> Self {
        Self {
            pos: region.top().align_down(word),
            region,
            word,
        }
    }

    /// Moves the cursor down by `len` bytes (rounded up to a word) and
    /// returns the new position.
    fn reserve(&mut self, len: u64) -> Result<GuestAddr, GuestFault> {
        let outside = || {
            let addr = GuestAddr::new(self.pos.val().wrapping_sub(len));
            GuestFault::new(addr, len, FaultKind::OutsideRegion)
        };
        let rounded = GuestAddr::new(len).align_up(self.word).ok_or_else(outside)?;
        let pos = self
            .pos
            .checked_sub(rounded.val())
            .filter(|pos| *pos >= self.region.base())
            .ok_or_else(outside)?;
        self.pos = pos;
        Ok(pos)
    }
}

/// Where the parts of the initial stack ended up.
///
/// The addresses are needed by the stage that builds the auxiliary vector
/// afterwards (`AT_PS_STRINGS`, `AT_EXECPATH`, `AT_CANARY`,
/// `AT_PAGESIZES`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InitialStack {
    /// Initial stack pointer of the guest. Also the start of the string
    /// block.
    pub stack_pointer: GuestAddr,
    /// Address of the [`PsStrings`] record.
    pub ps_strings: GuestAddr,
    /// Address of the signal trampoline, if the target has one.
    pub sigcode: Option<GuestAddr>,
    /// Address of the executable path, if one was given.
    pub exec_path: Option<GuestAddr>,
    /// Address of the stack-protector canary.
    pub canary: GuestAddr,
    /// Length of the canary in bytes.
    pub canary_len: u64,
    /// Address of the page size table.
    pub pagesizes: GuestAddr,
    /// Number of entries in the page size table.
    pub pagesizes_len: u64,
    /// Address of the argument pointer table.
    pub argv: GuestAddr,
    /// Address of the environment pointer table.
    pub envv: GuestAddr,
    /// End of the string block.
    pub strings_end: GuestAddr,
}

/// Builds the initial stack of a guest process the way the FreeBSD kernel's
/// `exec_copyout_strings()` does.
///
/// ```text
///  region top ->  ps_strings         (4 words)
///                 signal trampoline  (per architecture, may be empty)
///                 executable path    (rounded up to a word)
///                 canary             (8 words of random bytes)
///                 page size table    (1 word)
///                 pointer tables     (argv[], NULL, envv[], NULL; growing up)
///                 ...                (reserved span for user space)
///                 ...                (unused part of the argument space)
///  stack pointer ->  argv and envv strings (growing up)
/// ```
///
/// The image is written through a [`GuestMemory`], in the byte order and
/// word width of the target described by the [`ArchConfig`].
#[derive(Copy, Clone, Debug)]
pub struct StackImageBuilder<'c> {
    config: &'c ArchConfig,
    page_size: u64,
}

impl<'c> StackImageBuilder<'c> {
    /// Creates a new builder for the given target.
    #[must_use]
    pub const fn new(config: &'c ArchConfig) -> Self {
        Self {
            config,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the page size that is stored in the page size table.
    #[must_use]
    pub const fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Builds the stack image with randomness from the operating system.
    #[cfg(feature = "getrandom")]
    pub fn build_with_os_rng(
        &self,
        request: &LaunchRequest,
        mem: &mut dyn GuestMemory,
        region: StackRegion,
    ) -> Result<InitialStack, StackError> {
        self.build(request, mem, region, &mut rand_core::OsRng)
    }

    /// Builds the stack image into `region` of `mem`.
    ///
    /// The canary is taken from `rng`. On error, the launch must be
    /// aborted; parts of the image may already be written.
    ///
    /// # Arguments
    /// - `request`: path, arguments and environment of the new process.
    /// - `mem`: the guest address space.
    /// - `region`: the mapped and writable stack of the new process.
    /// - `rng`: source of the canary.
    pub fn build<R: CryptoRngCore + ?Sized>(
        &self,
        request: &LaunchRequest,
        mem: &mut dyn GuestMemory,
        region: StackRegion,
        rng: &mut R,
    ) -> Result<InitialStack, StackError> {
        let config = self.config;
        let abi = config.abi();
        let word = abi.word_bytes();

        if region.top().val().saturating_sub(1) > abi.word().max_value() {
            return Err(GuestFault::new(region.top(), 0, FaultKind::Unrepresentable).into());
        }

        let mut writer = GuestWriter::new(mem, abi, region);
        let mut cursor = StackCursor::new(region, word);

        // Written last, but it owns the highest addresses.
        let ps_strings = cursor.reserve(PsStrings::size(abi))?;
        log::debug!("ps_strings @ {ps_strings}");

        let trampoline = config.trampoline();
        let sigcode = if trampoline.size() > 0 {
            let addr = cursor.reserve(trampoline.size())?;
            trampoline.install(
                &mut writer,
                addr,
                config.sigframe_uc_offset(),
                config.sigreturn_nr(),
            )?;
            log::debug!("sigcode    @ {addr} ({} bytes)", trampoline.size());
            Some(addr)
        } else {
            None
        };

        let exec_path = match request.exec_path() {
            Some(path) => {
                let bytes = path.to_bytes_with_nul();
                let addr = cursor.reserve(bytes.len() as u64)?;
                writer.write_bytes(addr, bytes)?;
                log::debug!("execpath   @ {addr} ({path:?})");
                Some(addr)
            }
            None => None,
        };

        let canary_len = config.canary_len();
        let canary = {
            let mut buf = [0_u8; 64];
            let buf = &mut buf[..canary_len as usize];
            rng.fill_bytes(buf);
            let addr = cursor.reserve(canary_len)?;
            writer.write_bytes(addr, buf)?;
            addr
        };
        log::debug!("canary     @ {canary} ({canary_len} bytes)");

        let pagesizes = cursor.reserve(word)?;
        writer.write_word(pagesizes, self.page_size)?;
        log::debug!("pagesizes  @ {pagesizes} ({:#x})", self.page_size);

        let (argc, envc) = self.check_capacity(request)?;

        // The pointer tables grow upwards from the bottom of the span
        // reserved for user space; the strings grow upwards from the
        // bottom of the argument space below it.
        let argv = cursor.reserve(config.usrspace_reserve())?;
        let stack_pointer = cursor.reserve(config.max_arg_space())?;
        let envv = GuestAddr::new(argv.val() + (u64::from(argc) + 1) * word);
        log::debug!("argv[]     @ {argv}, envv[] @ {envv}, strings @ {stack_pointer}");

        let (destp, _) = pack_strings(&mut writer, request.argv(), stack_pointer, argv)?;
        let (strings_end, _) = pack_strings(&mut writer, request.envv(), destp, envv)?;

        let record = PsStrings {
            argv,
            argc,
            envv,
            envc,
        };
        record.write(&mut writer, ps_strings)?;

        log::debug!("initial stack pointer: {stack_pointer}");
        Ok(InitialStack {
            stack_pointer,
            ps_strings,
            sigcode,
            exec_path,
            canary,
            canary_len,
            pagesizes,
            pagesizes_len: 1,
            argv,
            envv,
            strings_end,
        })
    }

    /// Checks that the strings fit into the argument space and the pointer
    /// tables into the span reserved for user space.
    ///
    /// Returns `argc` and `envc`.
    fn check_capacity(&self, request: &LaunchRequest) -> Result<(u32, u32), StackError> {
        let word = self.config.abi().word_bytes();

        let needed = request.string_space();
        let available = self.config.max_arg_space();
        if needed > available {
            log::warn!("argument list too long: {needed} > {available} bytes");
            return Err(StackError::CapacityExceeded { needed, available });
        }

        let entries = request.argc() as u64 + 1 + request.envc() as u64 + 1;
        let needed = entries * word;
        let available = self.config.usrspace_reserve();
        if needed > available {
            log::warn!("too many arguments for the pointer tables: {needed} > {available} bytes");
            return Err(StackError::CapacityExceeded { needed, available });
        }

        // both are bounded by the table check above
        let argc = u32::try_from(request.argc()).map_err(|_| StackError::CapacityExceeded {
            needed,
            available,
        })?;
        let envc = u32::try_from(request.envc()).map_err(|_| StackError::CapacityExceeded {
            needed,
            available,
        })?;
        Ok((argc, envc))
    }
}
