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
//! Target descriptors: word width, byte order, and the per-architecture
//! constants that shape the initial stack.

use crate::sigtramp::{
    Aarch64Trampoline, ArmTrampoline, NoTrampoline, Riscv64Trampoline, SignalTrampoline,
};
use enum_iterator::IntoEnumIterator;

/// FreeBSD `SYS_sigreturn` (the `ucontext_t` based variant).
pub const FREEBSD_NR_SIGRETURN: u32 = 417;
/// FreeBSD `SYS_exit`.
pub const FREEBSD_NR_EXIT: u32 = 1;
/// Maximum bytes of argument and environment strings (`ARG_MAX`).
pub const DEFAULT_ARG_MAX: u64 = 262_144;
/// Span kept free between the page size table and the string area for the
/// pointer tables built later in user space.
pub const DEFAULT_USRSPACE: u64 = 4096;
/// Default guest page size.
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Byte order of the target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Endianness {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

/// Width of a native target word (`abi_ulong`), which is also the pointer
/// width.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WordSize {
    /// 32-bit target.
    Bits32 = 4,
    /// 64-bit target.
    Bits64 = 8,
}

impl WordSize {
    /// Size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self as u64
    }

    /// Largest value that fits into a target word.
    #[must_use]
    pub const fn max_value(self) -> u64 {
        match self {
            Self::Bits32 => u32::MAX as u64,
            Self::Bits64 => u64::MAX,
        }
    }
}

/// Serialized form of one target word. Only the first
/// [`WordSize::bytes`] bytes are meaningful.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WordBytes {
    buf: [u8; 8],
    len: usize,
}

impl WordBytes {
    /// The bytes in target order.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// The data model of the target: how wide a word is and in which order its
/// bytes are stored.
///
/// All conversion between host integers and target bytes goes through
/// this type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetAbi {
    word: WordSize,
    endian: Endianness,
}

impl TargetAbi {
    /// Creates a new ABI description.
    #[must_use]
    pub const fn new(word: WordSize, endian: Endianness) -> Self {
        Self { word, endian }
    }

    /// Width of a word.
    #[must_use]
    pub const fn word(self) -> WordSize {
        self.word
    }

    /// Byte order.
    #[must_use]
    pub const fn endian(self) -> Endianness {
        self.endian
    }

    /// Size of a word in bytes.
    #[must_use]
    pub const fn word_bytes(self) -> u64 {
        self.word.bytes()
    }

    /// Encodes `value` as one target word.
    ///
    /// Returns `None` if the value doesn't fit into the word.
    #[must_use]
    pub fn encode_word(self, value: u64) -> Option<WordBytes> {
        let mut buf = [0; 8];
        let len = match self.word {
            WordSize::Bits32 => {
                let value = u32::try_from(value).ok()?;
                buf[..4].copy_from_slice(&self.encode_u32(value));
                4
            }
            WordSize::Bits64 => {
                let bytes = match self.endian {
                    Endianness::Little => value.to_le_bytes(),
                    Endianness::Big => value.to_be_bytes(),
                };
                buf.copy_from_slice(&bytes);
                8
            }
        };
        Some(WordBytes { buf, len })
    }

    /// Encodes a 32-bit scalar in target byte order.
    #[must_use]
    pub const fn encode_u32(self, value: u32) -> [u8; 4] {
        match self.endian {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }

    /// Decodes one target word. `bytes` must be exactly one word long.
    #[must_use]
    pub fn decode_word(self, bytes: &[u8]) -> u64 {
        assert_eq!(bytes.len() as u64, self.word_bytes(), "must be one word");
        match self.word {
            WordSize::Bits32 => {
                let mut buf = [0; 4];
                buf.copy_from_slice(bytes);
                u64::from(self.decode_u32(buf))
            }
            WordSize::Bits64 => {
                let mut buf = [0; 8];
                buf.copy_from_slice(bytes);
                match self.endian {
                    Endianness::Little => u64::from_le_bytes(buf),
                    Endianness::Big => u64::from_be_bytes(buf),
                }
            }
        }
    }

    /// Decodes a 32-bit scalar in target byte order.
    #[must_use]
    pub const fn decode_u32(self, bytes: [u8; 4]) -> u32 {
        match self.endian {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// Everything the stack builder needs to know about a target.
///
/// Presets exist for every [`TargetArch`]. Individual values can be
/// overridden with the `with_*` methods.
#[derive(Copy, Clone, Debug)]
pub struct ArchConfig {
    abi: TargetAbi,
    trampoline: &'static dyn SignalTrampoline,
    sigframe_uc_offset: u32,
    sigreturn_nr: u32,
    max_arg_space: u64,
    usrspace_reserve: u64,
}

impl ArchConfig {
    /// Creates a configuration without signal trampoline and with the
    /// FreeBSD defaults for the remaining values.
    #[must_use]
    pub const fn new(abi: TargetAbi) -> Self {
        Self {
            abi,
            trampoline: &NoTrampoline,
            sigframe_uc_offset: 0,
            sigreturn_nr: FREEBSD_NR_SIGRETURN,
            max_arg_space: DEFAULT_ARG_MAX,
            usrspace_reserve: DEFAULT_USRSPACE,
        }
    }

    /// Sets the signal trampoline and the offset of `sf_uc` within the
    /// target's `struct sigframe`.
    #[must_use]
    pub const fn with_trampoline(
        mut self,
        trampoline: &'static dyn SignalTrampoline,
        sigframe_uc_offset: u32,
    ) -> Self {
        self.trampoline = trampoline;
        self.sigframe_uc_offset = sigframe_uc_offset;
        self
    }

    /// Sets the syscall number used by the trampoline to return from a
    /// signal handler.
    #[must_use]
    pub const fn with_sigreturn_nr(mut self, nr: u32) -> Self {
        self.sigreturn_nr = nr;
        self
    }

    /// Sets the maximum number of bytes for argument and environment
    /// strings.
    #[must_use]
    pub const fn with_max_arg_space(mut self, bytes: u64) -> Self {
        self.max_arg_space = bytes;
        self
    }

    /// Sets the span reserved for the pointer tables.
    #[must_use]
    pub const fn with_usrspace_reserve(mut self, bytes: u64) -> Self {
        self.usrspace_reserve = bytes;
        self
    }

    /// Data model of the target.
    #[must_use]
    pub const fn abi(&self) -> TargetAbi {
        self.abi
    }

    /// Signal trampoline installer of the target.
    #[must_use]
    pub const fn trampoline(&self) -> &'static dyn SignalTrampoline {
        self.trampoline
    }

    /// Offset of `sf_uc` in the target's `struct sigframe`.
    #[must_use]
    pub const fn sigframe_uc_offset(&self) -> u32 {
        self.sigframe_uc_offset
    }

    /// `sigreturn` syscall number of the target.
    #[must_use]
    pub const fn sigreturn_nr(&self) -> u32 {
        self.sigreturn_nr
    }

    /// Maximum bytes for argument and environment strings.
    #[must_use]
    pub const fn max_arg_space(&self) -> u64 {
        self.max_arg_space
    }

    /// Span reserved for the pointer tables.
    #[must_use]
    pub const fn usrspace_reserve(&self) -> u64 {
        self.usrspace_reserve
    }

    /// Size of the stack-protector canary: `sizeof(long) * 8`.
    #[must_use]
    pub const fn canary_len(&self) -> u64 {
        self.abi.word_bytes() * 8
    }
}

/// FreeBSD targets with a ready-made [`ArchConfig`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoEnumIterator)]
pub enum TargetArch {
    /// 32-bit x86.
    I386,
    /// 64-bit x86.
    X86_64,
    /// 32-bit ARM (little endian).
    Arm,
    /// 64-bit ARM.
    Aarch64,
    /// 64-bit RISC-V.
    Riscv64,
}

impl TargetArch {
    /// Returns the canonical name, as used by `uname -p`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::I386 => "i386",
            Self::X86_64 => "amd64",
            Self::Arm => "armv7",
            Self::Aarch64 => "aarch64",
            Self::Riscv64 => "riscv64",
        }
    }

    /// Looks up a target by its [`Self::name`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::into_enum_iter().find(|arch| arch.name() == name)
    }

    /// Returns the preset configuration.
    ///
    /// The `sf_uc` offsets follow the layout of `struct sigframe` on each
    /// architecture: x86 has no user-space trampoline on the stack.
    #[must_use]
    pub const fn config(self) -> ArchConfig {
        const LE32: TargetAbi = TargetAbi::new(WordSize::Bits32, Endianness::Little);
        const LE64: TargetAbi = TargetAbi::new(WordSize::Bits64, Endianness::Little);

        match self {
            Self::I386 => ArchConfig::new(LE32),
            Self::X86_64 => ArchConfig::new(LE64),
            // sf_si (siginfo_t, 64 bytes) precedes sf_uc
            Self::Arm => ArchConfig::new(LE32).with_trampoline(&ArmTrampoline, 64),
            // sf_si (siginfo_t, 80 bytes) precedes sf_uc
            Self::Aarch64 => ArchConfig::new(LE64).with_trampoline(&Aarch64Trampoline, 80),
            Self::Riscv64 => ArchConfig::new(LE64).with_trampoline(&Riscv64Trampoline, 80),
        }
    }
}
