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
//! Signal trampolines ("sigcode") placed right below `ps_strings`.
//!
//! When the guest returns from a signal handler it jumps through this
//! code, which passes the saved `ucontext_t` of the signal frame to
//! `sigreturn(2)`. Should that ever return, `exit(2)` is called, and then
//! the code loops back.
//!
//! All code fragments are sequences of 32-bit instruction words, written in
//! target byte order.

use crate::arch::FREEBSD_NR_EXIT;
use crate::guest_mem::{FaultKind, GuestFault, GuestWriter};
use crate::GuestAddr;
use core::fmt::Debug;

/// Architecture capability that installs a signal trampoline.
pub trait SignalTrampoline: Debug + Sync {
    /// Size of the code in bytes. `0` means the target needs no trampoline.
    fn size(&self) -> u64;

    /// Writes the code to `addr`.
    ///
    /// # Arguments
    /// - `sigframe_uc_offset`: offset of `sf_uc` in the target's
    ///   `struct sigframe`.
    /// - `sigreturn_nr`: syscall number of `sigreturn`.
    fn install(
        &self,
        writer: &mut GuestWriter<'_>,
        addr: GuestAddr,
        sigframe_uc_offset: u32,
        sigreturn_nr: u32,
    ) -> Result<(), GuestFault>;
}

/// Serializes `code` in target byte order and writes it in one go.
fn write_code<const N: usize>(
    writer: &mut GuestWriter<'_>,
    addr: GuestAddr,
    code: [u32; N],
) -> Result<(), GuestFault> {
    let mut buf = [0_u8; 64];
    let buf = &mut buf[..N * 4];
    let abi = writer.abi();
    for (chunk, insn) in buf.chunks_exact_mut(4).zip(code) {
        chunk.copy_from_slice(&abi.encode_u32(insn));
    }
    writer.write_bytes(addr, buf)
}

/// Fails if an immediate doesn't fit into its instruction field.
const fn check_imm(addr: GuestAddr, size: u64, val: u32, max: u32) -> Result<u32, GuestFault> {
    if val <= max {
        Ok(val)
    } else {
        Err(GuestFault::new(addr, size, FaultKind::Unrepresentable))
    }
}

/// Trampoline for targets whose kernel doesn't put one on the stack (x86).
#[derive(Debug, Default, Copy, Clone)]
pub struct NoTrampoline;

impl SignalTrampoline for NoTrampoline {
    fn size(&self) -> u64 {
        0
    }

    fn install(
        &self,
        _writer: &mut GuestWriter<'_>,
        _addr: GuestAddr,
        _sigframe_uc_offset: u32,
        _sigreturn_nr: u32,
    ) -> Result<(), GuestFault> {
        Ok(())
    }
}

/// Trampoline for 32-bit ARM.
#[derive(Debug, Default, Copy, Clone)]
pub struct ArmTrampoline;

impl SignalTrampoline for ArmTrampoline {
    fn size(&self) -> u64 {
        9 * 4
    }

    fn install(
        &self,
        writer: &mut GuestWriter<'_>,
        addr: GuestAddr,
        sigframe_uc_offset: u32,
        sigreturn_nr: u32,
    ) -> Result<(), GuestFault> {
        // add takes an 8-bit immediate, swi a 24-bit one
        let uc = check_imm(addr, self.size(), sigframe_uc_offset, 0xff)?;
        let nr = check_imm(addr, self.size(), sigreturn_nr, 0xff_ffff)?;
        let code = [
            0xe1a0_000d,                   // mov r0, sp
            0xe280_0000 + uc,              // add r0, r0, #SF_UC
            0xe59f_700c,                   // ldr r7, [pc, #12]
            0xef00_0000 + nr,              // swi SYS_sigreturn
            0xe59f_7008,                   // ldr r7, [pc, #8]
            0xef00_0000 + FREEBSD_NR_EXIT, // swi SYS_exit
            0xeaff_fffa,                   // b . - 16
            nr,
            FREEBSD_NR_EXIT,
        ];
        write_code(writer, addr, code)
    }
}

/// Trampoline for AArch64.
#[derive(Debug, Default, Copy, Clone)]
pub struct Aarch64Trampoline;

impl SignalTrampoline for Aarch64Trampoline {
    fn size(&self) -> u64 {
        9 * 4
    }

    fn install(
        &self,
        writer: &mut GuestWriter<'_>,
        addr: GuestAddr,
        sigframe_uc_offset: u32,
        sigreturn_nr: u32,
    ) -> Result<(), GuestFault> {
        // add takes a 12-bit immediate, movz a 16-bit one
        let uc = check_imm(addr, self.size(), sigframe_uc_offset, 0xfff)?;
        let nr = check_imm(addr, self.size(), sigreturn_nr, 0xffff)?;
        let code = [
            0x9100_03e0,                          // mov x0, sp
            0x9100_0000 | (uc << 10),             // add x0, x0, #SF_UC
            0xd280_0008 | (nr << 5),              // mov x8, #SYS_sigreturn
            0xd400_0001,                          // svc #0
            0xd280_0008 | (FREEBSD_NR_EXIT << 5), // mov x8, #SYS_exit
            0xd400_0001,                          // svc #0
            0x17ff_fffc,                          // b . - 16
            nr,
            FREEBSD_NR_EXIT,
        ];
        write_code(writer, addr, code)
    }
}

/// Trampoline for 64-bit RISC-V. The syscall number is passed in `t0`.
#[derive(Debug, Default, Copy, Clone)]
pub struct Riscv64Trampoline;

impl SignalTrampoline for Riscv64Trampoline {
    fn size(&self) -> u64 {
        7 * 4
    }

    fn install(
        &self,
        writer: &mut GuestWriter<'_>,
        addr: GuestAddr,
        sigframe_uc_offset: u32,
        sigreturn_nr: u32,
    ) -> Result<(), GuestFault> {
        // addi takes a signed 12-bit immediate
        let uc = check_imm(addr, self.size(), sigframe_uc_offset, 0x7ff)?;
        let nr = check_imm(addr, self.size(), sigreturn_nr, 0x7ff)?;
        let code = [
            0x0001_0513,                           // mv a0, sp
            0x0005_0513 | (uc << 20),              // addi a0, a0, SF_UC
            0x0000_0293 | (nr << 20),              // li t0, SYS_sigreturn
            0x0000_0073,                           // ecall
            0x0000_0293 | (FREEBSD_NR_EXIT << 20), // li t0, SYS_exit
            0x0000_0073,                           // ecall
            0xff1f_f06f,                           // j . - 16
        ];
        write_code(writer, addr, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Endianness, FREEBSD_NR_SIGRETURN, TargetAbi, WordSize};
    use crate::guest_mem::{FlatGuestMemory, GuestMemory, MemProt};
    use crate::StackRegion;
    use std::vec::Vec;

    const BASE: u64 = 0x1000;

    fn install(
        tramp: &dyn SignalTrampoline,
        abi: TargetAbi,
        uc: u32,
    ) -> Result<Vec<u32>, GuestFault> {
        let mut mem = FlatGuestMemory::new();
        mem.map(GuestAddr::new(BASE), 0x100, MemProt::READ | MemProt::WRITE);
        let region = StackRegion::new(GuestAddr::new(BASE), 0x100).unwrap();
        let mut writer = GuestWriter::new(&mut mem, abi, region);
        tramp.install(&mut writer, GuestAddr::new(BASE), uc, FREEBSD_NR_SIGRETURN)?;

        let mut buf = vec![0; tramp.size() as usize];
        mem.read_bytes(GuestAddr::new(BASE), &mut buf).unwrap();
        Ok(buf
            .chunks_exact(4)
            .map(|c| abi.decode_u32([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    #[test]
    fn test_aarch64_trampoline() {
        let abi = TargetAbi::new(WordSize::Bits64, Endianness::Little);
        let code = install(&Aarch64Trampoline, abi, 80).unwrap();
        assert_eq!(code.len(), 9);
        assert_eq!(code[1], 0x9101_4000); // add x0, x0, #80
        assert_eq!(code[2], 0xd280_3428); // mov x8, #417
        assert_eq!(code[4], 0xd280_0028); // mov x8, #1
        assert_eq!(code[7], FREEBSD_NR_SIGRETURN);
        assert_eq!(code[8], FREEBSD_NR_EXIT);
    }

    #[test]
    fn test_riscv64_trampoline() {
        let abi = TargetAbi::new(WordSize::Bits64, Endianness::Little);
        let code = install(&Riscv64Trampoline, abi, 80).unwrap();
        assert_eq!(
            code,
            [
                0x0001_0513,
                0x0505_0513,
                0x1a10_0293,
                0x0000_0073,
                0x0010_0293,
                0x0000_0073,
                0xff1f_f06f
            ]
        );
    }

    #[test]
    fn test_arm_trampoline_big_endian() {
        let abi = TargetAbi::new(WordSize::Bits32, Endianness::Big);
        let mut mem = FlatGuestMemory::new();
        mem.map(GuestAddr::new(BASE), 0x100, MemProt::READ | MemProt::WRITE);
        let region = StackRegion::new(GuestAddr::new(BASE), 0x100).unwrap();
        let mut writer = GuestWriter::new(&mut mem, abi, region);
        ArmTrampoline
            .install(&mut writer, GuestAddr::new(BASE), 64, FREEBSD_NR_SIGRETURN)
            .unwrap();

        let mut buf = [0; 8];
        mem.read_bytes(GuestAddr::new(BASE), &mut buf).unwrap();
        // mov r0, sp; add r0, r0, #64
        assert_eq!(buf, [0xe1, 0xa0, 0x00, 0x0d, 0xe2, 0x80, 0x00, 0x40]);
    }

    #[test]
    fn test_immediate_out_of_range() {
        let abi = TargetAbi::new(WordSize::Bits32, Endianness::Little);
        assert_eq!(
            install(&ArmTrampoline, abi, 0x100).unwrap_err().kind,
            FaultKind::Unrepresentable
        );
    }

    #[test]
    fn test_no_trampoline() {
        let abi = TargetAbi::new(WordSize::Bits64, Endianness::Little);
        assert_eq!(install(&NoTrampoline, abi, 0), Ok(vec![]));
    }
}
