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

//! # bsd-initial-stack
//!
//! A builder and parser for the initial stack of a FreeBSD process, made for
//! user-mode emulators that run BSD binaries of one architecture on
//! another host.
//!
//! **Keywords**: ps_strings, exec_copyout_strings, sigcode, stack canary,
//! argv, envv, crt0
//!
//! ## About the Stack Layout
//!
//! Before the kernel jumps to the entry point of a freshly exec'ed program,
//! it copies a couple of things to the top of the new stack: the
//! `ps_strings` record that `ps(1)` uses to find the arguments, the signal
//! trampoline ("sigcode"), the path of the executable, a canary for the
//! stack protector, a table with the supported page sizes, and finally the
//! argument and environment strings plus the pointer tables that refer to
//! them.
//!
//! An emulator has to do the same, but for a guest whose word width and
//! byte order may differ from the host's, and in memory it can only reach
//! through its address translation. [`StackImageBuilder`] does exactly
//! that: every write goes through [`GuestMemory`], every scalar is
//! converted to the target's data model ([`arch::TargetAbi`]), and every
//! address is checked against the [`StackRegion`] under construction.
//!
//! ### Layout Structure
//!
//! Higher addresses are on top; the example is an amd64 target without
//! executable path.
//!
//! ```text
//!    ------------------------------------------------- region top 0x7ff50000
//!     7ff4ffe0: ps_strings { argv, argc, envv, envc }   --+--+
//!               (signal trampoline, if any)               |  |
//!               (executable path, if any)                 |  |
//!     7ff4ffa0: canary (64 random bytes)                  |  |
//!     7ff4ff98: pagesizes[0] = 4096                       |  |
//!               ...                                       |  |
//!     7ff4efb8: NULL                                      |  |
//!     7ff4efb0: envv[0] = 0x7ff0efa0        ---------+  <-|--+
//!     7ff4efa8: NULL                                 |    |
//!     7ff4efa0: argv[1] = 0x7ff0ef9d        ------+  |    |
//!     7ff4ef98: argv[0] = 0x7ff0ef98        ---+  |  |  <-+
//!               ...                            |  |  |
//!     7ff0efa0: 'HOME=/root\0'               <-|--|--+
//!     7ff0ef9d: '-x\0'                       <-|--+
//!     7ff0ef98: 'prog\0'                     <-+
//!    ------------------------------------------------- initial stack pointer
//! ```
//!
//! The auxiliary vector and the `argc`/`argv`/`envv` block below the stack
//! pointer are not part of this image; they are written by a later stage
//! that uses the addresses reported in [`InitialStack`].
//!
//! ## Example
//!
//! ```
//! use bsd_initial_stack::arch::TargetArch;
//! use bsd_initial_stack::{
//!     FlatGuestMemory, GuestAddr, LaunchRequest, MemProt, StackImageBuilder, StackImageRef,
//!     StackRegion,
//! };
//!
//! let config = TargetArch::Aarch64.config();
//! let region = StackRegion::new(GuestAddr::new(0x7ffe_0000), 0x80000).unwrap();
//! let mut mem = FlatGuestMemory::new();
//! mem.map(region.base(), region.size(), MemProt::READ | MemProt::WRITE);
//!
//! let request = LaunchRequest::new()
//!     .path("/bin/prog")
//!     .add_arg("prog")
//!     .add_env("HOME=/root");
//! let stack = StackImageBuilder::new(&config)
//!     .build_with_os_rng(&request, &mut mem, region)
//!     .unwrap();
//! assert!(stack.stack_pointer.is_aligned(8));
//!
//! let image = StackImageRef::new(&mem, config.abi(), stack.ps_strings);
//! assert_eq!(image.argv().unwrap(), [c"prog".to_owned()]);
//! ```
//!
//! ## Background Information & Links
//! - <https://cgit.freebsd.org/src/tree/sys/kern/kern_exec.c> (`exec_copyout_strings()`)
//! - <https://cgit.freebsd.org/src/tree/sys/sys/exec.h> (`struct ps_strings`)
//! - <https://man.freebsd.org/cgi/man.cgi?query=elf_aux_info&sektion=3>

#![deny(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::must_use_candidate,
    // clippy::restriction,
    // clippy::pedantic
)]
// now allow a few rules which are denied by the above statement
// --> they are ridiculous and not necessary
#![allow(
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::fallible_impl_from
)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::all)]
#![no_std]

#[macro_use]
extern crate alloc;

#[cfg(test)]
extern crate std;

pub use addr::{GuestAddr, StackRegion};
pub use builder::{InitialStack, StackImageBuilder, pack_strings};
pub use error::{ParseStackError, StackError};
pub use guest_mem::{FaultKind, FlatGuestMemory, GuestFault, GuestMemory, GuestWriter, MemProt};
pub use parser::{PtrTableIter, StackImageRef};
pub use ps_strings::PsStrings;
pub use request::LaunchRequest;

mod addr;
pub mod arch;
mod builder;
mod error;
pub mod guest_mem;
mod parser;
mod ps_strings;
mod request;
pub mod sigtramp;
mod util;
