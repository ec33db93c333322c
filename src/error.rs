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
//! Error types.

use crate::guest_mem::GuestFault;
use crate::GuestAddr;

/// Errors of [`StackImageBuilder::build`].
///
/// Both abort the launch. Bytes that were written before the error are
/// left as they are.
///
/// [`StackImageBuilder::build`]: crate::StackImageBuilder::build
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    /// A guest memory write failed or would leave the stack region.
    #[error("memory fault while building the initial stack")]
    MemoryFault(#[from] GuestFault),
    /// The arguments and environment don't fit into the reserved space.
    #[error("argument list too long: {needed} bytes needed, {available} bytes available")]
    CapacityExceeded {
        /// Bytes the request needs.
        needed: u64,
        /// Bytes that are reserved for it.
        available: u64,
    },
}

/// Errors of [`StackImageRef`].
///
/// [`StackImageRef`]: crate::StackImageRef
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseStackError {
    /// Reading guest memory failed.
    #[error("memory fault while reading the initial stack")]
    Fault(#[from] GuestFault),
    /// No NUL byte was found within the maximum string length.
    #[error("string at {addr} is not NUL-terminated")]
    Unterminated {
        /// Start of the string.
        addr: GuestAddr,
    },
}
