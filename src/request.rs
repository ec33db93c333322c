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
//! Module for [`LaunchRequest`].

use crate::util::get_null_index;
use alloc::ffi::CString;
use alloc::vec::Vec;
use core::ffi::CStr;

/// The inputs of a process launch: the resolved executable path, the
/// arguments, and the environment.
///
/// Built with chained calls:
///
/// ```
/// use bsd_initial_stack::LaunchRequest;
///
/// let request = LaunchRequest::new()
///     .path("/bin/prog")
///     .add_arg("prog")
///     .add_arg("-x")
///     .add_env("HOME=/root");
/// assert_eq!(request.argc(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchRequest {
    path: Option<CString>,
    argv: Vec<CString>,
    envv: Vec<CString>,
}

/// Turns the input into a C-string.
///
/// A terminating NUL byte is accepted. Interim NUL bytes are prohibited.
fn to_cstring(bytes: impl Into<Vec<u8>>) -> CString {
    let mut bytes = bytes.into();
    if let Some(pos) = get_null_index(&bytes) {
        assert_eq!(
            pos,
            bytes.len() - 1,
            "strings must not contain interim NUL bytes"
        );
        bytes.pop();
    }
    // No NUL byte left, this can't fail.
    CString::new(bytes).unwrap_or_default()
}

impl LaunchRequest {
    /// Creates an empty request.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            path: None,
            argv: vec![],
            envv: vec![],
        }
    }

    /// Sets the resolved path of the executable. It is copied to the stack
    /// for the runtime linker (`AT_EXECPATH`).
    ///
    /// # Panics
    /// If the path contains interim NUL bytes.
    #[must_use]
    pub fn path(mut self, path: impl Into<Vec<u8>>) -> Self {
        self.path = Some(to_cstring(path));
        self
    }

    /// Adds an argument.
    ///
    /// Adding a terminating NUL byte is not necessary.
    ///
    /// # Panics
    /// If the argument contains interim NUL bytes.
    #[must_use]
    pub fn add_arg(mut self, arg: impl Into<Vec<u8>>) -> Self {
        self.argv.push(to_cstring(arg));
        self
    }

    /// Adds an environment variable, usually in `key=value` syntax.
    ///
    /// Adding a terminating NUL byte is not necessary.
    ///
    /// # Panics
    /// If the variable contains interim NUL bytes.
    #[must_use]
    pub fn add_env(mut self, env: impl Into<Vec<u8>>) -> Self {
        self.envv.push(to_cstring(env));
        self
    }

    /// The resolved executable path, if any.
    #[must_use]
    pub fn exec_path(&self) -> Option<&CStr> {
        self.path.as_deref()
    }

    /// The arguments.
    #[must_use]
    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// The environment variables.
    #[must_use]
    pub fn envv(&self) -> &[CString] {
        &self.envv
    }

    /// Number of arguments.
    #[must_use]
    pub fn argc(&self) -> usize {
        self.argv.len()
    }

    /// Number of environment variables.
    #[must_use]
    pub fn envc(&self) -> usize {
        self.envv.len()
    }

    /// Bytes needed for all argument and environment strings including
    /// their NUL bytes.
    #[must_use]
    pub fn string_space(&self) -> u64 {
        self.argv
            .iter()
            .chain(&self.envv)
            .map(|s| s.as_bytes_with_nul().len() as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::borrow::ToOwned;

    #[test]
    fn test_request_strings() {
        let request = LaunchRequest::new()
            .path("/bin/prog\0")
            .add_arg("prog")
            .add_arg(b"-x\0".as_slice())
            .add_env("HOME=/root");
        assert_eq!(request.exec_path(), Some(c"/bin/prog"));
        assert_eq!(request.argv(), [c"prog".to_owned(), c"-x".to_owned()]);
        assert_eq!(request.envv(), [c"HOME=/root".to_owned()]);
        assert_eq!(request.argc(), 2);
        assert_eq!(request.envc(), 1);
        // "prog\0" + "-x\0" + "HOME=/root\0"
        assert_eq!(request.string_space(), 5 + 3 + 11);
    }

    #[test]
    fn test_empty_strings() {
        let request = LaunchRequest::new().add_arg("").add_env("\0");
        assert_eq!(request.string_space(), 2);
        assert_eq!(LaunchRequest::new().string_space(), 0);
    }

    #[test]
    #[should_panic(expected = "strings must not contain interim NUL bytes")]
    fn test_interim_nul() {
        let _ = LaunchRequest::new().add_arg("a\0b");
    }
}
