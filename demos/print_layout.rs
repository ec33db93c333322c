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
use bsd_initial_stack::arch::TargetArch;
use bsd_initial_stack::{
    FlatGuestMemory, GuestAddr, LaunchRequest, MemProt, StackImageBuilder, StackImageRef,
    StackRegion,
};
use enum_iterator::IntoEnumIterator;

/// Builds the initial stack for every known target and prints where its
/// parts ended up.
///
/// Usage: `cargo run --example print_layout [target]`, e.g. `aarch64`.
fn main() {
    let filter = std::env::args().nth(1);
    let request = LaunchRequest::new()
        .path("/usr/bin/true")
        .add_arg("true")
        .add_arg("--version")
        .add_env("HOME=/root")
        .add_env("PATH=/bin:/usr/bin\0");

    for arch in TargetArch::into_enum_iter() {
        if filter.as_deref().is_some_and(|name| name != arch.name()) {
            continue;
        }

        let config = arch.config();
        let region = StackRegion::new(GuestAddr::new(0x7ff0_0000), 0x10_0000).unwrap();
        let mut mem = FlatGuestMemory::new();
        mem.map(region.base(), region.size(), MemProt::READ | MemProt::WRITE);

        let stack = StackImageBuilder::new(&config)
            .build_with_os_rng(&request, &mut mem, region)
            .unwrap();

        println!("{} ({:?})", arch.name(), config.abi());
        println!("  ps_strings   @ {}", stack.ps_strings);
        if let Some(sigcode) = stack.sigcode {
            println!("  sigcode      @ {sigcode}");
        }
        if let Some(exec_path) = stack.exec_path {
            println!("  execpath     @ {exec_path}");
        }
        println!("  canary       @ {} ({} bytes)", stack.canary, stack.canary_len);
        println!("  pagesizes    @ {}", stack.pagesizes);
        println!("  argv[]       @ {}", stack.argv);
        println!("  envv[]       @ {}", stack.envv);
        println!("  strings      @ {}..{}", stack.stack_pointer, stack.strings_end);
        println!("  sp           = {}", stack.stack_pointer);

        let image = StackImageRef::new(&mem, config.abi(), stack.ps_strings);
        for (i, arg) in image.argv().unwrap().iter().enumerate() {
            println!("    argv[{i}] {arg:?}");
        }
        for (i, env) in image.envv().unwrap().iter().enumerate() {
            println!("    envv[{i}] {env:?}");
        }
    }
}
