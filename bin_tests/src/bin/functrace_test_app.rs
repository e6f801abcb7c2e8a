// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Simulated instrumented target.
//!
//! Each `tt_*` function does exactly what `-finstrument-functions` would
//! have the compiler do: call the enter hook with its own address on the
//! way in and the exit hook on the way out. The hooks must be invoked
//! directly from the function body — the tracer's stack fixup expects the
//! instrumented function exactly two frames above the printer.
//!
//! Scenarios (selected by the first argument):
//!   basic     tt_main → tt_foo → tt_bar
//!   filtered  tt_chain → tt_noise → tt_bar (for blacklist tests)
//!   signal    prelude, SIGPROF, basic workload, SIGPROF, epilogue

use libc::c_void;
use libdd_functrace::{__cyg_profile_func_enter, __cyg_profile_func_exit};
use std::hint::black_box;
use std::ptr;

#[no_mangle]
#[inline(never)]
pub extern "C" fn tt_bar() {
    __cyg_profile_func_enter(tt_bar as usize as *mut c_void, ptr::null_mut());
    black_box(0);
    __cyg_profile_func_exit(tt_bar as usize as *mut c_void, ptr::null_mut());
    black_box(0);
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn tt_foo() {
    __cyg_profile_func_enter(tt_foo as usize as *mut c_void, ptr::null_mut());
    tt_bar();
    __cyg_profile_func_exit(tt_foo as usize as *mut c_void, ptr::null_mut());
    black_box(0);
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn tt_main() {
    __cyg_profile_func_enter(tt_main as usize as *mut c_void, ptr::null_mut());
    tt_foo();
    __cyg_profile_func_exit(tt_main as usize as *mut c_void, ptr::null_mut());
    black_box(0);
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn tt_noise() {
    __cyg_profile_func_enter(tt_noise as usize as *mut c_void, ptr::null_mut());
    tt_bar();
    __cyg_profile_func_exit(tt_noise as usize as *mut c_void, ptr::null_mut());
    black_box(0);
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn tt_chain() {
    __cyg_profile_func_enter(tt_chain as usize as *mut c_void, ptr::null_mut());
    tt_noise();
    __cyg_profile_func_exit(tt_chain as usize as *mut c_void, ptr::null_mut());
    black_box(0);
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn tt_prelude() {
    __cyg_profile_func_enter(tt_prelude as usize as *mut c_void, ptr::null_mut());
    black_box(0);
    __cyg_profile_func_exit(tt_prelude as usize as *mut c_void, ptr::null_mut());
    black_box(0);
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn tt_epilogue() {
    __cyg_profile_func_enter(tt_epilogue as usize as *mut c_void, ptr::null_mut());
    black_box(0);
    __cyg_profile_func_exit(tt_epilogue as usize as *mut c_void, ptr::null_mut());
    black_box(0);
}

fn main() {
    libdd_functrace::ensure_init();
    let scenario = std::env::args().nth(1).unwrap_or_else(|| "basic".to_string());
    match scenario.as_str() {
        "basic" => tt_main(),
        "filtered" => tt_chain(),
        "signal" => {
            tt_prelude();
            // SAFETY: raising a signal in a single-threaded process.
            unsafe { libc::raise(libc::SIGPROF) };
            tt_main();
            unsafe { libc::raise(libc::SIGPROF) };
            tt_epilogue();
        }
        other => {
            eprintln!("unknown scenario: {other}");
            std::process::exit(2);
        }
    }
}
