// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The two externally visible entry points, invoked by compiler-inserted
//! instrumentation at every function entry and exit. They own the depth
//! accounting.
//!
//! SAFETY:
//!     The tracer is not thread-safe. The depth counter, enabled flag and
//!     caches are process-wide and mutated without locking; tracing a
//!     multithreaded target is permitted only if interleaved and possibly
//!     corrupted output is acceptable. The TID prefix option exists to help
//!     untangle such output by hand.

use crate::shared::log::Sink;
use crate::tracer::printer::{Direction, Disposition};
use crate::tracer::Tracer;
use libc::c_void;
use std::io::Write;
use std::sync::atomic::Ordering::SeqCst;

impl Tracer {
    /// Entry half of the hook pair. Inlined into its caller so the printer
    /// sits exactly two frames below the instrumented function.
    #[inline(always)]
    pub(crate) fn on_enter<W: Write>(&self, out: &mut W, pc: usize) {
        if !self.enabled.load(SeqCst) {
            return;
        }
        if let Disposition::Admitted = self.print_trace(out, pc, Direction::Enter) {
            self.depth.fetch_add(1, SeqCst);
        }
    }

    /// Exit half. Decrements first — a LEAVE reports the depth of the frame
    /// it closes — and undoes the decrement when the event turns out to be
    /// filter-suppressed, keeping admitted depth balanced.
    #[inline(always)]
    pub(crate) fn on_exit<W: Write>(&self, out: &mut W, pc: usize) {
        if !self.enabled.load(SeqCst) {
            return;
        }
        self.depth.fetch_sub(1, SeqCst);
        if let Disposition::Suppressed = self.print_trace(out, pc, Direction::Leave) {
            self.depth.fetch_add(1, SeqCst);
        }
    }
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn __cyg_profile_func_enter(func: *mut c_void, _call_site: *mut c_void) {
    let tracer = crate::tracer::global();
    tracer.on_enter(&mut Sink::new(), func as usize);
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn __cyg_profile_func_exit(func: *mut c_void, _call_site: *mut c_void) {
    let tracer = crate::tracer::global();
    tracer.on_exit(&mut Sink::new(), func as usize);
}
