// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-start initialization.
//!
//! When the library rides in via `LD_PRELOAD`, the `.init_array`
//! constructor below materializes the tracer state before `main`, so a
//! configured signal trigger is armed for the whole run. Embedders linking
//! the static library call [`ensure_init`] instead.

use crate::shared::log::diagnostic;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::Ordering::SeqCst;

#[cfg(target_os = "linux")]
#[used]
#[link_section = ".init_array"]
static CONSTRUCTOR: extern "C" fn() = {
    extern "C" fn functrace_init() {
        ensure_init();
    }
    functrace_init
};

/// Materializes the tracer state (configuration snapshot, filters, signal
/// trigger) if it hasn't been already. Idempotent and cheap afterwards; the
/// hooks also trigger materialization lazily, so calling this is only
/// required to get the signal trigger armed before the first traced call.
pub fn ensure_init() {
    let _ = crate::tracer::global();
}

/// Installs the tracing-toggle handler. Returns whether the trigger is
/// armed; on failure a diagnostic is emitted and tracing stays
/// unconditionally on, as if no trigger were configured.
pub(crate) fn install_toggle_handler(signum: i32) -> bool {
    let Ok(signal) = Signal::try_from(signum) else {
        diagnostic(&format!("cannot arm trigger: unknown signal {signum}"));
        return false;
    };
    let action = SigAction::new(
        SigHandler::Handler(toggle_tracing),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler performs a single atomic flip, which is
    // async-signal-safe.
    match unsafe { sigaction(signal, &action) } {
        Ok(_) => true,
        Err(err) => {
            diagnostic(&format!("cannot arm trigger for signal {signum}: {err}"));
            false
        }
    }
}

/// One atomic store, nothing else: no allocation, no logging, no library
/// calls. Delivery before the state is published is dropped.
extern "C" fn toggle_tracing(_signum: libc::c_int) {
    if let Some(tracer) = crate::tracer::try_global() {
        tracer.enabled.fetch_xor(true, SeqCst);
    }
}
