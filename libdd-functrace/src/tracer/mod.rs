// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The tracing engine: process-wide state, the hook entry points, the call
//! printer and the async backlog.

pub(crate) mod backlog;
pub(crate) mod filters;
pub(crate) mod hooks;
pub(crate) mod init;
pub(crate) mod platform;
pub(crate) mod printer;

use crate::shared::configuration::TraceConfig;
use crate::shared::log::diagnostic;
use crate::symbols::resolver::DsoCache;
use crate::tracer::backlog::Backlog;
use crate::tracer::filters::{FunctionFilter, LibraryFilter};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, AtomicUsize};

/// Everything the tracer mutates at runtime, localized in one value.
///
/// There is exactly one instance for the process (see [`global`]); the
/// unsafe single-threaded contract of the hook entry points is what makes
/// the lock-free interior sound in practice. Tests construct private
/// instances to drive the engine deterministically.
pub(crate) struct Tracer {
    pub(crate) config: TraceConfig,
    pub(crate) lib_filter: LibraryFilter,
    pub(crate) fun_filter: FunctionFilter,
    /// Number of currently active admitted frames.
    pub(crate) depth: AtomicUsize,
    /// Flipped by the configured trigger signal.
    pub(crate) enabled: AtomicBool,
    pub(crate) dso_cache: DsoCache,
    /// Lazily created on the first printed call in async mode; None when
    /// creation failed.
    pub(crate) backlog: OnceCell<Option<Backlog>>,
}

impl Tracer {
    pub(crate) fn with_config(config: TraceConfig) -> Self {
        Self {
            lib_filter: LibraryFilter::from_config(
                config.include_libs.as_deref(),
                config.exclude_libs.as_deref(),
            ),
            fun_filter: FunctionFilter::from_config(
                config.include_funs.as_deref(),
                config.exclude_funs.as_deref(),
            ),
            depth: AtomicUsize::new(0),
            enabled: AtomicBool::new(true),
            dso_cache: DsoCache::new(),
            backlog: OnceCell::new(),
            config,
        }
    }
}

static TRACER: OnceCell<Tracer> = OnceCell::new();

/// The process-wide tracer, materialized from the environment on first use.
/// Configuration is read at most once; environment changes afterwards have
/// no effect.
pub(crate) fn global() -> &'static Tracer {
    TRACER.get_or_init(|| {
        let (config, diagnostics) = TraceConfig::from_env();
        for message in &diagnostics {
            diagnostic(message);
        }
        // Arm the trigger before publishing the state. A signal delivered
        // in between is dropped by the handler; the window is unavoidable
        // with the POSIX APIs and lasts an instant.
        let armed = config
            .signal_trigger
            .is_some_and(init::install_toggle_handler);
        let tracer = Tracer::with_config(config);
        if armed {
            tracer.enabled.store(false, std::sync::atomic::Ordering::SeqCst);
        }
        tracer
    })
}

/// The global tracer if it has been materialized. Used by the signal
/// handler and the exit hook, which must never force initialization.
pub(crate) fn try_global() -> Option<&'static Tracer> {
    TRACER.get()
}
