// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process function-call tracer for natively instrumented programs.
//!
//! Programs compiled with `-finstrument-functions` call
//! [`__cyg_profile_func_enter`] and [`__cyg_profile_func_exit`] at every
//! function boundary. Preloading this library into such a program (the
//! launcher sets `LD_PRELOAD`) turns those calls into a human-readable
//! trace on standard error:
//!
//! ```text
//! ENTER[0] tgt:main()
//! ENTER[1]  tgt:parse_args()
//! LEAVE[1]  tgt:parse_args()
//! LEAVE[0] tgt:main()
//! ```
//!
//! Behavior is driven entirely by `DD_FUNCTRACE_*` environment variables:
//! DSO and function filters (`_INLIBS`/`_EXLIBS`, `_INFUNS`/`_EXFUNS`), a
//! depth ceiling (`_MAXDEPTH`), deferred symbol resolution (`_ASYNC`), a
//! signal-controlled toggle (`_SIGNAL`), and line decoration (`_LOG_TIME`,
//! `_LOG_TID`, `_LOG_FNAME`, `_LOG_INDENT`, `_LOG_ENTRIES_ONLY`).
//!
//! The tracer resolves instruction pointers through the dynamic loader and,
//! when the loader cannot name a symbol, through its own walk of the
//! defining object's ELF symbol table. Resolution metadata is cached per
//! object for the life of the process.
//!
//! Not thread-safe by contract: process-wide state is mutated without
//! locking. The `_LOG_TID` option exists to help untangle interleaved
//! output from multithreaded targets by hand.

pub(crate) mod matchers;
pub(crate) mod shared;
pub(crate) mod symbols;
pub(crate) mod tracer;

pub use tracer::hooks::{__cyg_profile_func_enter, __cyg_profile_func_exit};
pub use tracer::init::ensure_init;
