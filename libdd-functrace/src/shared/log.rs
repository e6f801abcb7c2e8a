// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The output sink. Trace lines and configuration diagnostics share one
//! destination, selected at build time: standard error by default, or the
//! `log` facade when the crate is built with the `log-sink` feature. Both
//! receive the same payload.

use std::io::{self, Write};

/// One write destination per emission burst (a single trace line, or the
/// whole deferred symbol table). Dropping the sink completes the burst.
pub(crate) struct Sink {
    #[cfg(not(feature = "log-sink"))]
    out: io::StderrLock<'static>,
    #[cfg(feature = "log-sink")]
    buf: Vec<u8>,
}

impl Sink {
    #[cfg(not(feature = "log-sink"))]
    pub(crate) fn new() -> Self {
        Self {
            out: io::stderr().lock(),
        }
    }

    #[cfg(feature = "log-sink")]
    pub(crate) fn new() -> Self {
        Self { buf: Vec::new() }
    }
}

#[cfg(not(feature = "log-sink"))]
impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(feature = "log-sink")]
impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "log-sink")]
impl Drop for Sink {
    fn drop(&mut self) {
        for line in String::from_utf8_lossy(&self.buf).lines() {
            log::info!(target: "functrace", "{line}");
        }
    }
}

/// One-line diagnostic through the sink. Used for malformed configuration
/// and other degraded-mode notices; never fails the caller.
pub(crate) fn diagnostic(message: &str) {
    let mut sink = Sink::new();
    let _ = writeln!(sink, "functrace: {message}");
    let _ = sink.flush();
}
