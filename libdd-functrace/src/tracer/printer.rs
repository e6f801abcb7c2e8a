// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Formatting and emission of single trace events.
//!
//! Line shape: `[PREFIX ](ENTER|LEAVE)[D]<spaces>(<dso>:)?<name>()` with
//! `[0xADDR]` standing in for the name (and in async mode for the whole
//! body) when resolution is deferred or failed. The prefix carries wall
//! time and/or thread id when configured; the indent is `1 + indent_width ×
//! depth` spaces, so with the default width every body starts at a fixed
//! column.

use crate::symbols::resolver::{resolve, Resolution};
use crate::tracer::platform::{current_tid, timestamp};
use crate::tracer::Tracer;
use std::io::{self, Write};
use std::sync::atomic::Ordering::SeqCst;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Enter,
    Leave,
}

impl Direction {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Enter => "ENTER",
            Self::Leave => "LEAVE",
        }
    }

    pub(crate) fn is_leave(self) -> bool {
        matches!(self, Self::Leave)
    }
}

/// What a print attempt means for depth accounting. `Admitted` covers
/// actually-emitted events as well as events silently truncated by the
/// depth limit or by entries-only; `Suppressed` events must not count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Admitted,
    Suppressed,
}

/// The event body shared by trace lines and the deferred symbol table.
pub(crate) fn write_body<W: Write>(
    out: &mut W,
    dso: Option<&str>,
    name: Option<&str>,
    pc: usize,
) -> io::Result<()> {
    if let Some(dso) = dso {
        write!(out, "{dso}:")?;
    }
    match name {
        Some(name) => write!(out, "{name}()"),
        None => write!(out, "[0x{pc:x}]"),
    }
}

impl Tracer {
    /// Formats and emits one event, deciding its depth disposition.
    ///
    /// Kept out-of-line: the stack fixup below assumes exactly two frames
    /// between the instrumented function and the backtrace call (this
    /// function and the hook it was inlined into).
    #[inline(never)]
    pub(crate) fn print_trace<W: Write>(
        &self,
        out: &mut W,
        pc: usize,
        direction: Direction,
    ) -> Disposition {
        let depth = self.depth.load(SeqCst);
        if let Some(limit) = self.config.max_depth {
            // The subtree beyond the limit is silently truncated, but depth
            // accounting continues as if emitted.
            if depth >= limit {
                return Disposition::Admitted;
            }
        }

        #[allow(unused_mut)]
        let mut pc = pc;
        // The address supplied by the instrumentation has historically been
        // unreliable off ARM; trust a runtime backtrace instead. Frame 2
        // skips this function and the hook trampoline.
        #[cfg(all(
            target_env = "gnu",
            not(any(target_arch = "arm", target_arch = "aarch64"))
        ))]
        {
            let mut frames = [std::ptr::null_mut::<libc::c_void>(); 3];
            // SAFETY: backtrace fills at most 3 entries of a valid buffer.
            let filled = unsafe { libc::backtrace(frames.as_mut_ptr(), 3) };
            if filled < 3 {
                return Disposition::Suppressed;
            }
            pc = frames[2] as usize;
        }

        if self.config.async_mode {
            self.ensure_backlog();
        }

        if self.config.entries_only && direction.is_leave() {
            return Disposition::Admitted;
        }

        if self.config.async_mode {
            let _ = self.write_async_line(out, direction, depth, pc);
            if !direction.is_leave() {
                self.append_backlog(pc);
            }
            return Disposition::Admitted;
        }

        match resolve(pc, &self.lib_filter, &self.fun_filter, &self.dso_cache) {
            Resolution::Suppressed => Disposition::Suppressed,
            Resolution::Report { dso, name } => {
                let _ = self.write_event_line(out, direction, depth, pc, dso, name);
                Disposition::Admitted
            }
        }
    }

    fn write_prefix<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match (self.config.log_time, self.config.log_tid) {
            (false, false) => Ok(()),
            (true, false) => {
                let (sec, usec) = timestamp();
                write!(out, "{sec}.{usec:06} ")
            }
            (false, true) => write!(out, "{} ", current_tid()),
            (true, true) => {
                let (sec, usec) = timestamp();
                write!(out, "{sec}.{usec:06}[{}] ", current_tid())
            }
        }
    }

    fn write_head<W: Write>(&self, out: &mut W, direction: Direction, depth: usize) -> io::Result<()> {
        write!(out, "{}[{depth}]", direction.as_str())?;
        // Saturating: an unmatched LEAVE wraps the depth counter, and a
        // huge annotation must not take the indent arithmetic down with it.
        let indent = self.config.indent.saturating_mul(depth).saturating_add(1);
        write!(out, "{:indent$}", "")
    }

    fn write_event_line<W: Write>(
        &self,
        out: &mut W,
        direction: Direction,
        depth: usize,
        pc: usize,
        dso: Option<&str>,
        name: Option<&str>,
    ) -> io::Result<()> {
        self.write_prefix(out)?;
        self.write_head(out, direction, depth)?;
        let dso = if self.config.log_fname { dso } else { None };
        write_body(out, dso, name, pc)?;
        writeln!(out)?;
        out.flush()
    }

    fn write_async_line<W: Write>(
        &self,
        out: &mut W,
        direction: Direction,
        depth: usize,
        pc: usize,
    ) -> io::Result<()> {
        self.write_prefix(out)?;
        if self.config.entries_only {
            // Every line is an entry; the direction carries no information.
            write!(out, "[0x{pc:x}]")?;
        } else {
            self.write_head(out, direction, depth)?;
            write!(out, "[0x{pc:x}]")?;
        }
        writeln!(out)?;
        out.flush()
    }
}
