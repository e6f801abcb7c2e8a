// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Async-mode backlog: raw addresses written to an anonymous scratch file
//! during execution, resolved in one pass at process exit.
//!
//! The scratch file is created with a unique name under the temporary
//! directory and immediately unlinked, so it vanishes with the process. The
//! descriptor is held raw for the life of the process; record I/O goes
//! through plain read/write loops so the exit path stays free of buffering
//! state.

use crate::shared::constants::DD_FUNCTRACE_SYMTAB_HEADER;
use crate::shared::log::{diagnostic, Sink};
use crate::symbols::resolver::{resolve, Resolution};
use crate::tracer::printer::write_body;
use crate::tracer::Tracer;
use std::io::{self, Write};
use std::mem;
use std::os::unix::io::IntoRawFd;
use std::os::unix::io::RawFd;

const RECORD_SIZE: usize = mem::size_of::<usize>();

pub(crate) struct Backlog {
    fd: RawFd,
}

impl Backlog {
    fn create() -> io::Result<Self> {
        // tempfile() opens a uniquely named file in the temp dir and
        // unlinks it before returning.
        let file = tempfile::tempfile()?;
        Ok(Self {
            fd: file.into_raw_fd(),
        })
    }

    /// Appends one raw address record. Short writes are retried; failures
    /// degrade silently (the exit table will simply miss the record).
    fn append(&self, pc: usize) {
        let bytes = pc.to_ne_bytes();
        let mut written = 0;
        while written < bytes.len() {
            // SAFETY: the range is within a valid local buffer.
            let n = unsafe {
                libc::write(
                    self.fd,
                    bytes[written..].as_ptr().cast(),
                    bytes.len() - written,
                )
            };
            if n <= 0 {
                return;
            }
            written += n as usize;
        }
    }

    fn rewind(&self) -> bool {
        // SAFETY: lseek on an owned descriptor.
        unsafe { libc::lseek(self.fd, 0, libc::SEEK_SET) == 0 }
    }

    fn read_record(&self, record: &mut [u8; RECORD_SIZE]) -> bool {
        let mut got = 0;
        while got < record.len() {
            // SAFETY: the range is within a valid local buffer.
            let n = unsafe {
                libc::read(
                    self.fd,
                    record[got..].as_mut_ptr().cast(),
                    record.len() - got,
                )
            };
            if n <= 0 {
                return false;
            }
            got += n as usize;
        }
        true
    }
}

impl Tracer {
    /// First-call setup of async mode: the scratch file plus the exit-time
    /// resolution pass. Failure leaves async lines flowing but the exit
    /// table empty.
    pub(crate) fn ensure_backlog(&self) {
        self.backlog.get_or_init(|| match Backlog::create() {
            Ok(backlog) => {
                // SAFETY: registering a plain extern "C" hook.
                unsafe { libc::atexit(flush_backlog_at_exit) };
                Some(backlog)
            }
            Err(err) => {
                diagnostic(&format!("cannot create async backlog: {err}"));
                None
            }
        });
    }

    pub(crate) fn append_backlog(&self, pc: usize) {
        if let Some(Some(backlog)) = self.backlog.get() {
            backlog.append(pc);
        }
    }

    /// Emits the deferred resolution table: a `SYMTAB:` header, then one
    /// line per logged address (duplicates included), skipping addresses
    /// the filters suppress. Closes the backlog when done.
    pub(crate) fn flush_backlog<W: Write>(&self, out: &mut W) {
        let Some(Some(backlog)) = self.backlog.get() else {
            return;
        };
        let _ = writeln!(out, "{DD_FUNCTRACE_SYMTAB_HEADER}");
        if backlog.rewind() {
            let mut record = [0u8; RECORD_SIZE];
            while backlog.read_record(&mut record) {
                let pc = usize::from_ne_bytes(record);
                match resolve(pc, &self.lib_filter, &self.fun_filter, &self.dso_cache) {
                    Resolution::Suppressed => {}
                    Resolution::Report { dso, name } => {
                        let _ = write!(out, "0x{pc:x} = ");
                        let _ = write_body(out, dso, name, pc);
                        let _ = writeln!(out);
                    }
                }
            }
        }
        let _ = out.flush();
        // SAFETY: the descriptor is owned raw by the backlog and closed
        // exactly once, here.
        unsafe { libc::close(backlog.fd) };
    }
}

extern "C" fn flush_backlog_at_exit() {
    if let Some(tracer) = crate::tracer::try_global() {
        tracer.flush_backlog(&mut Sink::new());
    }
}
