// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Raw-libc platform queries used on the hook path. Everything here must be
//! cheap and allocation-free; these run on every traced call.

use std::mem;
use std::ptr;

/// Wall-clock (seconds, microseconds) for the line prefix.
pub(crate) fn timestamp() -> (i64, i64) {
    let mut tv: libc::timeval = unsafe { mem::zeroed() };
    // SAFETY: gettimeofday with a valid out-pointer and no timezone.
    unsafe { libc::gettimeofday(&mut tv, ptr::null_mut()) };
    (tv.tv_sec as i64, tv.tv_usec as i64)
}

/// Kernel thread id on Linux; the pthread handle elsewhere. Only used to
/// label output lines, so the exact flavor does not matter as long as it
/// distinguishes threads.
#[cfg(target_os = "linux")]
pub(crate) fn current_tid() -> u64 {
    // SAFETY: gettid has no preconditions and cannot fail.
    unsafe { libc::syscall(libc::SYS_gettid) as u64 }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn current_tid() -> u64 {
    // SAFETY: pthread_self has no preconditions.
    unsafe { libc::pthread_self() as u64 }
}
