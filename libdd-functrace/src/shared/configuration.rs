// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::shared::constants::*;
use std::env;

/// Process-wide tracer configuration, materialized from the environment at
/// most once per process and immutable afterwards. Environment changes after
/// process start have no effect.
///
/// Absent or empty variables mean default. Parsing is deliberately
/// permissive: a malformed value produces a one-line diagnostic (collected by
/// [`TraceConfig::from_env`] for the caller to route through the sink) and
/// falls back to the default for that item. The tracer never refuses to start
/// over configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    /// Signal toggling the tracing-enabled flag. When set, tracing starts
    /// disabled and flips on each delivery.
    pub signal_trigger: Option<i32>,
    /// Colon-separated whitelist of DSO basenames. Wins over `exclude_libs`.
    pub include_libs: Option<String>,
    /// Colon-separated blacklist of DSO basenames.
    pub exclude_libs: Option<String>,
    /// Extended-glob whitelist for function names. Wins over `exclude_funs`.
    pub include_funs: Option<String>,
    /// Extended-glob blacklist for function names.
    pub exclude_funs: Option<String>,
    /// Admitted-depth ceiling; frames at or beyond it are silently truncated
    /// but still counted.
    pub max_depth: Option<usize>,
    /// Defer name resolution to process exit, logging raw addresses.
    pub async_mode: bool,
    /// Omit LEAVE lines.
    pub entries_only: bool,
    /// Prefix each line with `seconds.microseconds `.
    pub log_time: bool,
    /// Prefix each line with the thread id.
    pub log_tid: bool,
    /// Include the DSO basename in each line.
    pub log_fname: bool,
    /// Additional spaces of indent per depth level.
    pub indent: usize,
}

impl TraceConfig {
    /// Reads the snapshot from the process environment. The second element
    /// holds diagnostics for malformed items; the caller decides where they
    /// go (the hooks route them through the log sink).
    pub fn from_env() -> (Self, Vec<String>) {
        let mut diagnostics = Vec::new();
        let signal_trigger = match env_nonempty(DD_FUNCTRACE_SIGNAL) {
            Some(raw) => parse_signal_trigger(&raw, &mut diagnostics),
            None => None,
        };
        let config = Self {
            signal_trigger,
            include_libs: env_nonempty(DD_FUNCTRACE_INLIBS),
            exclude_libs: env_nonempty(DD_FUNCTRACE_EXLIBS),
            include_funs: env_nonempty(DD_FUNCTRACE_INFUNS),
            exclude_funs: env_nonempty(DD_FUNCTRACE_EXFUNS),
            max_depth: env_nonempty(DD_FUNCTRACE_MAXDEPTH)
                .as_deref()
                .and_then(parse_max_depth),
            async_mode: is_flag_set(env_nonempty(DD_FUNCTRACE_ASYNC)),
            entries_only: is_flag_set(env_nonempty(DD_FUNCTRACE_LOG_ENTRIES_ONLY)),
            log_time: is_flag_set(env_nonempty(DD_FUNCTRACE_LOG_TIME)),
            log_tid: is_flag_set(env_nonempty(DD_FUNCTRACE_LOG_TID)),
            log_fname: parse_fname_flag(env_nonempty(DD_FUNCTRACE_LOG_FNAME).as_deref()),
            indent: env_nonempty(DD_FUNCTRACE_LOG_INDENT)
                .as_deref()
                .map_or(0, parse_indent),
        };
        (config, diagnostics)
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            signal_trigger: None,
            include_libs: None,
            exclude_libs: None,
            include_funs: None,
            exclude_funs: None,
            max_depth: None,
            async_mode: false,
            entries_only: false,
            log_time: false,
            log_tid: false,
            log_fname: true,
            indent: 0,
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Strict boolean: only the literal value `1` enables the option.
fn is_flag_set(value: Option<String>) -> bool {
    value.as_deref() == Some("1")
}

/// `log_fname` truthiness: unset means on, otherwise off only when the first
/// byte is `0`.
pub(crate) fn parse_fname_flag(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => !v.starts_with('0'),
    }
}

/// `atoi`-style integer parse: optional leading whitespace and sign, then
/// digits; trailing garbage ignored; no digits parses as 0.
pub(crate) fn parse_permissive_int(value: &str) -> i64 {
    let rest = value.trim_start();
    let (negative, rest) = match rest.as_bytes().first() {
        Some(b'-') => (true, &rest[1..]),
        Some(b'+') => (false, &rest[1..]),
        _ => (false, rest),
    };
    let mut n: i64 = 0;
    for &b in rest.as_bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        n = n.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    if negative {
        -n
    } else {
        n
    }
}

/// Non-positive or unparseable values mean "unlimited".
pub(crate) fn parse_max_depth(value: &str) -> Option<usize> {
    match parse_permissive_int(value) {
        n if n > 0 => Some(n as usize),
        _ => None,
    }
}

/// Negative or unparseable values mean no extra indent.
pub(crate) fn parse_indent(value: &str) -> usize {
    parse_permissive_int(value).max(0) as usize
}

/// A value starting with `y`/`Y` selects SIGPROF; anything else is parsed as
/// a signal number. Non-positive numbers disable the trigger with a
/// diagnostic.
pub(crate) fn parse_signal_trigger(value: &str, diagnostics: &mut Vec<String>) -> Option<i32> {
    if value.starts_with(['y', 'Y']) {
        return Some(libc::SIGPROF);
    }
    match parse_permissive_int(value) {
        n if n > 0 => Some(n as i32),
        _ => {
            diagnostics.push(format!(
                "{DD_FUNCTRACE_SIGNAL}: invalid signal \"{value}\", trigger disabled"
            ));
            None
        }
    }
}
