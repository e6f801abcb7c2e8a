// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment variable names and protocol constants.

pub const DD_FUNCTRACE_SIGNAL: &str = "DD_FUNCTRACE_SIGNAL";
pub const DD_FUNCTRACE_INLIBS: &str = "DD_FUNCTRACE_INLIBS";
pub const DD_FUNCTRACE_EXLIBS: &str = "DD_FUNCTRACE_EXLIBS";
pub const DD_FUNCTRACE_INFUNS: &str = "DD_FUNCTRACE_INFUNS";
pub const DD_FUNCTRACE_EXFUNS: &str = "DD_FUNCTRACE_EXFUNS";
pub const DD_FUNCTRACE_MAXDEPTH: &str = "DD_FUNCTRACE_MAXDEPTH";
pub const DD_FUNCTRACE_ASYNC: &str = "DD_FUNCTRACE_ASYNC";
pub const DD_FUNCTRACE_LOG_ENTRIES_ONLY: &str = "DD_FUNCTRACE_LOG_ENTRIES_ONLY";
pub const DD_FUNCTRACE_LOG_TIME: &str = "DD_FUNCTRACE_LOG_TIME";
pub const DD_FUNCTRACE_LOG_TID: &str = "DD_FUNCTRACE_LOG_TID";
pub const DD_FUNCTRACE_LOG_FNAME: &str = "DD_FUNCTRACE_LOG_FNAME";
pub const DD_FUNCTRACE_LOG_INDENT: &str = "DD_FUNCTRACE_LOG_INDENT";

/// Header line introducing the deferred resolution table in async mode.
pub const DD_FUNCTRACE_SYMTAB_HEADER: &str = "SYMTAB:";
