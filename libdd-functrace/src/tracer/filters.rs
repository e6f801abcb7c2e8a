// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Include/exclude policies deciding which calls are reported. Each filter
//! is a tri-state resolved once from configuration: report everything,
//! whitelist, or blacklist — never both lists at once; include wins when
//! both variables are set.

use crate::matchers::eglob::match_eglob;
use crate::matchers::word_list::{basename, WordList};

/// DSO filter over basename word lists.
#[derive(Debug)]
pub(crate) enum LibraryFilter {
    ReportAll,
    Include(WordList),
    Exclude(WordList),
}

impl LibraryFilter {
    pub(crate) fn from_config(include: Option<&str>, exclude: Option<&str>) -> Self {
        if let Some(list) = include {
            let list = WordList::build(list);
            if !list.is_empty() {
                return Self::Include(list);
            }
        }
        if let Some(list) = exclude {
            let list = WordList::build(list);
            if !list.is_empty() {
                return Self::Exclude(list);
            }
        }
        Self::ReportAll
    }

    /// Returns the basename to report `path` under, or None when the event
    /// is suppressed.
    pub(crate) fn admit<'p>(&self, path: &'p str) -> Option<&'p str> {
        match self {
            Self::ReportAll => Some(basename(path)),
            Self::Include(list) => list.matches(path),
            Self::Exclude(list) => match list.matches(path) {
                Some(_) => None,
                None => Some(basename(path)),
            },
        }
    }
}

/// Function-name filter over one extended-glob pattern.
#[derive(Debug)]
pub(crate) enum FunctionFilter {
    ReportAll,
    Include(String),
    Exclude(String),
}

impl FunctionFilter {
    pub(crate) fn from_config(include: Option<&str>, exclude: Option<&str>) -> Self {
        match (include, exclude) {
            (Some(pattern), _) => Self::Include(pattern.to_string()),
            (None, Some(pattern)) => Self::Exclude(pattern.to_string()),
            (None, None) => Self::ReportAll,
        }
    }

    /// Whether an event with this (possibly unresolved) name is reported.
    /// An unresolved name cannot satisfy a whitelist; a blacklist has
    /// nothing to reject, so it reports.
    pub(crate) fn admits(&self, name: Option<&str>) -> bool {
        match self {
            Self::ReportAll => true,
            Self::Include(pattern) => name.is_some_and(|n| match_eglob(pattern, n)),
            Self::Exclude(pattern) => !name.is_some_and(|n| match_eglob(pattern, n)),
        }
    }
}
