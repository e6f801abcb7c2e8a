// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Basename word-list matcher. A colon-separated list of names is compiled
//! once into hashed entries; every trace event then matches a path's
//! basename against the list. The additive byte hash is a
//! necessary-not-sufficient prefilter: a hit still requires length and full
//! byte equality.

/// The basename of a path: the substring after the last `/`, or the whole
/// string when there is none.
pub(crate) fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

fn additive_hash(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |h, &b| h.wrapping_add(u32::from(b)))
}

#[derive(Debug)]
struct WordEntry {
    text: String,
    hash: u32,
}

/// Compiled form of a colon-separated name list. Built once per filter list
/// and owned by the process-lived tracer state.
#[derive(Debug, Default)]
pub(crate) struct WordList {
    entries: Vec<WordEntry>,
}

impl WordList {
    /// Compiles `list`. Empty input and empty segments contribute nothing.
    pub(crate) fn build(list: &str) -> Self {
        let entries = list
            .split(':')
            .filter(|segment| !segment.is_empty())
            .map(|segment| WordEntry {
                hash: additive_hash(segment.as_bytes()),
                text: segment.to_string(),
            })
            .collect();
        Self { entries }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matches the basename of `path` against the list, returning the
    /// matched basename subslice of `path`.
    pub(crate) fn matches<'p>(&self, path: &'p str) -> Option<&'p str> {
        let base = basename(path);
        let hash = additive_hash(base.as_bytes());
        self.entries
            .iter()
            .find(|entry| {
                entry.text.len() == base.len() && entry.hash == hash && entry.text == base
            })
            .map(|_| base)
    }
}
