// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The two per-call matchers: a hashed basename word list for DSO filters
//! and an extended glob for function-name filters.

pub(crate) mod eglob;
pub(crate) mod word_list;
