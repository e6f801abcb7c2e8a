// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! ELF inspection and instruction-pointer resolution.

pub(crate) mod elf;
pub(crate) mod resolver;
