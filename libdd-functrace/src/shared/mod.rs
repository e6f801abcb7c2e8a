// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Constants, configuration and the output sink shared by every stage of the
//! tracer.

pub(crate) mod configuration;
pub(crate) mod constants;
pub(crate) mod log;
