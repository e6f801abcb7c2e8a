// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Test support for exercising the tracer through a real binary.
//!
//! The integration tests build `functrace_test_app` with cargo, run it with
//! a controlled `DD_FUNCTRACE_*` environment, and assert on the trace it
//! writes to standard error. The build is cached so every test shares one
//! artifact. This assumes the tests run in the context of a cargo `#[test]`
//! item, which lets the artifact be located relative to the test binary.

use anyhow::Context;
use once_cell::sync::OnceCell;
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Builds (once) and returns the path of the test application.
///
/// The app is linked with `--export-dynamic` so its instrumented functions
/// land in the dynamic symbol table and the loader can name them — the
/// same situation as a real instrumented target built with `-rdynamic`.
pub fn build_test_app() -> anyhow::Result<&'static Path> {
    static APP: OnceCell<PathBuf> = OnceCell::new();
    let path = APP.get_or_try_init(|| -> anyhow::Result<PathBuf> {
        let output = Command::new(env!("CARGO"))
            .arg("build")
            .arg("--bin")
            .arg("functrace_test_app")
            .env("RUSTFLAGS", "-C link-arg=-Wl,--export-dynamic")
            .output()
            .context("spawning cargo build")?;
        anyhow::ensure!(
            output.status.success(),
            "cargo build failed: status {:?}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        );

        let test_bin = env::current_exe().context("locating current test binary")?;
        let target_dir = test_bin
            .ancestors()
            .find(|dir| dir.file_name() == Some(OsStr::new("target")))
            .context("test binary is not under a cargo target directory")?;
        Ok(target_dir.join("debug").join("functrace_test_app"))
    })?;
    Ok(path)
}
