// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the launch reporter.
//!
//! Configuration is layered: the embedded [default config](ReporterConfig::DEFAULT_CONFIG),
//! then an optional TOML file, then `LAUNCH_REPORTER__*` environment variables. Unknown keys
//! produce a warning rather than an error.

mod imp;

pub use imp::*;
