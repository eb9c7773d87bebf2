// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Wire types for communicating with a remote report collector.
//!
//! A report is a *launch* containing a tree of *items* (suites, grouped tests,
//! classes, methods and nested steps). The types in this crate describe the
//! requests used to create and finish those items, and to attach logs to them.
//! They serialize to the camelCase JSON shape expected by collectors.

mod errors;
mod item;
#[cfg(feature = "proptest1")]
mod proptest_helpers;
mod request;

pub use errors::*;
pub use item::*;
pub use request::*;
