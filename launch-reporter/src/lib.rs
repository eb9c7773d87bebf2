// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for reporting test runs to a remote collector.
//!
//! A test runner emits lifecycle notifications (suites, grouped tests, classes, methods,
//! configuration methods, retries). [`ReportingService`](service::ReportingService) turns them
//! into a tree of report items, sent through a [`ReportSink`](sink::ReportSink).
//!
//! The pieces, leaves first:
//!
//! * [`cache::TrackingCache`]: a bounded, FIFO-evicting map used to remember small facts.
//! * [`tree::ItemTree`]: the registry of live scopes and their item handles.
//! * [`role::classify`]: maps a method to its lifecycle role.
//! * [`reconcile::ReconciliationEngine`]: decides retry flags and issue annotations, and
//!   retroactively amends already-sent finishes.
//! * [`steps`]: the per-thread stack of nested steps.

pub mod cache;
pub mod config;
pub mod errors;
pub mod events;
pub mod handle;
mod helpers;
pub mod reconcile;
pub mod role;
pub mod service;
pub mod sink;
pub mod status;
pub mod steps;
pub mod tree;
