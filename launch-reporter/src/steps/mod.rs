// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nested steps reported from inside a running method.
//!
//! Each thread keeps a [`StepContext`]: the item of the method it's running, plus a stack of
//! open nested steps. A new step attaches to the innermost open step, or to the method if none
//! is open. Contexts are per-thread; [`spawn_inheriting`] carries a snapshot into a worker
//! thread so steps started there still nest correctly.

mod context;
mod reporter;

pub use context::{
    StepContext, StepContextGuard, peek_step, pop_step, push_step, spawn_inheriting,
};
pub(crate) use context::{enter_method, exit_method};
pub use reporter::*;
