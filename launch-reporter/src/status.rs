// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling up sibling statuses into a parent status.

use crate::helpers::lock;
use launch_metadata::ItemStatus;
use std::sync::Mutex;

/// Folds a new result `next` into the accumulated status `current`.
///
/// `Passed` is the neutral element and `Failed` is absorbing. `Skipped` overrides `Passed` but
/// never `Failed`:
///
/// | current \ next | Passed  | Failed | Skipped |
/// |----------------|---------|--------|---------|
/// | Passed         | Passed  | Failed | Skipped |
/// | Failed         | Failed  | Failed | Failed  |
/// | Skipped        | Skipped | Failed | Skipped |
pub fn fold_status(current: ItemStatus, next: ItemStatus) -> ItemStatus {
    match (current, next) {
        (ItemStatus::Failed, _) | (_, ItemStatus::Passed) => current,
        (_, ItemStatus::Failed) => ItemStatus::Failed,
        (_, ItemStatus::Skipped) => ItemStatus::Skipped,
    }
}

/// A thread-safe running fold of child statuses.
#[derive(Debug, Default)]
pub struct StatusAccumulator {
    // None until the first child reports.
    status: Mutex<Option<ItemStatus>>,
}

impl StatusAccumulator {
    /// Creates a new, empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a child status into the accumulator, returning the new accumulated status.
    pub fn record(&self, status: ItemStatus) -> ItemStatus {
        let mut current = lock(&self.status);
        let next = fold_status(current.unwrap_or(ItemStatus::Passed), status);
        *current = Some(next);
        next
    }

    /// Returns the accumulated status, or `None` if no child has reported.
    pub fn get(&self) -> Option<ItemStatus> {
        *lock(&self.status)
    }

    /// Returns the accumulated status, treating "no children" as passed.
    pub fn get_or_passed(&self) -> ItemStatus {
        self.get().unwrap_or(ItemStatus::Passed)
    }
}
