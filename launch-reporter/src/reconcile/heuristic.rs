// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{backtrace::Backtrace, fmt};

/// A secondary signal for retry detection, consulted when the runner doesn't flag a retry
/// itself.
pub trait RetryHeuristic: fmt::Debug + Send + Sync {
    /// Returns true if the current call originates from the runner's retry-dispatch path.
    fn is_retry_dispatch(&self) -> bool;
}

/// A heuristic that never detects a retry.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoHeuristic;

impl RetryHeuristic for NoHeuristic {
    fn is_retry_dispatch(&self) -> bool {
        false
    }
}

/// Detects retries by looking for known frames on the current call stack.
///
/// Capturing a backtrace is slow, and symbol names depend on the build's debug info, so this
/// is strictly best-effort.
#[derive(Clone, Debug)]
pub struct CallStackHeuristic {
    markers: Vec<String>,
}

impl CallStackHeuristic {
    /// Creates a heuristic matching any of the given frame substrings.
    pub fn new(markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the configured markers.
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Returns true if any marker appears in `stack`.
    pub fn matches(&self, stack: &str) -> bool {
        self.markers
            .iter()
            .any(|marker| !marker.is_empty() && stack.contains(marker.as_str()))
    }
}

impl RetryHeuristic for CallStackHeuristic {
    fn is_retry_dispatch(&self) -> bool {
        if self.markers.is_empty() {
            return false;
        }
        let backtrace = Backtrace::force_capture();
        self.matches(&format!("{backtrace:#}"))
    }
}
