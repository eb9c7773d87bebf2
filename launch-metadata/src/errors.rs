// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

/// An error returned while parsing an [`ItemStatus`](crate::ItemStatus) from a string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemStatusParseError {
    input: String,
}

impl ItemStatusParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for ItemStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unrecognized item status: {} (known values: {})",
            self.input,
            crate::ItemStatus::variants().join(", ")
        )
    }
}

impl std::error::Error for ItemStatusParseError {}

/// An error returned while parsing a [`LogLevel`](crate::LogLevel) from a string.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unrecognized log level: {input}")]
pub struct LogLevelParseError {
    input: String,
}

impl LogLevelParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}
