// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the launch reporter.
//!
//! None of these errors ever reach the test runner: the
//! [`ReportingService`](crate::service::ReportingService) logs them at the point they occur and
//! carries on.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the reporter config.
#[derive(Debug, Error)]
#[error(
    "failed to parse launch reporter config{}",
    .config_file.as_ref().map(|f| format!(" at `{f}`")).unwrap_or_default()
)]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self { config_file, kind }
    }

    /// Returns the config file that failed to parse, if the error came from a file.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing the reporter config.
///
/// Forms part of [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while reading or merging config sources.
    #[error("error building config")]
    BuildError(#[source] Box<ConfigError>),

    /// An error occurred while deserializing the merged config.
    #[error("error deserializing config")]
    DeserializeError(#[source] Box<ConfigError>),

    /// A value was syntactically valid but not allowed.
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue {
        /// The key with the invalid value.
        key: &'static str,

        /// A description of what's wrong with the value.
        message: String,
    },
}

/// The operation a sink was performing when it failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SinkOperation {
    /// Starting a launch.
    StartLaunch,
    /// Finishing a launch.
    FinishLaunch,
    /// Starting an item.
    StartItem,
    /// Finishing an item.
    FinishItem,
    /// Sending a log entry.
    Log,
}

impl fmt::Display for SinkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SinkOperation::StartLaunch => "start launch",
            SinkOperation::FinishLaunch => "finish launch",
            SinkOperation::StartItem => "start item",
            SinkOperation::FinishItem => "finish item",
            SinkOperation::Log => "send log",
        };
        f.write_str(s)
    }
}

/// An error reported by a [`ReportSink`](crate::sink::ReportSink).
///
/// Sink errors are stored inside shared handles, so they are cheaply cloneable.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum SinkError {
    /// The transport behind the sink went away before replying.
    #[error("{operation}: transport disconnected before replying")]
    Disconnected {
        /// The operation that was in flight.
        operation: SinkOperation,
    },

    /// The collector rejected the request.
    #[error("{operation}: request rejected: {message}")]
    Rejected {
        /// The operation that was rejected.
        operation: SinkOperation,

        /// The rejection message.
        message: String,
    },

    /// The parent handle this request depended on failed to resolve.
    #[error("{operation}: parent item failed to resolve")]
    ParentFailed {
        /// The operation that depended on the parent.
        operation: SinkOperation,

        /// The parent's error.
        #[source]
        parent: Box<SinkError>,
    },
}

impl SinkError {
    /// Returns the operation that failed.
    pub fn operation(&self) -> SinkOperation {
        match self {
            SinkError::Disconnected { operation }
            | SinkError::Rejected { operation, .. }
            | SinkError::ParentFailed { operation, .. } => *operation,
        }
    }
}

/// An error returned when a handle needed for a synchronous decision failed to resolve.
#[derive(Clone, Debug, Error)]
#[error("item handle for scope `{scope}` failed to resolve")]
pub struct HandleResolveError {
    scope: String,
    #[source]
    error: SinkError,
}

impl HandleResolveError {
    pub(crate) fn new(scope: impl Into<String>, error: SinkError) -> Self {
        Self {
            scope: scope.into(),
            error,
        }
    }

    /// Returns a description of the scope whose handle failed.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the underlying sink error.
    pub fn sink_error(&self) -> &SinkError {
        &self.error
    }
}

/// Displays an error along with its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(error) = source {
            write!(f, "\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
