// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The boundary between the reporter and the remote collector.
//!
//! A [`ReportSink`] accepts start/finish/log requests and returns handles without blocking.
//! The sink is responsible for ordering: a finish for a handle must not reach the collector
//! before the create that resolves it.

mod channel;
mod recording;

pub use channel::*;
pub use recording::*;

use crate::{
    errors::SinkError,
    handle::{FinishAck, ItemHandle},
};
use launch_metadata::{
    FinishItemRequest, FinishLaunchRequest, LogRequest, StartItemRequest, StartLaunchRequest,
};

/// A destination for report requests.
///
/// Implementations must be callable concurrently from many runner threads. Methods returning
/// `Result` fail synchronously only when the request could not be handed off at all; failures
/// that happen later surface through the returned handle or acknowledgement.
pub trait ReportSink: Send + Sync {
    /// Starts a launch, returning a handle that resolves to the launch ID.
    fn start_launch(&self, request: StartLaunchRequest) -> ItemHandle;

    /// Finishes a launch.
    fn finish_launch(
        &self,
        launch: &ItemHandle,
        request: FinishLaunchRequest,
    ) -> Result<FinishAck, SinkError>;

    /// Starts an item under `parent`, or at the root of the launch if `parent` is `None`.
    fn start_item(&self, parent: Option<&ItemHandle>, request: StartItemRequest) -> ItemHandle;

    /// Finishes an item.
    fn finish_item(
        &self,
        item: &ItemHandle,
        request: FinishItemRequest,
    ) -> Result<FinishAck, SinkError>;

    /// Attaches a log entry to an item.
    fn log(&self, item: &ItemHandle, request: LogRequest) -> Result<FinishAck, SinkError>;
}

impl<S: ReportSink + ?Sized> ReportSink for std::sync::Arc<S> {
    fn start_launch(&self, request: StartLaunchRequest) -> ItemHandle {
        (**self).start_launch(request)
    }

    fn finish_launch(
        &self,
        launch: &ItemHandle,
        request: FinishLaunchRequest,
    ) -> Result<FinishAck, SinkError> {
        (**self).finish_launch(launch, request)
    }

    fn start_item(&self, parent: Option<&ItemHandle>, request: StartItemRequest) -> ItemHandle {
        (**self).start_item(parent, request)
    }

    fn finish_item(
        &self,
        item: &ItemHandle,
        request: FinishItemRequest,
    ) -> Result<FinishAck, SinkError> {
        (**self).finish_item(item, request)
    }

    fn log(&self, item: &ItemHandle, request: LogRequest) -> Result<FinishAck, SinkError> {
        (**self).log(item, request)
    }
}
