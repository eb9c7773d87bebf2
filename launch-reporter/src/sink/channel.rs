// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::ReportSink;
use crate::{
    errors::{SinkError, SinkOperation},
    handle::{FinishAck, HandleResult, ItemHandle},
};
use futures::future::BoxFuture;
use launch_metadata::{
    FinishItemRequest, FinishLaunchRequest, ItemId, LogRequest, StartItemRequest,
    StartLaunchRequest,
};
use std::future::Future;
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        oneshot,
    },
};

/// A request handed to the transport by a [`ChannelSink`].
///
/// Each request carries a reply channel. Requests that depend on other items are only sent once
/// those items have resolved, so the IDs here are always concrete. Dropping the reply sender
/// fails the corresponding handle with [`SinkError::Disconnected`].
#[derive(Debug)]
pub enum SinkRequest {
    /// Start a launch.
    StartLaunch {
        /// The request.
        request: StartLaunchRequest,
        /// Reply with the new launch ID.
        reply: oneshot::Sender<HandleResult>,
    },

    /// Finish a launch.
    FinishLaunch {
        /// The launch to finish.
        launch: ItemId,
        /// The request.
        request: FinishLaunchRequest,
        /// Reply once the collector acknowledges.
        reply: oneshot::Sender<Result<(), SinkError>>,
    },

    /// Start an item.
    StartItem {
        /// The parent item, or `None` for a root item.
        parent: Option<ItemId>,
        /// The request.
        request: StartItemRequest,
        /// Reply with the new item ID.
        reply: oneshot::Sender<HandleResult>,
    },

    /// Finish an item.
    FinishItem {
        /// The item to finish.
        item: ItemId,
        /// The request.
        request: FinishItemRequest,
        /// Reply once the collector acknowledges.
        reply: oneshot::Sender<Result<(), SinkError>>,
    },

    /// Attach a log entry to an item.
    Log {
        /// The item to attach the log to.
        item: ItemId,
        /// The request.
        request: LogRequest,
        /// Reply once the collector acknowledges.
        reply: oneshot::Sender<Result<(), SinkError>>,
    },
}

/// A sink that forwards requests over an unbounded channel to a transport task.
///
/// Dependent requests are chained off their parent handles on the given tokio runtime, so the
/// calling thread never waits for a round trip. Requests that target the same item, including
/// starts of its children, reach the transport in the order they were issued.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: UnboundedSender<SinkRequest>,
    runtime: Handle,
}

impl ChannelSink {
    /// Creates a new sink, returning the receiver the transport should drain.
    pub fn new(runtime: Handle) -> (Self, UnboundedReceiver<SinkRequest>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender, runtime }, receiver)
    }

    fn check_open(&self, operation: SinkOperation) -> Result<(), SinkError> {
        if self.sender.is_closed() {
            Err(SinkError::Disconnected { operation })
        } else {
            Ok(())
        }
    }

    // Spawning makes the chain run eagerly; nobody is required to poll the returned handle.
    fn spawn<T, F>(
        &self,
        operation: SinkOperation,
        fut: F,
    ) -> BoxFuture<'static, Result<T, SinkError>>
    where
        F: Future<Output = Result<T, SinkError>> + Send + 'static,
        T: Send + 'static,
    {
        let join = self.runtime.spawn(fut);
        Box::pin(async move {
            join.await
                .unwrap_or(Err(SinkError::Disconnected { operation }))
        })
    }
}

async fn send_and_wait<T>(
    sender: UnboundedSender<SinkRequest>,
    operation: SinkOperation,
    make_request: impl FnOnce(oneshot::Sender<Result<T, SinkError>>) -> SinkRequest,
) -> Result<T, SinkError> {
    let (reply, rx) = oneshot::channel();
    sender
        .send(make_request(reply))
        .map_err(|_| SinkError::Disconnected { operation })?;
    rx.await
        .unwrap_or(Err(SinkError::Disconnected { operation }))
}

impl ReportSink for ChannelSink {
    fn start_launch(&self, request: StartLaunchRequest) -> ItemHandle {
        let operation = SinkOperation::StartLaunch;
        let sender = self.sender.clone();
        ItemHandle::new(self.spawn(
            operation,
            send_and_wait(sender, operation, |reply| SinkRequest::StartLaunch {
                request,
                reply,
            }),
        ))
    }

    fn finish_launch(
        &self,
        launch: &ItemHandle,
        request: FinishLaunchRequest,
    ) -> Result<FinishAck, SinkError> {
        let operation = SinkOperation::FinishLaunch;
        self.check_open(operation)?;
        let sender = self.sender.clone();
        let fut = launch.sequence(operation, move |launch| {
            send_and_wait(sender, operation, |reply| SinkRequest::FinishLaunch {
                launch,
                request,
                reply,
            })
        });
        Ok(FinishAck::new(self.spawn(operation, fut)))
    }

    fn start_item(&self, parent: Option<&ItemHandle>, request: StartItemRequest) -> ItemHandle {
        let operation = SinkOperation::StartItem;
        let sender = self.sender.clone();
        match parent {
            Some(parent) => {
                let fut = parent.sequence(operation, move |parent| {
                    send_and_wait(sender, operation, |reply| SinkRequest::StartItem {
                        parent: Some(parent),
                        request,
                        reply,
                    })
                });
                ItemHandle::new(self.spawn(operation, fut))
            }
            None => ItemHandle::new(self.spawn(
                operation,
                send_and_wait(sender, operation, |reply| SinkRequest::StartItem {
                    parent: None,
                    request,
                    reply,
                }),
            )),
        }
    }

    fn finish_item(
        &self,
        item: &ItemHandle,
        request: FinishItemRequest,
    ) -> Result<FinishAck, SinkError> {
        let operation = SinkOperation::FinishItem;
        self.check_open(operation)?;
        let sender = self.sender.clone();
        let fut = item.sequence(operation, move |item| {
            send_and_wait(sender, operation, |reply| SinkRequest::FinishItem {
                item,
                request,
                reply,
            })
        });
        Ok(FinishAck::new(self.spawn(operation, fut)))
    }

    fn log(&self, item: &ItemHandle, request: LogRequest) -> Result<FinishAck, SinkError> {
        let operation = SinkOperation::Log;
        self.check_open(operation)?;
        let sender = self.sender.clone();
        let fut = item.sequence(operation, move |item| {
            send_and_wait(sender, operation, |reply| SinkRequest::Log {
                item,
                request,
                reply,
            })
        });
        Ok(FinishAck::new(self.spawn(operation, fut)))
    }
}
