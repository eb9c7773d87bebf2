// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::ReportSink;
use crate::{
    errors::{SinkError, SinkOperation},
    handle::{FinishAck, ItemHandle},
    helpers::lock,
};
use launch_metadata::{
    FinishItemRequest, FinishLaunchRequest, ItemId, LogRequest, StartItemRequest,
    StartLaunchRequest,
};
use std::{
    collections::BTreeSet,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

/// A call recorded by a [`RecordingSink`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SinkCall {
    /// A launch was started.
    StartLaunch {
        /// The assigned launch ID.
        id: ItemId,
        /// The request.
        request: StartLaunchRequest,
    },
    /// A launch was finished.
    FinishLaunch {
        /// The launch ID.
        id: ItemId,
        /// The request.
        request: FinishLaunchRequest,
    },
    /// An item was started.
    StartItem {
        /// The assigned item ID.
        id: ItemId,
        /// The parent's ID, if the parent was known and resolved.
        parent: Option<ItemId>,
        /// The request.
        request: StartItemRequest,
    },
    /// An item was finished.
    FinishItem {
        /// The item ID.
        id: ItemId,
        /// The request.
        request: FinishItemRequest,
    },
    /// A log entry was sent.
    Log {
        /// The item ID.
        id: ItemId,
        /// The request.
        request: LogRequest,
    },
}

/// An in-memory sink that resolves every request immediately and records it.
///
/// Useful for dry runs and for inspecting exactly what would be sent to a collector.
#[derive(Debug, Default)]
pub struct RecordingSink {
    next_id: AtomicU64,
    calls: Mutex<Vec<SinkCall>>,
    failing_finishes: Mutex<BTreeSet<String>>,
}

impl RecordingSink {
    /// Creates a new, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every finish of an item with this name fail synchronously.
    pub fn fail_finishes_named(&self, name: impl Into<String>) {
        lock(&self.failing_finishes).insert(name.into());
    }

    /// Returns every recorded call, in order.
    pub fn calls(&self) -> Vec<SinkCall> {
        lock(&self.calls).clone()
    }

    /// Returns the start requests for items with the given name, along with their IDs and parent
    /// IDs.
    pub fn starts_named(&self, name: &str) -> Vec<(ItemId, Option<ItemId>, StartItemRequest)> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                SinkCall::StartItem {
                    id,
                    parent,
                    request,
                } if request.name == name => Some((id.clone(), parent.clone(), request.clone())),
                _ => None,
            })
            .collect()
    }

    /// Returns the finish requests sent for items with the given name, in order.
    ///
    /// Replayed finishes are included, so an item can appear more than once.
    pub fn finishes_named(&self, name: &str) -> Vec<FinishItemRequest> {
        let calls = lock(&self.calls);
        calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::FinishItem { id, request } if self.name_of(&calls, id) == Some(name) => {
                    Some(request.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Returns the log requests sent to the item with the given ID.
    pub fn logs_for(&self, item: &ItemId) -> Vec<LogRequest> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                SinkCall::Log { id, request } if id == item => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the name of the item with the given ID.
    pub fn item_name(&self, item: &ItemId) -> Option<String> {
        let calls = lock(&self.calls);
        self.name_of(&calls, item).map(str::to_owned)
    }

    fn name_of<'a>(&self, calls: &'a [SinkCall], item: &ItemId) -> Option<&'a str> {
        calls.iter().find_map(|call| match call {
            SinkCall::StartItem { id, request, .. } if id == item => Some(request.name.as_str()),
            _ => None,
        })
    }

    fn allocate(&self, prefix: &str) -> ItemId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        ItemId::new(format!("{prefix}-{n}"))
    }

    fn resolved_id(
        handle: &ItemHandle,
        operation: SinkOperation,
    ) -> Result<ItemId, SinkError> {
        match handle.peek() {
            Some(Ok(id)) => Ok(id),
            Some(Err(parent)) => Err(SinkError::ParentFailed {
                operation,
                parent: Box::new(parent),
            }),
            None => Err(SinkError::Rejected {
                operation,
                message: "handle is not from this sink".to_owned(),
            }),
        }
    }

    fn record(&self, call: SinkCall) {
        lock(&self.calls).push(call);
    }
}

impl ReportSink for RecordingSink {
    fn start_launch(&self, request: StartLaunchRequest) -> ItemHandle {
        let id = self.allocate("launch");
        self.record(SinkCall::StartLaunch {
            id: id.clone(),
            request,
        });
        ItemHandle::resolved(id)
    }

    fn finish_launch(
        &self,
        launch: &ItemHandle,
        request: FinishLaunchRequest,
    ) -> Result<FinishAck, SinkError> {
        let id = Self::resolved_id(launch, SinkOperation::FinishLaunch)?;
        self.record(SinkCall::FinishLaunch { id, request });
        Ok(FinishAck::acknowledged())
    }

    fn start_item(&self, parent: Option<&ItemHandle>, request: StartItemRequest) -> ItemHandle {
        let parent = match parent.map(|p| Self::resolved_id(p, SinkOperation::StartItem)) {
            Some(Ok(id)) => Some(id),
            Some(Err(error)) => return ItemHandle::failed(error),
            None => None,
        };
        let id = self.allocate("item");
        self.record(SinkCall::StartItem {
            id: id.clone(),
            parent,
            request,
        });
        ItemHandle::resolved(id)
    }

    fn finish_item(
        &self,
        item: &ItemHandle,
        request: FinishItemRequest,
    ) -> Result<FinishAck, SinkError> {
        let id = Self::resolved_id(item, SinkOperation::FinishItem)?;
        if let Some(name) = self.item_name(&id) {
            if lock(&self.failing_finishes).contains(&name) {
                return Err(SinkError::Rejected {
                    operation: SinkOperation::FinishItem,
                    message: format!("configured to fail finishing `{name}`"),
                });
            }
        }
        self.record(SinkCall::FinishItem { id, request });
        Ok(FinishAck::acknowledged())
    }

    fn log(&self, item: &ItemHandle, request: LogRequest) -> Result<FinishAck, SinkError> {
        let id = Self::resolved_id(item, SinkOperation::Log)?;
        self.record(SinkCall::Log { id, request });
        Ok(FinishAck::acknowledged())
    }
}
