// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{handle::ItemHandle, helpers::lock};
use launch_metadata::FinishItemRequest;
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

/// A finish request that was already sent, kept so it can be resent with a retry flag.
#[derive(Clone, Debug)]
pub struct PendingFinish {
    /// The handle of the finished item.
    pub handle: ItemHandle,
    /// The request as it was sent.
    pub request: FinishItemRequest,
}

/// Retry and skip bookkeeping for one test-class instance.
#[derive(Debug, Default)]
pub struct ExecutionRecord {
    retried: AtomicBool,
    skip_suppressed: AtomicBool,
    pending_before_finishes: Mutex<VecDeque<PendingFinish>>,
}

impl ExecutionRecord {
    /// Creates a new, empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the instance is known to be part of a retry chain.
    pub fn is_retried(&self) -> bool {
        self.retried.load(Ordering::Acquire)
    }

    /// Marks the instance as part of a retry chain. Returns true if it wasn't marked before.
    pub fn mark_retried(&self) -> bool {
        !self.retried.swap(true, Ordering::AcqRel)
    }

    /// Returns true if skips on this instance are consequences of an earlier failure.
    pub fn is_skip_suppressed(&self) -> bool {
        self.skip_suppressed.load(Ordering::Acquire)
    }

    pub(crate) fn set_skip_suppressed(&self, suppressed: bool) {
        self.skip_suppressed.store(suppressed, Ordering::Release);
    }

    pub(crate) fn enqueue_before_finish(&self, handle: ItemHandle, request: FinishItemRequest) {
        lock(&self.pending_before_finishes).push_back(PendingFinish { handle, request });
    }

    pub(crate) fn drain_before_finishes(&self) -> Vec<PendingFinish> {
        lock(&self.pending_before_finishes).drain(..).collect()
    }

    /// Returns the number of before-method finishes waiting for a retry decision.
    pub fn pending_len(&self) -> usize {
        lock(&self.pending_before_finishes).len()
    }
}
