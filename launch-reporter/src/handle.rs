// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronously-resolved references to remote items.
//!
//! Creating a remote item is a round trip, but the runner must never wait for it. An
//! [`ItemHandle`] is returned immediately and resolves to an [`ItemId`] once the collector
//! replies. Handles are cheap to clone; every clone observes the same resolution.
//!
//! Operations on one item must reach the collector in the order they were issued (a failure
//! log before the finish, an original finish before its retry replay).
//! [`ItemHandle::sequence`] provides that ordering.

use crate::{
    errors::{SinkError, SinkOperation},
    helpers::lock,
};
use futures::{
    channel::oneshot,
    future::{self, BoxFuture, FutureExt, Shared},
};
use launch_metadata::ItemId;
use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex},
};

type Tail = Shared<BoxFuture<'static, ()>>;

/// The result a handle resolves to.
pub type HandleResult = Result<ItemId, SinkError>;

/// A handle to a remote item that eventually resolves to its ID, or fails.
#[derive(Clone)]
pub struct ItemHandle {
    inner: Shared<BoxFuture<'static, HandleResult>>,
    // Completes once every operation sequenced so far on this item has completed.
    tail: Arc<Mutex<Tail>>,
}

impl ItemHandle {
    /// Creates a handle from a future that resolves to the item's ID.
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = HandleResult> + Send + 'static,
    {
        Self {
            inner: fut.boxed().shared(),
            tail: Arc::new(Mutex::new(future::ready(()).boxed().shared())),
        }
    }

    /// Creates a handle that is already resolved.
    pub fn resolved(id: ItemId) -> Self {
        Self::new(future::ready(Ok(id))).primed()
    }

    /// Creates a handle that has already failed.
    pub fn failed(error: SinkError) -> Self {
        Self::new(future::ready(Err(error))).primed()
    }

    // A shared future only exposes its output via peek() after it's been polled once.
    fn primed(self) -> Self {
        _ = self.inner.clone().now_or_never();
        self
    }

    /// Returns the resolution if it's already available, without waiting.
    pub fn peek(&self) -> Option<HandleResult> {
        self.inner.peek().cloned()
    }

    /// Waits for the handle to resolve.
    pub async fn id(&self) -> HandleResult {
        self.inner.clone().await
    }

    /// Blocks the current thread until the handle resolves.
    ///
    /// Only used on local bookkeeping paths that need a concrete ID. Must not be called from
    /// within an async context.
    pub fn wait(&self) -> HandleResult {
        futures::executor::block_on(self.inner.clone())
    }

    /// Returns true if both handles refer to the same pending resolution.
    pub fn ptr_eq(&self, other: &ItemHandle) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }

    /// Chains a dependent operation off this handle.
    ///
    /// `f` runs with the resolved ID once this handle resolves. If this handle fails, `f` is
    /// never called and the returned future fails with [`SinkError::ParentFailed`].
    pub fn and_then<T, F, Fut>(
        &self,
        operation: SinkOperation,
        f: F,
    ) -> impl Future<Output = Result<T, SinkError>> + Send + 'static
    where
        F: FnOnce(ItemId) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SinkError>> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        async move {
            match inner.await {
                Ok(id) => f(id).await,
                Err(parent) => Err(SinkError::ParentFailed {
                    operation,
                    parent: Box::new(parent),
                }),
            }
        }
    }

    /// Like [`Self::and_then`], but `f` also waits for every operation previously sequenced on
    /// this handle to complete.
    ///
    /// Operations on one item therefore run in the order `sequence` was called, whatever order
    /// the returned futures are polled in. A failed or dropped operation doesn't hold up the
    /// ones after it.
    pub fn sequence<T, F, Fut>(
        &self,
        operation: SinkOperation,
        f: F,
    ) -> impl Future<Output = Result<T, SinkError>> + Send + 'static
    where
        F: FnOnce(ItemId) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SinkError>> + Send + 'static,
        T: Send + 'static,
    {
        let (done, done_rx) = oneshot::channel::<()>();
        let previous = {
            let mut tail = lock(&self.tail);
            let previous = tail.clone();
            // A dropped operation releases its successors only once its own predecessors are
            // done.
            *tail = previous
                .clone()
                .then(|()| done_rx.map(|_| ()))
                .boxed()
                .shared();
            previous
        };
        let chained = self.and_then(operation, f);
        async move {
            previous.await;
            let result = chained.await;
            _ = done.send(());
            result
        }
    }
}

impl fmt::Debug for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.peek() {
            Some(Ok(id)) => f.debug_tuple("ItemHandle").field(id).finish(),
            Some(Err(error)) => f.debug_tuple("ItemHandle").field(error).finish(),
            None => f.write_str("ItemHandle(<pending>)"),
        }
    }
}

/// The acknowledgement of a finish request, resolved once the collector replies.
#[derive(Clone)]
pub struct FinishAck {
    inner: Shared<BoxFuture<'static, Result<(), SinkError>>>,
}

impl FinishAck {
    /// Creates an acknowledgement from a future.
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<(), SinkError>> + Send + 'static,
    {
        Self {
            inner: fut.boxed().shared(),
        }
    }

    /// Creates an acknowledgement that has already succeeded.
    pub fn acknowledged() -> Self {
        Self::new(future::ready(Ok(()))).primed()
    }

    /// Creates an acknowledgement that has already failed.
    pub fn failed(error: SinkError) -> Self {
        Self::new(future::ready(Err(error))).primed()
    }

    fn primed(self) -> Self {
        _ = self.inner.clone().now_or_never();
        self
    }

    /// Returns the result if it's already available.
    pub fn peek(&self) -> Option<Result<(), SinkError>> {
        self.inner.peek().cloned()
    }

    /// Waits for the acknowledgement.
    pub async fn acked(&self) -> Result<(), SinkError> {
        self.inner.clone().await
    }

    /// Blocks the current thread until the acknowledgement arrives.
    pub fn wait(&self) -> Result<(), SinkError> {
        futures::executor::block_on(self.inner.clone())
    }
}

impl fmt::Debug for FinishAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.peek() {
            Some(Ok(())) => f.write_str("FinishAck(ok)"),
            Some(Err(error)) => f.debug_tuple("FinishAck").field(error).finish(),
            None => f.write_str("FinishAck(<pending>)"),
        }
    }
}
