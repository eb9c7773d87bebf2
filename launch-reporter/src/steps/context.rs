// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::handle::ItemHandle;
use launch_metadata::ItemStatus;
use std::{cell::RefCell, thread};

thread_local! {
    static CURRENT: RefCell<StepContext> = RefCell::new(StepContext::default());
}

/// A step that has been started but not finished.
#[derive(Clone, Debug)]
pub(crate) struct OpenStep {
    pub(crate) handle: ItemHandle,
    pub(crate) failed: bool,
}

impl OpenStep {
    pub(crate) fn default_status(&self) -> ItemStatus {
        if self.failed {
            ItemStatus::Failed
        } else {
            ItemStatus::Passed
        }
    }
}

/// The nesting state of the current thread: the running method's item plus the stack of open
/// nested steps.
///
/// Each thread has its own context. To carry it into a worker thread, take a snapshot with
/// [`StepContext::current`] and [`install`](StepContext::install) it on the worker, or use
/// [`spawn_inheriting`].
#[derive(Clone, Debug, Default)]
pub struct StepContext {
    method: Option<ItemHandle>,
    stack: Vec<OpenStep>,
}

impl StepContext {
    /// Returns a snapshot of the current thread's context.
    pub fn current() -> Self {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Replaces the current thread's context with this one until the guard is dropped.
    #[must_use = "the context is uninstalled when the guard is dropped"]
    pub fn install(self) -> StepContextGuard {
        let previous = CURRENT.with(|current| current.replace(self));
        StepContextGuard {
            previous: Some(previous),
        }
    }

    /// Returns the item of the method running on this context, if any.
    pub fn method(&self) -> Option<&ItemHandle> {
        self.method.as_ref()
    }

    /// Returns the number of open nested steps.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the handle a new nested step attaches to: the innermost open step, or the
    /// running method.
    pub fn parent(&self) -> Option<&ItemHandle> {
        self.stack
            .last()
            .map(|step| &step.handle)
            .or(self.method.as_ref())
    }
}

/// Restores the previous step context when dropped.
#[derive(Debug)]
pub struct StepContextGuard {
    previous: Option<StepContext>,
}

impl Drop for StepContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT.with(|current| current.replace(previous));
        }
    }
}

pub(crate) fn with_current<R>(f: impl FnOnce(&mut StepContext) -> R) -> R {
    CURRENT.with(|current| f(&mut current.borrow_mut()))
}

/// Spawns a thread that starts with a snapshot of this thread's step context.
pub fn spawn_inheriting<F, T>(f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let context = StepContext::current();
    thread::spawn(move || {
        let _guard = context.install();
        f()
    })
}

/// Pushes a step onto the current thread's stack.
pub fn push_step(handle: ItemHandle) {
    with_current(|context| {
        context.stack.push(OpenStep {
            handle,
            failed: false,
        })
    });
}

/// Pops the innermost step off the current thread's stack.
pub fn pop_step() -> Option<ItemHandle> {
    pop_open_step().map(|step| step.handle)
}

/// Returns the innermost step on the current thread's stack.
pub fn peek_step() -> Option<ItemHandle> {
    with_current(|context| context.stack.last().map(|step| step.handle.clone()))
}

pub(crate) fn pop_open_step() -> Option<OpenStep> {
    with_current(|context| context.stack.pop())
}

pub(crate) fn mark_innermost_failed() {
    with_current(|context| {
        if let Some(step) = context.stack.last_mut() {
            step.failed = true;
        }
    });
}

/// Sets the running method for this thread, discarding any open steps.
pub(crate) fn enter_method(handle: ItemHandle) {
    with_current(|context| {
        context.method = Some(handle);
        context.stack.clear();
    });
}

/// Clears the running method if it is `handle`.
pub(crate) fn exit_method(handle: &ItemHandle) {
    with_current(|context| {
        if context
            .method
            .as_ref()
            .is_some_and(|method| method.ptr_eq(handle))
        {
            context.method = None;
            context.stack.clear();
        }
    });
}
