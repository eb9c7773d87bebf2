// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::context::{OpenStep, mark_innermost_failed, pop_open_step, push_step, with_current};
use crate::{
    errors::DisplayErrorChain,
    handle::{FinishAck, ItemHandle},
    sink::ReportSink,
};
use chrono::Utc;
use launch_metadata::{
    Attachment, FinishItemRequest, ItemStatus, ItemType, LogLevel, LogRequest, StartItemRequest,
};
use tracing::{debug, warn};

/// Reports nested steps under whatever is running on the current thread.
///
/// Every operation is best-effort: if no method is running, nothing is reported, and sink
/// failures are logged rather than returned.
#[derive(Clone, Debug)]
pub struct StepReporter<S> {
    sink: S,
}

impl<S: ReportSink> StepReporter<S> {
    /// Creates a new step reporter sending to `sink`.
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Starts a nested step with the given name.
    ///
    /// Returns `None` if nothing is running on this thread.
    pub fn start_nested_step(&self, name: impl Into<String>) -> Option<ItemHandle> {
        self.start_nested_step_with(StartItemRequest::new(name, ItemType::Step, Utc::now()))
    }

    /// Starts a nested step from a full request.
    ///
    /// Nested steps never count towards statistics, so `has_stats` is always cleared.
    pub fn start_nested_step_with(&self, mut request: StartItemRequest) -> Option<ItemHandle> {
        let Some(parent) = with_current(|context| context.parent().cloned()) else {
            debug!(name = %request.name, "no running method on this thread, skipping step");
            return None;
        };
        request.has_stats = false;
        let handle = self.sink.start_item(Some(&parent), request);
        push_step(handle.clone());
        Some(handle)
    }

    /// Finishes the innermost open step.
    ///
    /// The step finishes as failed if a failure was reported inside it, and passed otherwise.
    pub fn finish_nested_step(&self) -> Option<FinishAck> {
        let step = pop_open_step()?;
        let status = step.default_status();
        self.finish(step, status)
    }

    /// Finishes the innermost open step with an explicit status.
    pub fn finish_nested_step_with(&self, status: ItemStatus) -> Option<FinishAck> {
        let step = pop_open_step()?;
        self.finish(step, status)
    }

    /// Closes every step still open on this thread, innermost first.
    ///
    /// Called before a method finishes so that a forgotten step doesn't stay open under it.
    /// Returns the number of steps closed.
    pub fn finish_previous_step(&self) -> usize {
        let mut closed = 0;
        // A failed finish is logged and doesn't stop the remaining steps from closing.
        while let Some(step) = pop_open_step() {
            let status = step.default_status();
            self.finish(step, status);
            closed += 1;
        }
        if closed > 0 {
            debug!(closed, "closed steps left open by the method");
        }
        closed
    }

    /// Reports a one-shot step with the given status.
    pub fn send_step(&self, status: ItemStatus, name: impl Into<String>) -> Option<FinishAck> {
        self.send(status, name.into(), None)
    }

    /// Reports a one-shot passed step with a log message attached.
    pub fn send_step_log(
        &self,
        level: LogLevel,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Option<FinishAck> {
        self.send(
            status_for(level),
            name.into(),
            Some(log(level, message.into(), None)),
        )
    }

    /// Reports a one-shot failed step with an error message attached.
    pub fn send_step_error(
        &self,
        name: impl Into<String>,
        error: impl Into<String>,
    ) -> Option<FinishAck> {
        self.send(
            ItemStatus::Failed,
            name.into(),
            Some(log(LogLevel::Error, error.into(), None)),
        )
    }

    /// Reports a one-shot step with a file attached.
    pub fn send_step_file(
        &self,
        level: LogLevel,
        name: impl Into<String>,
        message: impl Into<String>,
        file: Attachment,
    ) -> Option<FinishAck> {
        self.send(
            status_for(level),
            name.into(),
            Some(log(level, message.into(), Some(file))),
        )
    }

    fn send(
        &self,
        status: ItemStatus,
        name: String,
        entry: Option<LogRequest>,
    ) -> Option<FinishAck> {
        let handle = self.start_nested_step(name)?;
        if let Some(entry) = entry {
            if let Err(error) = self.sink.log(&handle, entry) {
                warn!("failed to send step log: {}", DisplayErrorChain::new(error));
            }
        }
        self.finish_nested_step_with(status)
    }

    fn finish(&self, step: OpenStep, status: ItemStatus) -> Option<FinishAck> {
        if status == ItemStatus::Failed {
            mark_innermost_failed();
        }
        match self
            .sink
            .finish_item(&step.handle, FinishItemRequest::new(Utc::now(), Some(status)))
        {
            Ok(ack) => Some(ack),
            Err(error) => {
                warn!("failed to finish nested step: {}", DisplayErrorChain::new(error));
                None
            }
        }
    }
}

fn status_for(level: LogLevel) -> ItemStatus {
    if level == LogLevel::Error {
        ItemStatus::Failed
    } else {
        ItemStatus::Passed
    }
}

fn log(level: LogLevel, message: String, file: Option<Attachment>) -> LogRequest {
    LogRequest {
        time: Utc::now(),
        level,
        message,
        file,
    }
}
