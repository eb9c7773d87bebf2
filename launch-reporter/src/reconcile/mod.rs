// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry and skip reconciliation.
//!
//! Some facts about an attempt are only known after its items were reported as finished. For
//! example, a before-method finishes before anyone knows that the test it prepared for is a
//! retry. The [`ReconciliationEngine`] keeps per-instance [`ExecutionRecord`]s in a bounded
//! [`TrackingCache`] and amends or resends finish requests as those facts arrive.
//!
//! Records are forgotten under memory pressure. The worst outcome is a report that misses an
//! annotation, never a failed run.

mod heuristic;
mod record;

pub use heuristic::*;
pub use record::*;

use crate::{
    cache::TrackingCache,
    errors::DisplayErrorChain,
    events::InstanceId,
    handle::ItemHandle,
    role::MethodRole,
    sink::ReportSink,
};
use debug_ignore::DebugIgnore;
use launch_metadata::{FinishItemRequest, Issue, ItemStatus};
use std::{num::NonZeroUsize, sync::Arc};
use tracing::{debug, warn};

/// The facts about a finishing event that reconciliation depends on.
#[derive(Clone, Debug)]
pub struct FinishContext<'a> {
    /// The role of the finishing method, or `None` if it has no recognized role.
    pub role: Option<MethodRole>,
    /// The instance the method ran on.
    pub instance: Option<InstanceId>,
    /// The status of the attempt.
    pub status: ItemStatus,
    /// True if the runner reports this attempt as retried.
    pub runner_retry: bool,
    /// The handle of the finishing item.
    pub handle: &'a ItemHandle,
}

/// What reconciliation did to a finish request.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ReconcileOutcome {
    /// The request was queued for a possible retry replay.
    pub queued: bool,
    /// The number of earlier before-method finishes that were resent with a retry flag.
    pub replayed: usize,
}

/// Decides retry flags and issue annotations for start and finish requests.
#[derive(Debug)]
pub struct ReconciliationEngine {
    records: TrackingCache<InstanceId, Arc<ExecutionRecord>>,
    heuristic: DebugIgnore<Box<dyn RetryHeuristic>>,
    skipped_is_issue: bool,
}

impl ReconciliationEngine {
    /// Creates a new engine remembering at most `capacity` instances.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            records: TrackingCache::new(capacity),
            heuristic: DebugIgnore(Box::new(NoHeuristic)),
            skipped_is_issue: true,
        }
    }

    /// Sets the fallback retry heuristic.
    pub fn with_heuristic(mut self, heuristic: impl RetryHeuristic + 'static) -> Self {
        self.heuristic = DebugIgnore(Box::new(heuristic));
        self
    }

    /// Sets whether skipped items count as issues.
    ///
    /// If false, every skipped finish carries the "not an issue" annotation.
    pub fn with_skipped_is_issue(mut self, skipped_is_issue: bool) -> Self {
        self.skipped_is_issue = skipped_is_issue;
        self
    }

    /// Returns the record for `instance`, if one is tracked.
    pub fn record(&self, instance: InstanceId) -> Option<Arc<ExecutionRecord>> {
        self.records.get(&instance)
    }

    fn record_or_create(&self, instance: InstanceId) -> Arc<ExecutionRecord> {
        self.records
            .get_or_insert_with(instance, || Arc::new(ExecutionRecord::new()))
    }

    /// Returns true if the instance is already known to be part of a retry chain.
    pub fn is_instance_marked_retried(&self, instance: Option<InstanceId>) -> bool {
        instance
            .and_then(|instance| self.record(instance))
            .is_some_and(|record| record.is_retried())
    }

    /// Returns true if an attempt should be treated as a retry.
    ///
    /// Checked in order: the runner's own flag, the instance's retry marker, then the
    /// heuristic.
    pub fn is_retry(&self, instance: Option<InstanceId>, runner_retry: bool) -> bool {
        runner_retry
            || self.is_instance_marked_retried(instance)
            || self.heuristic.is_retry_dispatch()
    }

    /// Decides whether a starting attempt is a retry.
    ///
    /// A test method confirmed as a retry marks its instance until the instance is cleared.
    pub fn on_start(
        &self,
        role: Option<MethodRole>,
        instance: Option<InstanceId>,
        runner_retry: bool,
    ) -> bool {
        let retry = self.is_retry(instance, runner_retry);
        if retry && role == Some(MethodRole::Step) {
            if let Some(instance) = instance {
                if self.record_or_create(instance).mark_retried() {
                    debug!(instance = instance.get(), "instance marked as retried at start");
                }
            }
        }
        retry
    }

    /// Amends `request` before it is sent, and resends earlier finishes that turned out to
    /// belong to a retry.
    ///
    /// `request.retry` must already be set if the attempt was started as a retry. Replays go
    /// through `sink`; failures are logged and swallowed.
    pub fn on_finish<S: ReportSink + ?Sized>(
        &self,
        sink: &S,
        finish: &FinishContext<'_>,
        request: &mut FinishItemRequest,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let record = finish.instance.map(|instance| self.record_or_create(instance));

        if let Some(record) = &record {
            if finish.status != ItemStatus::Skipped {
                record.set_skip_suppressed(false);
            }

            if finish.role == Some(MethodRole::Step) && !request.is_retry() && finish.runner_retry
            {
                record.mark_retried();
                request.retry = Some(true);
                request.issue = Some(Issue::not_issue());
            }

            let queue = finish.role == Some(MethodRole::BeforeMethod) && !request.is_retry();
            if !queue {
                let pending = record.drain_before_finishes();
                if request.is_retry() {
                    outcome.replayed = replay(sink, pending);
                } else if !pending.is_empty() {
                    debug!(
                        discarded = pending.len(),
                        "no retry, discarding queued before-method finishes"
                    );
                }
            }

            if finish.status == ItemStatus::Failed
                && matches!(
                    finish.role,
                    Some(MethodRole::BeforeMethod | MethodRole::BeforeClass)
                )
            {
                record.set_skip_suppressed(true);
            }

            if finish.status == ItemStatus::Skipped
                && (record.is_skip_suppressed()
                    || (finish.role == Some(MethodRole::BeforeMethod) && request.is_retry()))
            {
                request.issue = Some(Issue::not_issue());
            }

            outcome.queued = queue;
        }

        if finish.status == ItemStatus::Skipped && !self.skipped_is_issue {
            request.issue = Some(Issue::not_issue());
        }

        // Queue the request exactly as it will be sent.
        if let Some(record) = record.filter(|_| outcome.queued) {
            record.enqueue_before_finish(finish.handle.clone(), request.clone());
        }
        outcome
    }

    /// Forgets everything about the given instances.
    pub fn clear_instances(&self, instances: impl IntoIterator<Item = InstanceId>) {
        for instance in instances {
            self.records.remove(&instance);
        }
    }

    /// Returns the number of tracked instances.
    pub fn tracked_len(&self) -> usize {
        self.records.len()
    }
}

fn replay<S: ReportSink + ?Sized>(sink: &S, pending: Vec<PendingFinish>) -> usize {
    let mut replayed = 0;
    for PendingFinish {
        handle,
        mut request,
    } in pending
    {
        if request.is_retry() {
            continue;
        }
        request.retry = Some(true);
        match sink.finish_item(&handle, request) {
            Ok(_) => replayed += 1,
            Err(error) => {
                warn!(
                    "failed to resend before-method finish with retry flag: {}",
                    DisplayErrorChain::new(error)
                );
            }
        }
    }
    if replayed > 0 {
        debug!(replayed, "resent before-method finishes as retries");
    }
    replayed
}
