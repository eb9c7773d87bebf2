// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use launch_metadata::{ItemStatus, LogLevel};
use launch_reporter::{events::InstanceId, role::LifecycleFlags};
use pretty_assertions::assert_eq;

#[test]
fn failed_test_retried_and_passed() -> Result<()> {
    let h = Harness::new();
    h.open(true);

    // First attempt: setup passes, the test fails, teardown passes.
    let before_1 = h.attempt("beforeMethod", LifecycleFlags::BEFORE_METHOD, 1);
    h.run(&before_1, ItemStatus::Passed);
    let test_1 = h.attempt("test", LifecycleFlags::TEST, 1);
    h.run(&test_1, ItemStatus::Failed);
    let after_1 = h.attempt("afterMethod", LifecycleFlags::AFTER_METHOD, 1);
    h.run(&after_1, ItemStatus::Passed);

    // Second attempt: the runner only flags the test itself as a retry.
    let before_2 = h.attempt("beforeMethod", LifecycleFlags::BEFORE_METHOD, 1);
    h.run(&before_2, ItemStatus::Passed);
    let mut test_2 = h.attempt("test", LifecycleFlags::TEST, 1);
    test_2.runner_retry = true;
    h.run(&test_2, ItemStatus::Passed);
    let after_2 = h.attempt("afterMethod", LifecycleFlags::AFTER_METHOD, 1);
    h.run(&after_2, ItemStatus::Passed);

    let before_finishes = h.sink.finishes_named("beforeMethod");
    let statuses: Vec<_> = before_finishes
        .iter()
        .map(|f| (f.status, f.is_retry()))
        .collect();
    assert_eq!(
        statuses,
        [
            (Some(ItemStatus::Passed), false),
            (Some(ItemStatus::Passed), false),
            (Some(ItemStatus::Passed), true),
        ],
        "second setup is resent as a retry once the retry is detected"
    );
    ensure!(
        before_finishes.iter().all(|f| f.issue.is_none()),
        "setup finishes carry no issue"
    );

    // The replay targets the second setup item, not the first.
    let before_ids: Vec<_> = h
        .sink
        .starts_named("beforeMethod")
        .into_iter()
        .map(|(id, _, _)| id)
        .collect();
    assert_eq!(before_ids, [h.item_id(&before_1), h.item_id(&before_2)]);

    let test_finishes = h.sink.finishes_named("test");
    assert_eq!(test_finishes.len(), 2);
    assert_eq!(test_finishes[0].status, Some(ItemStatus::Failed));
    assert_eq!(test_finishes[0].issue, None);
    assert!(!test_finishes[0].is_retry());
    assert_eq!(test_finishes[1].status, Some(ItemStatus::Passed));
    assert!(test_finishes[1].is_retry());

    let test_starts = h.sink.starts_named("test");
    assert_eq!(test_starts[0].2.retry, None);
    assert_eq!(test_starts[1].2.retry, Some(true));

    let after_finishes = h.sink.finishes_named("afterMethod");
    assert_eq!(after_finishes.len(), 2, "teardown finishes once per attempt");
    ensure!(
        after_finishes
            .iter()
            .all(|f| f.status == Some(ItemStatus::Passed) && f.issue.is_none()),
        "teardown finishes pass without issues: {after_finishes:?}"
    );

    Ok(())
}

#[test]
fn setup_finishes_are_discarded_without_retry() {
    let h = Harness::new();
    h.open(true);

    for instance in [1, 2] {
        let before = h.attempt("beforeMethod", LifecycleFlags::BEFORE_METHOD, instance);
        h.run(&before, ItemStatus::Passed);
        let test = h.attempt("test", LifecycleFlags::TEST, instance);
        h.run(&test, ItemStatus::Passed);
    }

    let finishes = h.sink.finishes_named("beforeMethod");
    assert_eq!(finishes.len(), 2, "no finish is resent");
    assert!(finishes.iter().all(|f| !f.is_retry()));
    let record = h
        .service
        .engine()
        .record(InstanceId::new(1))
        .expect("instance is tracked while its grouped test runs");
    assert_eq!(record.pending_len(), 0);
}

#[test]
fn skips_after_failed_class_setup_are_not_issues() {
    let h = Harness::new();
    h.open(true);

    let before_class = h.attempt("beforeClass", LifecycleFlags::BEFORE_CLASS, 1);
    h.run(&before_class, ItemStatus::Failed);
    let skipped = h.attempt("test", LifecycleFlags::TEST, 1);
    h.run(&skipped, ItemStatus::Skipped);

    // A different instance has no failed setup, so its skip is a genuine issue.
    let other = h.attempt("other", LifecycleFlags::TEST, 2);
    h.run(&other, ItemStatus::Skipped);

    let finishes = h.sink.finishes_named("test");
    assert!(finishes[0].is_not_issue());
    assert_eq!(h.sink.finishes_named("other")[0].issue, None);

    // A passing method ends the suppression for instance 1.
    let passing = h.attempt("passing", LifecycleFlags::TEST, 1);
    h.run(&passing, ItemStatus::Passed);
    let later = h.attempt("later", LifecycleFlags::TEST, 1);
    h.run(&later, ItemStatus::Skipped);
    assert_eq!(h.sink.finishes_named("later")[0].issue, None);
}

#[test]
fn skipped_is_never_an_issue_when_configured() {
    let mut config = launch_reporter::config::ReporterConfig::default_config();
    config.reporting.skipped_is_issue = false;
    let h = Harness::with_config(config);
    h.open(true);

    let test = h.attempt("test", LifecycleFlags::TEST, 1);
    h.run(&test, ItemStatus::Skipped);
    assert!(h.sink.finishes_named("test")[0].is_not_issue());
}

#[test]
fn failure_message_is_logged_before_finish() {
    let h = Harness::new();
    h.open(true);

    let mut test = h.attempt("test", LifecycleFlags::TEST, 1);
    test.error = Some("expected 2, got 3".to_owned());
    h.run(&test, ItemStatus::Failed);

    let id = h.item_id(&test);
    let logs = h.sink.logs_for(&id);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Error);
    assert_eq!(logs[0].message, "expected 2, got 3");

    let calls = h.sink.calls();
    let log_index = calls
        .iter()
        .position(|call| matches!(call, launch_reporter::sink::SinkCall::Log { .. }));
    let finish_index = calls.iter().position(|call| {
        matches!(call, launch_reporter::sink::SinkCall::FinishItem { id: finished, .. }
            if *finished == id)
    });
    assert!(log_index < finish_index, "log precedes finish");
}

#[test]
fn grouped_test_finish_forgets_instances() {
    let h = Harness::new();
    h.open(true);

    let mut test = h.attempt("test", LifecycleFlags::TEST, 7);
    test.runner_retry = true;
    h.run(&test, ItemStatus::Passed);
    assert!(
        h.service
            .engine()
            .is_instance_marked_retried(Some(InstanceId::new(7)))
    );

    h.service.on_class_finish(&h.class);
    h.service.on_test_group_finish(&h.group);
    assert!(h.service.engine().record(InstanceId::new(7)).is_none());
    assert_eq!(h.service.engine().tracked_len(), 0);
}
