// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use launch_metadata::{ItemStatus, ItemType};
use launch_reporter::{role::LifecycleFlags, steps};
use pretty_assertions::assert_eq;

#[test]
fn forgotten_steps_close_before_their_method() {
    let h = Harness::new();
    h.open(true);
    h.sink.fail_finishes_named("inner");

    let test = h.attempt("test", LifecycleFlags::TEST, 1);
    h.service.on_method_start(&test);
    let outer = h.service.steps().start_nested_step("outer");
    let inner = h.service.steps().start_nested_step("inner");
    assert!(outer.is_some() && inner.is_some());
    assert_eq!(steps::StepContext::current().depth(), 2);

    h.service.on_method_finish(ItemStatus::Passed, &test);

    assert!(h.sink.finishes_named("inner").is_empty(), "inner finish was rejected");
    assert_eq!(h.sink.finishes_named("outer").len(), 1);
    assert_eq!(
        h.sink.finishes_named("test")[0].status,
        Some(ItemStatus::Passed)
    );
    assert_eq!(steps::StepContext::current().depth(), 0);
    assert!(steps::StepContext::current().method().is_none());

    let (_, parent, request) = h.sink.starts_named("inner").remove(0);
    assert_eq!(request.item_type, ItemType::Step);
    assert!(!request.has_stats);
    assert_eq!(
        parent.and_then(|p| h.sink.item_name(&p)).as_deref(),
        Some("outer")
    );
}

#[test]
fn step_errors_fail_the_enclosing_step() {
    let h = Harness::new();
    h.open(true);

    let test = h.attempt("test", LifecycleFlags::TEST, 1);
    h.service.on_method_start(&test);
    h.service.steps().start_nested_step("outer");
    h.service
        .steps()
        .send_step_error("assert balance", "expected 10, got 0");
    h.service.on_method_finish(ItemStatus::Failed, &test);

    assert_eq!(
        h.sink.finishes_named("assert balance")[0].status,
        Some(ItemStatus::Failed)
    );
    assert_eq!(
        h.sink.finishes_named("outer")[0].status,
        Some(ItemStatus::Failed),
        "an error inside a step fails the step it was reported in"
    );
}

#[test]
fn steps_outside_methods_are_dropped() {
    let h = Harness::new();
    h.open(true);

    assert!(h.service.steps().start_nested_step("orphan").is_none());
    assert!(h.sink.starts_named("orphan").is_empty());
}
