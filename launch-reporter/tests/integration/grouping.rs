// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use launch_metadata::{ItemStatus, ItemType};
use launch_reporter::{
    config::ReporterConfig,
    events::{ClassInfo, InstanceId, MethodInfo, MethodResult, TestGroupInfo},
    role::LifecycleFlags,
};
use pretty_assertions::assert_eq;
use std::thread;

fn grouped() -> Harness {
    let mut config = ReporterConfig::default_config();
    config.reporting.group_by_class = true;
    Harness::with_config(config)
}

fn method(class: &ClassInfo, name: &str, flags: LifecycleFlags, instance: u64) -> MethodResult {
    let mut result = MethodResult::new(class, MethodInfo::new(name, flags));
    result.instance = Some(InstanceId::new(instance));
    result
}

#[test]
fn classes_aggregate_directly_under_suite() {
    let h = grouped();
    h.open(true);
    let other = ClassInfo::new(&h.group, "D");

    let before_test = h.attempt("beforeTest", LifecycleFlags::BEFORE_TEST, 1);
    h.run(&before_test, ItemStatus::Passed);
    h.run(&h.attempt("one", LifecycleFlags::TEST, 1), ItemStatus::Passed);
    h.run(&h.attempt("two", LifecycleFlags::TEST, 1), ItemStatus::Failed);
    h.run(&method(&other, "three", LifecycleFlags::TEST, 2), ItemStatus::Passed);

    assert!(h.sink.starts_named("T").is_empty(), "grouped test isn't reported");
    let class_starts = h.sink.starts_named("C");
    assert_eq!(class_starts.len(), 1, "one item per class");
    let (class_id, class_parent, request) = &class_starts[0];
    assert_eq!(request.item_type, ItemType::Test);
    assert_eq!(
        class_parent.as_ref().and_then(|p| h.sink.item_name(p)).as_deref(),
        Some("S")
    );

    let parent_of = |name: &str| h.sink.starts_named(name).remove(0).1;
    assert_eq!(parent_of("one").as_ref(), Some(class_id));
    assert_eq!(parent_of("two").as_ref(), Some(class_id));
    assert_eq!(
        parent_of("beforeTest").and_then(|p| h.sink.item_name(&p)).as_deref(),
        Some("S")
    );

    // Class finishes leave the aggregated items open.
    h.service.on_class_finish(&h.class);
    h.service.on_class_finish(&other);
    assert!(h.sink.finishes_named("C").is_empty());
    assert!(h.sink.finishes_named("D").is_empty());

    h.service.on_test_group_finish(&h.group);
    h.service.on_suite_finish(&h.suite);
    let c_finishes = h.sink.finishes_named("C");
    assert_eq!(c_finishes.len(), 1);
    assert_eq!(c_finishes[0].status, Some(ItemStatus::Failed));
    let d_finishes = h.sink.finishes_named("D");
    assert_eq!(d_finishes.len(), 1);
    assert_eq!(d_finishes[0].status, Some(ItemStatus::Passed));
    assert_eq!(
        h.sink.finishes_named("S")[0].status,
        Some(ItemStatus::Failed)
    );
}

#[test]
fn class_spanning_grouped_tests_gets_one_item() {
    let h = grouped();
    h.open(true);
    let second_group = TestGroupInfo::new(&h.suite, "T2");
    let second_class = ClassInfo::new(&second_group, "C");

    h.run(&h.attempt("one", LifecycleFlags::TEST, 1), ItemStatus::Passed);
    h.service.on_class_finish(&h.class);
    h.service.on_test_group_finish(&h.group);

    h.service.on_test_group_start(&second_group);
    h.service.on_class_start(&second_class);
    h.run(&method(&second_class, "two", LifecycleFlags::TEST, 2), ItemStatus::Failed);
    h.service.on_class_finish(&second_class);
    h.service.on_test_group_finish(&second_group);
    h.service.on_suite_finish(&h.suite);

    let class_starts = h.sink.starts_named("C");
    assert_eq!(class_starts.len(), 1, "one item for C across both grouped tests");
    let class_id = &class_starts[0].0;
    let parent_of = |name: &str| h.sink.starts_named(name).remove(0).1;
    assert_eq!(parent_of("one").as_ref(), Some(class_id));
    assert_eq!(parent_of("two").as_ref(), Some(class_id));

    let finishes = h.sink.finishes_named("C");
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].status, Some(ItemStatus::Failed));
    assert!(h.sink.starts_named("T2").is_empty());
}

#[test]
fn unfinished_classes_close_at_execution_finish() {
    let h = grouped();
    h.open(false);
    h.run(&h.attempt("one", LifecycleFlags::TEST, 1), ItemStatus::Skipped);

    h.service.on_execution_finish();
    let finishes = h.sink.finishes_named("C");
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].status, Some(ItemStatus::Skipped));
}

#[test]
fn concurrent_first_methods_share_one_class_item() {
    let h = grouped();
    h.open(false);

    thread::scope(|scope| {
        for n in 0..8 {
            let h = &h;
            scope.spawn(move || {
                let result = h.attempt(&format!("method-{n}"), LifecycleFlags::TEST, n);
                h.run(&result, ItemStatus::Passed);
            });
        }
    });

    let class_starts = h.sink.starts_named("C");
    assert_eq!(class_starts.len(), 1);
    let class_id = &class_starts[0].0;
    for n in 0..8 {
        let (_, parent, _) = h.sink.starts_named(&format!("method-{n}")).remove(0);
        assert_eq!(parent.as_ref(), Some(class_id), "method-{n} attaches to the class");
    }
}
