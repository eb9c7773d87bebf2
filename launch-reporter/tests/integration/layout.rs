// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, eyre};
use launch_metadata::{ItemParameter, ItemStatus, ItemType};
use launch_reporter::{config::ReporterConfig, role::LifecycleFlags, sink::SinkCall, tree::ScopeKey};
use maplit::btreemap;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

fn retaining() -> ReporterConfig {
    let mut config = ReporterConfig::default_config();
    config.reporting.retain_tree = true;
    config
}

#[test]
fn parameterized_invocations_get_distinct_nodes() -> Result<()> {
    let h = Harness::with_config(retaining());
    h.open(true);

    let mut first = h.attempt("login", LifecycleFlags::TEST, 1);
    first.parameters = vec![ItemParameter::new("user", Some("alice".to_owned()))];
    let mut second = h.attempt("login", LifecycleFlags::TEST, 2);
    second.parameters = vec![ItemParameter::new("user", Some("bob".to_owned()))];
    h.run(&first, ItemStatus::Passed);
    h.run(&second, ItemStatus::Failed);

    let class_path = [ScopeKey::new("S"), ScopeKey::new("T"), ScopeKey::new("C")];
    let class_node = h
        .service
        .tree()
        .get(&class_path)
        .ok_or_else(|| eyre!("class node is retained"))?;
    let keys = class_node.child_keys();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|key| key.name() == "login"));
    assert_ne!(keys[0], keys[1]);
    assert_eq!(
        first.attributes.tree_path().map(|path| path.last()),
        Some(keys.first())
    );

    let test_case_ids: Vec<_> = h
        .sink
        .starts_named("login")
        .into_iter()
        .map(|(_, _, request)| request.test_case_id)
        .collect();
    assert_eq!(
        test_case_ids,
        [Some("C.login[alice]".to_owned()), Some("C.login[bob]".to_owned())]
    );
    Ok(())
}

#[test]
fn statuses_roll_up_to_the_launch() {
    let h = Harness::new();
    h.open(true);

    let passing = h.attempt("passing", LifecycleFlags::TEST, 1);
    h.run(&passing, ItemStatus::Passed);
    let failing = h.attempt("failing", LifecycleFlags::TEST, 1);
    h.run(&failing, ItemStatus::Failed);

    h.service.on_class_finish(&h.class);
    h.service.on_test_group_finish(&h.group);
    h.service.on_suite_finish(&h.suite);
    let ack = h
        .service
        .on_execution_finish()
        .expect("launch was started");
    assert!(ack.wait().is_ok());

    let statuses: BTreeMap<_, _> = ["C", "T", "S"]
        .into_iter()
        .map(|name| (name, h.sink.finishes_named(name)[0].status))
        .collect();
    assert_eq!(
        statuses,
        btreemap! {
            "C" => Some(ItemStatus::Failed),
            "S" => Some(ItemStatus::Failed),
            "T" => Some(ItemStatus::Failed),
        }
    );

    let launch_status = h.sink.calls().into_iter().find_map(|call| match call {
        SinkCall::FinishLaunch { request, .. } => Some(request.status),
        _ => None,
    });
    assert_eq!(launch_status, Some(Some(ItemStatus::Failed)));
    assert!(h.service.tree().root_keys().is_empty(), "tree is cleared");
}

#[test]
fn items_nest_under_their_owners() {
    let h = Harness::new();
    h.open(true);

    let before_suite = h.attempt("beforeSuite", LifecycleFlags::BEFORE_SUITE, 1);
    h.run(&before_suite, ItemStatus::Passed);
    let before_test = h.attempt("beforeTest", LifecycleFlags::BEFORE_TEST, 1);
    h.run(&before_test, ItemStatus::Passed);
    let test = h.attempt("test", LifecycleFlags::TEST, 1);
    h.run(&test, ItemStatus::Passed);

    let parent_name = |name: &str| {
        let (_, parent, _) = h.sink.starts_named(name).remove(0);
        parent.and_then(|parent| h.sink.item_name(&parent))
    };
    assert_eq!(parent_name("S"), None);
    assert_eq!(parent_name("T").as_deref(), Some("S"));
    assert_eq!(parent_name("C").as_deref(), Some("T"));
    assert_eq!(parent_name("beforeSuite").as_deref(), Some("S"));
    assert_eq!(parent_name("beforeTest").as_deref(), Some("T"));
    assert_eq!(parent_name("test").as_deref(), Some("C"));

    let (_, _, request) = h.sink.starts_named("test").remove(0);
    assert_eq!(request.item_type, ItemType::Step);
    assert_eq!(request.code_ref.as_deref(), Some("C.test"));
    let (_, _, request) = h.sink.starts_named("beforeTest").remove(0);
    assert_eq!(request.item_type, ItemType::BeforeTest);
}

#[test]
fn methods_attach_to_grouped_test_without_class_events() {
    let h = Harness::new();
    h.open(false);

    let test = h.attempt("test", LifecycleFlags::TEST, 1);
    h.run(&test, ItemStatus::Passed);

    let (_, parent, _) = h.sink.starts_named("test").remove(0);
    assert_eq!(parent.and_then(|p| h.sink.item_name(&p)).as_deref(), Some("T"));
    assert!(h.sink.starts_named("C").is_empty());
}

#[test]
fn unclassified_methods_are_reported_as_steps() {
    let h = Harness::new();
    h.open(true);

    let helper = h.attempt("helper", LifecycleFlags::empty(), 1);
    h.service.on_configuration_start(&helper);
    h.service.on_configuration_finish(ItemStatus::Passed, &helper);

    let (_, _, request) = h.sink.starts_named("helper").remove(0);
    assert_eq!(request.item_type, ItemType::Step);
    assert_eq!(h.sink.finishes_named("helper").len(), 1);
}

#[test]
fn retained_tree_keeps_finish_acknowledgements() -> Result<()> {
    let h = Harness::with_config(retaining());
    h.open(true);

    let test = h.attempt("test", LifecycleFlags::TEST, 1);
    h.run(&test, ItemStatus::Passed);
    h.service.on_class_finish(&h.class);
    h.service.on_test_group_finish(&h.group);
    h.service.on_suite_finish(&h.suite);
    h.service.on_execution_finish();

    let path = test
        .attributes
        .tree_path()
        .ok_or_else(|| eyre!("test was registered in the tree"))?;
    let node = h
        .service
        .tree()
        .get(path)
        .ok_or_else(|| eyre!("finished node is retained"))?;
    let ack = node
        .finish_ack()
        .ok_or_else(|| eyre!("finish acknowledgement is recorded"))?;
    assert!(ack.wait().is_ok());

    let id = h.service.tree().resolve_id(path)?;
    assert_eq!(id, Some(h.item_id(&test)));
    assert_eq!(h.service.tree().root_keys(), [ScopeKey::new("S")]);
    Ok(())
}

#[test]
fn failed_finish_does_not_stop_reporting() {
    let h = Harness::new();
    h.open(true);
    h.sink.fail_finishes_named("flaky-collector");

    let broken = h.attempt("flaky-collector", LifecycleFlags::TEST, 1);
    h.run(&broken, ItemStatus::Passed);
    let next = h.attempt("next", LifecycleFlags::TEST, 1);
    h.run(&next, ItemStatus::Passed);

    assert!(h.sink.finishes_named("flaky-collector").is_empty());
    assert_eq!(h.sink.finishes_named("next").len(), 1);
}
