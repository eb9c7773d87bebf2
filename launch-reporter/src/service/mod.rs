// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reporting service: turns runner callbacks into report items.
//!
//! An event adapter calls the `on_*` methods of [`ReportingService`] from whatever threads the
//! runner uses. None of them block on the collector, and none of them return errors: failures
//! are logged and reporting carries on.
//!
//! Two layouts are supported:
//!
//! * By default, items mirror the runner: suite → grouped test → class → method. Class items
//!   exist only if the adapter reports class events; otherwise methods attach to the grouped
//!   test.
//! * With `reporting.group-by-class`, grouped tests aren't reported. Each class gets one item
//!   directly under its suite, created by the first method of that class and closed by the
//!   suite finish (or the execution finish, for suites that never finish). A class may span
//!   several grouped tests, so class finish events don't close it.

mod grouped;

use self::grouped::{AggregatedClass, ClassAggregator};
use crate::{
    config::ReporterConfig,
    errors::DisplayErrorChain,
    events::{ClassInfo, InstanceId, MethodResult, SuiteInfo, TestGroupInfo},
    handle::{FinishAck, ItemHandle},
    helpers::lock,
    reconcile::{FinishContext, ReconciliationEngine},
    role::MethodRole,
    sink::ReportSink,
    status::StatusAccumulator,
    steps::{self, StepReporter},
    tree::{DisplayScopePath, ItemTree, ScopeKey},
};
use chrono::{DateTime, Utc};
use debug_ignore::DebugIgnore;
use launch_metadata::{
    FinishItemRequest, FinishLaunchRequest, ItemStatus, ItemType, LogLevel, LogRequest,
    StartItemRequest,
};
use smol_str::SmolStr;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, OnceLock},
};
use tracing::{debug, warn};

/// Reconciles runner lifecycle events into report items.
#[derive_where::derive_where(Debug)]
pub struct ReportingService<S> {
    sink: DebugIgnore<Arc<S>>,
    config: ReporterConfig,
    tree: ItemTree,
    engine: ReconciliationEngine,
    steps: DebugIgnore<StepReporter<Arc<S>>>,
    launch: OnceLock<ItemHandle>,
    launch_status: StatusAccumulator,
    classes: ClassAggregator,
    // Instances seen in each grouped test, forgotten when the grouped test finishes.
    group_instances: Mutex<HashMap<(SmolStr, SmolStr), BTreeSet<InstanceId>>>,
}

impl<S: ReportSink> ReportingService<S> {
    /// Creates a new service sending to `sink`.
    pub fn new(sink: Arc<S>, config: ReporterConfig) -> Self {
        Self {
            steps: DebugIgnore(StepReporter::new(sink.clone())),
            sink: DebugIgnore(sink),
            tree: ItemTree::new(config.reporting.retain_tree),
            engine: config.reconciliation_engine(),
            config,
            launch: OnceLock::new(),
            launch_status: StatusAccumulator::new(),
            classes: ClassAggregator::default(),
            group_instances: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration this service was created with.
    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Returns the item tree.
    pub fn tree(&self) -> &ItemTree {
        &self.tree
    }

    /// Returns the reconciliation engine.
    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// Returns the reporter for nested steps inside running methods.
    pub fn steps(&self) -> &StepReporter<Arc<S>> {
        &self.steps
    }

    /// Returns the launch handle, if the launch has started.
    pub fn launch(&self) -> Option<&ItemHandle> {
        self.launch.get()
    }

    fn group_by_class(&self) -> bool {
        self.config.reporting.group_by_class
    }

    // ---
    // Launch
    // ---

    /// Starts the launch.
    pub fn on_execution_start(&self) {
        let handle = self.sink.start_launch(self.config.start_launch_request());
        if self.launch.set(handle).is_err() {
            warn!("execution started more than once, keeping the first launch");
        }
    }

    /// Finishes the launch with the rolled-up status of every suite.
    ///
    /// Any class items still open are closed first. Returns the acknowledgement, so that the
    /// caller can wait for delivery before exiting.
    pub fn on_execution_finish(&self) -> Option<FinishAck> {
        for class in self.classes.take_remaining(None) {
            self.close_class(&class, Utc::now());
        }

        let Some(launch) = self.launch.get() else {
            debug!("execution finished without a launch, nothing to finish");
            return None;
        };
        let request = FinishLaunchRequest {
            end_time: Utc::now(),
            status: Some(self.launch_status.get_or_passed()),
        };
        let ack = match self.sink.finish_launch(launch, request) {
            Ok(ack) => ack,
            Err(error) => {
                warn!("failed to finish launch: {}", DisplayErrorChain::new(&error));
                FinishAck::failed(error)
            }
        };

        if !self.tree.is_retained() {
            self.tree.clear();
        }
        Some(ack)
    }

    // ---
    // Suites
    // ---

    /// Starts a suite item at the root of the launch.
    pub fn on_suite_start(&self, suite: &SuiteInfo) {
        let mut request =
            StartItemRequest::new(suite.name.as_str(), ItemType::Suite, suite.start_time);
        request.description = suite.description.clone();
        request.attributes = suite.attributes.clone();

        let handle = self.sink.start_item(None, request);
        if !suite.slot.set(handle.clone()) {
            warn!(suite = %suite.name, "suite started more than once, ignoring restart");
            return;
        }
        self.tree.put(&[], ScopeKey::new(&suite.name), handle);
    }

    /// Finishes a suite item with the rolled-up status of its children.
    pub fn on_suite_finish(&self, suite: &SuiteInfo) {
        let end_time = suite.end_time.unwrap_or_else(Utc::now);
        for class in self.classes.take_remaining(Some(&suite.name)) {
            self.close_class(&class, end_time);
        }

        let Some(handle) = suite.slot.get() else {
            debug!(suite = %suite.name, "suite finished without starting, skipping");
            return;
        };
        let status = self.finish_scope(handle, &suite.path(), end_time);
        self.launch_status.record(status);
    }

    // ---
    // Grouped tests
    // ---

    /// Starts a grouped-test item under its suite.
    ///
    /// In grouped-by-class mode grouped tests aren't reported.
    pub fn on_test_group_start(&self, group: &TestGroupInfo) {
        if self.group_by_class() {
            return;
        }

        let mut request =
            StartItemRequest::new(group.name.as_str(), ItemType::Test, group.start_time);
        request.description = group.description.clone();
        request.attributes = group.attributes.clone();

        let parent = group.suite.slot.get();
        let handle = self.sink.start_item(parent, request);
        if !group.slot.set(handle.clone()) {
            warn!(group = %group.name, "grouped test started more than once, ignoring restart");
            return;
        }
        self.tree
            .put(&group.suite.path(), ScopeKey::new(&group.name), handle);
    }

    /// Finishes a grouped-test item, and forgets the retry state of every instance seen in it.
    pub fn on_test_group_finish(&self, group: &TestGroupInfo) {
        let instances = lock(&self.group_instances)
            .remove(&(group.suite.name.clone(), group.name.clone()))
            .unwrap_or_default();
        if !instances.is_empty() {
            debug!(
                group = %group.name,
                count = instances.len(),
                "clearing execution records for grouped test"
            );
            self.engine.clear_instances(instances);
        }

        if self.group_by_class() {
            return;
        }
        let Some(handle) = group.slot.get() else {
            debug!(group = %group.name, "grouped test finished without starting, skipping");
            return;
        };
        let end_time = group.end_time.unwrap_or_else(Utc::now);
        let status = self.finish_scope(handle, &group.path(), end_time);
        self.record_child_status(&group.suite.path(), status);
    }

    // ---
    // Classes
    // ---

    /// Starts a class item under its grouped test.
    ///
    /// In grouped-by-class mode the class item is created by its first method instead.
    pub fn on_class_start(&self, class: &ClassInfo) {
        if self.group_by_class() {
            return;
        }

        let request = StartItemRequest::new(class.name.as_str(), ItemType::Test, class.start_time);
        let handle = self.sink.start_item(class.test_group.slot.get(), request);
        if !class.slot.set(handle.clone()) {
            warn!(class = %class.name, "class started more than once, ignoring restart");
            return;
        }
        self.tree
            .put(&class.test_group.path(), ScopeKey::new(&class.name), handle);
    }

    /// Finishes a class item.
    ///
    /// Does nothing in grouped-by-class mode: the aggregated item is closed by the suite finish.
    pub fn on_class_finish(&self, class: &ClassInfo) {
        if self.group_by_class() {
            debug!(class = %class.name, "class stays open until its suite finishes");
            return;
        }

        let end_time = class.end_time.unwrap_or_else(Utc::now);

        let Some(handle) = class.slot.get() else {
            debug!(class = %class.name, "class finished without starting, skipping");
            return;
        };
        let status = self.finish_scope(handle, &class.path(), end_time);
        self.record_child_status(&class.test_group.path(), status);
    }

    // ---
    // Methods
    // ---

    /// Starts a test method item.
    pub fn on_method_start(&self, result: &MethodResult) {
        self.start_method(result);
    }

    /// Finishes a test method item.
    pub fn on_method_finish(&self, status: ItemStatus, result: &MethodResult) {
        self.finish_method(status, result);
    }

    /// Starts a configuration method item.
    pub fn on_configuration_start(&self, result: &MethodResult) {
        self.start_method(result);
    }

    /// Finishes a configuration method item.
    pub fn on_configuration_finish(&self, status: ItemStatus, result: &MethodResult) {
        self.finish_method(status, result);
    }

    fn start_method(&self, result: &MethodResult) {
        let role = result.role();
        let retry = self
            .engine
            .on_start(role, result.instance, result.runner_retry);
        // A restarted attempt keeps its first decision.
        _ = result.attributes.retry.set(retry);

        let item_type = role.map_or(ItemType::Step, MethodRole::item_type);
        let mut request =
            StartItemRequest::new(result.method.name.as_str(), item_type, result.start_time);
        request.description = result.method.description.clone();
        request.code_ref = Some(result.code_ref());
        request.test_case_id = Some(result.test_case_id());
        request.parameters = result.parameters.clone();
        request.attributes = result.method.attributes.clone();
        if retry {
            request.retry = Some(true);
        }

        let (parent, parent_path) = self.method_parent(result, role);
        let handle = self.sink.start_item(parent.as_ref(), request);
        if !result.attributes.slot.set(handle.clone()) {
            warn!(
                method = %result.code_ref(),
                "method attempt started more than once, ignoring restart"
            );
            return;
        }

        let key = result.key();
        if self.tree.put(&parent_path, key.clone(), handle.clone()).is_some() {
            let mut path = parent_path;
            path.push(key);
            _ = result.attributes.path.set(path);
        }

        if let Some(instance) = result.instance {
            lock(&self.group_instances)
                .entry((
                    result.class.suite().name.clone(),
                    result.class.test_group.name.clone(),
                ))
                .or_default()
                .insert(instance);
        }

        steps::enter_method(handle);
    }

    fn finish_method(&self, status: ItemStatus, result: &MethodResult) {
        let Some(handle) = result.attributes.handle() else {
            debug!(
                method = %result.code_ref(),
                "method finished without starting, skipping"
            );
            return;
        };

        // Forgotten nested steps must be closed before the method itself.
        self.steps.finish_previous_step();

        if let Some(error) = &result.error {
            let log = LogRequest {
                time: Utc::now(),
                level: LogLevel::Error,
                message: error.clone(),
                file: None,
            };
            if let Err(error) = self.sink.log(handle, log) {
                warn!(
                    method = %result.code_ref(),
                    "failed to send failure log: {}",
                    DisplayErrorChain::new(&error)
                );
            }
        }

        let mut request =
            FinishItemRequest::new(result.end_time.unwrap_or_else(Utc::now), Some(status));
        if result.attributes.started_as_retry() {
            request.retry = Some(true);
        }
        let context = FinishContext {
            role: result.role(),
            instance: result.instance,
            status,
            runner_retry: result.runner_retry,
            handle,
        };
        let outcome = self.engine.on_finish(&**self.sink, &context, &mut request);
        if outcome.replayed > 0 {
            debug!(
                method = %result.code_ref(),
                replayed = outcome.replayed,
                "retry detected, resent earlier before-method finishes"
            );
        }

        let ack = self.send_finish(handle, request);
        if let Some(path) = result.attributes.tree_path() {
            self.tree.finish(path, ack);
            if let Some((_, parent)) = path.split_last() {
                self.record_child_status(parent, status);
            }
        }
        if self.group_by_class() && !result.role().is_some_and(MethodRole::is_suite_or_test_level)
        {
            if let Some(class) = self.classes.get(&result.class.suite().name, &result.class.name) {
                class.status.record(status);
            }
        }

        steps::exit_method(handle);
    }

    /// Returns the parent handle and tree path for a method.
    fn method_parent(
        &self,
        result: &MethodResult,
        role: Option<MethodRole>,
    ) -> (Option<ItemHandle>, Vec<ScopeKey>) {
        let class = &result.class;
        let group = &class.test_group;
        let suite = &group.suite;

        match role {
            Some(MethodRole::BeforeSuite | MethodRole::AfterSuite) => {
                (suite.slot.get().cloned(), suite.path())
            }
            Some(MethodRole::BeforeTest | MethodRole::AfterTest) if self.group_by_class() => {
                (suite.slot.get().cloned(), suite.path())
            }
            Some(MethodRole::BeforeTest | MethodRole::AfterTest) => {
                (group.slot.get().cloned(), group.path())
            }
            _ if self.group_by_class() => {
                let aggregated = self.classes.get_or_start(&suite.name, &class.name, || {
                    self.start_aggregated_class(result)
                });
                (Some(aggregated.handle.clone()), aggregated.path())
            }
            _ => match class.slot.get() {
                Some(handle) => (Some(handle.clone()), class.path()),
                None => (group.slot.get().cloned(), group.path()),
            },
        }
    }

    fn start_aggregated_class(&self, result: &MethodResult) -> ItemHandle {
        let class = &result.class;
        let suite = class.suite();
        let request = StartItemRequest::new(class.name.as_str(), ItemType::Test, result.start_time);
        let handle = self.sink.start_item(suite.slot.get(), request);
        self.tree
            .put(&suite.path(), ScopeKey::new(&class.name), handle.clone());
        debug!(suite = %suite.name, class = %class.name, "started aggregated class item");
        handle
    }

    fn close_class(&self, class: &AggregatedClass, end_time: DateTime<Utc>) {
        if !class.close() {
            return;
        }
        let status = class.status.get_or_passed();
        let request = FinishItemRequest::new(end_time, Some(status));
        let ack = self.send_finish(&class.handle, request);
        let path = class.path();
        self.tree.finish(&path, ack);
        self.record_child_status(&path[..1], status);
    }

    // ---
    // Helpers
    // ---

    /// Finishes a container scope with the roll-up of its children's statuses.
    fn finish_scope(
        &self,
        handle: &ItemHandle,
        path: &[ScopeKey],
        end_time: DateTime<Utc>,
    ) -> ItemStatus {
        let status = self
            .tree
            .get(path)
            .map_or(ItemStatus::Passed, |node| node.status().get_or_passed());
        let ack = self.send_finish(handle, FinishItemRequest::new(end_time, Some(status)));
        self.tree.finish(path, ack);
        status
    }

    fn record_child_status(&self, parent: &[ScopeKey], status: ItemStatus) {
        match self.tree.get(parent) {
            Some(node) => {
                node.status().record(status);
            }
            None => debug!(
                parent = %DisplayScopePath(parent),
                "parent scope not in item tree, status not rolled up"
            ),
        }
    }

    fn send_finish(&self, handle: &ItemHandle, request: FinishItemRequest) -> FinishAck {
        match self.sink.finish_item(handle, request) {
            Ok(ack) => ack,
            Err(error) => {
                warn!("failed to finish item: {}", DisplayErrorChain::new(&error));
                FinishAck::failed(error)
            }
        }
    }
}
