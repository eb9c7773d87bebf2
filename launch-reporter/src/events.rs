// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runner-facing event types.
//!
//! An event adapter translates its runner's callbacks into these types and hands them to the
//! [`ReportingService`](crate::service::ReportingService). Each one carries an [`ItemSlot`]: the
//! opaque "current item" attribute the service writes at start and reads back at finish. Clones
//! share the slot, so an adapter may clone an event to fill in its end time before finishing it.

use crate::{
    handle::ItemHandle,
    role::{LifecycleFlags, MethodDescriptor, MethodRole, classify},
    tree::ScopeKey,
};
use chrono::{DateTime, Utc};
use launch_metadata::{ItemAttribute, ItemParameter};
use smol_str::SmolStr;
use std::sync::{Arc, OnceLock};

/// The identity of a test-class instance.
///
/// Retry and skip bookkeeping is keyed by instance: all methods (test and configuration) that run
/// on the same object share one execution record.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Creates a new instance ID from an adapter-chosen identity, such as an object address or a
    /// counter.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// The slot the service uses to attach an item handle to a runner object.
#[derive(Clone, Debug, Default)]
pub struct ItemSlot {
    handle: Arc<OnceLock<ItemHandle>>,
}

impl ItemSlot {
    /// Creates a new, empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle attached to this slot, if the object has started.
    pub fn get(&self) -> Option<&ItemHandle> {
        self.handle.get()
    }

    /// Attaches a handle. Returns false if a handle was already attached, in which case the
    /// existing handle is kept.
    pub(crate) fn set(&self, handle: ItemHandle) -> bool {
        self.handle.set(handle).is_ok()
    }
}

/// A suite as seen by the runner.
#[derive(Clone, Debug)]
pub struct SuiteInfo {
    /// The suite name.
    pub name: SmolStr,
    /// A description of the suite.
    pub description: Option<String>,
    /// Attributes attached to the suite item.
    pub attributes: Vec<ItemAttribute>,
    /// The time at which the suite started.
    pub start_time: DateTime<Utc>,
    /// The time at which the suite finished. Defaults to the finish call time.
    pub end_time: Option<DateTime<Utc>>,
    /// The current item attribute.
    pub slot: ItemSlot,
}

impl SuiteInfo {
    /// Creates a new suite that started now.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().into(),
            description: None,
            attributes: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            slot: ItemSlot::new(),
        }
    }

    pub(crate) fn path(&self) -> Vec<ScopeKey> {
        vec![ScopeKey::new(&self.name)]
    }
}

/// A grouped test (a named block of classes within a suite).
#[derive(Clone, Debug)]
pub struct TestGroupInfo {
    /// The owning suite.
    pub suite: SuiteInfo,
    /// The name of the grouped test.
    pub name: SmolStr,
    /// A description of the grouped test.
    pub description: Option<String>,
    /// Attributes attached to the grouped-test item.
    pub attributes: Vec<ItemAttribute>,
    /// The time at which the grouped test started.
    pub start_time: DateTime<Utc>,
    /// The time at which the grouped test finished. Defaults to the finish call time.
    pub end_time: Option<DateTime<Utc>>,
    /// The current item attribute.
    pub slot: ItemSlot,
}

impl TestGroupInfo {
    /// Creates a new grouped test that started now.
    pub fn new(suite: &SuiteInfo, name: impl AsRef<str>) -> Self {
        Self {
            suite: suite.clone(),
            name: name.as_ref().into(),
            description: None,
            attributes: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            slot: ItemSlot::new(),
        }
    }

    pub(crate) fn path(&self) -> Vec<ScopeKey> {
        vec![ScopeKey::new(&self.suite.name), ScopeKey::new(&self.name)]
    }
}

/// A test class within a grouped test.
#[derive(Clone, Debug)]
pub struct ClassInfo {
    /// The owning grouped test.
    pub test_group: TestGroupInfo,
    /// The canonical class name.
    pub name: SmolStr,
    /// The time at which the class started.
    pub start_time: DateTime<Utc>,
    /// The time at which the class finished. Defaults to the finish call time.
    pub end_time: Option<DateTime<Utc>>,
    /// The current item attribute.
    pub slot: ItemSlot,
}

impl ClassInfo {
    /// Creates a new class that started now.
    pub fn new(test_group: &TestGroupInfo, name: impl AsRef<str>) -> Self {
        Self {
            test_group: test_group.clone(),
            name: name.as_ref().into(),
            start_time: Utc::now(),
            end_time: None,
            slot: ItemSlot::new(),
        }
    }

    /// Returns the owning suite.
    pub fn suite(&self) -> &SuiteInfo {
        &self.test_group.suite
    }

    pub(crate) fn path(&self) -> Vec<ScopeKey> {
        let mut path = self.test_group.path();
        path.push(ScopeKey::new(&self.name));
        path
    }
}

/// The declaration of a method.
#[derive(Clone, Debug)]
pub struct MethodInfo {
    /// The method name.
    pub name: SmolStr,
    /// The lifecycle annotations on the method.
    pub flags: LifecycleFlags,
    /// A description of the method.
    pub description: Option<String>,
    /// An explicitly declared test case ID.
    pub test_case_id: Option<String>,
    /// Attributes declared on the method.
    pub attributes: Vec<ItemAttribute>,
}

impl MethodInfo {
    /// Creates a new method declaration.
    pub fn new(name: impl AsRef<str>, flags: LifecycleFlags) -> Self {
        Self {
            name: name.as_ref().into(),
            flags,
            description: None,
            test_case_id: None,
            attributes: Vec::new(),
        }
    }

    /// Returns the role of this method.
    pub fn role(&self) -> Option<MethodRole> {
        classify(self)
    }
}

impl MethodDescriptor for MethodInfo {
    fn is_test(&self) -> bool {
        self.flags.is_test()
    }
    fn is_before_suite(&self) -> bool {
        self.flags.is_before_suite()
    }
    fn is_before_test(&self) -> bool {
        self.flags.is_before_test()
    }
    fn is_before_groups(&self) -> bool {
        self.flags.is_before_groups()
    }
    fn is_before_class(&self) -> bool {
        self.flags.is_before_class()
    }
    fn is_before_method(&self) -> bool {
        self.flags.is_before_method()
    }
    fn is_after_method(&self) -> bool {
        self.flags.is_after_method()
    }
    fn is_after_class(&self) -> bool {
        self.flags.is_after_class()
    }
    fn is_after_groups(&self) -> bool {
        self.flags.is_after_groups()
    }
    fn is_after_test(&self) -> bool {
        self.flags.is_after_test()
    }
    fn is_after_suite(&self) -> bool {
        self.flags.is_after_suite()
    }
}

/// Per-attempt state the service attaches to a [`MethodResult`].
#[derive(Clone, Debug, Default)]
pub struct MethodAttributes {
    pub(crate) slot: ItemSlot,
    // Whether the start request was sent as a retry.
    pub(crate) retry: Arc<OnceLock<bool>>,
    // Where the attempt was registered in the item tree, if it was.
    pub(crate) path: Arc<OnceLock<Vec<ScopeKey>>>,
}

impl MethodAttributes {
    /// Returns the item handle, if the attempt has started.
    pub fn handle(&self) -> Option<&ItemHandle> {
        self.slot.get()
    }

    /// Returns true if the attempt was started as a retry.
    pub fn started_as_retry(&self) -> bool {
        self.retry.get().copied().unwrap_or(false)
    }

    /// Returns the item tree path the attempt was registered at.
    pub fn tree_path(&self) -> Option<&[ScopeKey]> {
        self.path.get().map(Vec::as_slice)
    }
}

/// One execution attempt of a test or configuration method.
#[derive(Clone, Debug)]
pub struct MethodResult {
    /// The declaring class.
    pub class: ClassInfo,
    /// The method declaration.
    pub method: MethodInfo,
    /// The instance the method runs on, if any.
    pub instance: Option<InstanceId>,
    /// Parameters of this invocation.
    pub parameters: Vec<ItemParameter>,
    /// The time at which this attempt started.
    pub start_time: DateTime<Utc>,
    /// The time at which this attempt finished. Defaults to the finish call time.
    pub end_time: Option<DateTime<Utc>>,
    /// Set by the adapter when the runner reports a retry for this method.
    ///
    /// Read twice. At method start, it marks this attempt as a retry. At method finish, an
    /// adapter sets it on the failed attempt before calling
    /// [`on_method_finish`](crate::service::ReportingService::on_method_finish) once the runner
    /// has scheduled another attempt: the instance is then remembered as retried, and the
    /// failure isn't reported as an issue.
    pub runner_retry: bool,
    /// A failure message, sent as an error log before the finish.
    pub error: Option<String>,
    /// State attached by the service.
    pub attributes: MethodAttributes,
}

impl MethodResult {
    /// Creates a new attempt that started now.
    pub fn new(class: &ClassInfo, method: MethodInfo) -> Self {
        Self {
            class: class.clone(),
            method,
            instance: None,
            parameters: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            runner_retry: false,
            error: None,
            attributes: MethodAttributes::default(),
        }
    }

    /// Returns the role of this method.
    pub fn role(&self) -> Option<MethodRole> {
        self.method.role()
    }

    /// Returns the `<class>.<method>` code reference.
    pub fn code_ref(&self) -> String {
        format!("{}.{}", self.class.name, self.method.name)
    }

    /// Returns the test case ID: the declared one, or the code reference with parameter values.
    pub fn test_case_id(&self) -> String {
        if let Some(id) = &self.method.test_case_id {
            return id.clone();
        }
        let code_ref = self.code_ref();
        if self.parameters.is_empty() {
            return code_ref;
        }
        let values: Vec<&str> = self
            .parameters
            .iter()
            .map(|p| p.value.as_deref().unwrap_or("null"))
            .collect();
        format!("{code_ref}[{}]", values.join(","))
    }

    pub(crate) fn key(&self) -> ScopeKey {
        ScopeKey::with_parameters(&self.method.name, &self.parameters)
    }
}
