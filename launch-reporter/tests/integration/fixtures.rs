// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use launch_reporter::{
    config::ReporterConfig,
    events::{ClassInfo, InstanceId, MethodInfo, MethodResult, SuiteInfo, TestGroupInfo},
    role::LifecycleFlags,
    service::ReportingService,
    sink::RecordingSink,
};
use launch_metadata::{ItemId, ItemStatus};
use std::sync::{Arc, Once};

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        _ = color_eyre::install();
        _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// A service writing to a recording sink, plus the runner objects of a single class.
pub(crate) struct Harness {
    pub(crate) sink: Arc<RecordingSink>,
    pub(crate) service: ReportingService<RecordingSink>,
    pub(crate) suite: SuiteInfo,
    pub(crate) group: TestGroupInfo,
    pub(crate) class: ClassInfo,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(ReporterConfig::default_config())
    }

    pub(crate) fn with_config(config: ReporterConfig) -> Self {
        test_init();
        let sink = Arc::new(RecordingSink::new());
        let service = ReportingService::new(sink.clone(), config);
        let suite = SuiteInfo::new("S");
        let group = TestGroupInfo::new(&suite, "T");
        let class = ClassInfo::new(&group, "C");
        Self {
            sink,
            service,
            suite,
            group,
            class,
        }
    }

    /// Starts the launch, suite, grouped test and (if `with_class` is set) the class.
    pub(crate) fn open(&self, with_class: bool) {
        self.service.on_execution_start();
        self.service.on_suite_start(&self.suite);
        self.service.on_test_group_start(&self.group);
        if with_class {
            self.service.on_class_start(&self.class);
        }
    }

    /// Creates a method attempt of the class, running on `instance`.
    pub(crate) fn attempt(
        &self,
        name: &str,
        flags: LifecycleFlags,
        instance: u64,
    ) -> MethodResult {
        let mut result = MethodResult::new(&self.class, MethodInfo::new(name, flags));
        result.instance = Some(InstanceId::new(instance));
        result
    }

    /// Runs a method attempt from start to finish.
    pub(crate) fn run(&self, result: &MethodResult, status: ItemStatus) {
        if result.method.flags.contains(LifecycleFlags::TEST) {
            self.service.on_method_start(result);
            self.service.on_method_finish(status, result);
        } else {
            self.service.on_configuration_start(result);
            self.service.on_configuration_finish(status, result);
        }
    }

    pub(crate) fn item_id(&self, result: &MethodResult) -> ItemId {
        result
            .attributes
            .handle()
            .and_then(|handle| handle.peek())
            .and_then(Result::ok)
            .expect("recording sink resolves items immediately")
    }
}
