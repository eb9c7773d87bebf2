// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::test_init;
use color_eyre::eyre::{Result, eyre};
use launch_metadata::{ItemId, ItemStatus};
use launch_reporter::{
    config::ReporterConfig,
    events::{ClassInfo, InstanceId, MethodInfo, MethodResult, SuiteInfo, TestGroupInfo},
    role::LifecycleFlags,
    service::ReportingService,
    sink::{ChannelSink, SinkRequest},
};
use pretty_assertions::assert_eq;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{runtime::Handle, sync::mpsc::UnboundedReceiver};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Arrival {
    Log(String),
    Finish { status: Option<ItemStatus>, retry: bool },
}

/// What the fake collector saw, in arrival order.
#[derive(Debug, Default)]
struct Collector {
    names: HashMap<ItemId, String>,
    arrivals: Vec<(ItemId, Arrival)>,
    launch_status: Option<Option<ItemStatus>>,
}

impl Collector {
    fn finish_count(&self) -> usize {
        self.arrivals
            .iter()
            .filter(|(_, arrival)| matches!(arrival, Arrival::Finish { .. }))
            .count()
    }

    /// Arrivals for each item called `name`, one list per item.
    fn per_item(&self, name: &str) -> Vec<Vec<Arrival>> {
        let mut items: Vec<(&ItemId, Vec<Arrival>)> = Vec::new();
        for (item, arrival) in &self.arrivals {
            if self.names.get(item).map(String::as_str) != Some(name) {
                continue;
            }
            match items.iter_mut().find(|(id, _)| *id == item) {
                Some((_, seen)) => seen.push(arrival.clone()),
                None => items.push((item, vec![arrival.clone()])),
            }
        }
        items.into_iter().map(|(_, seen)| seen).collect()
    }
}

/// Spawns a collector that answers item starts after `start_delay`.
fn spawn_collector(
    mut rx: UnboundedReceiver<SinkRequest>,
    start_delay: Duration,
) -> Arc<Mutex<Collector>> {
    let collector = Arc::new(Mutex::new(Collector::default()));
    let state = collector.clone();
    tokio::spawn(async move {
        let mut next = 0;
        while let Some(request) = rx.recv().await {
            let mut state = state.lock().unwrap();
            match request {
                SinkRequest::StartLaunch { reply, .. } => {
                    _ = reply.send(Ok(ItemId::new("launch")));
                }
                SinkRequest::FinishLaunch { request, reply, .. } => {
                    state.launch_status = Some(request.status);
                    _ = reply.send(Ok(()));
                }
                SinkRequest::StartItem { request, reply, .. } => {
                    next += 1;
                    let id = ItemId::new(format!("item-{next}"));
                    state.names.insert(id.clone(), request.name);
                    if start_delay.is_zero() {
                        _ = reply.send(Ok(id));
                    } else {
                        tokio::spawn(async move {
                            tokio::time::sleep(start_delay).await;
                            _ = reply.send(Ok(id));
                        });
                    }
                }
                SinkRequest::FinishItem {
                    item,
                    request,
                    reply,
                } => {
                    let arrival = Arrival::Finish {
                        status: request.status,
                        retry: request.is_retry(),
                    };
                    state.arrivals.push((item, arrival));
                    _ = reply.send(Ok(()));
                }
                SinkRequest::Log {
                    item,
                    request,
                    reply,
                } => {
                    state.arrivals.push((item, Arrival::Log(request.message)));
                    _ = reply.send(Ok(()));
                }
            }
        }
    });
    collector
}

/// Runs a test that fails with a message and passes on the runner's retry, each attempt behind
/// a passing `beforeMethod`.
async fn run_retried_test(start_delay: Duration) -> Result<Arc<Mutex<Collector>>> {
    let (sink, rx) = ChannelSink::new(Handle::current());
    let collector = spawn_collector(rx, start_delay);
    let service = ReportingService::new(Arc::new(sink), ReporterConfig::default_config());

    let suite = SuiteInfo::new("S");
    let group = TestGroupInfo::new(&suite, "T");
    let class = ClassInfo::new(&group, "C");
    let attempt = |name: &str, flags: LifecycleFlags, runner_retry: bool| {
        let mut result = MethodResult::new(&class, MethodInfo::new(name, flags));
        result.instance = Some(InstanceId::new(1));
        result.runner_retry = runner_retry;
        result
    };

    service.on_execution_start();
    service.on_suite_start(&suite);
    service.on_test_group_start(&group);
    service.on_class_start(&class);
    for (status, runner_retry) in [(ItemStatus::Failed, false), (ItemStatus::Passed, true)] {
        let before = attempt("beforeMethod", LifecycleFlags::BEFORE_METHOD, false);
        service.on_configuration_start(&before);
        service.on_configuration_finish(ItemStatus::Passed, &before);
        let mut test = attempt("test", LifecycleFlags::TEST, runner_retry);
        if status == ItemStatus::Failed {
            test.error = Some("expected 2, got 3".to_owned());
        }
        service.on_method_start(&test);
        service.on_method_finish(status, &test);
    }
    service.on_class_finish(&class);
    service.on_test_group_finish(&group);
    service.on_suite_finish(&suite);
    let ack = service
        .on_execution_finish()
        .ok_or_else(|| eyre!("launch was started"))?;

    tokio::time::timeout(Duration::from_secs(10), ack.acked()).await??;
    // The launch finish doesn't wait for item finishes still chained off their handles.
    tokio::time::timeout(Duration::from_secs(10), async {
        while collector.lock().unwrap().finish_count() < 8 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(collector)
}

fn finish(status: ItemStatus, retry: bool) -> Arrival {
    Arrival::Finish {
        status: Some(status),
        retry,
    }
}

fn assert_retried_test_order(collector: &Collector) {
    let before = collector.per_item("beforeMethod");
    assert_eq!(before.len(), 2);
    assert!(before.contains(&vec![finish(ItemStatus::Passed, false)]));
    assert!(
        before.contains(&vec![
            finish(ItemStatus::Passed, false),
            finish(ItemStatus::Passed, true),
        ]),
        "the original finish of the second setup arrives before its replay: {before:?}"
    );

    let tests = collector.per_item("test");
    assert_eq!(tests.len(), 2);
    assert!(
        tests.contains(&vec![
            Arrival::Log("expected 2, got 3".to_owned()),
            finish(ItemStatus::Failed, false),
        ]),
        "the failure message arrives before the finish: {tests:?}"
    );
    assert!(tests.contains(&vec![finish(ItemStatus::Passed, true)]));
}

#[tokio::test(flavor = "multi_thread")]
async fn retried_run_over_channel() -> Result<()> {
    test_init();
    let collector = run_retried_test(Duration::ZERO).await?;
    let collector = collector.lock().unwrap();
    assert_eq!(collector.launch_status, Some(Some(ItemStatus::Failed)));
    assert_retried_test_order(&collector);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_item_starts_keep_per_item_order() -> Result<()> {
    test_init();
    let collector = run_retried_test(Duration::from_millis(20)).await?;
    let collector = collector.lock().unwrap();
    assert_eq!(collector.launch_status, Some(Some(ItemStatus::Failed)));
    assert_retried_test_order(&collector);
    Ok(())
}
