// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregated class items for the grouped-by-class reporting mode.

use crate::{
    handle::ItemHandle,
    helpers::{read, write},
    status::StatusAccumulator,
    tree::ScopeKey,
};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::sync::{
    Arc, RwLock,
    atomic::{AtomicBool, Ordering},
};

/// One class item collecting the results of every method of that class.
#[derive(Debug)]
pub(super) struct AggregatedClass {
    pub(super) suite: SmolStr,
    pub(super) name: SmolStr,
    pub(super) handle: ItemHandle,
    pub(super) status: StatusAccumulator,
    closed: AtomicBool,
}

impl AggregatedClass {
    pub(super) fn path(&self) -> Vec<ScopeKey> {
        vec![ScopeKey::new(&self.suite), ScopeKey::new(&self.name)]
    }

    /// Marks the class closed. Returns false if it was already closed.
    pub(super) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

type ClassKey = (SmolStr, SmolStr);

/// Aggregated classes that haven't been closed yet, keyed by suite and canonical class name.
#[derive(Debug, Default)]
pub(super) struct ClassAggregator {
    classes: RwLock<IndexMap<ClassKey, Arc<AggregatedClass>>>,
}

impl ClassAggregator {
    pub(super) fn get(&self, suite: &SmolStr, class: &SmolStr) -> Option<Arc<AggregatedClass>> {
        read(&self.classes)
            .get(&(suite.clone(), class.clone()))
            .cloned()
    }

    /// Returns the class, calling `start` to create its item if it doesn't exist yet.
    ///
    /// `start` runs at most once per class even if many threads race here.
    pub(super) fn get_or_start(
        &self,
        suite: &SmolStr,
        class: &SmolStr,
        start: impl FnOnce() -> ItemHandle,
    ) -> Arc<AggregatedClass> {
        if let Some(existing) = self.get(suite, class) {
            return existing;
        }

        let mut classes = write(&self.classes);
        // Another thread may have created it between the read and the write lock.
        classes
            .entry((suite.clone(), class.clone()))
            .or_insert_with(|| {
                Arc::new(AggregatedClass {
                    suite: suite.clone(),
                    name: class.clone(),
                    handle: start(),
                    status: StatusAccumulator::new(),
                    closed: AtomicBool::new(false),
                })
            })
            .clone()
    }

    /// Removes and returns every class of `suite`, or of every suite if `suite` is `None`.
    pub(super) fn take_remaining(&self, suite: Option<&SmolStr>) -> Vec<Arc<AggregatedClass>> {
        let mut classes = write(&self.classes);
        let mut taken = Vec::new();
        classes.retain(|(class_suite, _), class| {
            if suite.is_none_or(|suite| suite == class_suite) {
                taken.push(class.clone());
                false
            } else {
                true
            }
        });
        taken
    }
}
