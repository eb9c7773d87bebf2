// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The registry of live report scopes.
//!
//! Scopes nest as suite → grouped test → class → method invocation. Each scope is identified by
//! a [`ScopeKey`] relative to its parent, and owns a [`TreeNode`] holding the item handle.
//!
//! The tree is a reporting convenience, not authoritative state: the sink receives parent
//! handles directly with each start request. Registrations under an unknown parent are skipped.

use crate::{
    errors::HandleResolveError,
    handle::{FinishAck, ItemHandle},
    helpers::lock,
    status::StatusAccumulator,
};
use indexmap::IndexMap;
use launch_metadata::{ItemId, ItemParameter};
use smol_str::SmolStr;
use std::{
    fmt,
    sync::{Arc, Mutex, OnceLock},
};
use tracing::debug;
use xxhash_rust::xxh3::Xxh3;

/// Identifies a scope relative to its parent.
///
/// Parameterized invocations of the same method get distinct keys through a hash of their
/// parameters.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ScopeKey {
    name: SmolStr,
    params_hash: Option<u64>,
}

impl ScopeKey {
    /// Creates a key for an unparameterized scope.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().into(),
            params_hash: None,
        }
    }

    /// Creates a key for an invocation with the given parameters.
    ///
    /// An empty parameter list produces the same key as [`ScopeKey::new`].
    pub fn with_parameters(name: impl AsRef<str>, parameters: &[ItemParameter]) -> Self {
        if parameters.is_empty() {
            return Self::new(name);
        }

        let mut hasher = Xxh3::new();
        for param in parameters {
            hasher.update(param.key.as_bytes());
            hasher.update(&[0]);
            match &param.value {
                Some(value) => {
                    hasher.update(&[1]);
                    hasher.update(value.as_bytes());
                }
                None => hasher.update(&[2]),
            }
            hasher.update(&[0]);
        }

        Self {
            name: name.as_ref().into(),
            params_hash: Some(hasher.digest()),
        }
    }

    /// Returns the human-readable name of this scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameter hash, if this key identifies a parameterized invocation.
    pub fn params_hash(&self) -> Option<u64> {
        self.params_hash
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.params_hash {
            Some(hash) => write!(f, "{}[{hash:016x}]", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Displays a scope path as `a/b/c`.
pub(crate) struct DisplayScopePath<'a>(pub(crate) &'a [ScopeKey]);

impl fmt::Display for DisplayScopePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

type ChildMap = IndexMap<ScopeKey, Arc<TreeNode>>;

/// A node in the item tree.
#[derive(Debug)]
pub struct TreeNode {
    handle: ItemHandle,
    children: Mutex<ChildMap>,
    finish: OnceLock<FinishAck>,
    status: StatusAccumulator,
}

impl TreeNode {
    fn new(handle: ItemHandle) -> Self {
        Self {
            handle,
            children: Mutex::new(IndexMap::new()),
            finish: OnceLock::new(),
            status: StatusAccumulator::new(),
        }
    }

    /// Returns the item handle for this scope.
    pub fn handle(&self) -> &ItemHandle {
        &self.handle
    }

    /// Returns the child node with the given key.
    pub fn child(&self, key: &ScopeKey) -> Option<Arc<TreeNode>> {
        lock(&self.children).get(key).cloned()
    }

    /// Returns the keys of all current children, in insertion order.
    pub fn child_keys(&self) -> Vec<ScopeKey> {
        lock(&self.children).keys().cloned().collect()
    }

    /// Returns the finish acknowledgement, if this scope finished while the tree was retained.
    pub fn finish_ack(&self) -> Option<&FinishAck> {
        self.finish.get()
    }

    /// Returns the roll-up of the statuses reported by this node's children.
    pub fn status(&self) -> &StatusAccumulator {
        &self.status
    }
}

/// A concurrency-safe registry mapping scope paths to tree nodes.
#[derive(Debug)]
pub struct ItemTree {
    roots: Mutex<ChildMap>,
    retain: bool,
}

impl ItemTree {
    /// Creates a new, empty tree.
    ///
    /// If `retain` is true, finished scopes stay in the tree with their finish acknowledgement
    /// recorded, for correlation after the run. Otherwise they're removed as soon as they
    /// finish.
    pub fn new(retain: bool) -> Self {
        Self {
            roots: Mutex::new(IndexMap::new()),
            retain,
        }
    }

    /// Returns true if finished scopes are retained.
    pub fn is_retained(&self) -> bool {
        self.retain
    }

    /// Registers `key` under the scope at `parent`, returning the new node.
    ///
    /// An empty `parent` registers a root scope. If the parent isn't in the tree, nothing is
    /// registered and `None` is returned. If `key` is already present under the parent, the
    /// existing mapping is replaced.
    pub fn put(
        &self,
        parent: &[ScopeKey],
        key: ScopeKey,
        handle: ItemHandle,
    ) -> Option<Arc<TreeNode>> {
        let node = Arc::new(TreeNode::new(handle));
        let previous = if parent.is_empty() {
            lock(&self.roots).insert(key.clone(), node.clone())
        } else {
            let Some(parent_node) = self.get(parent) else {
                debug!(
                    parent = %DisplayScopePath(parent),
                    %key,
                    "parent scope not in item tree, skipping registration"
                );
                return None;
            };
            lock(&parent_node.children).insert(key.clone(), node.clone())
        };

        if previous.is_some() {
            debug!(
                parent = %DisplayScopePath(parent),
                %key,
                "scope registered again, replacing previous node"
            );
        }
        Some(node)
    }

    /// Returns the node at `path`.
    pub fn get(&self, path: &[ScopeKey]) -> Option<Arc<TreeNode>> {
        let (first, rest) = path.split_first()?;
        let mut node = lock(&self.roots).get(first).cloned()?;
        for key in rest {
            let next = node.child(key)?;
            node = next;
        }
        Some(node)
    }

    /// Removes the node at `path` from its parent, returning it.
    pub fn remove(&self, path: &[ScopeKey]) -> Option<Arc<TreeNode>> {
        let (last, parent) = path.split_last()?;
        if parent.is_empty() {
            lock(&self.roots).shift_remove(last)
        } else {
            let parent_node = self.get(parent)?;
            let mut children = lock(&parent_node.children);
            children.shift_remove(last)
        }
    }

    /// Marks the scope at `path` as finished.
    ///
    /// With retention enabled, `ack` is recorded on the node. Otherwise the node is removed from
    /// the tree. Returns the node, if it was present.
    pub fn finish(&self, path: &[ScopeKey], ack: FinishAck) -> Option<Arc<TreeNode>> {
        if self.retain {
            let node = self.get(path)?;
            if node.finish.set(ack).is_err() {
                debug!(
                    path = %DisplayScopePath(path),
                    "scope finished more than once, keeping first acknowledgement"
                );
            }
            Some(node)
        } else {
            self.remove(path)
        }
    }

    /// Waits for the handle at `path` to resolve, returning its ID.
    ///
    /// Returns `Ok(None)` if there's no node at `path`. If the handle fails to resolve, the node
    /// is dropped from the tree so later lookups don't depend on it.
    pub fn resolve_id(&self, path: &[ScopeKey]) -> Result<Option<ItemId>, HandleResolveError> {
        let Some(node) = self.get(path) else {
            return Ok(None);
        };
        match node.handle.wait() {
            Ok(id) => Ok(Some(id)),
            Err(error) => {
                self.remove(path);
                Err(HandleResolveError::new(
                    DisplayScopePath(path).to_string(),
                    error,
                ))
            }
        }
    }

    /// Returns the keys of all root scopes.
    pub fn root_keys(&self) -> Vec<ScopeKey> {
        lock(&self.roots).keys().cloned().collect()
    }

    /// Removes every scope from the tree.
    pub fn clear(&self) {
        lock(&self.roots).clear();
    }
}

impl Default for ItemTree {
    fn default() -> Self {
        Self::new(false)
    }
}
