// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process realtime store emulator.
//!
//! Mirrors the semantics the client relies on: nested paths, value-change
//! listeners that receive the current value first, a `.info/connected` flag,
//! and server-held on-disconnect directives that run when the connection is
//! dropped. Used for tests and offline runs, the same role the Firestore
//! emulator plays for the profile store.

use super::{paths, DataSnapshot, RealtimeStore, Subscription};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Characters the store refuses inside a path segment.
const FORBIDDEN_SEGMENT_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

type Listener = mpsc::UnboundedSender<Result<DataSnapshot>>;

struct Inner {
    /// Scalar and array values keyed by their full path
    leaves: DashMap<String, Value>,
    listeners: DashMap<String, Vec<Listener>>,
    /// Paths to remove when the connection drops
    on_disconnect: DashSet<String>,
    connected: AtomicBool,
    rejecting_writes: AtomicBool,
}

/// Realtime store emulator. Clones share the same data.
#[derive(Clone)]
pub struct MemoryRealtimeStore {
    inner: Arc<Inner>,
}

impl Default for MemoryRealtimeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRealtimeStore {
    /// Create an empty, connected store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                leaves: DashMap::new(),
                listeners: DashMap::new(),
                on_disconnect: DashSet::new(),
                connected: AtomicBool::new(true),
                rejecting_writes: AtomicBool::new(false),
            }),
        }
    }

    // ─── Emulator Controls ───────────────────────────────────────

    /// Simulate the client connection coming up or dropping.
    ///
    /// Dropping the connection runs every armed on-disconnect directive, the
    /// way the server does for an unclean disconnect.
    pub fn set_connected(&self, connected: bool) {
        let was = self.inner.connected.swap(connected, Ordering::SeqCst);
        if was == connected {
            return;
        }

        if !connected {
            let armed: Vec<String> = self.inner.on_disconnect.iter().map(|p| p.clone()).collect();
            self.inner.on_disconnect.clear();
            for path in armed {
                tracing::debug!(path = %path, "Running on-disconnect removal");
                self.clear_subtree(&path);
                self.notify(&path);
            }
        }

        tracing::debug!(connected, "Connection state changed");
        self.notify_connection();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail, as a security rule rejection would.
    pub fn reject_writes(&self, reject: bool) {
        self.inner.rejecting_writes.store(reject, Ordering::SeqCst);
    }

    /// Cancel all listeners on `path` with an error, as the server does when
    /// read access is revoked.
    pub fn cancel_listeners(&self, path: &str, message: &str) {
        if let Some((_, listeners)) = self.inner.listeners.remove(&normalize(path)) {
            for tx in listeners {
                let _ = tx.send(Err(AppError::Subscription(message.to_string())));
            }
        }
    }

    /// Paths with an armed on-disconnect directive, sorted.
    pub fn pending_disconnects(&self) -> Vec<String> {
        let mut armed: Vec<String> = self.inner.on_disconnect.iter().map(|p| p.clone()).collect();
        armed.sort();
        armed
    }

    /// Number of live listeners on `path`.
    pub fn listener_count(&self, path: &str) -> usize {
        self.inner
            .listeners
            .get(&normalize(path))
            .map(|listeners| listeners.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    // ─── Internals ───────────────────────────────────────────────

    fn check_writable(&self, path: &str) -> Result<()> {
        if self.inner.rejecting_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(format!("Permission denied at {}", path)));
        }
        let valid = !path.is_empty()
            && path
                .split('/')
                .all(|s| !s.is_empty() && !s.contains(FORBIDDEN_SEGMENT_CHARS));
        if !valid {
            return Err(AppError::Database(format!("Invalid path: {}", path)));
        }
        Ok(())
    }

    fn snapshot(&self, path: &str) -> DataSnapshot {
        if path == paths::CONNECTED {
            return DataSnapshot::new(path, Some(Value::Bool(self.is_connected())));
        }
        DataSnapshot::new(path, self.assemble(path))
    }

    /// Rebuild the nested value stored at or below `path`.
    fn assemble(&self, path: &str) -> Option<Value> {
        if let Some(leaf) = self.inner.leaves.get(path) {
            return Some(leaf.clone());
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };

        let mut root = Map::new();
        let mut found = false;
        for entry in self.inner.leaves.iter() {
            if let Some(rest) = entry.key().strip_prefix(&prefix) {
                insert_nested(&mut root, rest, entry.value().clone());
                found = true;
            }
        }

        found.then_some(Value::Object(root))
    }

    fn write(&self, path: &str, value: Value) {
        self.clear_subtree(path);
        // A scalar stored at an ancestor is replaced by the new subtree
        let mut current = path;
        while let Some((parent, _)) = current.rsplit_once('/') {
            self.inner.leaves.remove(parent);
            current = parent;
        }

        let mut flat = Vec::new();
        flatten(path, value, &mut flat);
        for (key, leaf) in flat {
            self.inner.leaves.insert(key, leaf);
        }
    }

    fn clear_subtree(&self, path: &str) {
        self.inner.leaves.retain(|key, _| !is_under(key, path));
    }

    /// Deliver fresh snapshots to listeners above or below `changed`.
    fn notify(&self, changed: &str) {
        let affected: Vec<String> = self
            .inner
            .listeners
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|listened| {
                listened != paths::CONNECTED
                    && (is_under(changed, listened) || is_under(listened, changed))
            })
            .collect();

        for path in affected {
            let snapshot = self.snapshot(&path);
            if let Some(mut listeners) = self.inner.listeners.get_mut(&path) {
                listeners.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
            }
        }
    }

    fn notify_connection(&self) {
        let snapshot = self.snapshot(paths::CONNECTED);
        if let Some(mut listeners) = self.inner.listeners.get_mut(paths::CONNECTED) {
            listeners.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        }
    }
}

#[async_trait]
impl RealtimeStore for MemoryRealtimeStore {
    async fn get(&self, path: &str) -> Result<DataSnapshot> {
        Ok(self.snapshot(&normalize(path)))
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let path = normalize(path);
        self.check_writable(&path)?;
        if value.is_null() {
            self.clear_subtree(&path);
        } else {
            self.write(&path, value);
        }
        tracing::trace!(path = %path, "set");
        self.notify(&path);
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let path = normalize(path);
        self.check_writable(&path)?;
        for (key, value) in fields {
            let child = paths::child(&path, &key);
            self.check_writable(&child)?;
            if value.is_null() {
                self.clear_subtree(&child);
            } else {
                self.write(&child, value);
            }
        }
        tracing::trace!(path = %path, "update");
        self.notify(&path);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        self.check_writable(&path)?;
        self.clear_subtree(&path);
        tracing::trace!(path = %path, "remove");
        self.notify(&path);
        Ok(())
    }

    fn subscribe(&self, path: &str) -> Result<Subscription> {
        let path = normalize(path);
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(self.snapshot(&path)))
            .map_err(|_| AppError::Subscription("listener closed".to_string()))?;
        self.inner
            .listeners
            .entry(path.clone())
            .or_default()
            .push(tx);
        Ok(Subscription::new(path, rx))
    }

    async fn on_disconnect_remove(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        self.check_writable(&path)?;
        self.inner.on_disconnect.insert(path);
        Ok(())
    }

    async fn cancel_on_disconnect(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        self.check_writable(&path)?;
        self.inner.on_disconnect.retain(|armed| !is_under(armed, &path));
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Whether `key` is `path` itself or lies below it.
fn is_under(key: &str, path: &str) -> bool {
    path.is_empty()
        || key == path
        || (key.len() > path.len() && key.starts_with(path) && key[path.len()..].starts_with('/'))
}

fn flatten(path: &str, value: Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&paths::child(path, &key), child, out);
            }
        }
        leaf => out.push((path.to_string(), leaf)),
    }
}

fn insert_nested(root: &mut Map<String, Value>, rest: &str, value: Value) {
    let mut segments = rest.split('/').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
}
