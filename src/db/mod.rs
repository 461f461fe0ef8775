//! Database layer: realtime store seam, in-process emulator and Firestore.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryRealtimeStore;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// Path roots as constants.
pub mod paths {
    /// Driver profiles, keyed by driver id
    pub const DRIVER_INFO: &str = "DriverInfo";
    /// Presence index root, partitioned by place
    pub const DRIVERS_LOCATION: &str = "DriversLocation";
    /// Well-known connection state path
    pub const CONNECTED: &str = ".info/connected";
    /// Avatar objects in storage
    pub const AVATARS: &str = "avatars";

    /// Join a parent path and a child key.
    pub fn child(parent: &str, key: &str) -> String {
        if parent.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", parent.trim_end_matches('/'), key)
        }
    }
}

/// Value read from a path at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSnapshot {
    pub path: String,
    pub value: Option<Value>,
}

impl DataSnapshot {
    pub fn new(path: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_ref().and_then(Value::as_bool)
    }

    /// Deserialize the value, `None` if nothing is stored at the path.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.value
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| AppError::Database(format!("Malformed value at {}: {}", self.path, e)))
    }
}

/// Live value-change subscription. Dropping it detaches the listener.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    rx: mpsc::UnboundedReceiver<Result<DataSnapshot>>,
}

impl Subscription {
    pub fn new(path: impl Into<String>, rx: mpsc::UnboundedReceiver<Result<DataSnapshot>>) -> Self {
        Self {
            path: path.into(),
            rx,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next snapshot or cancellation error; `None` once the store drops the
    /// listener.
    pub async fn next(&mut self) -> Option<Result<DataSnapshot>> {
        self.rx.recv().await
    }
}

/// Realtime key-value store consumed by the client.
///
/// Paths are `/`-separated. Writing `null` is equivalent to removing.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Single read of the value at `path`.
    async fn get(&self, path: &str) -> Result<DataSnapshot>;

    /// Overwrite the value at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<()>;

    /// Merge `fields` into the object at `path`.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()>;

    /// Delete the value at `path` and everything below it.
    async fn remove(&self, path: &str) -> Result<()>;

    /// Continuous value-change subscription. The current value is delivered
    /// first. `.info/connected` reports connection state.
    fn subscribe(&self, path: &str) -> Result<Subscription>;

    /// Ask the server to remove `path` if this client disconnects uncleanly.
    async fn on_disconnect_remove(&self, path: &str) -> Result<()>;

    /// Cancel directives previously armed for `path`.
    async fn cancel_on_disconnect(&self, path: &str) -> Result<()>;
}
