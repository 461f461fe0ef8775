// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Connection state tracking and disconnect cleanup.
//!
//! While connected, the server holds an "on disconnect, remove" directive for
//! the driver's presence entry, so an app crash or network loss takes the
//! driver offline without any client cooperation. Directives are consumed
//! when they run, so they are re-armed on every reconnect.

use crate::db::{paths, DataSnapshot, RealtimeStore, Subscription};
use crate::error::{AppError, Result};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Watches `.info/connected` and arms the disconnect directive.
pub struct ConnectivityMonitor {
    store: Arc<dyn RealtimeStore>,
    subscription: Option<Subscription>,
    state: ConnectionState,
    /// Presence entry to clean up on disconnect
    reference: Option<String>,
    /// Path the directive is currently armed for
    armed: Option<String>,
}

impl ConnectivityMonitor {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self {
            store,
            subscription: None,
            state: ConnectionState::Disconnected,
            reference: None,
            armed: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn armed(&self) -> Option<&str> {
        self.armed.as_deref()
    }

    /// Subscribe to connection state. No-op if already attached.
    pub fn attach(&mut self) -> Result<()> {
        if self.subscription.is_none() {
            self.subscription = Some(self.store.subscribe(paths::CONNECTED)?);
            tracing::debug!("Connectivity monitor attached");
        }
        Ok(())
    }

    /// Drop the subscription. Armed directives stay on the server.
    pub fn detach(&mut self) {
        if self.subscription.take().is_some() {
            tracing::debug!("Connectivity monitor detached");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Next connection snapshot. Never resolves while detached.
    pub async fn next_snapshot(&mut self) -> Result<DataSnapshot> {
        match self.subscription.as_mut() {
            Some(subscription) => match subscription.next().await {
                Some(snapshot) => snapshot,
                None => Err(AppError::Subscription(
                    "connection listener closed".to_string(),
                )),
            },
            None => std::future::pending().await,
        }
    }

    /// Apply a connection snapshot, arming the directive on entering the
    /// connected state when a presence reference exists.
    ///
    /// A subscription error detaches the monitor; it is not re-subscribed.
    pub async fn handle_snapshot(&mut self, snapshot: Result<DataSnapshot>) -> Result<ConnectionState> {
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Connection subscription failed");
                self.subscription = None;
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        if snapshot.as_bool() == Some(true) {
            self.state = ConnectionState::Connected;
            self.armed = None;
            self.arm().await?;
        } else {
            self.state = ConnectionState::Disconnected;
            // The server runs (and forgets) directives when the connection drops
            self.armed = None;
        }

        tracing::debug!(state = ?self.state, "Connection state");
        Ok(self.state)
    }

    /// Point the monitor at a presence entry (or none). Arms immediately when
    /// connected, retrying an earlier failed arm for the same entry.
    pub async fn set_reference(&mut self, reference: Option<String>) -> Result<()> {
        if self.reference != reference {
            self.reference = reference;
            self.armed = None;
        }
        if self.state == ConnectionState::Connected {
            self.arm().await?;
        }
        Ok(())
    }

    async fn arm(&mut self) -> Result<()> {
        let Some(reference) = self.reference.clone() else {
            return Ok(());
        };
        if self.armed.as_deref() == Some(reference.as_str()) {
            return Ok(());
        }

        self.store.on_disconnect_remove(&reference).await?;
        tracing::debug!(path = %reference, "Armed on-disconnect removal");
        self.armed = Some(reference);
        Ok(())
    }
}
