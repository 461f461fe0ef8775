// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Driver presence workflow.
//!
//! A [`DriverSession`] owns one driver's location stream and presence entry:
//!
//! 1. Check location permission and start the location stream
//! 2. On each fix, recenter the map and reverse-geocode the fix in the
//!    background
//! 3. Apply geocoding results in fix order, publishing the fix under
//!    `DriversLocation/<place>/<driver>` and arming disconnect cleanup
//! 4. On teardown, stop the stream, wait for writes in flight and remove
//!    the entry
//!
//! All state changes happen in [`DriverSession::handle`] on the caller's
//! task. Geocoding and publishing run on spawned tasks and never block the
//! next fix.

use crate::db::{DataSnapshot, RealtimeStore};
use crate::error::{AppError, Result};
use crate::models::{LocationRequest, PermissionStatus, PlaceKey, PositionFix};
use crate::services::connectivity::{ConnectionState, ConnectivityMonitor};
use crate::services::location::{LocationProvider, LocationRegistration};
use crate::services::map::{MapView, DEFAULT_ZOOM};
use crate::services::place::{Geocoder, PlaceResolver};
use crate::services::presence::{PresencePublisher, PresenceRef};
use crate::services::{AuthProvider, AuthSession, GeoIndex, Notice, NoticeSink};
use crate::time_utils::format_utc_rfc3339;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

/// Lifecycle of a [`DriverSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Waiting on (or refused) location permission
    PermissionPending,
    Active,
    TornDown,
}

/// External services a session talks to.
#[derive(Clone)]
pub struct SessionServices {
    pub store: Arc<dyn RealtimeStore>,
    pub index: Arc<dyn GeoIndex>,
    pub location: Arc<dyn LocationProvider>,
    pub geocoder: Arc<dyn Geocoder>,
    pub auth: Arc<dyn AuthProvider>,
    pub map: Arc<dyn MapView>,
    pub notices: Arc<dyn NoticeSink>,
}

/// Geocoding outcome for one fix.
#[derive(Debug)]
pub struct PlaceResolution {
    /// Position of the fix in delivery order
    pub seq: u64,
    pub fix: PositionFix,
    pub place: Result<PlaceKey>,
}

/// Input to [`DriverSession::handle`].
#[derive(Debug)]
pub enum SessionEvent {
    Fix(PositionFix),
    Resolved(PlaceResolution),
    Connectivity(Result<DataSnapshot>),
    PermissionChanged(PermissionStatus),
    /// The location provider closed the stream
    StreamEnded,
}

enum Wake {
    Permission(Option<PermissionStatus>),
    Resolved(PlaceResolution),
    Fix(Option<PositionFix>),
    Connectivity(Result<DataSnapshot>),
    Reaped,
}

pub struct DriverSession {
    driver_id: String,
    request: LocationRequest,
    location: Arc<dyn LocationProvider>,
    resolver: PlaceResolver,
    publisher: PresencePublisher,
    monitor: ConnectivityMonitor,
    auth: Arc<dyn AuthProvider>,
    map: Arc<dyn MapView>,
    notices: Arc<dyn NoticeSink>,

    state: SessionState,
    registration: Option<LocationRegistration>,
    permission_rx: Option<watch::Receiver<PermissionStatus>>,

    resolved_tx: mpsc::UnboundedSender<PlaceResolution>,
    resolved_rx: mpsc::UnboundedReceiver<PlaceResolution>,
    next_seq: u64,
    applied_seq: u64,
    resolving: JoinSet<()>,

    /// Tail of the publish chain; each write waits for the one before it
    publishing: Option<JoinHandle<()>>,
    current: Option<PresenceRef>,
    /// Entries from earlier places whose removal failed
    stale: Vec<PresenceRef>,
}

impl DriverSession {
    pub fn new(driver: &AuthSession, services: SessionServices, request: LocationRequest) -> Self {
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();

        Self {
            driver_id: driver.id().to_string(),
            request,
            location: services.location,
            resolver: PlaceResolver::new(services.geocoder),
            publisher: PresencePublisher::new(
                services.index,
                services.store.clone(),
                driver.id(),
            ),
            monitor: ConnectivityMonitor::new(services.store),
            auth: services.auth,
            map: services.map,
            notices: services.notices,
            state: SessionState::Idle,
            registration: None,
            permission_rx: None,
            resolved_tx,
            resolved_rx,
            next_seq: 0,
            applied_seq: 0,
            resolving: JoinSet::new(),
            publishing: None,
            current: None,
            stale: Vec::new(),
        }
    }

    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Where the driver's presence entry currently lives.
    pub fn presence(&self) -> Option<&PresenceRef> {
        self.current.as_ref()
    }

    /// Entries left behind in earlier places, awaiting removal.
    pub fn stale_presence(&self) -> &[PresenceRef] {
        &self.stale
    }

    pub fn current_place(&self) -> Option<&PlaceKey> {
        self.current.as_ref().map(|c| &c.place)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.monitor.state()
    }

    pub fn is_receiving_updates(&self) -> bool {
        self.registration.is_some()
    }

    /// Check permission and start the location stream.
    ///
    /// Without permission this reports `PermissionDenied` and never touches
    /// the location provider. Starting an active session is a no-op.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Active => return Ok(()),
            SessionState::TornDown => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "Session for driver {} was torn down",
                    self.driver_id
                )))
            }
            SessionState::Idle | SessionState::PermissionPending => {}
        }

        self.state = SessionState::PermissionPending;
        if !self.location.permission().is_granted() {
            tracing::warn!(driver_id = %self.driver_id, "Location permission not granted");
            let err = AppError::PermissionDenied;
            self.notices.report(&err);
            return Err(err);
        }

        let registration = match self.location.request_updates(&self.request).await {
            Ok(registration) => registration,
            Err(e) => {
                self.notices.report(&e);
                return Err(e);
            }
        };
        self.registration = Some(registration);
        self.permission_rx = Some(self.location.permission_changes());

        if let Err(e) = self.monitor.attach() {
            self.notices.report(&e);
        }

        self.state = SessionState::Active;
        tracing::info!(driver_id = %self.driver_id, "Driver session active");
        Ok(())
    }

    /// Wait for the next event. Returns `None` when the session is not active.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if self.state != SessionState::Active {
                return None;
            }

            let wake = tokio::select! {
                biased;
                status = permission_change(&mut self.permission_rx) => Wake::Permission(status),
                Some(resolution) = self.resolved_rx.recv() => Wake::Resolved(resolution),
                fix = next_fix(&mut self.registration) => Wake::Fix(fix),
                snapshot = self.monitor.next_snapshot() => Wake::Connectivity(snapshot),
                Some(joined) = self.resolving.join_next() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Geocoding task panicked");
                        }
                    }
                    Wake::Reaped
                }
            };

            match wake {
                Wake::Permission(Some(status)) => return Some(SessionEvent::PermissionChanged(status)),
                Wake::Permission(None) => self.permission_rx = None,
                Wake::Resolved(resolution) => return Some(SessionEvent::Resolved(resolution)),
                Wake::Fix(Some(fix)) => return Some(SessionEvent::Fix(fix)),
                Wake::Fix(None) => {
                    if let Some(registration) = self.registration.take() {
                        self.location.remove_updates(registration).await;
                    }
                    return Some(SessionEvent::StreamEnded);
                }
                Wake::Connectivity(snapshot) => return Some(SessionEvent::Connectivity(snapshot)),
                Wake::Reaped => {}
            }
        }
    }

    /// Apply one event.
    pub async fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Fix(fix) => self.on_fix(fix),
            SessionEvent::Resolved(resolution) => self.on_resolved(resolution).await,
            SessionEvent::Connectivity(snapshot) => {
                if let Err(e) = self.monitor.handle_snapshot(snapshot).await {
                    self.notices.report(&e);
                }
            }
            SessionEvent::PermissionChanged(status) => {
                if !status.is_granted() {
                    self.on_permission_revoked().await;
                }
            }
            SessionEvent::StreamEnded => {
                tracing::info!(driver_id = %self.driver_id, "Location stream ended");
            }
        }
    }

    fn on_fix(&mut self, fix: PositionFix) {
        if self.state != SessionState::Active {
            return;
        }

        self.map.move_camera(&fix, DEFAULT_ZOOM);

        self.next_seq += 1;
        let seq = self.next_seq;
        let resolver = self.resolver.clone();
        let tx = self.resolved_tx.clone();
        self.resolving.spawn(async move {
            let place = resolver.resolve(&fix).await;
            // Receiver lives as long as the session
            let _ = tx.send(PlaceResolution { seq, fix, place });
        });

        tracing::trace!(
            driver_id = %self.driver_id,
            seq,
            taken_at = %format_utc_rfc3339(fix.timestamp),
            "Resolving fix"
        );
    }

    async fn on_resolved(&mut self, resolution: PlaceResolution) {
        let PlaceResolution { seq, fix, place } = resolution;

        if self.state != SessionState::Active {
            return;
        }
        if seq <= self.applied_seq {
            tracing::debug!(driver_id = %self.driver_id, seq, applied = self.applied_seq, "Dropping stale place resolution");
            return;
        }
        self.applied_seq = seq;

        let place = match place {
            Ok(place) => place,
            Err(e) => {
                tracing::warn!(driver_id = %self.driver_id, seq, error = %e, "Place resolution failed");
                self.notices.report(&e);
                return;
            }
        };

        // Publishing here again overwrites any leftover entry
        self.stale.retain(|stale| stale.place != place);
        self.retry_stale().await;

        let moved_from = self
            .current
            .as_ref()
            .filter(|current| current.place != place)
            .cloned();
        if let Some(previous) = moved_from {
            self.drain_publishes().await;
            if let Err(e) = self.publisher.withdraw(&previous).await {
                tracing::warn!(driver_id = %self.driver_id, path = %previous.path, error = %e, "Old presence entry not removed; will retry");
                self.notices.report(&e);
                self.stale.push(previous.clone());
            }
            tracing::info!(
                driver_id = %self.driver_id,
                from = %previous.place,
                to = %place,
                "Driver moved to a new place"
            );
        }

        let reference = self.publisher.reference(&place);
        self.spawn_publish(place, fix);
        self.current = Some(reference.clone());

        if let Err(e) = self.monitor.set_reference(Some(reference.path)).await {
            self.notices.report(&e);
        }
    }

    fn spawn_publish(&mut self, place: PlaceKey, fix: PositionFix) {
        let previous = self.publishing.take();
        let publisher = self.publisher.clone();
        let notices = self.notices.clone();

        self.publishing = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    tracing::error!(driver_id = %publisher.driver_id(), error = %e, "Publish task failed");
                }
            }
            match publisher.publish(&place, &fix).await {
                Ok(()) => notices.notify(Notice::online()),
                Err(e) => {
                    tracing::warn!(driver_id = %publisher.driver_id(), place = %place, error = %e, "Publish failed");
                    notices.report(&e);
                }
            }
        }));
    }

    /// Wait for every publish spawned so far.
    async fn drain_publishes(&mut self) {
        if let Some(tail) = self.publishing.take() {
            if let Err(e) = tail.await {
                tracing::error!(driver_id = %self.driver_id, error = %e, "Publish task failed");
            }
        }
    }

    async fn stop_updates(&mut self) {
        if let Some(registration) = self.registration.take() {
            self.location.remove_updates(registration).await;
        }
        self.permission_rx = None;
        self.resolving.abort_all();
        self.applied_seq = self.next_seq;
        while self.resolved_rx.try_recv().is_ok() {}
    }

    async fn withdraw_current(&mut self) {
        if let Some(current) = self.current.take() {
            if let Err(e) = self.monitor.set_reference(None).await {
                self.notices.report(&e);
            }
            if let Err(e) = self.publisher.withdraw(&current).await {
                self.notices.report(&e);
                self.stale.push(current);
            }
        }
        self.retry_stale().await;
    }

    /// Try again to remove entries from earlier places. Failures stay queued.
    async fn retry_stale(&mut self) {
        if self.stale.is_empty() {
            return;
        }

        let mut remaining = Vec::new();
        for stale in std::mem::take(&mut self.stale) {
            match self.publisher.withdraw(&stale).await {
                Ok(()) => {
                    tracing::info!(driver_id = %self.driver_id, path = %stale.path, "Removed leftover presence entry")
                }
                Err(e) => {
                    tracing::debug!(driver_id = %self.driver_id, path = %stale.path, error = %e, "Leftover presence entry still not removed");
                    remaining.push(stale);
                }
            }
        }
        self.stale = remaining;
    }

    async fn on_permission_revoked(&mut self) {
        if self.state != SessionState::Active {
            return;
        }
        tracing::warn!(driver_id = %self.driver_id, "Location permission revoked");

        self.stop_updates().await;
        self.drain_publishes().await;
        self.withdraw_current().await;

        self.state = SessionState::PermissionPending;
        self.notices.report(&AppError::PermissionDenied);
    }

    /// Stop the stream and take the driver offline. Idempotent.
    ///
    /// The presence entry is removed only while a user is signed in; after
    /// sign-out the disconnect directive is left to clean up.
    pub async fn teardown(&mut self) {
        if matches!(self.state, SessionState::Idle | SessionState::TornDown) {
            return;
        }

        self.stop_updates().await;
        self.drain_publishes().await;

        if self.auth.current_user().is_some() {
            self.withdraw_current().await;
        } else {
            for entry in self.current.take().into_iter().chain(self.stale.drain(..)) {
                tracing::info!(
                    driver_id = %self.driver_id,
                    path = %entry.path,
                    "Signed out; leaving presence cleanup to disconnect directive"
                );
            }
        }

        self.monitor.detach();
        self.state = SessionState::TornDown;
        tracing::info!(driver_id = %self.driver_id, "Driver session torn down");
    }

    /// Re-subscribe to connection state after a teardown. The location stream
    /// stays stopped; a new session is needed for that.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != SessionState::TornDown {
            return Ok(());
        }
        self.monitor.attach()?;
        self.state = SessionState::Active;
        tracing::info!(driver_id = %self.driver_id, "Driver session resumed");
        Ok(())
    }

    /// Animate the map to the last known location ("my location").
    pub async fn recenter_on_last_location(&self) -> Result<Option<PositionFix>> {
        if !self.location.permission().is_granted() {
            let err = AppError::PermissionDenied;
            self.notices.report(&err);
            return Err(err);
        }

        let fix = self.location.last_location().await?;
        match &fix {
            Some(fix) => self.map.animate_camera(fix, DEFAULT_ZOOM),
            None => tracing::debug!(driver_id = %self.driver_id, "No last known location"),
        }
        Ok(fix)
    }

    /// Process every event that is ready now, then wait for geocoding and
    /// publishing in flight. Repeats until nothing is left.
    pub async fn settle(&mut self) {
        loop {
            while self.resolving.join_next().await.is_some() {}

            let mut progressed = false;
            while let Some(event) = self.next_event().now_or_never().flatten() {
                self.handle(event).await;
                progressed = true;
            }

            if !progressed && self.resolving.is_empty() {
                break;
            }
        }
        self.drain_publishes().await;
    }

    /// Start the session and process events until `shutdown` resolves or the
    /// session stops being active, then tear down.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        tokio::pin!(shutdown);

        loop {
            let event = tokio::select! {
                _ = &mut shutdown => None,
                event = self.next_event() => event,
            };
            match event {
                Some(event) => self.handle(event).await,
                None => break,
            }
        }

        self.teardown().await;
        Ok(())
    }
}

async fn permission_change(
    rx: &mut Option<watch::Receiver<PermissionStatus>>,
) -> Option<PermissionStatus> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

async fn next_fix(registration: &mut Option<LocationRegistration>) -> Option<PositionFix> {
    match registration {
        Some(registration) => registration.next().await,
        None => std::future::pending().await,
    }
}
