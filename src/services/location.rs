// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device location updates.
//!
//! The platform location service is push based: a caller registers with a
//! [`LocationRequest`] and receives fixes on a channel until it deregisters.
//! Permission is checked when registering and again before every delivery.

use crate::error::{AppError, Result};
use crate::models::{LocationRequest, PermissionStatus, PositionFix};
use async_trait::async_trait;
use dashmap::DashMap;
use geo::LineString;
use geojson::GeoJson;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Live location update registration. Pass it back to
/// [`LocationProvider::remove_updates`] to stop delivery.
#[derive(Debug)]
pub struct LocationRegistration {
    id: u64,
    rx: mpsc::UnboundedReceiver<PositionFix>,
}

impl LocationRegistration {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next fix, `None` once the provider stops delivering.
    pub async fn next(&mut self) -> Option<PositionFix> {
        self.rx.recv().await
    }
}

/// Device location provider consumed by the session workflow.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    fn permission(&self) -> PermissionStatus;

    /// Permission changes, including revocation while updates are running.
    fn permission_changes(&self) -> watch::Receiver<PermissionStatus>;

    /// Start an update stream. Fails with `PermissionDenied` unless fine or
    /// coarse access is granted.
    async fn request_updates(&self, request: &LocationRequest) -> Result<LocationRegistration>;

    /// Stop an update stream. Unknown registrations are ignored.
    async fn remove_updates(&self, registration: LocationRegistration);

    /// Most recent fix seen by the provider.
    async fn last_location(&self) -> Result<Option<PositionFix>>;
}

/// Suppresses fixes that moved less than the requested displacement.
#[derive(Debug, Clone)]
pub struct DisplacementFilter {
    min_displacement_m: f64,
    last: Option<PositionFix>,
}

impl DisplacementFilter {
    pub fn new(min_displacement_m: f64) -> Self {
        Self {
            min_displacement_m,
            last: None,
        }
    }

    /// Whether `fix` should be delivered. Accepted fixes become the new
    /// reference point.
    pub fn accept(&mut self, fix: &PositionFix) -> bool {
        let moved_enough = match &self.last {
            Some(last) => last.distance_to(fix) >= self.min_displacement_m,
            None => true,
        };
        if moved_enough {
            self.last = Some(*fix);
        }
        moved_enough
    }
}

struct Registrant {
    tx: mpsc::UnboundedSender<PositionFix>,
    filter: DisplacementFilter,
}

struct PushInner {
    permission: watch::Sender<PermissionStatus>,
    registrants: DashMap<u64, Registrant>,
    next_id: AtomicU64,
    last: watch::Sender<Option<PositionFix>>,
}

/// Provider fed by a platform bridge calling [`PushLocationProvider::push`].
#[derive(Clone)]
pub struct PushLocationProvider {
    inner: Arc<PushInner>,
}

impl PushLocationProvider {
    pub fn new(permission: PermissionStatus) -> Self {
        let (permission, _) = watch::channel(permission);
        let (last, _) = watch::channel(None);
        Self {
            inner: Arc::new(PushInner {
                permission,
                registrants: DashMap::new(),
                next_id: AtomicU64::new(1),
                last,
            }),
        }
    }

    /// Record an OS permission change.
    pub fn set_permission(&self, status: PermissionStatus) {
        let previous = self.inner.permission.send_replace(status);
        if previous != status {
            tracing::info!(from = ?previous, to = ?status, "Location permission changed");
        }
    }

    /// Number of live registrations.
    pub fn registration_count(&self) -> usize {
        self.inner.registrants.len()
    }

    /// Deliver a fix to every registration. Returns how many received it.
    pub fn push(&self, fix: PositionFix) -> usize {
        if !self.permission().is_granted() {
            tracing::debug!("Dropping fix: location permission not granted");
            return 0;
        }
        if !fix.is_valid() {
            tracing::warn!(
                latitude = fix.latitude,
                longitude = fix.longitude,
                "Dropping invalid fix"
            );
            return 0;
        }

        self.inner.last.send_replace(Some(fix));

        let mut delivered = 0;
        let mut closed = Vec::new();
        for mut entry in self.inner.registrants.iter_mut() {
            if !entry.filter.accept(&fix) {
                continue;
            }
            if entry.tx.send(fix).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            self.inner.registrants.remove(&id);
        }
        delivered
    }
}

#[async_trait]
impl LocationProvider for PushLocationProvider {
    fn permission(&self) -> PermissionStatus {
        *self.inner.permission.borrow()
    }

    fn permission_changes(&self) -> watch::Receiver<PermissionStatus> {
        self.inner.permission.subscribe()
    }

    async fn request_updates(&self, request: &LocationRequest) -> Result<LocationRegistration> {
        if !self.permission().is_granted() {
            return Err(AppError::PermissionDenied);
        }
        request.validate().map_err(AppError::Validation)?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.registrants.insert(
            id,
            Registrant {
                tx,
                filter: DisplacementFilter::new(request.smallest_displacement_m),
            },
        );

        tracing::debug!(
            registration = id,
            interval_ms = request.interval.as_millis() as u64,
            fastest_interval_ms = request.fastest_interval.as_millis() as u64,
            min_displacement_m = request.smallest_displacement_m,
            priority = ?request.priority,
            "Location updates requested"
        );
        Ok(LocationRegistration { id, rx })
    }

    async fn remove_updates(&self, registration: LocationRegistration) {
        if self.inner.registrants.remove(&registration.id).is_some() {
            tracing::debug!(registration = registration.id, "Location updates removed");
        }
    }

    async fn last_location(&self) -> Result<Option<PositionFix>> {
        Ok(*self.inner.last.borrow())
    }
}

/// Provider that replays a recorded track at the requested interval.
///
/// Each registration plays the track once through the shared push provider,
/// so the displacement threshold and permission checks apply as they would
/// for live fixes.
#[derive(Clone)]
pub struct ReplayLocationProvider {
    track: Arc<LineString<f64>>,
    push: PushLocationProvider,
    players: Arc<DashMap<u64, JoinHandle<()>>>,
}

impl ReplayLocationProvider {
    pub fn new(track: LineString<f64>, permission: PermissionStatus) -> Self {
        Self {
            track: Arc::new(track),
            push: PushLocationProvider::new(permission),
            players: Arc::new(DashMap::new()),
        }
    }

    /// Load a track from a GeoJSON or encoded polyline file, picked by
    /// extension.
    pub fn load_from_file<P: AsRef<Path>>(
        path: P,
        permission: PermissionStatus,
    ) -> std::result::Result<Self, TrackError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| TrackError::IoError(e.to_string()))?;

        let track = match path.extension().and_then(|e| e.to_str()) {
            Some("json") | Some("geojson") => parse_geojson_track(&data)?,
            _ => parse_polyline_track(data.trim())?,
        };
        tracing::info!(path = %path.display(), points = track.0.len(), "Loaded replay track");
        Ok(Self::new(track, permission))
    }

    /// Track from the first LineString in a GeoJSON document.
    pub fn from_geojson(
        json_data: &str,
        permission: PermissionStatus,
    ) -> std::result::Result<Self, TrackError> {
        Ok(Self::new(parse_geojson_track(json_data)?, permission))
    }

    /// Track from an encoded polyline (precision 5).
    pub fn from_polyline(
        encoded: &str,
        permission: PermissionStatus,
    ) -> std::result::Result<Self, TrackError> {
        Ok(Self::new(parse_polyline_track(encoded)?, permission))
    }

    pub fn track(&self) -> &LineString<f64> {
        &self.track
    }

    pub fn set_permission(&self, status: PermissionStatus) {
        self.push.set_permission(status);
    }

    /// Number of tracks currently playing.
    pub fn active_players(&self) -> usize {
        self.players.iter().filter(|p| !p.is_finished()).count()
    }
}

#[async_trait]
impl LocationProvider for ReplayLocationProvider {
    fn permission(&self) -> PermissionStatus {
        self.push.permission()
    }

    fn permission_changes(&self) -> watch::Receiver<PermissionStatus> {
        self.push.permission_changes()
    }

    async fn request_updates(&self, request: &LocationRequest) -> Result<LocationRegistration> {
        let registration = self.push.request_updates(request).await?;

        let track = self.track.clone();
        let push = self.push.clone();
        let period = request.interval.max(request.fastest_interval);
        let id = registration.id;

        let player = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            for coord in track.coords() {
                ticker.tick().await;
                push.push(PositionFix::new(coord.y, coord.x));
            }
            tracing::debug!(registration = id, "Replay track finished");
        });
        self.players.insert(id, player);

        Ok(registration)
    }

    async fn remove_updates(&self, registration: LocationRegistration) {
        if let Some((_, player)) = self.players.remove(&registration.id) {
            player.abort();
        }
        self.push.remove_updates(registration).await;
    }

    async fn last_location(&self) -> Result<Option<PositionFix>> {
        self.push.last_location().await
    }
}

fn parse_geojson_track(json_data: &str) -> std::result::Result<LineString<f64>, TrackError> {
    use std::convert::TryInto;

    let geojson: GeoJson = json_data
        .parse()
        .map_err(|e: geojson::Error| TrackError::ParseError(e.to_string()))?;

    let geometries: Vec<geojson::Geometry> = match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .collect(),
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::Geometry(geometry) => vec![geometry],
    };

    for geometry in geometries {
        let line: std::result::Result<LineString<f64>, _> = geometry.value.try_into();
        if let Ok(line) = line {
            return non_empty(line);
        }
    }
    Err(TrackError::UnsupportedGeometry)
}

fn parse_polyline_track(encoded: &str) -> std::result::Result<LineString<f64>, TrackError> {
    let line = polyline::decode_polyline(encoded, 5)
        .map_err(|e| TrackError::ParseError(e.to_string()))?;
    non_empty(line)
}

fn non_empty(line: LineString<f64>) -> std::result::Result<LineString<f64>, TrackError> {
    if line.0.is_empty() {
        Err(TrackError::EmptyTrack)
    } else {
        Ok(line)
    }
}

/// Errors loading a replay track.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse track: {0}")]
    ParseError(String),

    #[error("Track needs a LineString geometry")]
    UnsupportedGeometry,

    #[error("Track has no points")]
    EmptyTrack,
}
