// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Map camera seam.

use crate::models::PositionFix;
use tokio::sync::watch;

/// Street-level zoom used when following the driver.
pub const DEFAULT_ZOOM: f32 = 18.0;

/// Camera position last requested of the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f32,
    pub animated: bool,
}

/// Map view driven by the session workflow.
pub trait MapView: Send + Sync {
    /// Jump the camera to the fix.
    fn move_camera(&self, fix: &PositionFix, zoom: f32);

    /// Animate the camera to the fix.
    fn animate_camera(&self, fix: &PositionFix, zoom: f32);
}

/// Map without a renderer; remembers the last camera position.
#[derive(Debug, Clone)]
pub struct HeadlessMap {
    camera: watch::Sender<Option<CameraPosition>>,
}

impl Default for HeadlessMap {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessMap {
    pub fn new() -> Self {
        let (camera, _) = watch::channel(None);
        Self { camera }
    }

    pub fn camera(&self) -> Option<CameraPosition> {
        *self.camera.borrow()
    }

    /// Camera updates, for a UI layer rendering elsewhere.
    pub fn watch(&self) -> watch::Receiver<Option<CameraPosition>> {
        self.camera.subscribe()
    }

    fn set(&self, fix: &PositionFix, zoom: f32, animated: bool) {
        tracing::trace!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            zoom,
            animated,
            "Camera moved"
        );
        self.camera.send_replace(Some(CameraPosition {
            latitude: fix.latitude,
            longitude: fix.longitude,
            zoom,
            animated,
        }));
    }
}

impl MapView for HeadlessMap {
    fn move_camera(&self, fix: &PositionFix, zoom: f32) {
        self.set(fix, zoom, false);
    }

    fn animate_camera(&self, fix: &PositionFix, zoom: f32) {
        self.set(fix, zoom, true);
    }
}
