// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod avatar;
pub mod connectivity;
pub mod geo_index;
pub mod location;
pub mod map;
pub mod notice;
pub mod place;
pub mod presence;
pub mod profile;
pub mod session;
pub mod workflow;

pub use auth::{create_id_token, AuthProvider, AuthUser, IdTokenAuth};
pub use avatar::{AvatarService, MemoryObjectStorage, ObjectStorage, UploadProgress};
pub use connectivity::{ConnectionState, ConnectivityMonitor};
pub use geo_index::{GeoFireIndex, GeoIndex};
pub use location::{
    LocationProvider, LocationRegistration, PushLocationProvider, ReplayLocationProvider,
    TrackError,
};
pub use map::{HeadlessMap, MapView, DEFAULT_ZOOM};
pub use notice::{ChannelNoticeSink, Notice, NoticeLevel, NoticeSink, TracingNoticeSink};
pub use place::{BoundaryGeocoder, Geocoder, NominatimGeocoder, PlaceError, PlaceResolver};
pub use presence::{PresencePublisher, PresenceRef};
pub use profile::{ProfileStore, RealtimeProfileStore};
pub use session::{AuthSession, Bootstrap, SessionService};
pub use workflow::{DriverSession, PlaceResolution, SessionEvent, SessionServices, SessionState};
