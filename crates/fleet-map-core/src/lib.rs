// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Keeps a vector-map rendering engine in sync with live fleet data: device
//! markers with clustering, geofences, tracks, the focused-device popup and
//! theme-driven rebuilds.

pub mod config;
pub mod engine;
pub mod features;
pub mod geo;
pub mod geocode;
pub mod headless;
pub mod layers;
pub mod model;
pub mod popup;
pub mod session;

pub use config::{ConfigError, MapConfig, Theme};
pub use engine::{EngineError, EngineEvent, MapEngine};
pub use features::{build_device_features, DeviceFeature};
pub use geo::geofence::{calculate_centroid, parse_geofence, GeofenceGeometry};
pub use model::{Device, FleetData, FleetSnapshot, Geofence, Position, TrackPoint};
pub use session::{DeferredTask, Lifecycle, MapSession};
