// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Contract of the vector-map rendering engine this crate drives.
//!
//! The engine is external and stateful. Everything the session does to the map
//! goes through [`MapEngine`]; everything the map tells the session arrives as
//! an [`EngineEvent`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::geo::{LngLat, LngLatBounds};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Source not found: {0}")]
    SourceNotFound(String),
    #[error("Source already exists: {0}")]
    DuplicateSource(String),
    #[error("Source {0} is still used by a layer")]
    SourceInUse(String),
    #[error("Layer not found: {0}")]
    LayerNotFound(String),
    #[error("Layer already exists: {0}")]
    DuplicateLayer(String),
    #[error("Cluster {0} cannot be expanded")]
    ClusterUnavailable(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SourceSpec {
    #[serde(rename_all = "camelCase")]
    GeoJson {
        data: Value,
        #[serde(default)]
        cluster: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cluster_radius: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cluster_max_zoom: Option<u32>,
    },
}

impl SourceSpec {
    pub fn geojson(data: Value) -> Self {
        SourceSpec::GeoJson {
            data,
            cluster: false,
            cluster_radius: None,
            cluster_max_zoom: None,
        }
    }

    pub fn clustered(data: Value, radius: u32, max_zoom: u32) -> Self {
        SourceSpec::GeoJson {
            data,
            cluster: true,
            cluster_radius: Some(radius),
            cluster_max_zoom: Some(max_zoom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Circle,
    Symbol,
    Fill,
    Line,
}

/// A style layer: kind, backing source, optional filter, and the paint and
/// layout property objects passed to the engine unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    pub kind: LayerKind,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default)]
    pub paint: Map<String, Value>,
    #[serde(default)]
    pub layout: Map<String, Value>,
}

impl LayerSpec {
    pub fn new(id: &str, kind: LayerKind, source: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            source: source.to_string(),
            filter: None,
            paint: Map::new(),
            layout: Map::new(),
        }
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn paint(mut self, name: &str, value: Value) -> Self {
        self.paint.insert(name.to_string(), value);
        self
    }

    pub fn layout(mut self, name: &str, value: Value) -> Self {
        self.layout.insert(name.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraOptions {
    pub center: LngLat,
    pub zoom: Option<f64>,
    pub duration: Option<Duration>,
}

impl CameraOptions {
    pub fn center(center: LngLat) -> Self {
        Self {
            center,
            zoom: None,
            duration: None,
        }
    }

    pub fn zoom(mut self, zoom: f64) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub padding: f64,
    pub max_zoom: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    MouseEnter,
    MouseLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Pointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Navigation,
    Fullscreen,
    Attribution,
}

/// Token for one `on` registration. Passing it to `off` detaches exactly that
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupHandle(pub u64);

/// RGBA image registered with the engine (used for marker glyphs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A feature the engine reports under the cursor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedFeature {
    /// Point geometry, when the feature is a point.
    pub geometry: Option<LngLat>,
    pub properties: Map<String, Value>,
}

impl RenderedFeature {
    /// Engine-assigned cluster id for cluster features.
    pub fn cluster_id(&self) -> Option<u64> {
        self.properties.get("cluster_id").and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The map finished its first load.
    Load,
    /// A style swap finished loading.
    StyleLoad,
    /// A layer-scoped handler fired.
    Layer {
        handler: HandlerId,
        feature: Option<RenderedFeature>,
    },
    /// The user closed a popup from the map UI.
    PopupClosed(PopupHandle),
}

pub trait MapEngine {
    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), EngineError>;
    fn remove_source(&mut self, id: &str) -> Result<(), EngineError>;
    fn has_source(&self, id: &str) -> bool;
    fn set_source_data(&mut self, id: &str, data: Value) -> Result<(), EngineError>;

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), EngineError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), EngineError>;
    fn has_layer(&self, id: &str) -> bool;
    fn set_paint_property(&mut self, layer: &str, name: &str, value: Value)
        -> Result<(), EngineError>;

    fn has_image(&self, name: &str) -> bool;
    fn add_image(&mut self, name: &str, image: Bitmap) -> Result<(), EngineError>;

    fn fly_to(&mut self, options: CameraOptions);
    fn ease_to(&mut self, options: CameraOptions);
    fn fit_bounds(&mut self, bounds: LngLatBounds, options: FitOptions);
    fn cluster_expansion_zoom(&self, source: &str, cluster_id: u64) -> Result<f64, EngineError>;

    fn open_popup(&mut self, at: LngLat, html: &str) -> PopupHandle;
    fn set_popup_lng_lat(&mut self, popup: PopupHandle, at: LngLat);
    fn set_popup_html(&mut self, popup: PopupHandle, html: &str);
    fn remove_popup(&mut self, popup: PopupHandle);

    fn on(&mut self, kind: EventKind, layer: &str) -> HandlerId;
    fn off(&mut self, handler: HandlerId);

    /// Replaces the style. Sources, layers and images are discarded; layer
    /// event registrations are kept.
    fn set_style(&mut self, style_url: &str);
    fn add_control(&mut self, control: Control);
    fn set_cursor(&mut self, cursor: Cursor);
    fn destroy(&mut self);
}

/// Removes a layer if the engine has it.
pub fn remove_layer_if_present(engine: &mut dyn MapEngine, id: &str) -> Result<(), EngineError> {
    if engine.has_layer(id) {
        engine.remove_layer(id)?;
    }
    Ok(())
}

/// Removes a source if the engine has it. Layers using it must be gone first.
pub fn remove_source_if_present(engine: &mut dyn MapEngine, id: &str) -> Result<(), EngineError> {
    if engine.has_source(id) {
        engine.remove_source(id)?;
    }
    Ok(())
}
