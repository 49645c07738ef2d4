// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! In-memory [`MapEngine`] that renders nothing and records everything.
//!
//! It enforces the same structural rules as a real engine (no duplicate ids,
//! layers need their source, a source cannot go while a layer uses it) and
//! keeps layer event registrations across style swaps.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::config::MapConfig;
use crate::engine::{
    Bitmap, CameraOptions, Control, Cursor, EngineError, EngineEvent, EventKind, FitOptions,
    HandlerId, LayerSpec, MapEngine, PopupHandle, RenderedFeature, SourceSpec,
};
use crate::geo::{LngLat, LngLatBounds};

#[derive(Debug, Clone, PartialEq)]
pub enum CameraCall {
    FlyTo(CameraOptions),
    EaseTo(CameraOptions),
    FitBounds(LngLatBounds, FitOptions),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupState {
    pub at: LngLat,
    pub html: String,
}

#[derive(Debug, Default)]
pub struct HeadlessEngine {
    style: Option<String>,
    initial_camera: Option<CameraOptions>,
    sources: HashMap<String, SourceSpec>,
    layers: Vec<LayerSpec>,
    images: HashMap<String, Bitmap>,
    handlers: BTreeMap<HandlerId, (EventKind, String)>,
    popups: BTreeMap<PopupHandle, PopupState>,
    cluster_zooms: HashMap<u64, f64>,
    camera: Vec<CameraCall>,
    controls: Vec<Control>,
    cursor: Option<Cursor>,
    next_id: u64,
    popups_opened: usize,
    images_added: usize,
    destroy_calls: usize,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(style_url: &str) -> Self {
        Self {
            style: Some(style_url.to_string()),
            ..Self::default()
        }
    }

    /// Engine opened at the configured initial view.
    pub fn from_config(config: &MapConfig, style_url: &str) -> Self {
        Self {
            initial_camera: Some(
                CameraOptions::center(LngLat::from(config.initial_center)).zoom(config.initial_zoom),
            ),
            ..Self::with_style(style_url)
        }
    }

    pub fn initial_camera(&self) -> Option<&CameraOptions> {
        self.initial_camera.as_ref()
    }

    /// Answer returned by `cluster_expansion_zoom` for `cluster_id`.
    pub fn set_cluster_zoom(&mut self, cluster_id: u64, zoom: f64) {
        self.cluster_zooms.insert(cluster_id, zoom);
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id)
    }

    pub fn source_data(&self, id: &str) -> Option<&Value> {
        match self.sources.get(id)? {
            SourceSpec::GeoJson { data, .. } => Some(data),
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layer ids in drawing order.
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn paint_property(&self, layer: &str, name: &str) -> Option<&Value> {
        self.layer(layer)?.paint.get(name)
    }

    pub fn handlers_for(&self, kind: EventKind, layer: &str) -> Vec<HandlerId> {
        self.handlers
            .iter()
            .filter(|(_, (k, l))| *k == kind && l == layer)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Simulates a pointer event on `layer`: one event per live registration.
    pub fn trigger(
        &self,
        kind: EventKind,
        layer: &str,
        feature: Option<RenderedFeature>,
    ) -> Vec<EngineEvent> {
        self.handlers_for(kind, layer)
            .into_iter()
            .map(|handler| EngineEvent::Layer {
                handler,
                feature: feature.clone(),
            })
            .collect()
    }

    pub fn click(&self, layer: &str, feature: RenderedFeature) -> Vec<EngineEvent> {
        self.trigger(EventKind::Click, layer, Some(feature))
    }

    /// Simulates the user closing the popup from its close button.
    pub fn close_popup_by_user(&mut self, popup: PopupHandle) -> Option<EngineEvent> {
        self.popups
            .remove(&popup)
            .map(|_| EngineEvent::PopupClosed(popup))
    }

    pub fn popup(&self, handle: PopupHandle) -> Option<&PopupState> {
        self.popups.get(&handle)
    }

    pub fn open_popups(&self) -> Vec<PopupHandle> {
        self.popups.keys().copied().collect()
    }

    /// Total popups created over the engine's life.
    pub fn popups_opened(&self) -> usize {
        self.popups_opened
    }

    pub fn has_image_named(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    pub fn images_added(&self) -> usize {
        self.images_added
    }

    pub fn camera_calls(&self) -> &[CameraCall] {
        &self.camera
    }

    pub fn last_camera_call(&self) -> Option<&CameraCall> {
        self.camera.last()
    }

    pub fn fit_bounds_calls(&self) -> usize {
        self.camera
            .iter()
            .filter(|c| matches!(c, CameraCall::FitBounds(..)))
            .count()
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl MapEngine for HeadlessEngine {
    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), EngineError> {
        if self.sources.contains_key(id) {
            return Err(EngineError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), source);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), EngineError> {
        if self.layers.iter().any(|l| l.source == id) {
            return Err(EngineError::SourceInUse(id.to_string()));
        }
        self.sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::SourceNotFound(id.to_string()))
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn set_source_data(&mut self, id: &str, data: Value) -> Result<(), EngineError> {
        match self.sources.get_mut(id) {
            Some(SourceSpec::GeoJson { data: current, .. }) => {
                *current = data;
                Ok(())
            }
            None => Err(EngineError::SourceNotFound(id.to_string())),
        }
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), EngineError> {
        if self.has_layer(&layer.id) {
            return Err(EngineError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(EngineError::SourceNotFound(layer.source));
        }
        self.layers.push(layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), EngineError> {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() == before {
            return Err(EngineError::LayerNotFound(id.to_string()));
        }
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn set_paint_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        let spec = self
            .layers
            .iter_mut()
            .find(|l| l.id == layer)
            .ok_or_else(|| EngineError::LayerNotFound(layer.to_string()))?;
        spec.paint.insert(name.to_string(), value);
        Ok(())
    }

    fn has_image(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    fn add_image(&mut self, name: &str, image: Bitmap) -> Result<(), EngineError> {
        self.images.insert(name.to_string(), image);
        self.images_added += 1;
        Ok(())
    }

    fn fly_to(&mut self, options: CameraOptions) {
        self.camera.push(CameraCall::FlyTo(options));
    }

    fn ease_to(&mut self, options: CameraOptions) {
        self.camera.push(CameraCall::EaseTo(options));
    }

    fn fit_bounds(&mut self, bounds: LngLatBounds, options: FitOptions) {
        self.camera.push(CameraCall::FitBounds(bounds, options));
    }

    fn cluster_expansion_zoom(&self, source: &str, cluster_id: u64) -> Result<f64, EngineError> {
        if !self.sources.contains_key(source) {
            return Err(EngineError::SourceNotFound(source.to_string()));
        }
        self.cluster_zooms
            .get(&cluster_id)
            .copied()
            .ok_or(EngineError::ClusterUnavailable(cluster_id))
    }

    fn open_popup(&mut self, at: LngLat, html: &str) -> PopupHandle {
        let handle = PopupHandle(self.next_id());
        self.popups.insert(
            handle,
            PopupState {
                at,
                html: html.to_string(),
            },
        );
        self.popups_opened += 1;
        handle
    }

    fn set_popup_lng_lat(&mut self, popup: PopupHandle, at: LngLat) {
        if let Some(state) = self.popups.get_mut(&popup) {
            state.at = at;
        }
    }

    fn set_popup_html(&mut self, popup: PopupHandle, html: &str) {
        if let Some(state) = self.popups.get_mut(&popup) {
            state.html = html.to_string();
        }
    }

    fn remove_popup(&mut self, popup: PopupHandle) {
        self.popups.remove(&popup);
    }

    fn on(&mut self, kind: EventKind, layer: &str) -> HandlerId {
        let id = HandlerId(self.next_id());
        self.handlers.insert(id, (kind, layer.to_string()));
        id
    }

    fn off(&mut self, handler: HandlerId) {
        self.handlers.remove(&handler);
    }

    fn set_style(&mut self, style_url: &str) {
        self.style = Some(style_url.to_string());
        self.layers.clear();
        self.sources.clear();
        self.images.clear();
    }

    fn add_control(&mut self, control: Control) {
        self.controls.push(control);
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = Some(cursor);
    }

    fn destroy(&mut self) {
        self.destroy_calls += 1;
        self.layers.clear();
        self.sources.clear();
        self.popups.clear();
        self.handlers.clear();
    }
}
