// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Highlight for one selected sample of a device track, with a popup whose
//! address is resolved on demand.

use html_escape::encode_text;
use log::debug;
use serde_json::{json, Value};

use crate::config::MapConfig;
use crate::engine::{
    CameraOptions, EngineError, LayerKind, LayerSpec, MapEngine, PopupHandle, SourceSpec,
};
use crate::geo::LngLat;
use crate::geocode::{address_or_coordinates, ReverseGeocoder};
use crate::popup::{format_coordinates, format_timestamp, PopupController, KNOTS_TO_KMH};
use crate::model::TrackPoint;

pub const HISTORY_SOURCE: &str = "track-history-point";
pub const HISTORY_LAYER: &str = "track-history-point-layer";

/// A pending address lookup for the sample shown at the time it was made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddressRequest {
    generation: u64,
    pub lat: f64,
    pub lng: f64,
}

impl AddressRequest {
    pub async fn resolve(self, geocoder: &dyn ReverseGeocoder) -> ResolvedAddress {
        ResolvedAddress {
            generation: self.generation,
            address: address_or_coordinates(geocoder, self.lat, self.lng).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAddress {
    generation: u64,
    pub address: String,
}

#[derive(Debug, Default)]
pub struct TrackHistoryLayer {
    current: Option<TrackPoint>,
    popup: Option<PopupHandle>,
    generation: u64,
}

impl TrackHistoryLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&TrackPoint> {
        self.current.as_ref()
    }

    /// Highlights `sample`, flies to it and opens its popup.
    pub fn show(
        &mut self,
        engine: &mut dyn MapEngine,
        popup: &mut PopupController,
        sample: &TrackPoint,
        config: &MapConfig,
    ) -> Result<(), EngineError> {
        let at = LngLat::new(sample.longitude, sample.latitude);
        if !at.is_finite() {
            return Ok(());
        }

        self.generation += 1;
        self.current = Some(sample.clone());
        self.add(engine)?;

        engine.fly_to(CameraOptions::center(at).zoom(config.track_history_zoom));
        self.popup = Some(popup.open_html(engine, at, &sample_popup_html(sample, None)));
        debug!(
            "Showing track sample — device_id={} generation={}",
            sample.device_id, self.generation
        );
        Ok(())
    }

    /// (Re)creates the highlight source and layer for the current sample.
    /// Used after a style swap.
    pub fn add(&self, engine: &mut dyn MapEngine) -> Result<(), EngineError> {
        let data = sample_collection(self.current.as_ref());
        if engine.has_source(HISTORY_SOURCE) {
            engine.set_source_data(HISTORY_SOURCE, data)?;
        } else {
            engine.add_source(HISTORY_SOURCE, SourceSpec::geojson(data))?;
        }
        if !engine.has_layer(HISTORY_LAYER) {
            engine.add_layer(
                LayerSpec::new(HISTORY_LAYER, LayerKind::Circle, HISTORY_SOURCE)
                    .paint("circle-color", json!("#f59e0b"))
                    .paint("circle-radius", json!(9))
                    .paint("circle-stroke-width", json!(3))
                    .paint("circle-stroke-color", json!("#ffffff")),
            )?;
        }
        Ok(())
    }

    /// Lookup request for the sample currently shown.
    pub fn address_request(&self) -> Option<AddressRequest> {
        let sample = self.current.as_ref()?;
        Some(AddressRequest {
            generation: self.generation,
            lat: sample.latitude,
            lng: sample.longitude,
        })
    }

    /// Writes a resolved address into the popup. Results for a sample that is
    /// no longer shown, or whose popup has closed, are dropped.
    pub fn apply_address(
        &mut self,
        engine: &mut dyn MapEngine,
        popup: &mut PopupController,
        resolved: &ResolvedAddress,
    ) -> bool {
        if resolved.generation != self.generation || self.popup.is_none() || popup.handle() != self.popup {
            debug!("Dropping stale address — generation={}", resolved.generation);
            return false;
        }
        let Some(sample) = &self.current else {
            return false;
        };
        popup.set_html(engine, &sample_popup_html(sample, Some(&resolved.address)))
    }

    /// Removes the highlight and closes its popup if still open.
    pub fn clear(
        &mut self,
        engine: &mut dyn MapEngine,
        popup: &mut PopupController,
    ) -> Result<(), EngineError> {
        self.generation += 1;
        self.current = None;
        if self.popup.take().is_some_and(|h| popup.handle() == Some(h)) {
            popup.close(engine);
        }
        if engine.has_source(HISTORY_SOURCE) {
            engine.set_source_data(HISTORY_SOURCE, sample_collection(None))?;
        }
        Ok(())
    }
}

fn sample_collection(sample: Option<&TrackPoint>) -> Value {
    let features: Vec<Value> = sample
        .map(|s| {
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [s.longitude, s.latitude] },
                "properties": { "deviceId": s.device_id },
            })
        })
        .into_iter()
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

pub fn sample_popup_html(sample: &TrackPoint, resolved: Option<&str>) -> String {
    let mut lines = Vec::new();
    if let Some(time) = &sample.device_time {
        lines.push(format!("<strong>{}</strong>", format_timestamp(time)));
    }
    if let Some(speed) = sample.speed.filter(|v| v.is_finite()) {
        lines.push(format!("<div>Speed: {:.1} km/h</div>", speed * KNOTS_TO_KMH));
    }
    lines.push(format!(
        "<div>Location: {}</div>",
        format_coordinates(sample.latitude, sample.longitude)
    ));
    if let Some(start) = sample.start_address.as_deref().filter(|a| !a.trim().is_empty()) {
        lines.push(format!("<div>From: {}</div>", encode_text(start)));
    }
    if let Some(end) = sample.end_address.as_deref().filter(|a| !a.trim().is_empty()) {
        lines.push(format!("<div>To: {}</div>", encode_text(end)));
    }
    match resolved {
        Some(address) => lines.push(format!("<div>Address: {}</div>", encode_text(address))),
        None => lines.push(format!(
            "<button class=\"resolve-address\" data-lat=\"{}\" data-lng=\"{}\">Show address</button>",
            sample.latitude, sample.longitude
        )),
    }
    format!("<div class=\"track-popup\">{}</div>", lines.join(""))
}
