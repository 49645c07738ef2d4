// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::config::MapConfig;
use crate::engine::{EngineError, FitOptions, LayerKind, LayerSpec, MapEngine, SourceSpec};
use crate::geo::{LngLat, LngLatBounds};
use crate::model::{DeviceId, TrackPoint};

pub const TRACK_SOURCE: &str = "tracks";
pub const TRACK_LAYER: &str = "track-lines";

/// Id used for the placeholder case of an empty color expression. Real device
/// ids are positive.
const NO_DEVICE: DeviceId = -1;

/// History of one device as handed over by report screens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTrack {
    pub id: DeviceId,
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<TrackPoint>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub hide_track: bool,
    #[serde(default)]
    pub show_route: bool,
}

impl DeviceTrack {
    /// Points to draw, oldest first. A hidden track yields nothing unless its
    /// route was explicitly requested.
    pub fn visible_points(&self) -> Vec<&TrackPoint> {
        if self.hide_track && !self.show_route {
            return Vec::new();
        }
        let mut points: Vec<&TrackPoint> = self
            .tracks
            .iter()
            .filter(|p| p.latitude.is_finite() && p.longitude.is_finite())
            .collect();
        points.sort_by_key(|p| p.device_time);
        points
    }
}

/// One LineString per device with at least two drawable points.
pub fn track_collection(tracks: &[DeviceTrack]) -> Value {
    let features: Vec<Value> = tracks
        .iter()
        .filter_map(|track| {
            let points = track.visible_points();
            if points.len() < 2 {
                return None;
            }
            let coordinates: Vec<[f64; 2]> =
                points.iter().map(|p| [p.longitude, p.latitude]).collect();
            Some(json!({
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": coordinates },
                "properties": { "deviceId": track.id, "name": track.name },
            }))
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}

/// `match` expression coloring each line by its device. Labels must be
/// unique, so only the first colored track of a device counts.
pub fn color_expression(tracks: &[DeviceTrack], default_color: &str) -> Value {
    let mut expression = vec![json!("match"), json!(["get", "deviceId"])];
    let mut seen = HashSet::new();
    for track in tracks {
        if let Some(color) = &track.color {
            if !seen.insert(track.id) {
                continue;
            }
            expression.push(json!(track.id));
            expression.push(json!(color));
        }
    }
    if expression.len() == 2 {
        // A match needs at least one case to be valid.
        expression.push(json!(NO_DEVICE));
        expression.push(json!(default_color));
    }
    expression.push(json!(default_color));
    Value::Array(expression)
}

/// Draws `tracks`, creating the source and layer on first use.
pub fn update(
    engine: &mut dyn MapEngine,
    tracks: &[DeviceTrack],
    config: &MapConfig,
) -> Result<(), EngineError> {
    let data = track_collection(tracks);
    if engine.has_source(TRACK_SOURCE) {
        engine.set_source_data(TRACK_SOURCE, data)?;
    } else {
        engine.add_source(TRACK_SOURCE, SourceSpec::geojson(data))?;
    }

    let color = color_expression(tracks, &config.track_color);
    if engine.has_layer(TRACK_LAYER) {
        engine.set_paint_property(TRACK_LAYER, "line-color", color)?;
    } else {
        engine.add_layer(
            LayerSpec::new(TRACK_LAYER, LayerKind::Line, TRACK_SOURCE)
                .layout("line-join", json!("round"))
                .layout("line-cap", json!("round"))
                .paint("line-color", color)
                .paint("line-width", json!(4))
                .paint("line-opacity", json!(0.85)),
        )?;
    }
    Ok(())
}

/// Empties the track source, keeping the layer for the next update.
pub fn clear(engine: &mut dyn MapEngine) -> Result<(), EngineError> {
    if !engine.has_source(TRACK_SOURCE) {
        return Ok(());
    }
    engine.set_source_data(TRACK_SOURCE, track_collection(&[]))
}

/// Fits the camera to one device's track, or to all tracks when `target` is
/// `None`. Returns `false` when there is nothing to fit.
pub fn fit(
    engine: &mut dyn MapEngine,
    tracks: &[DeviceTrack],
    target: Option<DeviceId>,
    config: &MapConfig,
) -> bool {
    let bounds: LngLatBounds = tracks
        .iter()
        .filter(|t| target.map_or(true, |id| t.id == id))
        .flat_map(|t| t.visible_points())
        .map(|p| LngLat::new(p.longitude, p.latitude))
        .collect();
    if bounds.is_empty() {
        return false;
    }
    engine.fit_bounds(
        bounds,
        FitOptions {
            padding: config.fit_padding,
            max_zoom: Some(config.fit_max_zoom),
        },
    );
    true
}
