// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use log::debug;
use serde_json::{json, Value};

use super::{halo_color, text_color};
use crate::config::Theme;
use crate::engine::{EngineError, LayerKind, LayerSpec, MapEngine, SourceSpec};
use crate::geo::geofence::parse_geofence;
use crate::model::Geofence;

pub const GEOFENCE_SOURCE: &str = "geofences";
pub const GEOFENCE_LABEL_SOURCE: &str = "geofence-labels";
pub const FILL_LAYER: &str = "geofence-fill";
pub const OUTLINE_LAYER: &str = "geofence-outline";
pub const LABEL_LAYER: &str = "geofence-label";

const GEOFENCE_COLOR: &str = "#8b5cf6";

/// Shape and label collections for a geofence list. Entries whose area does
/// not parse are absent from both.
pub fn geofence_collections(geofences: &[Geofence]) -> (Value, Value) {
    let mut shapes = Vec::new();
    let mut labels = Vec::new();

    for geofence in geofences {
        let Some(geometry) = parse_geofence(&geofence.area) else {
            debug!(
                "Skipping geofence with unparseable area — id={} area={:?}",
                geofence.id, geofence.area
            );
            continue;
        };
        let properties = json!({
            "id": geofence.id,
            "name": geofence.name,
            "description": geofence.description,
        });

        if let Some(anchor) = geometry.label_point() {
            labels.push(json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": anchor.to_array() },
                "properties": properties.clone(),
            }));
        }
        shapes.push(json!({
            "type": "Feature",
            "geometry": geometry.to_geojson(),
            "properties": properties,
        }));
    }

    (
        json!({ "type": "FeatureCollection", "features": shapes }),
        json!({ "type": "FeatureCollection", "features": labels }),
    )
}

/// Creates the geofence sources and layers unless they already exist.
pub fn add(engine: &mut dyn MapEngine, theme: Theme) -> Result<(), EngineError> {
    let empty = json!({ "type": "FeatureCollection", "features": [] });
    if !engine.has_source(GEOFENCE_SOURCE) {
        engine.add_source(GEOFENCE_SOURCE, SourceSpec::geojson(empty.clone()))?;
    }
    if !engine.has_source(GEOFENCE_LABEL_SOURCE) {
        engine.add_source(GEOFENCE_LABEL_SOURCE, SourceSpec::geojson(empty))?;
    }

    let dark = theme.is_dark();
    let layers = [
        LayerSpec::new(FILL_LAYER, LayerKind::Fill, GEOFENCE_SOURCE)
            .filter(json!(["==", ["geometry-type"], "Polygon"]))
            .paint("fill-color", json!(GEOFENCE_COLOR))
            .paint("fill-opacity", json!(0.15)),
        LayerSpec::new(OUTLINE_LAYER, LayerKind::Line, GEOFENCE_SOURCE)
            .paint("line-color", json!(GEOFENCE_COLOR))
            .paint("line-width", json!(2)),
        LayerSpec::new(LABEL_LAYER, LayerKind::Symbol, GEOFENCE_LABEL_SOURCE)
            .layout("text-field", json!(["get", "name"]))
            .layout("text-size", json!(12))
            .paint("text-color", json!(text_color(dark)))
            .paint("text-halo-color", json!(halo_color(dark)))
            .paint("text-halo-width", json!(1.5)),
    ];
    for layer in layers {
        if !engine.has_layer(&layer.id) {
            engine.add_layer(layer)?;
        }
    }
    Ok(())
}

/// Replaces both geofence collections. No-op until `add` has run.
pub fn update(engine: &mut dyn MapEngine, geofences: &[Geofence]) -> Result<bool, EngineError> {
    if !engine.has_source(GEOFENCE_SOURCE) || !engine.has_source(GEOFENCE_LABEL_SOURCE) {
        return Ok(false);
    }
    let (shapes, labels) = geofence_collections(geofences);
    engine.set_source_data(GEOFENCE_SOURCE, shapes)?;
    engine.set_source_data(GEOFENCE_LABEL_SOURCE, labels)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessEngine;

    fn geofence(id: i64, area: &str) -> Geofence {
        Geofence {
            id,
            name: format!("Zone {}", id),
            description: None,
            area: area.to_string(),
        }
    }

    #[test]
    fn test_collections_skip_bad_areas() {
        let list = vec![
            geofence(1, "CIRCLE (52.5 13.4, 300)"),
            geofence(2, "GARBAGE(1 2)"),
            geofence(3, "LINESTRING (52.0 13.0, 52.1 13.1)"),
        ];
        let (shapes, labels) = geofence_collections(&list);

        let ids: Vec<i64> = shapes["features"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["properties"]["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(labels["features"].as_array().unwrap().len(), 2);
        assert_eq!(labels["features"][0]["geometry"]["coordinates"][0], 13.4);
    }

    #[test]
    fn test_add_is_repeatable_and_update_pushes_data() {
        let mut engine = HeadlessEngine::new();
        assert!(!update(&mut engine, &[]).unwrap());

        add(&mut engine, Theme::Dark).unwrap();
        add(&mut engine, Theme::Dark).unwrap();
        assert_eq!(engine.layer_ids(), vec![FILL_LAYER, OUTLINE_LAYER, LABEL_LAYER]);

        assert!(update(&mut engine, &[geofence(1, "POLYGON((0 0, 0 1, 1 1, 0 0))")]).unwrap());
        let data = engine.source_data(GEOFENCE_SOURCE).unwrap();
        assert_eq!(data["features"][0]["geometry"]["type"], "Polygon");
        assert_eq!(
            engine.paint_property(LABEL_LAYER, "text-halo-color"),
            Some(&json!("#111827"))
        );
    }
}
