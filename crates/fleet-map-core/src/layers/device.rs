// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Clustered device markers: one GeoJSON source, five layers, and the click
//! and hover wiring on top of them.

use log::{debug, warn};
use serde_json::{json, Value};

use super::{halo_color, text_color, HandlerSet};
use crate::config::{MapConfig, Theme};
use crate::engine::{
    remove_layer_if_present, remove_source_if_present, Bitmap, CameraOptions, EngineError,
    EventKind, FitOptions, HandlerId, LayerKind, LayerSpec, MapEngine, RenderedFeature,
    SourceSpec,
};
use crate::features::{feature_collection, features_bounds, DeviceFeature};
use crate::model::DeviceId;
use crate::popup::PopupController;

pub const DEVICE_SOURCE: &str = "devices";
pub const CLUSTER_LAYER: &str = "device-clusters";
pub const CLUSTER_COUNT_LAYER: &str = "device-cluster-count";
pub const POINT_LAYER: &str = "device-points";
pub const ARROW_LAYER: &str = "device-arrows";
pub const LABEL_LAYER: &str = "device-labels";
pub const ARROW_IMAGE: &str = "direction-arrow";

/// Layers in drawing order. Teardown walks this list before the source goes.
pub const DEVICE_LAYERS: [&str; 5] = [
    CLUSTER_LAYER,
    CLUSTER_COUNT_LAYER,
    POINT_LAYER,
    ARROW_LAYER,
    LABEL_LAYER,
];

const ARROW_SIZE: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceInteraction {
    ClusterClick,
    DeviceClick,
    PointerEnter,
    PointerLeave,
}

#[derive(Debug, Default)]
pub struct DeviceLayer {
    handlers: HandlerSet<DeviceInteraction>,
}

impl DeviceLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tears down whatever this manager put on the map and builds it again.
    /// Safe to call any number of times in a row.
    pub fn add(
        &mut self,
        engine: &mut dyn MapEngine,
        theme: Theme,
        config: &MapConfig,
        focused: Option<DeviceId>,
    ) -> Result<(), EngineError> {
        if !self.handlers.is_empty() {
            debug!("Replacing device handlers — previous={}", self.handlers.len());
            self.handlers.detach_all(engine);
        }
        for layer in DEVICE_LAYERS.iter().rev() {
            remove_layer_if_present(engine, layer)?;
        }
        remove_source_if_present(engine, DEVICE_SOURCE)?;

        if !engine.has_image(ARROW_IMAGE) {
            engine.add_image(ARROW_IMAGE, direction_arrow())?;
        }

        engine.add_source(
            DEVICE_SOURCE,
            SourceSpec::clustered(
                feature_collection(&[]),
                config.cluster_radius,
                config.cluster_max_zoom,
            ),
        )?;
        for layer in device_layers(theme.is_dark()) {
            engine.add_layer(layer)?;
        }

        self.handlers.register(engine, EventKind::Click, CLUSTER_LAYER, DeviceInteraction::ClusterClick);
        for layer in [POINT_LAYER, ARROW_LAYER, LABEL_LAYER] {
            self.handlers.register(engine, EventKind::Click, layer, DeviceInteraction::DeviceClick);
        }
        for layer in [CLUSTER_LAYER, POINT_LAYER] {
            self.handlers.register(engine, EventKind::MouseEnter, layer, DeviceInteraction::PointerEnter);
            self.handlers.register(engine, EventKind::MouseLeave, layer, DeviceInteraction::PointerLeave);
        }

        if focused.is_some() {
            set_label_visibility(engine, focused)?;
        }
        debug!(
            "Device layers added — theme={:?} handlers={} focused={:?}",
            theme,
            self.handlers.len(),
            focused
        );
        Ok(())
    }

    pub fn interaction(&self, handler: HandlerId) -> Option<DeviceInteraction> {
        self.handlers.action(handler)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn detach(&mut self, engine: &mut dyn MapEngine) {
        self.handlers.detach_all(engine);
    }
}

/// Pushes new features into the device source.
///
/// The first non-empty update with `has_fit_bounds == false` fits the camera
/// to all features and sets the flag; later updates never move the camera.
/// Returns `false` without touching anything when the source does not exist yet.
pub fn update_source_data(
    engine: &mut dyn MapEngine,
    features: &[DeviceFeature],
    has_fit_bounds: &mut bool,
    config: &MapConfig,
) -> Result<bool, EngineError> {
    if !engine.has_source(DEVICE_SOURCE) {
        return Ok(false);
    }
    engine.set_source_data(DEVICE_SOURCE, feature_collection(features))?;

    if !*has_fit_bounds && !features.is_empty() {
        let bounds = features_bounds(features);
        if !bounds.is_empty() {
            engine.fit_bounds(
                bounds,
                FitOptions {
                    padding: config.fit_padding,
                    max_zoom: Some(config.fit_max_zoom),
                },
            );
            *has_fit_bounds = true;
            debug!("Camera fitted to {} devices", features.len());
        }
    }
    Ok(true)
}

/// Hides the name label of `focused` and shows every other one.
/// `None` shows all labels. No-op while the label layer is missing.
pub fn set_label_visibility(
    engine: &mut dyn MapEngine,
    focused: Option<DeviceId>,
) -> Result<(), EngineError> {
    if !engine.has_layer(LABEL_LAYER) {
        return Ok(());
    }
    engine.set_paint_property(LABEL_LAYER, "text-opacity", label_opacity(focused))
}

fn label_opacity(focused: Option<DeviceId>) -> Value {
    match focused {
        Some(id) => json!(["case", ["==", ["get", "deviceId"], id], 0, 1]),
        None => json!(1),
    }
}

/// Zooms into a clicked cluster. Returns `false` when the cluster cannot be
/// expanded; the click is then ignored.
pub fn expand_cluster(engine: &mut dyn MapEngine, feature: &RenderedFeature) -> bool {
    let (Some(cluster_id), Some(center)) = (feature.cluster_id(), feature.geometry) else {
        return false;
    };
    match engine.cluster_expansion_zoom(DEVICE_SOURCE, cluster_id) {
        Ok(zoom) => {
            engine.ease_to(CameraOptions::center(center).zoom(zoom));
            true
        }
        Err(e) => {
            warn!("Cluster expansion failed — cluster_id={} error={}", cluster_id, e);
            false
        }
    }
}

/// Opens the popup for a clicked device and hides its label.
/// Returns the device to focus.
pub fn open_clicked_device(
    engine: &mut dyn MapEngine,
    popup: &mut PopupController,
    feature: &RenderedFeature,
) -> Result<Option<DeviceId>, EngineError> {
    let Some(device) = DeviceFeature::from_rendered(feature) else {
        return Ok(None);
    };
    popup.open_from_feature(engine, &device);
    set_label_visibility(engine, Some(device.device_id()))?;
    Ok(Some(device.device_id()))
}

fn unclustered() -> Value {
    json!(["!", ["has", "point_count"]])
}

fn device_layers(dark: bool) -> Vec<LayerSpec> {
    let cluster_colors = if dark {
        ["#38bdf8", "#0ea5e9", "#0369a1"]
    } else {
        ["#60a5fa", "#3b82f6", "#1d4ed8"]
    };

    vec![
        LayerSpec::new(CLUSTER_LAYER, LayerKind::Circle, DEVICE_SOURCE)
            .filter(json!(["has", "point_count"]))
            .paint(
                "circle-color",
                json!(["step", ["get", "point_count"], cluster_colors[0], 10, cluster_colors[1], 50, cluster_colors[2]]),
            )
            .paint("circle-radius", json!(["step", ["get", "point_count"], 18, 10, 24, 50, 30]))
            .paint("circle-stroke-width", json!(2))
            .paint("circle-stroke-color", json!(halo_color(dark))),
        LayerSpec::new(CLUSTER_COUNT_LAYER, LayerKind::Symbol, DEVICE_SOURCE)
            .filter(json!(["has", "point_count"]))
            .layout("text-field", json!(["get", "point_count_abbreviated"]))
            .layout("text-size", json!(12))
            .paint("text-color", json!("#ffffff")),
        LayerSpec::new(POINT_LAYER, LayerKind::Circle, DEVICE_SOURCE)
            .filter(unclustered())
            .paint(
                "circle-color",
                json!(["match", ["get", "status"], "online", "#22c55e", "offline", "#ef4444", "#9ca3af"]),
            )
            .paint("circle-radius", json!(8))
            .paint("circle-stroke-width", json!(2))
            .paint("circle-stroke-color", json!(halo_color(dark))),
        LayerSpec::new(ARROW_LAYER, LayerKind::Symbol, DEVICE_SOURCE)
            .filter(json!(["all", unclustered(), ["!=", ["get", "course"], null]]))
            .layout("icon-image", json!(ARROW_IMAGE))
            .layout("icon-rotate", json!(["coalesce", ["get", "course"], 0]))
            .layout("icon-rotation-alignment", json!("map"))
            .layout("icon-allow-overlap", json!(true))
            .layout("icon-size", json!(0.6)),
        LayerSpec::new(LABEL_LAYER, LayerKind::Symbol, DEVICE_SOURCE)
            .filter(unclustered())
            .layout("text-field", json!(["get", "name"]))
            .layout("text-size", json!(12))
            .layout("text-offset", json!([0, 1.4]))
            .layout("text-anchor", json!("top"))
            .paint("text-color", json!(text_color(dark)))
            .paint("text-halo-color", json!(halo_color(dark)))
            .paint("text-halo-width", json!(1.5))
            .paint("text-opacity", label_opacity(None)),
    ]
}

/// North-pointing triangle, rotated by the engine to the device course.
fn direction_arrow() -> Bitmap {
    let size = ARROW_SIZE as f64;
    let tip = (size / 2.0, 2.0);
    let right = (size - 4.0, size - 3.0);
    let left = (4.0, size - 3.0);

    let edge = |a: (f64, f64), b: (f64, f64), p: (f64, f64)| {
        (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
    };

    let mut rgba = Vec::with_capacity((ARROW_SIZE * ARROW_SIZE * 4) as usize);
    for y in 0..ARROW_SIZE {
        for x in 0..ARROW_SIZE {
            let p = (x as f64 + 0.5, y as f64 + 0.5);
            let w0 = edge(tip, right, p);
            let w1 = edge(right, left, p);
            let w2 = edge(left, tip, p);
            let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0) || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
            if inside {
                rgba.extend_from_slice(&[0x1f, 0x29, 0x37, 0xff]);
            } else {
                rgba.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }

    Bitmap {
        width: ARROW_SIZE,
        height: ARROW_SIZE,
        rgba,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::DeviceProperties;
    use crate::geo::LngLat;
    use crate::headless::{CameraCall, HeadlessEngine};
    use crate::model::DeviceStatus;

    fn feature(id: DeviceId, lng: f64, lat: f64) -> DeviceFeature {
        DeviceFeature {
            properties: DeviceProperties {
                device_id: id,
                name: format!("Device {}", id),
                status: DeviceStatus::Online,
                speed: None,
                course: Some(45.0),
                last_update: None,
                total_distance: 0.0,
                latitude: lat,
                longitude: lng,
                address: None,
            },
        }
    }

    #[test]
    fn test_add_creates_source_layers_and_arrow() {
        let mut engine = HeadlessEngine::new();
        let mut layer = DeviceLayer::new();
        layer
            .add(&mut engine, Theme::Light, &MapConfig::default(), None)
            .unwrap();

        assert_eq!(engine.layer_ids(), DEVICE_LAYERS.to_vec());
        assert!(engine.has_image_named(ARROW_IMAGE));
        match engine.source(DEVICE_SOURCE) {
            Some(SourceSpec::GeoJson {
                cluster,
                cluster_radius,
                cluster_max_zoom,
                ..
            }) => {
                assert!(*cluster);
                assert_eq!(*cluster_radius, Some(50));
                assert_eq!(*cluster_max_zoom, Some(14));
            }
            None => panic!("device source missing"),
        }
    }

    #[test]
    fn test_theme_changes_paint() {
        let mut engine = HeadlessEngine::new();
        let mut layer = DeviceLayer::new();
        let config = MapConfig::default();

        layer.add(&mut engine, Theme::Light, &config, None).unwrap();
        let light = engine.paint_property(LABEL_LAYER, "text-color").cloned();
        layer.add(&mut engine, Theme::Dark, &config, None).unwrap();
        let dark = engine.paint_property(LABEL_LAYER, "text-color").cloned();

        assert_ne!(light, dark);
    }

    #[test]
    fn test_arrow_image_registered_once() {
        let mut engine = HeadlessEngine::new();
        let mut layer = DeviceLayer::new();
        let config = MapConfig::default();
        for _ in 0..3 {
            layer.add(&mut engine, Theme::Light, &config, None).unwrap();
        }
        assert_eq!(engine.images_added(), 1);
    }

    #[test]
    fn test_arrow_bitmap_shape() {
        let arrow = direction_arrow();
        assert_eq!(arrow.rgba.len(), (ARROW_SIZE * ARROW_SIZE * 4) as usize);
        let alpha = |x: u32, y: u32| arrow.rgba[((y * ARROW_SIZE + x) * 4 + 3) as usize];
        // Solid near the base center, empty in the top corners.
        assert_eq!(alpha(12, 18), 0xff);
        assert_eq!(alpha(0, 0), 0);
        assert_eq!(alpha(23, 0), 0);
    }

    #[test]
    fn test_update_before_add_is_noop() {
        let mut engine = HeadlessEngine::new();
        let mut fitted = false;
        let pushed = update_source_data(
            &mut engine,
            &[feature(1, 1.0, 1.0)],
            &mut fitted,
            &MapConfig::default(),
        )
        .unwrap();
        assert!(!pushed);
        assert!(!fitted);
        assert!(engine.camera_calls().is_empty());
    }

    #[test]
    fn test_fit_bounds_only_once() {
        let mut engine = HeadlessEngine::new();
        let config = MapConfig::default();
        DeviceLayer::new()
            .add(&mut engine, Theme::Light, &config, None)
            .unwrap();

        let mut fitted = false;
        update_source_data(&mut engine, &[], &mut fitted, &config).unwrap();
        assert!(!fitted);

        let features = vec![feature(1, 10.0, 50.0), feature(2, 12.0, 52.0)];
        update_source_data(&mut engine, &features, &mut fitted, &config).unwrap();
        update_source_data(&mut engine, &features, &mut fitted, &config).unwrap();

        assert!(fitted);
        assert_eq!(engine.fit_bounds_calls(), 1);
        match engine.last_camera_call() {
            Some(CameraCall::FitBounds(bounds, options)) => {
                assert_eq!(bounds.south_west(), Some(LngLat::new(10.0, 50.0)));
                assert_eq!(bounds.north_east(), Some(LngLat::new(12.0, 52.0)));
                assert_eq!(options.padding, 50.0);
            }
            other => panic!("unexpected camera call {:?}", other),
        }
        let data = engine.source_data(DEVICE_SOURCE).unwrap();
        assert_eq!(data["features"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_label_visibility_expression() {
        let mut engine = HeadlessEngine::new();
        set_label_visibility(&mut engine, Some(3)).unwrap();

        DeviceLayer::new()
            .add(&mut engine, Theme::Light, &MapConfig::default(), None)
            .unwrap();
        set_label_visibility(&mut engine, Some(3)).unwrap();
        assert_eq!(
            engine.paint_property(LABEL_LAYER, "text-opacity"),
            Some(&json!(["case", ["==", ["get", "deviceId"], 3], 0, 1]))
        );

        set_label_visibility(&mut engine, None).unwrap();
        assert_eq!(engine.paint_property(LABEL_LAYER, "text-opacity"), Some(&json!(1)));
    }

    #[test]
    fn test_rebuild_keeps_focused_label_hidden() {
        let mut engine = HeadlessEngine::new();
        let mut layer = DeviceLayer::new();
        let config = MapConfig::default();
        layer.add(&mut engine, Theme::Light, &config, Some(8)).unwrap();
        layer.add(&mut engine, Theme::Dark, &config, Some(8)).unwrap();

        assert_eq!(
            engine.paint_property(LABEL_LAYER, "text-opacity"),
            Some(&json!(["case", ["==", ["get", "deviceId"], 8], 0, 1]))
        );
    }

    #[test]
    fn test_cluster_expansion() {
        let mut engine = HeadlessEngine::new();
        DeviceLayer::new()
            .add(&mut engine, Theme::Light, &MapConfig::default(), None)
            .unwrap();
        engine.set_cluster_zoom(77, 11.0);

        let mut cluster = RenderedFeature {
            geometry: Some(LngLat::new(5.0, 6.0)),
            ..Default::default()
        };
        assert!(!expand_cluster(&mut engine, &cluster));

        cluster.properties.insert("cluster_id".to_string(), json!(77));
        assert!(expand_cluster(&mut engine, &cluster));
        assert_eq!(
            engine.last_camera_call(),
            Some(&CameraCall::EaseTo(
                CameraOptions::center(LngLat::new(5.0, 6.0)).zoom(11.0)
            ))
        );

        cluster.properties.insert("cluster_id".to_string(), json!(78));
        assert!(!expand_cluster(&mut engine, &cluster));
        assert_eq!(engine.camera_calls().len(), 1);
    }
}
