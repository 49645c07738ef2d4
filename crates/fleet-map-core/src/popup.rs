// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use chrono::{DateTime, Utc};
use html_escape::encode_text;
use log::debug;

use crate::engine::{MapEngine, PopupHandle};
use crate::features::{find_feature, DeviceFeature, DeviceProperties};
use crate::geo::LngLat;
use crate::model::DeviceId;

pub const KNOTS_TO_KMH: f64 = 1.852;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActivePopup {
    handle: PopupHandle,
    device_id: Option<DeviceId>,
}

/// Owns the single popup that may be open on the map.
#[derive(Debug, Default)]
pub struct PopupController {
    active: Option<ActivePopup>,
}

impl PopupController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn handle(&self) -> Option<PopupHandle> {
        self.active.map(|a| a.handle)
    }

    /// Device the open popup belongs to, if it is a device popup.
    pub fn device_id(&self) -> Option<DeviceId> {
        self.active.and_then(|a| a.device_id)
    }

    pub fn open_from_feature(
        &mut self,
        engine: &mut dyn MapEngine,
        feature: &DeviceFeature,
    ) -> PopupHandle {
        self.close(engine);
        let html = device_popup_html(&feature.properties);
        let handle = engine.open_popup(feature.coordinates(), &html);
        debug!(
            "Opened device popup — device_id={} popup={:?}",
            feature.device_id(),
            handle
        );
        self.active = Some(ActivePopup {
            handle,
            device_id: Some(feature.device_id()),
        });
        handle
    }

    pub fn open_for_device_id(
        &mut self,
        engine: &mut dyn MapEngine,
        device_id: DeviceId,
        features: &[DeviceFeature],
    ) -> Option<PopupHandle> {
        let feature = find_feature(features, device_id)?;
        Some(self.open_from_feature(engine, feature))
    }

    /// Opens a popup that is not tied to a device.
    pub fn open_html(&mut self, engine: &mut dyn MapEngine, at: LngLat, html: &str) -> PopupHandle {
        self.close(engine);
        let handle = engine.open_popup(at, html);
        self.active = Some(ActivePopup {
            handle,
            device_id: None,
        });
        handle
    }

    /// Refreshes the open popup in place with new device data.
    /// Returns `false` if nothing is open.
    pub fn update_content(&mut self, engine: &mut dyn MapEngine, feature: &DeviceFeature) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        engine.set_popup_html(active.handle, &device_popup_html(&feature.properties));
        engine.set_popup_lng_lat(active.handle, feature.coordinates());
        true
    }

    pub fn set_html(&mut self, engine: &mut dyn MapEngine, html: &str) -> bool {
        match self.active {
            Some(active) => {
                engine.set_popup_html(active.handle, html);
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self, engine: &mut dyn MapEngine) {
        if let Some(active) = self.active.take() {
            engine.remove_popup(active.handle);
        }
    }

    /// Drops the reference to a popup the engine already removed.
    /// Returns `true` if it was the active one.
    pub fn forget(&mut self, handle: PopupHandle) -> bool {
        if self.handle() == Some(handle) {
            self.active = None;
            true
        } else {
            false
        }
    }
}

pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_coordinates(lat: f64, lng: f64) -> String {
    format!("{:.5}, {:.5}", lat, lng)
}

/// Popup body for a device. Lines whose data is missing are left out.
pub fn device_popup_html(props: &DeviceProperties) -> String {
    let mut lines = vec![
        format!("<strong>{}</strong>", encode_text(&props.name)),
        format!(
            "<div>Status: <span style=\"color: {}\">{}</span></div>",
            props.status.color(),
            props.status.label()
        ),
    ];

    if let Some(speed) = props.speed.filter(|v| v.is_finite()) {
        lines.push(format!("<div>Speed: {:.1} km/h</div>", speed * KNOTS_TO_KMH));
    }
    if let Some(course) = props.course.filter(|v| v.is_finite()) {
        lines.push(format!("<div>Course: {}°</div>", course.round() as i64));
    }
    if let Some(address) = props.address.as_deref().filter(|a| !a.trim().is_empty()) {
        lines.push(format!("<div>Address: {}</div>", encode_text(address)));
    }
    if props.latitude.is_finite() && props.longitude.is_finite() {
        lines.push(format!(
            "<div>Location: {}</div>",
            format_coordinates(props.latitude, props.longitude)
        ));
    }
    if let Some(time) = &props.last_update {
        lines.push(format!("<div>Last update: {}</div>", format_timestamp(time)));
    }

    format!("<div class=\"device-popup\">{}</div>", lines.join(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessEngine;
    use crate::model::DeviceStatus;
    use chrono::TimeZone;

    fn feature(id: DeviceId, lat: f64, lng: f64) -> DeviceFeature {
        DeviceFeature {
            properties: DeviceProperties {
                device_id: id,
                name: "Van <1>".to_string(),
                status: DeviceStatus::Offline,
                speed: Some(10.0),
                course: Some(89.6),
                last_update: Some(Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap()),
                total_distance: 0.0,
                latitude: lat,
                longitude: lng,
                address: None,
            },
        }
    }

    #[test]
    fn test_html_contents() {
        let html = device_popup_html(&feature(1, 48.123456, 11.987654).properties);
        assert!(html.contains("Van &lt;1&gt;"));
        assert!(html.contains("#ef4444"));
        assert!(html.contains("Offline"));
        assert!(html.contains("18.5 km/h"));
        assert!(html.contains("Course: 90°"));
        assert!(html.contains("48.12346, 11.98765"));
        assert!(html.contains("2026-03-01 08:30:00"));
        assert!(!html.contains("Address"));
    }

    #[test]
    fn test_html_omits_missing_lines() {
        let mut f = feature(1, 0.0, 0.0);
        f.properties.speed = None;
        f.properties.course = None;
        f.properties.last_update = None;
        f.properties.address = Some("Main St 1".to_string());

        let html = device_popup_html(&f.properties);
        assert!(!html.contains("Speed"));
        assert!(!html.contains("Course"));
        assert!(!html.contains("Last update"));
        assert!(html.contains("Address: Main St 1"));
    }

    #[test]
    fn test_single_popup_at_a_time() {
        let mut engine = HeadlessEngine::new();
        let mut popups = PopupController::new();

        let first = popups.open_from_feature(&mut engine, &feature(1, 1.0, 1.0));
        let second = popups.open_from_feature(&mut engine, &feature(2, 2.0, 2.0));

        assert_ne!(first, second);
        assert_eq!(engine.open_popups().len(), 1);
        assert_eq!(popups.device_id(), Some(2));
    }

    #[test]
    fn test_open_for_missing_device_is_noop() {
        let mut engine = HeadlessEngine::new();
        let mut popups = PopupController::new();
        let features = vec![feature(1, 1.0, 1.0)];

        assert!(popups.open_for_device_id(&mut engine, 5, &features).is_none());
        assert!(!popups.is_open());
        assert!(popups.open_for_device_id(&mut engine, 1, &features).is_some());
    }

    #[test]
    fn test_update_keeps_same_popup() {
        let mut engine = HeadlessEngine::new();
        let mut popups = PopupController::new();
        let handle = popups.open_from_feature(&mut engine, &feature(1, 1.0, 1.0));

        assert!(popups.update_content(&mut engine, &feature(1, 3.0, 4.0)));
        assert_eq!(popups.handle(), Some(handle));
        let state = engine.popup(handle).unwrap();
        assert_eq!(state.at, LngLat::new(4.0, 3.0));
        assert_eq!(engine.popups_opened(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut engine = HeadlessEngine::new();
        let mut popups = PopupController::new();
        popups.close(&mut engine);

        popups.open_from_feature(&mut engine, &feature(1, 1.0, 1.0));
        popups.close(&mut engine);
        popups.close(&mut engine);
        assert!(!popups.is_open());
        assert!(engine.open_popups().is_empty());
    }
}
