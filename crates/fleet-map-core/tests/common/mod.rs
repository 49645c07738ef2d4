#![allow(dead_code)]

use fleet_map_core::engine::{EngineEvent, RenderedFeature};
use fleet_map_core::headless::HeadlessEngine;
use fleet_map_core::{DeviceFeature, FleetData, MapConfig, MapSession, Theme};
use serde_json::json;

/// Fleet snapshot with one position per `(device_id, lat, lng)`.
pub fn fleet(devices: &[(i64, f64, f64)]) -> FleetData {
    let value = json!({
        "devices": devices.iter().map(|(id, _, _)| json!({
            "id": id,
            "name": format!("Unit {}", id),
            "status": "online",
        })).collect::<Vec<_>>(),
        "positions": devices.iter().map(|(id, lat, lng)| json!({
            "deviceId": id,
            "latitude": lat,
            "longitude": lng,
            "speed": 12.0,
            "course": 180.0,
        })).collect::<Vec<_>>(),
    });
    serde_json::from_value(value).unwrap()
}

pub fn ready_session(data: &FleetData) -> MapSession<HeadlessEngine> {
    let mut session = MapSession::new(MapConfig::default(), Theme::Light);
    assert!(session.mount(HeadlessEngine::from_config));
    session.handle_event(EngineEvent::Load, data);
    session
}

pub fn rendered(feature: &DeviceFeature) -> RenderedFeature {
    let value = feature.to_geojson();
    RenderedFeature {
        geometry: Some(feature.coordinates()),
        properties: value["properties"].as_object().cloned().unwrap(),
    }
}

/// Clicks `device_id` on `layer` and feeds every resulting event back.
pub fn click_device(
    session: &mut MapSession<HeadlessEngine>,
    data: &FleetData,
    layer: &str,
    device_id: i64,
) {
    let feature = session
        .features()
        .iter()
        .find(|f| f.device_id() == device_id)
        .cloned()
        .unwrap();
    let events = session.engine().unwrap().click(layer, rendered(&feature));
    for event in events {
        session.handle_event(event, data);
    }
}
