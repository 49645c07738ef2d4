// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::engine::RenderedFeature;
use crate::geo::{LngLat, LngLatBounds};
use crate::model::{Device, DeviceId, DeviceStatus, Position};

pub const UNKNOWN_DEVICE_NAME: &str = "Unknown device";

/// Display attributes carried by a device point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProperties {
    pub device_id: DeviceId,
    pub name: String,
    pub status: DeviceStatus,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
    pub total_distance: f64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFeature {
    pub properties: DeviceProperties,
}

impl DeviceFeature {
    pub fn device_id(&self) -> DeviceId {
        self.properties.device_id
    }

    pub fn coordinates(&self) -> LngLat {
        LngLat::new(self.properties.longitude, self.properties.latitude)
    }

    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": self.coordinates().to_array(),
            },
            "properties": self.properties,
        })
    }

    /// Rebuilds a device feature from one the engine reported under the cursor.
    /// The geometry wins over the `latitude`/`longitude` properties when present.
    pub fn from_rendered(feature: &RenderedFeature) -> Option<DeviceFeature> {
        let mut properties: DeviceProperties =
            serde_json::from_value(Value::Object(feature.properties.clone())).ok()?;
        if let Some(point) = feature.geometry.filter(LngLat::is_finite) {
            properties.longitude = point.lng;
            properties.latitude = point.lat;
        }
        Some(DeviceFeature { properties })
    }
}

/// Joins devices with their latest position into renderable points.
///
/// `positions` is expected newest-first; only the first position seen for each
/// device is used. Positions without a known device or with non-finite
/// coordinates are skipped. The order of the result is unspecified.
pub fn build_device_features(devices: &[Device], positions: &[Position]) -> Vec<DeviceFeature> {
    let devices_by_id: HashMap<DeviceId, &Device> = devices.iter().map(|d| (d.id, d)).collect();

    let mut latest: HashMap<DeviceId, &Position> = HashMap::new();
    for position in positions {
        let Some(id) = position.device_id.to_id() else {
            continue;
        };
        latest.entry(id).or_insert(position);
    }

    latest
        .into_iter()
        .filter_map(|(id, position)| {
            let device = devices_by_id.get(&id)?;
            let latitude = position.latitude.filter(|v| v.is_finite())?;
            let longitude = position.longitude.filter(|v| v.is_finite())?;

            Some(DeviceFeature {
                properties: DeviceProperties {
                    device_id: id,
                    name: device
                        .name
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string()),
                    status: device.status.unwrap_or_default(),
                    speed: position.speed.filter(|v| v.is_finite()),
                    course: position.course.filter(|v| v.is_finite()),
                    last_update: device.last_update,
                    total_distance: position
                        .attributes
                        .total_distance
                        .filter(|v| v.is_finite())
                        .unwrap_or(0.0),
                    latitude,
                    longitude,
                    address: position.address.clone(),
                },
            })
        })
        .collect()
}

pub fn feature_collection(features: &[DeviceFeature]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features.iter().map(DeviceFeature::to_geojson).collect::<Vec<_>>(),
    })
}

pub fn features_bounds(features: &[DeviceFeature]) -> LngLatBounds {
    features.iter().map(DeviceFeature::coordinates).collect()
}

pub fn find_feature(features: &[DeviceFeature], device_id: DeviceId) -> Option<&DeviceFeature> {
    features.iter().find(|f| f.device_id() == device_id)
}
