// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type DeviceId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Unknown => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "Online",
            DeviceStatus::Offline => "Offline",
            DeviceStatus::Unknown => "Unknown",
        }
    }

    /// Marker and popup color for this status.
    pub fn color(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "#22c55e",
            DeviceStatus::Offline => "#ef4444",
            DeviceStatus::Unknown => "#9ca3af",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<DeviceStatus>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

/// Device reference as sent by the backend: usually a number, sometimes a
/// numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceKey {
    Number(f64),
    Text(String),
}

impl DeviceKey {
    /// Coerces the key to a device id. Non-finite or fractional values yield `None`.
    pub fn to_id(&self) -> Option<DeviceId> {
        let value = match self {
            DeviceKey::Number(n) => *n,
            DeviceKey::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        if !value.is_finite() || value.fract() != 0.0 {
            return None;
        }
        Some(value as DeviceId)
    }
}

impl From<DeviceId> for DeviceKey {
    fn from(id: DeviceId) -> Self {
        DeviceKey::Number(id as f64)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAttributes {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub device_id: DeviceKey,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub course: Option<f64>,
    #[serde(default)]
    pub attributes: PositionAttributes,
    #[serde(default)]
    pub fix_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub description: Option<String>,
    /// An area that is missing or not a string is kept as `""`, which no
    /// parser accepts, so only this geofence is left off the map.
    #[serde(default, deserialize_with = "lenient_string")]
    pub area: String,
}

/// One historical sample of a device track.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub device_id: DeviceId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub device_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub start_address: Option<String>,
    #[serde(default)]
    pub end_address: Option<String>,
}

// Backend records are loosely typed. A field of the wrong type degrades to
// "absent" so that one bad record never rejects the whole snapshot.

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|v| v.is_finite()))
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

/// Read access to the latest domain data, pulled by the session whenever it
/// needs to rebuild.
pub trait FleetSnapshot {
    fn devices(&self) -> &[Device];
    fn positions(&self) -> &[Position];
    fn geofences(&self) -> &[Geofence];
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetData {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub geofences: Vec<Geofence>,
}

impl FleetSnapshot for FleetData {
    fn devices(&self) -> &[Device] {
        &self.devices
    }

    fn positions(&self) -> &[Position] {
        &self.positions
    }

    fn geofences(&self) -> &[Geofence] {
        &self.geofences
    }
}
