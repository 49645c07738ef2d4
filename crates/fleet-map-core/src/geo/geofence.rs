// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Parser for the geofence `area` strings stored by the tracking backend.
//!
//! Three shapes are understood, all with latitude before longitude:
//! `CIRCLE (lat lng, radius)`, `POLYGON ((lat lng, lat lng, ...))` and
//! `LINESTRING (lat lng, lat lng, ...)`. Output coordinates are `[lng, lat]`.

use regex::Regex;
use serde_json::{json, Value};
use std::f64::consts::PI;
use std::sync::OnceLock;

use super::LngLat;

/// Meters per degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;
/// Vertices used to approximate a circle, excluding the closing vertex.
pub const CIRCLE_SEGMENTS: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum GeofenceGeometry {
    Polygon {
        rings: Vec<Vec<[f64; 2]>>,
        /// Set for circles; polygons derive their anchor from the outer ring.
        center: Option<[f64; 2]>,
    },
    LineString {
        coordinates: Vec<[f64; 2]>,
        center: [f64; 2],
    },
}

impl GeofenceGeometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            GeofenceGeometry::Polygon { .. } => "Polygon",
            GeofenceGeometry::LineString { .. } => "LineString",
        }
    }

    /// Where the geofence name label is placed.
    pub fn label_point(&self) -> Option<LngLat> {
        match self {
            GeofenceGeometry::Polygon {
                center: Some(center),
                ..
            } => Some(LngLat::from(*center)),
            GeofenceGeometry::Polygon { rings, center: None } => {
                rings.first().and_then(|ring| calculate_centroid(ring))
            }
            GeofenceGeometry::LineString { center, .. } => Some(LngLat::from(*center)),
        }
    }

    /// GeoJSON geometry object.
    pub fn to_geojson(&self) -> Value {
        match self {
            GeofenceGeometry::Polygon { rings, .. } => {
                json!({ "type": "Polygon", "coordinates": rings })
            }
            GeofenceGeometry::LineString { coordinates, .. } => {
                json!({ "type": "LineString", "coordinates": coordinates })
            }
        }
    }
}

pub fn parse_geofence(area: &str) -> Option<GeofenceGeometry> {
    let area = area.trim();
    if area.starts_with("CIRCLE") {
        parse_circle(area)
    } else if area.starts_with("POLYGON") {
        parse_polygon(area)
    } else if area.starts_with("LINESTRING") {
        parse_linestring(area)
    } else {
        None
    }
}

/// Approximates `CIRCLE (lat lng, radius)` with a closed 64-segment ring.
///
/// Radius is in meters. Latitude and longitude radii are computed
/// independently, so the result is only accurate for local-scale circles away
/// from the poles.
pub fn parse_circle(area: &str) -> Option<GeofenceGeometry> {
    static CIRCLE_RE: OnceLock<Regex> = OnceLock::new();
    let re = CIRCLE_RE.get_or_init(|| {
        Regex::new(r"^CIRCLE\s*\(\s*(\S+)\s+(\S+)\s*,\s*(\S+)\s*\)$").unwrap()
    });

    let caps = re.captures(area.trim())?;
    let lat = parse_number(&caps[1])?;
    let lng = parse_number(&caps[2])?;
    let radius = parse_number(&caps[3])?;
    if radius <= 0.0 {
        return None;
    }

    let d_lat = radius / METERS_PER_DEGREE;
    let d_lng = d_lat / lat.to_radians().cos();

    let mut ring: Vec<[f64; 2]> = (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let theta = (i as f64 / CIRCLE_SEGMENTS as f64) * 2.0 * PI;
            [lng + d_lng * theta.cos(), lat + d_lat * theta.sin()]
        })
        .collect();
    ring.push(ring[0]);

    Some(GeofenceGeometry::Polygon {
        rings: vec![ring],
        center: Some([lng, lat]),
    })
}

fn parse_polygon(area: &str) -> Option<GeofenceGeometry> {
    static POLYGON_RE: OnceLock<Regex> = OnceLock::new();
    let re = POLYGON_RE
        .get_or_init(|| Regex::new(r"^POLYGON\s*\(\s*\((.*)\)\s*\)$").unwrap());

    let caps = re.captures(area.trim())?;
    let mut ring = parse_pairs(&caps[1])?;
    if ring.len() < 3 {
        return None;
    }
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }

    Some(GeofenceGeometry::Polygon {
        rings: vec![ring],
        center: None,
    })
}

fn parse_linestring(area: &str) -> Option<GeofenceGeometry> {
    static LINESTRING_RE: OnceLock<Regex> = OnceLock::new();
    let re = LINESTRING_RE.get_or_init(|| Regex::new(r"^LINESTRING\s*\((.*)\)$").unwrap());

    let caps = re.captures(area.trim())?;
    let coordinates = parse_pairs(&caps[1])?;
    if coordinates.len() < 2 {
        return None;
    }

    let count = coordinates.len() as f64;
    let (sum_lng, sum_lat) = coordinates
        .iter()
        .fold((0.0, 0.0), |(x, y), c| (x + c[0], y + c[1]));

    Some(GeofenceGeometry::LineString {
        center: [sum_lng / count, sum_lat / count],
        coordinates,
    })
}

/// Mean of a closed ring's vertices. The closing vertex duplicates the first
/// one and is left out of the divisor, so a ring of `n` points divides by `n - 1`.
pub fn calculate_centroid(ring: &[[f64; 2]]) -> Option<LngLat> {
    if ring.len() < 2 {
        return None;
    }
    let count = (ring.len() - 1) as f64;
    let (sum_lng, sum_lat) = ring[..ring.len() - 1]
        .iter()
        .fold((0.0, 0.0), |(x, y), c| (x + c[0], y + c[1]));
    Some(LngLat::new(sum_lng / count, sum_lat / count))
}

/// Parses `"lat lng, lat lng"` into `[lng, lat]` pairs.
fn parse_pairs(body: &str) -> Option<Vec<[f64; 2]>> {
    body.split(',')
        .map(|pair| {
            let mut parts = pair.split_whitespace();
            let lat = parse_number(parts.next()?)?;
            let lng = parse_number(parts.next()?)?;
            if parts.next().is_some() {
                return None;
            }
            Some([lng, lat])
        })
        .collect()
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}
