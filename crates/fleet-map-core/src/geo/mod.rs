// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

pub mod geofence;

use serde::{Deserialize, Serialize};

/// A coordinate in render order (longitude first).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(c: [f64; 2]) -> Self {
        Self { lng: c[0], lat: c[1] }
    }
}

/// Bounding box accumulator. Starts empty and grows with `extend`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LngLatBounds {
    bounds: Option<(LngLat, LngLat)>,
}

impl LngLatBounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, point: LngLat) {
        if !point.is_finite() {
            return;
        }
        self.bounds = Some(match self.bounds {
            None => (point, point),
            Some((sw, ne)) => (
                LngLat::new(sw.lng.min(point.lng), sw.lat.min(point.lat)),
                LngLat::new(ne.lng.max(point.lng), ne.lat.max(point.lat)),
            ),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    pub fn south_west(&self) -> Option<LngLat> {
        self.bounds.map(|(sw, _)| sw)
    }

    pub fn north_east(&self) -> Option<LngLat> {
        self.bounds.map(|(_, ne)| ne)
    }
}

impl FromIterator<LngLat> for LngLatBounds {
    fn from_iter<I: IntoIterator<Item = LngLat>>(iter: I) -> Self {
        let mut bounds = LngLatBounds::new();
        for point in iter {
            bounds.extend(point);
        }
        bounds
    }
}
