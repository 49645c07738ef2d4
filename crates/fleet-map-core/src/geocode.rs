// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use futures::future::BoxFuture;
use log::debug;
use thiserror::Error;

use crate::popup::format_coordinates;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("Reverse geocoding failed: {0}")]
    Lookup(String),
}

/// Turns a coordinate into a street address.
pub trait ReverseGeocoder {
    fn reverse_geocode(&self, lat: f64, lng: f64) -> BoxFuture<'_, Result<Option<String>, GeocodeError>>;
}

/// Resolves an address, falling back to the formatted coordinates when the
/// lookup fails or finds nothing.
pub async fn address_or_coordinates(geocoder: &dyn ReverseGeocoder, lat: f64, lng: f64) -> String {
    match geocoder.reverse_geocode(lat, lng).await {
        Ok(Some(address)) if !address.trim().is_empty() => address,
        Ok(_) => format_coordinates(lat, lng),
        Err(e) => {
            debug!("Address lookup fell back to coordinates — lat={} lng={} error={}", lat, lng, e);
            format_coordinates(lat, lng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::FutureExt;

    struct Fixed(Result<Option<String>, GeocodeError>);

    impl ReverseGeocoder for Fixed {
        fn reverse_geocode(&self, _lat: f64, _lng: f64) -> BoxFuture<'_, Result<Option<String>, GeocodeError>> {
            futures::future::ready(self.0.clone()).boxed()
        }
    }

    #[test]
    fn test_address_found() {
        let geocoder = Fixed(Ok(Some("1 Harbour Rd".to_string())));
        assert_eq!(block_on(address_or_coordinates(&geocoder, 1.0, 2.0)), "1 Harbour Rd");
    }

    #[test]
    fn test_failure_and_empty_fall_back() {
        let failing = Fixed(Err(GeocodeError::Lookup("timeout".to_string())));
        assert_eq!(
            block_on(address_or_coordinates(&failing, 1.5, 2.25)),
            "1.50000, 2.25000"
        );
        let empty = Fixed(Ok(Some("  ".to_string())));
        assert_eq!(block_on(address_or_coordinates(&empty, 0.0, 0.0)), "0.00000, 0.00000");
    }
}
