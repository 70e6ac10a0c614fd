// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 The leadmarket-rs authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Great-circle distance between request and provider coordinates.
//!
//! Malformed coordinates never abort a scoring pass: [`GeoPoint::new`]
//! rejects them at construction and callers substitute
//! [`UNDEFINED_DISTANCE_KM`], which degrades the proximity component to zero
//! instead of excluding the candidate.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance assumed when one side has no usable coordinates.
///
/// Larger than any surface distance, so every proximity tier evaluates to
/// zero without special-casing.
pub const UNDEFINED_DISTANCE_KM: f64 = 1.0e5;

/// A validated geographic coordinate, stored as longitude/latitude to match
/// the GeoJSON-style `[lon, lat]` pairs the request documents carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    /// Returns `None` for non-finite values or out-of-range coordinates.
    pub fn new(lon: f64, lat: f64) -> Option<Self> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some(Self { lon, lat })
    }

    /// Convenience for the stored `[lon, lat]` representation.
    pub fn from_pair(pair: [f64; 2]) -> Option<Self> {
        Self::new(pair[0], pair[1])
    }
}

/// Great-circle distance in kilometers between two points (haversine formula).
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Distance between two optional points, falling back to
/// [`UNDEFINED_DISTANCE_KM`] when either side is missing.
pub fn distance_or_default(a: Option<GeoPoint>, b: Option<GeoPoint>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => haversine_km(a, b),
        _ => UNDEFINED_DISTANCE_KM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn london() -> GeoPoint {
        GeoPoint::new(-0.1278, 51.5074).unwrap()
    }

    fn manchester() -> GeoPoint {
        GeoPoint::new(-2.2426, 53.4808).unwrap()
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = london();
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn london_to_manchester_roughly_262_km() {
        let d = haversine_km(london(), manchester());
        assert!((d - 262.0).abs() < 5.0, "got {d} km");
    }

    #[test]
    fn distance_is_symmetric() {
        let d1 = haversine_km(london(), manchester());
        let d2 = haversine_km(manchester(), london());
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        assert!(GeoPoint::new(f64::NAN, 51.0).is_none());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_none());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(GeoPoint::new(181.0, 0.0).is_none());
        assert!(GeoPoint::new(0.0, -90.5).is_none());
        assert!(GeoPoint::new(180.0, 90.0).is_some());
    }

    #[test]
    fn missing_point_yields_default_distance() {
        assert_eq!(
            distance_or_default(None, Some(london())),
            UNDEFINED_DISTANCE_KM
        );
        assert_eq!(distance_or_default(None, None), UNDEFINED_DISTANCE_KM);
    }
}
