use serde::{Deserialize, Serialize};

pub const LON_RANGE: (f64, f64) = (-180.0, 180.0);
pub const LAT_RANGE: (f64, f64) = (-90.0, 90.0);

/// Geographic extent in WGS84 degrees.
///
/// A `GeoBounds` carries whatever numbers the backend handed us; use
/// [`GeoBounds::is_valid_wgs84`] (or [`GeoBounds::checked`]) before trusting it.
/// Values that look like projected coordinates (UTM metres) fail the gate.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoBounds {
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Returns the bounds only if they pass the WGS84 gate.
    ///
    /// Invalid input is treated as absent, never corrected.
    pub fn checked(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Option<Self> {
        is_valid_box(min_lon, min_lat, max_lon, max_lat)
            .then(|| Self::new(min_lon, min_lat, max_lon, max_lat))
    }

    pub fn is_valid_wgs84(&self) -> bool {
        is_valid_box(self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }

    /// South-west and north-east corners as `[lat, lon]` pairs.
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.min_lat, self.min_lon], [self.max_lat, self.max_lon]]
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min_lon + self.max_lon) * 0.5,
            (self.min_lat + self.max_lat) * 0.5,
        ]
    }
}

/// WGS84 validity gate for a `(min_lon, min_lat, max_lon, max_lat)` tuple.
///
/// NaN compares false against every bound and is rejected.
pub fn is_valid_box(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> bool {
    let lon_ok = |v: f64| v >= LON_RANGE.0 && v <= LON_RANGE.1;
    let lat_ok = |v: f64| v >= LAT_RANGE.0 && v <= LAT_RANGE.1;

    lon_ok(min_lon)
        && lon_ok(max_lon)
        && lat_ok(min_lat)
        && lat_ok(max_lat)
        && min_lon < max_lon
        && min_lat < max_lat
}
