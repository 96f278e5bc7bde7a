use crate::wgs84::{A, B, E2};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

const MAX_ITERATIONS: usize = 10;
const LATITUDE_TOLERANCE: f64 = 1e-12; // rad

/// Geodetic coordinates on the WGS-84 ellipsoid.
/// Angles in radians, height in meters above the ellipsoid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Geodetic {
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
}

impl Geodetic {
    pub fn new(latitude: f64, longitude: f64, height: f64) -> Self {
        Self { latitude, longitude, height }
    }
}

/// Converts an ECEF position (m) to geodetic latitude, longitude and height.
///
/// Fixed point iteration on latitude starting from the zero height guess,
/// stops once the latitude update drops below 1e-12 rad or after
/// 10 iterations. Points on the polar axis are resolved directly.
pub fn ecef_to_geodetic(r: &Vector3<f64>) -> Geodetic {
    let (x, y, z) = (r[0], r[1], r[2]);
    let p = x.hypot(y);

    if p < 1e-9 {
        let latitude = if z < 0.0 { -FRAC_PI_2 } else { FRAC_PI_2 };
        return Geodetic::new(latitude, 0.0, z.abs() - B);
    }

    let longitude = y.atan2(x);
    let mut latitude = z.atan2(p * (1.0 - E2));

    for _ in 0..MAX_ITERATIONS {
        let n = prime_vertical_radius(latitude);
        let height = ellipsoid_height(p, z, latitude);
        let next = z.atan2(p * (1.0 - E2 * n / (n + height)));
        let converged = (next - latitude).abs() < LATITUDE_TOLERANCE;
        latitude = next;
        if converged {
            break;
        }
    }
    let height = ellipsoid_height(p, z, latitude);

    Geodetic::new(latitude, longitude, height)
}

/// Converts geodetic coordinates to an ECEF position (m).
pub fn geodetic_to_ecef(geodetic: &Geodetic) -> Vector3<f64> {
    let (sin_lat, cos_lat) = geodetic.latitude.sin_cos();
    let (sin_lon, cos_lon) = geodetic.longitude.sin_cos();
    let n = prime_vertical_radius(geodetic.latitude);

    Vector3::new(
        (n + geodetic.height) * cos_lat * cos_lon,
        (n + geodetic.height) * cos_lat * sin_lon,
        (n * (1.0 - E2) + geodetic.height) * sin_lat,
    )
}

fn prime_vertical_radius(latitude: f64) -> f64 {
    let sin_lat = latitude.sin();
    A / (1.0 - E2 * sin_lat * sin_lat).sqrt()
}

// valid at every latitude, unlike p / cos(lat) - n
fn ellipsoid_height(p: f64, z: f64, latitude: f64) -> f64 {
    let (sin_lat, cos_lat) = latitude.sin_cos();
    p * cos_lat + z * sin_lat - A * (1.0 - E2 * sin_lat * sin_lat).sqrt()
}
