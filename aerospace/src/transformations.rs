use nalgebra::{Matrix3, Vector3};
use rotations::prelude::RotationMatrix;

/// Rotation taking vectors in the local North-East-Down frame at the given
/// geodetic latitude and longitude (rad) into ECEF.
pub fn ecef_from_ned(latitude: f64, longitude: f64) -> RotationMatrix {
    let (sin_lat, cos_lat) = latitude.sin_cos();
    let (sin_lon, cos_lon) = longitude.sin_cos();

    let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
    let east = Vector3::new(-sin_lon, cos_lon, 0.0);
    let down = Vector3::new(-cos_lat * cos_lon, -cos_lat * sin_lon, -sin_lat);

    RotationMatrix::from(Matrix3::from_columns(&[north, east, down]))
}
