pub mod geodetic;
pub mod transformations;

/// WGS-84 reference ellipsoid.
pub mod wgs84 {
    /// semi-major axis (m)
    pub const A: f64 = 6378137.0;
    /// flattening
    pub const F: f64 = 1.0 / 298.257223563;
    /// semi-minor axis (m)
    pub const B: f64 = A * (1.0 - F);
    /// first eccentricity squared
    pub const E2: f64 = F * (2.0 - F);
    /// gravitational parameter (m^3/s^2)
    pub const MU: f64 = 3.986004415e14;
    /// normal gravity magnitude used for local-level compensation (m/s^2)
    pub const G0: f64 = 9.80665;
}
