use crate::frame_adapter::GravityPolicy;
use crate::fusion::{FusionErrors, RateDivider};
use crate::position::PositionState;
use aerospace::wgs84::G0;
use nalgebra::{SVector, Vector3};
use rotations::prelude::{Quaternion, QuaternionErrors};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigErrors {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid fusion rate: {0}")]
    Fusion(#[from] FusionErrors),
    #[error("invalid initial orientation: {0}")]
    Quaternion(#[from] QuaternionErrors),
}

/// Initial conditions and noise for the 9 state position filter.
/// Matrices are given as diagonals ordered position, velocity, acceleration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimatorConfig {
    pub initial_state: PositionState,
    pub initial_covariance: SVector<f64, 9>,
    pub process_noise: SVector<f64, 9>,
    /// position fix variance per axis (m^2)
    pub gps_noise: Vector3<f64>,
    /// acceleration measurement variance per axis (m^2/s^4)
    pub accel_noise: Vector3<f64>,
}

impl Default for PositionEstimatorConfig {
    fn default() -> Self {
        Self {
            initial_state: PositionState::default(),
            initial_covariance: SVector::from_column_slice(&[
                1e6, 1e6, 1e6, 1e2, 1e2, 1e2, 1.0, 1.0, 1.0,
            ]),
            process_noise: SVector::from_column_slice(&[
                1e-2, 1e-2, 1e-2, 1e-3, 1e-3, 1e-3, 1e-2, 1e-2, 1e-2,
            ]),
            gps_noise: Vector3::repeat(25.0),
            accel_noise: Vector3::repeat(2.5e-3),
        }
    }
}

/// Initial conditions, noise and reference vectors shared by the attitude
/// filter variants. State diagonals are ordered qx, qy, qz, qw, wx, wy, wz.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttitudeEstimatorConfig {
    /// body to local-level, need not be normalized
    pub initial_orientation: Quaternion,
    pub initial_angular_rate: Vector3<f64>,
    pub initial_covariance: SVector<f64, 7>,
    pub process_noise: SVector<f64, 7>,
    pub accelerometer_noise: Vector3<f64>,
    pub magnetometer_noise: Vector3<f64>,
    /// specific force seen by a level accelerometer at rest, local-level frame
    pub vertical_reference: Vector3<f64>,
    /// local magnetic field, local-level frame
    pub magnetic_reference: Vector3<f64>,
}

impl Default for AttitudeEstimatorConfig {
    fn default() -> Self {
        Self {
            initial_orientation: Quaternion::IDENTITY,
            initial_angular_rate: Vector3::zeros(),
            initial_covariance: SVector::from_column_slice(&[
                0.1, 0.1, 0.1, 0.1, 1e-2, 1e-2, 1e-2,
            ]),
            process_noise: SVector::from_column_slice(&[
                1e-6, 1e-6, 1e-6, 1e-6, 1e-6, 1e-6, 1e-6,
            ]),
            accelerometer_noise: Vector3::repeat(2.5e-3),
            magnetometer_noise: Vector3::repeat(0.25),
            vertical_reference: Vector3::new(0.0, 0.0, -G0),
            // microtesla, mid latitude
            magnetic_reference: Vector3::new(20.0, 0.0, 45.0),
        }
    }
}

/// Tick-count decimation of each fusion branch. A rate of n samples the
/// branch on every n-th tick of its task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionRates {
    pub gnss: u32,
    pub accelerometer: u32,
    pub gyroscope: u32,
    /// accelerometer and magnetometer reference vectors
    pub references: u32,
}

impl Default for FusionRates {
    fn default() -> Self {
        Self { gnss: 10, accelerometer: 10, gyroscope: 1, references: 1 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationConfig {
    pub position: PositionEstimatorConfig,
    pub attitude: AttitudeEstimatorConfig,
    pub rates: FusionRates,
    pub gravity: GravityPolicy,
}

impl NavigationConfig {
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigErrors> {
        let config: Self = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigErrors> {
        let s = std::fs::read_to_string(path)?;
        Self::from_ron_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigErrors> {
        let FusionRates { gnss, accelerometer, gyroscope, references } = self.rates;
        for rate in [gnss, accelerometer, gyroscope, references] {
            RateDivider::new(rate)?;
        }
        self.attitude.initial_orientation.normalize()?;
        Ok(())
    }
}
