use nalgebra::Vector3;
use rotations::prelude::UnitQuaternion;
use serde::{Deserialize, Serialize};
use time::Timestamp;

/// Attitude (body to local-level) valid at `timestamp`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientationEstimate {
    pub orientation: UnitQuaternion,
    pub timestamp: Timestamp,
}

/// Earth-fixed position and velocity valid at `timestamp`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub timestamp: Timestamp,
}

pub trait OrientationProvider {
    fn predict(&mut self) -> OrientationEstimate;
}

pub trait PositionProvider {
    fn predict(&mut self) -> PositionEstimate;
}

impl<T: OrientationProvider + ?Sized> OrientationProvider for &mut T {
    fn predict(&mut self) -> OrientationEstimate {
        (**self).predict()
    }
}

impl<T: PositionProvider + ?Sized> PositionProvider for &mut T {
    fn predict(&mut self) -> PositionEstimate {
        (**self).predict()
    }
}

impl OrientationProvider for OrientationEstimate {
    fn predict(&mut self) -> OrientationEstimate {
        *self
    }
}

impl PositionProvider for PositionEstimate {
    fn predict(&mut self) -> PositionEstimate {
        *self
    }
}
