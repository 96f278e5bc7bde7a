use crate::providers::{OrientationProvider, PositionProvider};
use crate::sensors::Accelerometer;
use aerospace::geodetic::ecef_to_geodetic;
use aerospace::transformations::ecef_from_ned;
use aerospace::wgs84::G0;
use nalgebra::Vector3;
use rotations::RotationTrait;
use serde::{Deserialize, Serialize};

/// What to do with gravity once a reading is in the local-level frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum GravityPolicy {
    #[default]
    NoCompensation,
    /// Subtracts `gravity_ned`, the local gravity in North-East-Down.
    SubtractLocalGravity { gravity_ned: Vector3<f64> },
}

impl GravityPolicy {
    pub fn subtract_standard_gravity() -> Self {
        Self::SubtractLocalGravity { gravity_ned: Vector3::new(0.0, 0.0, G0) }
    }

    pub fn apply(&self, local_level: &Vector3<f64>) -> Vector3<f64> {
        match self {
            Self::NoCompensation => *local_level,
            Self::SubtractLocalGravity { gravity_ned } => local_level - gravity_ned,
        }
    }
}

/// Accelerometer whose readings come out in ECEF.
///
/// Each body reading is rotated into NED with the current attitude, passed
/// through the gravity policy, then rotated into ECEF at the geodetic
/// latitude and longitude of the current position.
#[derive(Clone, Debug)]
pub struct FrameAdapter<S, O, P> {
    sensor: S,
    orientation: O,
    position: P,
    policy: GravityPolicy,
}

impl<S, O, P> FrameAdapter<S, O, P>
where
    S: Accelerometer,
    O: OrientationProvider,
    P: PositionProvider,
{
    pub fn new(sensor: S, orientation: O, position: P, policy: GravityPolicy) -> Self {
        Self { sensor, orientation, position, policy }
    }

    pub fn policy(&self) -> &GravityPolicy {
        &self.policy
    }

    /// Applies the frame chain to a reading without touching the sensor.
    pub fn adapt(&mut self, body: &Vector3<f64>) -> Vector3<f64> {
        let attitude = self.orientation.predict();
        let local_level = self.policy.apply(&attitude.orientation.rotate(body));

        let location = ecef_to_geodetic(&self.position.predict().position);
        ecef_from_ned(location.latitude, location.longitude).rotate(&local_level)
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn orientation_mut(&mut self) -> &mut O {
        &mut self.orientation
    }

    pub fn position_mut(&mut self) -> &mut P {
        &mut self.position
    }

    pub fn into_parts(self) -> (S, O, P) {
        (self.sensor, self.orientation, self.position)
    }
}

impl<S, O, P> Accelerometer for FrameAdapter<S, O, P>
where
    S: Accelerometer,
    O: OrientationProvider,
    P: PositionProvider,
{
    fn read_accelerometer(&mut self) -> Option<Vector3<f64>> {
        let body = self.sensor.read_accelerometer()?;
        Some(self.adapt(&body))
    }
}
