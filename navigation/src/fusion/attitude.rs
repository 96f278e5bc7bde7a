use super::{FusionErrors, RateDivider, Validity};
use crate::attitude::{AttitudeFilter, ReferenceUpdate};
use crate::providers::{OrientationEstimate, OrientationProvider};
use crate::sensors::Gyroscope;
use nalgebra::Vector3;
use rotations::prelude::{EulerAngles, UnitQuaternion};
use serde::{Deserialize, Serialize};
use time::{Clock, Timestamp};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttitudeSolution {
    pub timestamp: Timestamp,
    /// body to local-level
    pub orientation: UnitQuaternion,
    pub angular_rate: Vector3<f64>,
    pub validity: Validity,
}

impl AttitudeSolution {
    /// [yaw, pitch, roll] in radians, Z-Y-X.
    pub fn yaw_pitch_roll(&self) -> [f64; 3] {
        EulerAngles::from(&self.orientation).yaw_pitch_roll()
    }
}

/// Periodic attitude task. Each run propagates to the clock time, then
/// takes the gyro rate followed by whatever reference vectors the
/// estimator variant fuses. The gyro and reference branches have their
/// own decimation.
#[derive(Debug)]
pub struct AttitudeFusion<C, S, E> {
    clock: C,
    sensors: S,
    estimator: E,
    gyro_divider: RateDivider,
    reference_divider: RateDivider,
}

impl<C, S, E> AttitudeFusion<C, S, E>
where
    C: Clock,
    S: Gyroscope,
    E: ReferenceUpdate<S>,
{
    pub fn new(
        clock: C,
        sensors: S,
        estimator: E,
        gyro_rate: u32,
        reference_rate: u32,
    ) -> Result<Self, FusionErrors> {
        Ok(Self {
            clock,
            sensors,
            estimator,
            gyro_divider: RateDivider::new(gyro_rate)?,
            reference_divider: RateDivider::new(reference_rate)?,
        })
    }

    pub fn run(&mut self) -> AttitudeSolution {
        let t = self.clock.now();
        self.estimator.predict_to(t);

        let gyro_sampled = self.gyro_divider.tick();
        let reference_sampled = self.reference_divider.tick();

        let mut validity = Validity::NONE;
        if gyro_sampled {
            if let Some(angular_rate) = self.sensors.read_gyroscope() {
                self.estimator.update_gyro(&angular_rate, t);
                validity.set(Validity::ANGULAR_RATE);
            }
        }
        if reference_sampled && self.estimator.update_references(&mut self.sensors, t) {
            validity.set(Validity::ATTITUDE);
        }

        debug!(t = t.millis(), validity = validity.bits(), "attitude solution");
        AttitudeSolution {
            timestamp: t,
            orientation: self.estimator.orientation(),
            angular_rate: self.estimator.angular_rate(),
            validity,
        }
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut E {
        &mut self.estimator
    }

    pub fn gyro_divider(&self) -> &RateDivider {
        &self.gyro_divider
    }

    pub fn reference_divider(&self) -> &RateDivider {
        &self.reference_divider
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }
}

impl<C, S, E> OrientationProvider for AttitudeFusion<C, S, E>
where
    C: Clock,
    S: Gyroscope,
    E: ReferenceUpdate<S>,
{
    /// Propagates to the current clock time without measurements.
    fn predict(&mut self) -> OrientationEstimate {
        let t = self.clock.now();
        self.estimator.predict_to(t);
        OrientationEstimate {
            orientation: self.estimator.orientation(),
            timestamp: self.estimator.estimator().last_update(),
        }
    }
}
