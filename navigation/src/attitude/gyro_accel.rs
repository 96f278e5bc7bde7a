use super::jacobian::{predict_reference, reference_jacobian, state_jacobian};
use super::{AttitudeEstimator, AttitudeFilter, ReferenceUpdate};
use crate::config::{AttitudeEstimatorConfig, ConfigErrors};
use crate::sensors::Accelerometer;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use time::Timestamp;

/// Gyro propagation corrected by the measured vertical. Heading is not
/// observable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GyroAccelEstimator {
    base: AttitudeEstimator,
    vertical_reference: Vector3<f64>,
    accelerometer_noise: Matrix3<f64>,
}

impl GyroAccelEstimator {
    pub fn new(config: &AttitudeEstimatorConfig, start: Timestamp) -> Result<Self, ConfigErrors> {
        Ok(Self {
            base: AttitudeEstimator::new(config, start)?,
            vertical_reference: config.vertical_reference,
            accelerometer_noise: Matrix3::from_diagonal(&config.accelerometer_noise),
        })
    }

    pub fn update_accelerometer(&mut self, specific_force: &Vector3<f64>, t: Timestamp) {
        self.base.predict_to(t);

        let reference = self.vertical_reference;
        let q = self.base.quaternion_vector();
        let h = state_jacobian(&reference_jacobian(&q, &reference));
        self.base.correct(
            |x| predict_reference(&x.fixed_rows::<4>(0).into_owned(), &reference),
            &h,
            specific_force,
            &self.accelerometer_noise,
        );
    }
}

impl AttitudeFilter for GyroAccelEstimator {
    fn estimator(&self) -> &AttitudeEstimator {
        &self.base
    }

    fn estimator_mut(&mut self) -> &mut AttitudeEstimator {
        &mut self.base
    }
}

impl<S: Accelerometer + ?Sized> ReferenceUpdate<S> for GyroAccelEstimator {
    fn update_references(&mut self, sensors: &mut S, t: Timestamp) -> bool {
        match sensors.read_accelerometer() {
            Some(specific_force) => {
                self.update_accelerometer(&specific_force, t);
                true
            }
            None => false,
        }
    }
}
