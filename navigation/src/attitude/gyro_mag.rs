use super::jacobian::{predict_reference, reference_jacobian, state_jacobian};
use super::{AttitudeEstimator, AttitudeFilter, ReferenceUpdate};
use crate::config::{AttitudeEstimatorConfig, ConfigErrors};
use crate::sensors::Magnetometer;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use time::Timestamp;

/// Gyro propagation corrected by the magnetic field direction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GyroMagEstimator {
    base: AttitudeEstimator,
    magnetic_reference: Vector3<f64>,
    magnetometer_noise: Matrix3<f64>,
}

impl GyroMagEstimator {
    pub fn new(config: &AttitudeEstimatorConfig, start: Timestamp) -> Result<Self, ConfigErrors> {
        Ok(Self {
            base: AttitudeEstimator::new(config, start)?,
            magnetic_reference: config.magnetic_reference,
            magnetometer_noise: Matrix3::from_diagonal(&config.magnetometer_noise),
        })
    }

    pub fn update_magnetometer(&mut self, magnetic_field: &Vector3<f64>, t: Timestamp) {
        self.base.predict_to(t);

        let reference = self.magnetic_reference;
        let q = self.base.quaternion_vector();
        let h = state_jacobian(&reference_jacobian(&q, &reference));
        self.base.correct(
            |x| predict_reference(&x.fixed_rows::<4>(0).into_owned(), &reference),
            &h,
            magnetic_field,
            &self.magnetometer_noise,
        );
    }
}

impl AttitudeFilter for GyroMagEstimator {
    fn estimator(&self) -> &AttitudeEstimator {
        &self.base
    }

    fn estimator_mut(&mut self) -> &mut AttitudeEstimator {
        &mut self.base
    }
}

impl<S: Magnetometer + ?Sized> ReferenceUpdate<S> for GyroMagEstimator {
    fn update_references(&mut self, sensors: &mut S, t: Timestamp) -> bool {
        match sensors.read_magnetometer() {
            Some(field) => {
                self.update_magnetometer(&field, t);
                true
            }
            None => false,
        }
    }
}
