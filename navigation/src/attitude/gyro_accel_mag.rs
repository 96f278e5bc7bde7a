use super::jacobian::{predict_reference, reference_jacobian, stacked_state_jacobian};
use super::{AttitudeEstimator, AttitudeFilter, ReferenceUpdate};
use crate::config::{AttitudeEstimatorConfig, ConfigErrors};
use crate::sensors::{Accelerometer, Magnetometer};
use nalgebra::{Matrix6, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use time::Timestamp;
use tracing::debug;

/// Gyro propagation corrected by the vertical and the magnetic field
/// together, which fixes all three axes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GyroAccelMagEstimator {
    base: AttitudeEstimator,
    vertical_reference: Vector3<f64>,
    magnetic_reference: Vector3<f64>,
    /// accelerometer block then magnetometer block
    measurement_noise: Matrix6<f64>,
}

impl GyroAccelMagEstimator {
    pub fn new(config: &AttitudeEstimatorConfig, start: Timestamp) -> Result<Self, ConfigErrors> {
        let mut diagonal = Vector6::zeros();
        diagonal.fixed_rows_mut::<3>(0).copy_from(&config.accelerometer_noise);
        diagonal.fixed_rows_mut::<3>(3).copy_from(&config.magnetometer_noise);

        Ok(Self {
            base: AttitudeEstimator::new(config, start)?,
            vertical_reference: config.vertical_reference,
            magnetic_reference: config.magnetic_reference,
            measurement_noise: Matrix6::from_diagonal(&diagonal),
        })
    }

    pub fn update_accelerometer_magnetometer(
        &mut self,
        specific_force: &Vector3<f64>,
        magnetic_field: &Vector3<f64>,
        t: Timestamp,
    ) {
        self.base.predict_to(t);

        let vertical = self.vertical_reference;
        let magnetic = self.magnetic_reference;
        let q = self.base.quaternion_vector();
        let h = stacked_state_jacobian(
            &reference_jacobian(&q, &vertical),
            &reference_jacobian(&q, &magnetic),
        );

        let mut measurement = Vector6::zeros();
        measurement.fixed_rows_mut::<3>(0).copy_from(specific_force);
        measurement.fixed_rows_mut::<3>(3).copy_from(magnetic_field);

        self.base.correct(
            |x| {
                let q = x.fixed_rows::<4>(0).into_owned();
                let mut predicted = Vector6::zeros();
                predicted
                    .fixed_rows_mut::<3>(0)
                    .copy_from(&predict_reference(&q, &vertical));
                predicted
                    .fixed_rows_mut::<3>(3)
                    .copy_from(&predict_reference(&q, &magnetic));
                predicted
            },
            &h,
            &measurement,
            &self.measurement_noise,
        );
    }
}

impl AttitudeFilter for GyroAccelMagEstimator {
    fn estimator(&self) -> &AttitudeEstimator {
        &self.base
    }

    fn estimator_mut(&mut self) -> &mut AttitudeEstimator {
        &mut self.base
    }
}

/// Both sensors are read every time. A lone reading is dropped since the
/// update needs the pair.
impl<S: Accelerometer + Magnetometer + ?Sized> ReferenceUpdate<S> for GyroAccelMagEstimator {
    fn update_references(&mut self, sensors: &mut S, t: Timestamp) -> bool {
        match (sensors.read_accelerometer(), sensors.read_magnetometer()) {
            (Some(specific_force), Some(field)) => {
                self.update_accelerometer_magnetometer(&specific_force, &field, t);
                true
            }
            (None, None) => false,
            (accel, mag) => {
                debug!(
                    accelerometer = accel.is_some(),
                    magnetometer = mag.is_some(),
                    "incomplete reference pair dropped"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::LatchedSensors;
    use approx::assert_abs_diff_eq;
    use nalgebra::SVector;
    use rotations::prelude::*;
    use std::f64::consts::FRAC_PI_4;
    use utilities::angle_difference;

    fn unit_reference_config() -> AttitudeEstimatorConfig {
        AttitudeEstimatorConfig {
            initial_covariance: SVector::repeat(1.0),
            process_noise: SVector::repeat(1e-3),
            accelerometer_noise: Vector3::repeat(0.1),
            magnetometer_noise: Vector3::repeat(0.1),
            vertical_reference: Vector3::new(0.0, 0.0, 1.0),
            magnetic_reference: Vector3::new(1.0, 0.0, 0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_gyro_accel_mag_converges_from_yaw_offset() {
        let config = unit_reference_config();
        let truth = UnitQuaternion::from(&EulerAngles::from_yaw_pitch_roll(FRAC_PI_4, 0.0, 0.0));
        let accel = truth.transform(&config.vertical_reference);
        let mag = truth.transform(&config.magnetic_reference);

        let mut est = GyroAccelMagEstimator::new(&config, Timestamp::EPOCH).unwrap();
        let mut converged_at = None;
        for k in 1..=50 {
            est.update_accelerometer_magnetometer(&accel, &mag, Timestamp::from_millis(10 * k));
            let error = angle_difference(est.yaw_pitch_roll()[0], FRAC_PI_4).abs();
            assert!(error < 2.0);
            if error < 0.6 && converged_at.is_none() {
                converged_at = Some(k);
            }
            assert_abs_diff_eq!(est.orientation().0.mag(), 1.0, epsilon = 1e-6);
        }
        assert!(converged_at.is_some_and(|k| k <= 5));
        assert_abs_diff_eq!(est.yaw_pitch_roll()[0], FRAC_PI_4, epsilon = 1e-3);
    }

    #[test]
    fn test_gyro_accel_mag_first_step() {
        let config = unit_reference_config();
        let truth = UnitQuaternion::from(&EulerAngles::from_yaw_pitch_roll(FRAC_PI_4, 0.0, 0.0));
        let mut est = GyroAccelMagEstimator::new(&config, Timestamp::EPOCH).unwrap();
        est.update_accelerometer_magnetometer(
            &truth.transform(&config.vertical_reference),
            &truth.transform(&config.magnetic_reference),
            Timestamp::from_millis(10),
        );
        assert_abs_diff_eq!(est.yaw_pitch_roll()[0], 0.66432, epsilon = 1e-4);
    }

    #[test]
    fn test_gyro_accel_mag_needs_both_readings() {
        let config = unit_reference_config();
        let mut est = GyroAccelMagEstimator::new(&config, Timestamp::EPOCH).unwrap();
        let mut sensors = LatchedSensors::default();
        sensors.latch_accelerometer(Vector3::z());

        assert!(!est.update_references(&mut sensors, Timestamp::from_millis(10)));
        // the lone reading was still consumed
        assert_eq!(sensors.accelerometer, None);
        assert_eq!(est.estimator().last_update(), Timestamp::EPOCH);

        sensors.latch_accelerometer(Vector3::z());
        sensors.latch_magnetometer(Vector3::x());
        assert!(est.update_references(&mut sensors, Timestamp::from_millis(20)));
        assert_eq!(est.estimator().last_update(), Timestamp::from_millis(20));
    }
}
