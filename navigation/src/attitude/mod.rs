pub mod gyro_accel;
pub mod gyro_accel_mag;
pub mod gyro_mag;
pub mod jacobian;

pub use gyro_accel::GyroAccelEstimator;
pub use gyro_accel_mag::GyroAccelMagEstimator;
pub use gyro_mag::GyroMagEstimator;

use crate::config::{AttitudeEstimatorConfig, ConfigErrors};
use crate::kalman::KalmanFilter;
use crate::providers::{OrientationEstimate, OrientationProvider};
use nalgebra::{SMatrix, SVector, Vector3, Vector4};
use rotations::prelude::*;
use serde::{Deserialize, Serialize};
use time::Timestamp;
use tracing::{trace, warn};

pub const ATTITUDE_STATES: usize = 7;

/// Raw filter state: quaternion (x, y, z, w), body to local-level, and body
/// angular rate (rad/s). The quaternion is only approximately unit length
/// between predictions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttitudeState {
    pub quaternion: Quaternion,
    pub angular_rate: Vector3<f64>,
}

impl From<&SVector<f64, ATTITUDE_STATES>> for AttitudeState {
    fn from(x: &SVector<f64, ATTITUDE_STATES>) -> Self {
        Self {
            quaternion: Quaternion::from(x.fixed_rows::<4>(0).into_owned()),
            angular_rate: x.fixed_rows::<3>(4).into_owned(),
        }
    }
}

impl From<&AttitudeState> for SVector<f64, ATTITUDE_STATES> {
    fn from(state: &AttitudeState) -> Self {
        let mut x = SVector::<f64, ATTITUDE_STATES>::zeros();
        x.fixed_rows_mut::<4>(0).copy_from(&Vector4::from(state.quaternion));
        x.fixed_rows_mut::<3>(4).copy_from(&state.angular_rate);
        x
    }
}

/// Quaternion and angular rate filter shared by every attitude variant.
///
/// Prediction integrates the quaternion directly with the exponential map
/// and only inflates the covariance by Q; there is no linearized transition.
/// The last accepted orientation is kept separately as a unit quaternion and
/// is the reference for resolving the q / -q ambiguity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttitudeEstimator {
    filter: KalmanFilter<ATTITUDE_STATES>,
    last_update: Timestamp,
    last_accepted: UnitQuaternion,
}

impl AttitudeEstimator {
    pub fn new(config: &AttitudeEstimatorConfig, start: Timestamp) -> Result<Self, ConfigErrors> {
        let orientation = UnitQuaternion::try_from(&config.initial_orientation)?;
        let state = AttitudeState {
            quaternion: orientation.0,
            angular_rate: config.initial_angular_rate,
        };
        let filter = KalmanFilter::new(
            SVector::from(&state),
            SMatrix::from_diagonal(&config.initial_covariance),
            SMatrix::from_diagonal(&config.process_noise),
        );
        Ok(Self { filter, last_update: start, last_accepted: orientation })
    }

    /// Integrates the orientation with the current rate up to `t`.
    /// Stale or repeated timestamps are ignored.
    pub fn predict_to(&mut self, t: Timestamp) {
        if t <= self.last_update {
            trace!(t = t.millis(), last = self.last_update.millis(), "attitude predict skipped");
            return;
        }
        let dt = t.seconds_since(self.last_update);
        let state = self.state();

        let increment = UnitQuaternion::exp(&(state.angular_rate * dt));
        let propagated = match UnitQuaternion::try_from(&(state.quaternion * increment.0)) {
            Ok(q) => q.aligned_with(&self.last_accepted),
            Err(e) => {
                warn!("{e}, holding last orientation");
                self.last_accepted
            }
        };

        self.filter
            .state_mut()
            .fixed_rows_mut::<4>(0)
            .copy_from(&Vector4::from(propagated.0));
        self.filter.add_process_noise();
        self.last_accepted = propagated;
        self.last_update = t;
    }

    /// Overwrites the rate sub-state. Gyro readings are taken as truth.
    pub fn set_gyro_angular_rate(&mut self, angular_rate: &Vector3<f64>) {
        self.filter.state_mut().fixed_rows_mut::<3>(4).copy_from(angular_rate);
    }

    /// Propagates with the previous rate up to `t`, then takes the new rate.
    pub fn update_gyro(&mut self, angular_rate: &Vector3<f64>, t: Timestamp) {
        self.predict_to(t);
        self.set_gyro_angular_rate(angular_rate);
    }

    /// EKF correction against reference vector observations. The stored
    /// quaternion is left as the update produced it.
    pub(crate) fn correct<const M: usize, F>(
        &mut self,
        predict_measurement: F,
        jacobian: &SMatrix<f64, M, ATTITUDE_STATES>,
        measurement: &SVector<f64, M>,
        measurement_noise: &SMatrix<f64, M, M>,
    ) where
        F: FnOnce(&SVector<f64, ATTITUDE_STATES>) -> SVector<f64, M>,
    {
        self.filter
            .update_ekf(predict_measurement, jacobian, measurement, measurement_noise);
        self.accept();
    }

    fn accept(&mut self) {
        match UnitQuaternion::try_from(&self.state().quaternion) {
            Ok(q) => self.last_accepted = q.aligned_with(&self.last_accepted),
            Err(e) => warn!("{e} after update, keeping last orientation"),
        }
    }

    pub(crate) fn quaternion_vector(&self) -> Vector4<f64> {
        self.filter.state().fixed_rows::<4>(0).into_owned()
    }

    pub fn state(&self) -> AttitudeState {
        AttitudeState::from(self.filter.state())
    }

    /// Replaces the state and re-anchors the hemisphere reference to it.
    pub fn set_state(&mut self, state: &AttitudeState) -> Result<(), QuaternionErrors> {
        let orientation = UnitQuaternion::try_from(&state.quaternion)?;
        self.filter.set_state(SVector::from(state));
        self.last_accepted = orientation;
        Ok(())
    }

    /// Unit orientation, body to local-level.
    pub fn orientation(&self) -> UnitQuaternion {
        self.last_accepted
    }

    pub fn angular_rate(&self) -> Vector3<f64> {
        self.state().angular_rate
    }

    /// [yaw, pitch, roll] in radians, Z-Y-X.
    pub fn yaw_pitch_roll(&self) -> [f64; 3] {
        EulerAngles::from(&self.last_accepted).yaw_pitch_roll()
    }

    pub fn covariance(&self) -> &SMatrix<f64, ATTITUDE_STATES, ATTITUDE_STATES> {
        self.filter.covariance()
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }
}

impl OrientationProvider for AttitudeEstimator {
    fn predict(&mut self) -> OrientationEstimate {
        OrientationEstimate { orientation: self.last_accepted, timestamp: self.last_update }
    }
}

/// Access to the shared base of an attitude variant.
pub trait AttitudeFilter {
    fn estimator(&self) -> &AttitudeEstimator;
    fn estimator_mut(&mut self) -> &mut AttitudeEstimator;

    fn predict_to(&mut self, t: Timestamp) {
        self.estimator_mut().predict_to(t);
    }

    fn update_gyro(&mut self, angular_rate: &Vector3<f64>, t: Timestamp) {
        self.estimator_mut().update_gyro(angular_rate, t);
    }

    fn orientation(&self) -> UnitQuaternion {
        self.estimator().orientation()
    }

    fn angular_rate(&self) -> Vector3<f64> {
        self.estimator().angular_rate()
    }

    fn yaw_pitch_roll(&self) -> [f64; 3] {
        self.estimator().yaw_pitch_roll()
    }
}

/// Reads whichever reference sensors a variant fuses from `S` and applies
/// them at `t`. Returns false when nothing was applied.
pub trait ReferenceUpdate<S: ?Sized>: AttitudeFilter {
    fn update_references(&mut self, sensors: &mut S, t: Timestamp) -> bool;
}

impl AttitudeFilter for AttitudeEstimator {
    fn estimator(&self) -> &AttitudeEstimator {
        self
    }

    fn estimator_mut(&mut self) -> &mut AttitudeEstimator {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn estimator() -> AttitudeEstimator {
        AttitudeEstimator::new(&AttitudeEstimatorConfig::default(), Timestamp::EPOCH).unwrap()
    }

    #[test]
    fn test_attitude_predict_integrates_rate() {
        let mut est = estimator();
        est.set_gyro_angular_rate(&Vector3::new(0.0, 0.0, 0.5));
        for k in 1..=100 {
            est.predict_to(Timestamp::from_millis(10 * k));
        }
        let [yaw, pitch, roll] = est.yaw_pitch_roll();
        assert_abs_diff_eq!(yaw, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(pitch, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(roll, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_attitude_predict_only_adds_process_noise() {
        let mut est = estimator();
        est.set_gyro_angular_rate(&Vector3::new(0.3, -0.1, 0.2));
        let before = *est.covariance();
        est.predict_to(Timestamp::from_millis(100));
        let expected = before + SMatrix::<f64, 7, 7>::from_diagonal(
            &AttitudeEstimatorConfig::default().process_noise,
        );
        assert_abs_diff_eq!(*est.covariance(), expected, epsilon = 1e-15);
    }

    #[test]
    fn test_attitude_stale_timestamp_ignored() {
        let mut est = estimator();
        est.set_gyro_angular_rate(&Vector3::new(0.0, 1.0, 0.0));
        est.predict_to(Timestamp::from_millis(200));
        let state = est.state();
        let covariance = *est.covariance();

        est.predict_to(Timestamp::from_millis(200));
        est.predict_to(Timestamp::from_millis(100));
        assert_eq!(est.state(), state);
        assert_eq!(*est.covariance(), covariance);
    }

    #[test]
    fn test_attitude_continuity_through_full_turn() {
        // a full turn crosses w = 0 twice, the sign must never flip back
        let mut est = estimator();
        est.set_gyro_angular_rate(&Vector3::new(0.2, 0.0, 2.0 * PI));
        let mut previous = est.orientation();
        for k in 1..=300 {
            est.predict_to(Timestamp::from_millis(10 * k));
            let current = est.orientation();
            assert!(current.dot(&previous) > 0.0);
            assert_abs_diff_eq!(current.0.mag(), 1.0, epsilon = 1e-6);
            previous = current;
        }
    }

    #[test]
    fn test_attitude_set_state_reanchors() {
        let mut est = estimator();
        let flipped = AttitudeState {
            quaternion: Quaternion::new(0.0, 0.0, 0.0, -2.0),
            angular_rate: Vector3::new(0.0, 0.0, 0.1),
        };
        est.set_state(&flipped).unwrap();
        assert_eq!(est.orientation().0, Quaternion::new(0.0, 0.0, 0.0, -1.0));

        // the next prediction stays in the new hemisphere
        est.predict_to(Timestamp::from_millis(10));
        assert!(est.orientation().0.w < 0.0);

        let zero = AttitudeState { quaternion: Quaternion::new(0.0, 0.0, 0.0, 0.0), ..flipped };
        assert_eq!(est.set_state(&zero), Err(QuaternionErrors::ZeroMagnitude));
    }

    #[test]
    fn test_attitude_update_gyro_uses_previous_rate() {
        let mut est = estimator();
        est.update_gyro(&Vector3::new(0.0, 0.0, 1.0), Timestamp::from_millis(1000));
        // nothing to integrate yet, rate was zero over the first second
        assert_abs_diff_eq!(est.yaw_pitch_roll()[0], 0.0, epsilon = 1e-15);
        assert_eq!(est.angular_rate(), Vector3::new(0.0, 0.0, 1.0));

        est.update_gyro(&Vector3::new(0.0, 0.0, 1.0), Timestamp::from_millis(1500));
        assert_abs_diff_eq!(est.yaw_pitch_roll()[0], 0.5, epsilon = 1e-12);
    }
}
