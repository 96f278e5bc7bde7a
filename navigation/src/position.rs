use crate::config::PositionEstimatorConfig;
use crate::kalman::KalmanFilter;
use crate::providers::{PositionEstimate, PositionProvider};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};
use time::Timestamp;
use tracing::trace;

pub const POSITION_STATES: usize = 9;

/// Earth-fixed Cartesian position (m), velocity (m/s) and acceleration (m/s^2).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub acceleration: Vector3<f64>,
}

impl PositionState {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>, acceleration: Vector3<f64>) -> Self {
        Self { position, velocity, acceleration }
    }
}

impl From<&SVector<f64, POSITION_STATES>> for PositionState {
    fn from(x: &SVector<f64, POSITION_STATES>) -> Self {
        Self {
            position: x.fixed_rows::<3>(0).into_owned(),
            velocity: x.fixed_rows::<3>(3).into_owned(),
            acceleration: x.fixed_rows::<3>(6).into_owned(),
        }
    }
}

impl From<&PositionState> for SVector<f64, POSITION_STATES> {
    fn from(state: &PositionState) -> Self {
        let mut x = SVector::<f64, POSITION_STATES>::zeros();
        x.fixed_rows_mut::<3>(0).copy_from(&state.position);
        x.fixed_rows_mut::<3>(3).copy_from(&state.velocity);
        x.fixed_rows_mut::<3>(6).copy_from(&state.acceleration);
        x
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Parameters {
    gps_noise: Matrix3<f64>,
    accel_noise: Matrix3<f64>,
}

/// Constant acceleration position / velocity / acceleration filter.
///
/// Position fixes and acceleration readings are both direct, noisy
/// observations of a block of the state. Acceleration is never used as a
/// control input, so with no fixes the filter keeps integrating whatever
/// acceleration it has estimated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionEstimator {
    filter: KalmanFilter<POSITION_STATES>,
    parameters: Parameters,
    last_update: Timestamp,
}

impl PositionEstimator {
    pub fn new(config: &PositionEstimatorConfig, start: Timestamp) -> Self {
        let filter = KalmanFilter::new(
            SVector::from(&config.initial_state),
            SMatrix::from_diagonal(&config.initial_covariance),
            SMatrix::from_diagonal(&config.process_noise),
        );
        let parameters = Parameters {
            gps_noise: Matrix3::from_diagonal(&config.gps_noise),
            accel_noise: Matrix3::from_diagonal(&config.accel_noise),
        };
        Self { filter, parameters, last_update: start }
    }

    /// Propagates to `t` with the constant acceleration model.
    /// Stale or repeated timestamps are ignored.
    pub fn maybe_predict(&mut self, t: Timestamp) {
        if t <= self.last_update {
            trace!(t = t.millis(), last = self.last_update.millis(), "position predict skipped");
            return;
        }
        let dt = t.seconds_since(self.last_update);
        self.filter.predict(&transition(dt));
        self.last_update = t;
    }

    pub fn update_with_gps(&mut self, position: &Vector3<f64>, t: Timestamp) {
        self.maybe_predict(t);
        self.filter.update(&selector(0), position, &self.parameters.gps_noise);
    }

    pub fn update_with_accel(&mut self, acceleration: &Vector3<f64>, t: Timestamp) {
        self.maybe_predict(t);
        self.filter.update(&selector(6), acceleration, &self.parameters.accel_noise);
    }

    pub fn state(&self) -> PositionState {
        PositionState::from(self.filter.state())
    }

    pub fn set_state(&mut self, state: &PositionState) {
        self.filter.set_state(SVector::from(state));
    }

    pub fn covariance(&self) -> &SMatrix<f64, POSITION_STATES, POSITION_STATES> {
        self.filter.covariance()
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }
}

impl PositionProvider for PositionEstimator {
    /// Reports the state as of the last propagation or update without
    /// advancing it. Callers that need the estimate at a later time
    /// propagate with [`PositionEstimator::maybe_predict`] first.
    fn predict(&mut self) -> PositionEstimate {
        let state = self.state();
        PositionEstimate {
            position: state.position,
            velocity: state.velocity,
            timestamp: self.last_update,
        }
    }
}

fn transition(dt: f64) -> SMatrix<f64, POSITION_STATES, POSITION_STATES> {
    let i3 = Matrix3::<f64>::identity();
    let mut f = SMatrix::<f64, POSITION_STATES, POSITION_STATES>::identity();
    f.fixed_view_mut::<3, 3>(0, 3).copy_from(&(i3 * dt));
    f.fixed_view_mut::<3, 3>(0, 6).copy_from(&(i3 * (0.5 * dt * dt)));
    f.fixed_view_mut::<3, 3>(3, 6).copy_from(&(i3 * dt));
    f
}

// picks the 3 states starting at `offset`
fn selector(offset: usize) -> SMatrix<f64, 3, POSITION_STATES> {
    let mut h = SMatrix::<f64, 3, POSITION_STATES>::zeros();
    h.fixed_view_mut::<3, 3>(0, offset).fill_with_identity();
    h
}
