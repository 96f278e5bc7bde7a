use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fixed size linear / extended Kalman filter.
///
/// The state dimension `N` is fixed at compile time. The measurement
/// dimension `M` is chosen per update call, so one filter can fuse
/// measurements of different sizes. Measurement noise is supplied with
/// each update for the same reason.
///
/// Nothing here guards the numerics: the covariance is never
/// re-symmetrized and a singular innovation covariance is still
/// "inverted" (into NaNs), so a bad model shows up in the state instead
/// of being silently patched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KalmanFilter<const N: usize> {
    state: SVector<f64, N>,
    covariance: SMatrix<f64, N, N>,
    process_noise: SMatrix<f64, N, N>,
}

impl<const N: usize> KalmanFilter<N> {
    pub fn new(
        state: SVector<f64, N>,
        covariance: SMatrix<f64, N, N>,
        process_noise: SMatrix<f64, N, N>,
    ) -> Self {
        Self { state, covariance, process_noise }
    }

    /// x = F x, P = F P F' + Q
    pub fn predict(&mut self, transition: &SMatrix<f64, N, N>) {
        self.state = transition * self.state;
        self.covariance = transition * self.covariance * transition.transpose() + self.process_noise;
    }

    /// P = P + Q, for models that propagate the state themselves.
    pub fn add_process_noise(&mut self) {
        self.covariance += self.process_noise;
    }

    /// Linear measurement update with innovation z - H x.
    pub fn update<const M: usize>(
        &mut self,
        measurement_matrix: &SMatrix<f64, M, N>,
        measurement: &SVector<f64, M>,
        measurement_noise: &SMatrix<f64, M, M>,
    ) {
        let innovation = measurement - measurement_matrix * self.state;
        self.correct(innovation, measurement_matrix, measurement_noise);
    }

    /// Extended update with innovation z - h(x). `jacobian` is dh/dx
    /// evaluated at the current state.
    pub fn update_ekf<const M: usize, F>(
        &mut self,
        predict_measurement: F,
        jacobian: &SMatrix<f64, M, N>,
        measurement: &SVector<f64, M>,
        measurement_noise: &SMatrix<f64, M, M>,
    ) where
        F: FnOnce(&SVector<f64, N>) -> SVector<f64, M>,
    {
        let innovation = measurement - predict_measurement(&self.state);
        self.correct(innovation, jacobian, measurement_noise);
    }

    fn correct<const M: usize>(
        &mut self,
        innovation: SVector<f64, M>,
        measurement_matrix: &SMatrix<f64, M, N>,
        measurement_noise: &SMatrix<f64, M, M>,
    ) {
        let h = measurement_matrix;
        let ph_t = self.covariance * h.transpose();
        let innovation_covariance = h * ph_t + measurement_noise;

        let s_inv = innovation_covariance
            .try_inverse()
            .unwrap_or_else(|| {
                warn!(dimension = M, "singular innovation covariance");
                SMatrix::<f64, M, M>::repeat(f64::NAN)
            });

        let gain = ph_t * s_inv;
        self.state += gain * innovation;
        self.covariance = (SMatrix::<f64, N, N>::identity() - gain * h) * self.covariance;
    }

    pub fn state(&self) -> &SVector<f64, N> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SVector<f64, N> {
        &mut self.state
    }

    pub fn set_state(&mut self, state: SVector<f64, N>) {
        self.state = state;
    }

    pub fn covariance(&self) -> &SMatrix<f64, N, N> {
        &self.covariance
    }

    pub fn set_covariance(&mut self, covariance: SMatrix<f64, N, N>) {
        self.covariance = covariance;
    }

    pub fn process_noise(&self) -> &SMatrix<f64, N, N> {
        &self.process_noise
    }
}
