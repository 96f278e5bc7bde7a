use super::{FusionErrors, RateDivider, Validity};
use crate::config::PositionEstimatorConfig;
use crate::position::PositionEstimator;
use crate::providers::{PositionEstimate, PositionProvider};
use crate::sensors::{Accelerometer, GnssReceiver};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use time::{Clock, Timestamp};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSolution {
    pub timestamp: Timestamp,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub acceleration: Vector3<f64>,
    pub validity: Validity,
}

/// Periodic position task. Each run propagates to the clock time, then
/// applies a position fix followed by an acceleration reading. The two
/// branches are decimated independently and a branch only reads its
/// sensor on its own sampled ticks.
///
/// A position fix also marks velocity valid since the filter corrects
/// velocity through the position-velocity cross covariance.
#[derive(Debug)]
pub struct PositionFusion<C, G, A> {
    clock: C,
    gnss: G,
    accelerometer: A,
    estimator: PositionEstimator,
    gnss_divider: RateDivider,
    accelerometer_divider: RateDivider,
}

impl<C, G, A> PositionFusion<C, G, A>
where
    C: Clock,
    G: GnssReceiver,
    A: Accelerometer,
{
    pub fn new(
        clock: C,
        gnss: G,
        accelerometer: A,
        config: &PositionEstimatorConfig,
        start: Timestamp,
        gnss_rate: u32,
        accelerometer_rate: u32,
    ) -> Result<Self, FusionErrors> {
        Ok(Self {
            clock,
            gnss,
            accelerometer,
            estimator: PositionEstimator::new(config, start),
            gnss_divider: RateDivider::new(gnss_rate)?,
            accelerometer_divider: RateDivider::new(accelerometer_rate)?,
        })
    }

    pub fn run(&mut self) -> PositionSolution {
        let t = self.clock.now();
        self.estimator.maybe_predict(t);

        // both counters advance every tick
        let gnss_sampled = self.gnss_divider.tick();
        let accelerometer_sampled = self.accelerometer_divider.tick();

        let mut validity = Validity::NONE;
        if gnss_sampled {
            if let Some(fix) = self.gnss.read_position_fix() {
                self.estimator.update_with_gps(&fix, t);
                validity.set(Validity::POSITION | Validity::VELOCITY);
            }
        }
        if accelerometer_sampled {
            if let Some(acceleration) = self.accelerometer.read_accelerometer() {
                self.estimator.update_with_accel(&acceleration, t);
                validity.set(Validity::ACCELERATION);
            }
        }

        let state = self.estimator.state();
        debug!(t = t.millis(), validity = validity.bits(), "position solution");
        PositionSolution {
            timestamp: t,
            position: state.position,
            velocity: state.velocity,
            acceleration: state.acceleration,
            validity,
        }
    }

    pub fn estimator(&self) -> &PositionEstimator {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut PositionEstimator {
        &mut self.estimator
    }

    pub fn gnss_divider(&self) -> &RateDivider {
        &self.gnss_divider
    }

    pub fn accelerometer_divider(&self) -> &RateDivider {
        &self.accelerometer_divider
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn gnss_mut(&mut self) -> &mut G {
        &mut self.gnss
    }

    pub fn accelerometer_mut(&mut self) -> &mut A {
        &mut self.accelerometer
    }
}

impl<C, G, A> PositionProvider for PositionFusion<C, G, A>
where
    C: Clock,
    G: GnssReceiver,
    A: Accelerometer,
{
    /// Propagates to the current clock time without measurements.
    fn predict(&mut self) -> PositionEstimate {
        let t = self.clock.now();
        self.estimator.maybe_predict(t);
        self.estimator.predict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionState;
    use crate::sensors::LatchedSensors;
    use approx::assert_abs_diff_eq;
    use time::{ManualClock, SteppingClock};

    type Fusion<C> = PositionFusion<C, LatchedSensors, LatchedSensors>;

    fn fusion<C: Clock>(clock: C, gnss_rate: u32, accelerometer_rate: u32) -> Fusion<C> {
        PositionFusion::new(
            clock,
            LatchedSensors::default(),
            LatchedSensors::default(),
            &PositionEstimatorConfig::default(),
            Timestamp::EPOCH,
            gnss_rate,
            accelerometer_rate,
        )
        .unwrap()
    }

    #[test]
    fn test_position_fusion_decimation() {
        let mut fusion = fusion(SteppingClock::new(Timestamp::EPOCH, 100), 3, 3);
        let mut sampled = Vec::new();
        for tick in 0..9 {
            fusion.gnss_mut().latch_position_fix(Vector3::new(1.0, 2.0, 3.0));
            let solution = fusion.run();
            if solution.validity.contains(Validity::POSITION) {
                sampled.push(tick);
            }
        }
        assert_eq!(sampled, vec![0, 3, 6]);
        assert_eq!(fusion.gnss_divider().counter(), 9);
    }

    #[test]
    fn test_position_fusion_independent_branch_rates() {
        let mut fusion = fusion(SteppingClock::new(Timestamp::EPOCH, 100), 3, 1);
        let mut fixes = Vec::new();
        let mut accels = Vec::new();
        for tick in 0..6 {
            fusion.gnss_mut().latch_position_fix(Vector3::new(1.0, 2.0, 3.0));
            fusion.accelerometer_mut().latch_accelerometer(Vector3::new(0.0, 0.0, 0.1));
            let solution = fusion.run();
            if solution.validity.contains(Validity::POSITION) {
                fixes.push(tick);
            }
            if solution.validity.contains(Validity::ACCELERATION) {
                accels.push(tick);
            }
        }
        assert_eq!(fixes, vec![0, 3]);
        assert_eq!(accels, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(fusion.gnss_divider().counter(), 6);
        assert_eq!(fusion.accelerometer_divider().counter(), 6);
    }

    #[test]
    fn test_position_fusion_accelerometer_decimation() {
        let mut fusion = fusion(SteppingClock::new(Timestamp::EPOCH, 100), 1, 3);
        let mut accels = Vec::new();
        for tick in 0..6 {
            fusion.accelerometer_mut().latch_accelerometer(Vector3::new(0.0, 0.0, 0.1));
            let solution = fusion.run();
            assert!(!solution.validity.contains(Validity::POSITION));
            if solution.validity.contains(Validity::ACCELERATION) {
                accels.push(tick);
            }
        }
        assert_eq!(accels, vec![0, 3]);
    }

    #[test]
    fn test_position_fusion_validity_per_field() {
        let mut fusion = fusion(SteppingClock::new(Timestamp::EPOCH, 100), 1, 1);

        let solution = fusion.run();
        assert!(solution.validity.is_empty());

        fusion.accelerometer_mut().latch_accelerometer(Vector3::new(0.0, 0.0, -9.81));
        let solution = fusion.run();
        assert_eq!(solution.validity, Validity::ACCELERATION);
        assert_eq!(solution.timestamp, Timestamp::from_millis(100));

        fusion.gnss_mut().latch_position_fix(Vector3::zeros());
        fusion.accelerometer_mut().latch_accelerometer(Vector3::zeros());
        let solution = fusion.run();
        assert_eq!(
            solution.validity,
            Validity::POSITION | Validity::VELOCITY | Validity::ACCELERATION
        );
    }

    #[test]
    fn test_position_fusion_coasts_without_sensors() {
        let mut fusion = fusion(ManualClock::new(Timestamp::EPOCH), 1, 1);
        fusion.estimator_mut().set_state(&PositionState::new(
            Vector3::new(7.0e6, 0.0, 0.0),
            Vector3::new(0.0, 7.5e3, 0.0),
            Vector3::zeros(),
        ));

        fusion.clock_mut().advance(2000);
        let solution = fusion.run();
        assert!(solution.validity.is_empty());
        assert_abs_diff_eq!(solution.position[1], 15.0e3, epsilon = 1e-6);

        // same clock time again, nothing moves
        let again = fusion.run();
        assert_eq!(again.position, solution.position);
    }

    #[test]
    fn test_position_fusion_predict_provider() {
        let mut fusion = fusion(ManualClock::new(Timestamp::EPOCH), 1, 1);
        fusion.estimator_mut().set_state(&PositionState::new(
            Vector3::zeros(),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::zeros(),
        ));
        fusion.clock_mut().set(Timestamp::from_millis(500));
        let estimate = fusion.predict();
        assert_eq!(estimate.timestamp, Timestamp::from_millis(500));
        assert_abs_diff_eq!(estimate.position[0], 0.5, epsilon = 1e-12);
        assert_eq!(fusion.gnss_divider().counter(), 0);
        assert_eq!(fusion.accelerometer_divider().counter(), 0);
    }
}
