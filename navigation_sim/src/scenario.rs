use aerospace::geodetic::ecef_to_geodetic;
use aerospace::transformations::ecef_from_ned;
use aerospace::wgs84::{A, MU};
use nalgebra::Vector3;
use navigation::prelude::{GravityPolicy, NavigationConfig, PositionState};
use rand::{SeedableRng, rngs::SmallRng};
use rand_distr::{Distribution, Normal, NormalError};
use rotations::prelude::*;

/// Gyro white noise (rad/s, 1 sigma).
pub const GYRO_NOISE: f64 = 1e-4;

/// Circular equatorial orbit in a non-rotating Earth-fixed frame, with the
/// body spinning at a constant rate.
#[derive(Debug, Clone)]
pub struct Truth {
    radius: f64,
    mean_motion: f64,
    elapsed: f64,
    body_rate: Vector3<f64>,
    orientation: UnitQuaternion,
}

impl Truth {
    pub fn new(altitude: f64, body_rate: Vector3<f64>) -> Self {
        let radius = A + altitude;
        Self {
            radius,
            mean_motion: (MU / radius.powi(3)).sqrt(),
            elapsed: 0.0,
            body_rate,
            orientation: UnitQuaternion::IDENTITY,
        }
    }

    pub fn step(&mut self, dt: f64) {
        self.elapsed += dt;
        self.orientation = self.orientation.integrate(&self.body_rate, dt);
    }

    pub fn position(&self) -> Vector3<f64> {
        let (s, c) = (self.mean_motion * self.elapsed).sin_cos();
        Vector3::new(c, s, 0.0) * self.radius
    }

    pub fn velocity(&self) -> Vector3<f64> {
        let (s, c) = (self.mean_motion * self.elapsed).sin_cos();
        Vector3::new(-s, c, 0.0) * (self.radius * self.mean_motion)
    }

    pub fn acceleration(&self) -> Vector3<f64> {
        -self.position() * self.mean_motion.powi(2)
    }

    pub fn state(&self) -> PositionState {
        PositionState::new(self.position(), self.velocity(), self.acceleration())
    }

    pub fn orientation(&self) -> UnitQuaternion {
        self.orientation
    }

    pub fn body_rate(&self) -> Vector3<f64> {
        self.body_rate
    }
}

/// Sensor models with white noise sized from the filter's own noise
/// settings, so the filters are tuned to the truth.
#[derive(Debug, Clone)]
pub struct NoisySensors {
    rng: SmallRng,
    gnss: Normal<f64>,
    orbit_accelerometer: Normal<f64>,
    attitude_accelerometer: Normal<f64>,
    magnetometer: Normal<f64>,
    gyroscope: Normal<f64>,
}

impl NoisySensors {
    pub fn new(seed: u64, config: &NavigationConfig) -> Result<Self, NormalError> {
        let sigma = |variance: &Vector3<f64>| variance[0].sqrt();
        Ok(Self {
            rng: SmallRng::seed_from_u64(seed),
            gnss: Normal::new(0.0, sigma(&config.position.gps_noise))?,
            orbit_accelerometer: Normal::new(0.0, sigma(&config.position.accel_noise))?,
            attitude_accelerometer: Normal::new(0.0, sigma(&config.attitude.accelerometer_noise))?,
            magnetometer: Normal::new(0.0, sigma(&config.attitude.magnetometer_noise))?,
            gyroscope: Normal::new(0.0, GYRO_NOISE)?,
        })
    }

    fn perturb(rng: &mut SmallRng, noise: &Normal<f64>, v: Vector3<f64>) -> Vector3<f64> {
        v + Vector3::new(noise.sample(rng), noise.sample(rng), noise.sample(rng))
    }

    pub fn position_fix(&mut self, truth: &Truth) -> Vector3<f64> {
        Self::perturb(&mut self.rng, &self.gnss, truth.position())
    }

    pub fn gyroscope(&mut self, truth: &Truth) -> Vector3<f64> {
        Self::perturb(&mut self.rng, &self.gyroscope, truth.body_rate())
    }

    pub fn magnetometer(&mut self, truth: &Truth, reference: &Vector3<f64>) -> Vector3<f64> {
        let body = truth.orientation().transform(reference);
        Self::perturb(&mut self.rng, &self.magnetometer, body)
    }

    pub fn attitude_accelerometer(&mut self, truth: &Truth, reference: &Vector3<f64>) -> Vector3<f64> {
        let body = truth.orientation().transform(reference);
        Self::perturb(&mut self.rng, &self.attitude_accelerometer, body)
    }

    /// Body frame reading that the frame adapter maps back onto the true
    /// Earth-fixed acceleration under `policy`.
    pub fn orbit_accelerometer(&mut self, truth: &Truth, policy: &GravityPolicy) -> Vector3<f64> {
        let location = ecef_to_geodetic(&truth.position());
        let ned = ecef_from_ned(location.latitude, location.longitude).transform(&truth.acceleration());
        let ned = match policy {
            GravityPolicy::NoCompensation => ned,
            GravityPolicy::SubtractLocalGravity { gravity_ned } => ned + gravity_ned,
        };
        let body = truth.orientation().transform(&ned);
        Self::perturb(&mut self.rng, &self.orbit_accelerometer, body)
    }
}
