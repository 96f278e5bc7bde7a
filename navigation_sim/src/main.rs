use clap::{Parser, ValueEnum};
use nalgebra::Vector3;
use navigation::prelude::*;
use rotations::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use time::{SteppingClock, TimeErrors, Timestamp};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod scenario;
use scenario::{NoisySensors, Truth};

const ALTITUDE: f64 = 500e3; // m

#[derive(Debug, Error)]
enum SimErrors {
    #[error(transparent)]
    Config(#[from] ConfigErrors),
    #[error(transparent)]
    Fusion(#[from] FusionErrors),
    #[error(transparent)]
    Time(#[from] TimeErrors),
    #[error("sensor noise: {0}")]
    Noise(#[from] rand_distr::NormalError),
    #[error("csv output: {0}")]
    Csv(#[from] csv::Error),
    #[error("tick must be a positive number of milliseconds, got {0}")]
    InvalidTick(i64),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Variant {
    GyroMag,
    GyroAccel,
    GyroAccelMag,
}

#[derive(Parser, Debug)]
#[command(name = "navigation_sim")]
#[command(about = "Closed loop orbit and attitude estimation with synthetic sensors")]
#[command(version)]
struct Args {
    /// RON navigation config, built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// simulated time (s)
    #[arg(long, default_value_t = 600.0)]
    duration: f64,
    /// scheduler period (ms)
    #[arg(long, default_value_t = 100)]
    tick_ms: i64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// csv file for the per-tick solutions
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Variant::GyroAccelMag)]
    variant: Variant,
}

/// One csv row.
#[derive(Debug, Serialize)]
struct Record {
    t_ms: i64,
    utc: String,
    x: f64,
    y: f64,
    z: f64,
    vx: f64,
    vy: f64,
    vz: f64,
    position_error: f64,
    velocity_error: f64,
    position_validity: u8,
    qx: f64,
    qy: f64,
    qz: f64,
    qw: f64,
    yaw: f64,
    pitch: f64,
    roll: f64,
    attitude_error: f64,
    attitude_validity: u8,
}

#[derive(Debug, Default)]
struct Summary {
    ticks: u64,
    /// ticks that fused a position fix
    fixes: u64,
    position_sq: f64,
    velocity_sq: f64,
    attitude_sq: f64,
    final_position_error: f64,
    final_attitude_error: f64,
}

impl Summary {
    fn add(&mut self, position_error: f64, velocity_error: f64, attitude_error: f64) {
        self.ticks += 1;
        self.position_sq += position_error.powi(2);
        self.velocity_sq += velocity_error.powi(2);
        self.attitude_sq += attitude_error.powi(2);
        self.final_position_error = position_error;
        self.final_attitude_error = attitude_error;
    }

    fn rms(sum_sq: f64, n: u64) -> f64 {
        if n == 0 { 0.0 } else { (sum_sq / n as f64).sqrt() }
    }

    fn position_rms(&self) -> f64 {
        Self::rms(self.position_sq, self.ticks)
    }

    fn velocity_rms(&self) -> f64 {
        Self::rms(self.velocity_sq, self.ticks)
    }

    fn attitude_rms(&self) -> f64 {
        Self::rms(self.attitude_sq, self.ticks)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                fixes = summary.fixes,
                position_rms = summary.position_rms(),
                velocity_rms = summary.velocity_rms(),
                attitude_rms = summary.attitude_rms(),
                final_position_error = summary.final_position_error,
                final_attitude_error = summary.final_attitude_error,
                "scenario complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<Summary, SimErrors> {
    let config = match &args.config {
        Some(path) => NavigationConfig::from_file(path)?,
        None => NavigationConfig::default(),
    };
    info!(variant = ?args.variant, duration = args.duration, tick_ms = args.tick_ms, "starting scenario");

    let start = Timestamp::EPOCH;
    match args.variant {
        Variant::GyroMag => simulate(args, &config, GyroMagEstimator::new(&config.attitude, start)?),
        Variant::GyroAccel => {
            simulate(args, &config, GyroAccelEstimator::new(&config.attitude, start)?)
        }
        Variant::GyroAccelMag => {
            simulate(args, &config, GyroAccelMagEstimator::new(&config.attitude, start)?)
        }
    }
}

type OrbitAccelerometer = FrameAdapter<LatchedSensors, OrientationEstimate, PositionEstimate>;

fn simulate<E>(args: &Args, config: &NavigationConfig, estimator: E) -> Result<Summary, SimErrors>
where
    E: ReferenceUpdate<LatchedSensors>,
{
    if args.tick_ms <= 0 {
        return Err(SimErrors::InvalidTick(args.tick_ms));
    }
    let start = Timestamp::EPOCH;
    let dt = args.tick_ms as f64 / 1000.0;
    let ticks = (args.duration * 1000.0 / args.tick_ms as f64).round() as u64;

    let mut truth = Truth::new(ALTITUDE, Vector3::new(0.002, -0.001, 0.05));
    let mut noise = NoisySensors::new(args.seed, config)?;

    // the propagator hands over its state at start
    let mut position_config = config.position.clone();
    position_config.initial_state = truth.state();

    let accelerometer: OrbitAccelerometer = FrameAdapter::new(
        LatchedSensors::default(),
        OrientationEstimate { orientation: truth.orientation(), timestamp: start },
        PositionEstimate {
            position: truth.position(),
            velocity: truth.velocity(),
            timestamp: start,
        },
        config.gravity,
    );
    let mut orbit = PositionFusion::new(
        SteppingClock::new(start, args.tick_ms),
        LatchedSensors::default(),
        accelerometer,
        &position_config,
        start,
        config.rates.gnss,
        config.rates.accelerometer,
    )?;
    let mut attitude = AttitudeFusion::new(
        SteppingClock::new(start, args.tick_ms),
        LatchedSensors::default(),
        estimator,
        config.rates.gyroscope,
        config.rates.references,
    )?;

    let mut writer = match &args.output {
        Some(path) => Some(csv::Writer::from_path(path)?),
        None => None,
    };

    // gnss outage over the middle tenth of the run
    let outage = (ticks * 4 / 10)..(ticks / 2);

    let mut summary = Summary::default();
    for k in 0..ticks {
        if k > 0 {
            truth.step(dt);
        }

        let sensors = attitude.sensors_mut();
        sensors.latch_gyroscope(noise.gyroscope(&truth));
        sensors.latch_accelerometer(
            noise.attitude_accelerometer(&truth, &config.attitude.vertical_reference),
        );
        sensors.latch_magnetometer(noise.magnetometer(&truth, &config.attitude.magnetic_reference));
        let attitude_solution = attitude.run();

        // a fix latched before the outage must not be consumed inside it
        let gnss = orbit.gnss_mut();
        if outage.contains(&k) {
            gnss.clear();
        } else {
            gnss.latch_position_fix(noise.position_fix(&truth));
        }
        let position_estimate = orbit.estimator_mut().predict();
        let reading = noise.orbit_accelerometer(&truth, &config.gravity);
        let adapter = orbit.accelerometer_mut();
        *adapter.orientation_mut() = OrientationEstimate {
            orientation: attitude_solution.orientation,
            timestamp: attitude_solution.timestamp,
        };
        *adapter.position_mut() = position_estimate;
        adapter.sensor_mut().latch_accelerometer(reading);
        let position_solution = orbit.run();

        let position_error = (position_solution.position - truth.position()).magnitude();
        let velocity_error = (position_solution.velocity - truth.velocity()).magnitude();
        let attitude_error = angle_between(&truth.orientation(), &attitude_solution.orientation);
        summary.add(position_error, velocity_error, attitude_error);
        if position_solution.validity.contains(Validity::POSITION) {
            summary.fixes += 1;
        }

        if k % 100 == 0 {
            debug!(k, position_error, velocity_error, attitude_error, "scenario progress");
        }

        if let Some(writer) = writer.as_mut() {
            let [yaw, pitch, roll] = attitude_solution.yaw_pitch_roll();
            let q = attitude_solution.orientation.0;
            writer.serialize(Record {
                t_ms: position_solution.timestamp.millis(),
                utc: position_solution.timestamp.to_datetime()?.to_rfc3339(),
                x: position_solution.position[0],
                y: position_solution.position[1],
                z: position_solution.position[2],
                vx: position_solution.velocity[0],
                vy: position_solution.velocity[1],
                vz: position_solution.velocity[2],
                position_error,
                velocity_error,
                position_validity: position_solution.validity.bits(),
                qx: q.x,
                qy: q.y,
                qz: q.z,
                qw: q.w,
                yaw,
                pitch,
                roll,
                attitude_error,
                attitude_validity: attitude_solution.validity.bits(),
            })?;
        }
    }

    if let Some(mut writer) = writer {
        writer.flush().map_err(csv::Error::from)?;
    }
    Ok(summary)
}

/// Rotation angle (rad) taking `a` to `b`.
fn angle_between(a: &UnitQuaternion, b: &UnitQuaternion) -> f64 {
    let error = a.inv() * *b;
    2.0 * error.0.w.abs().min(1.0).acos()
}
