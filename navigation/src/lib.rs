pub mod attitude;
pub mod config;
pub mod frame_adapter;
pub mod fusion;
pub mod kalman;
pub mod position;
pub mod providers;
pub mod sensors;

pub mod prelude {
    pub use crate::attitude::{
        AttitudeEstimator, AttitudeFilter, AttitudeState, GyroAccelEstimator,
        GyroAccelMagEstimator, GyroMagEstimator, ReferenceUpdate,
    };
    pub use crate::config::*;
    pub use crate::frame_adapter::{FrameAdapter, GravityPolicy};
    pub use crate::fusion::{
        AttitudeFusion, AttitudeSolution, FusionErrors, PositionFusion, PositionSolution,
        RateDivider, Validity,
    };
    pub use crate::kalman::KalmanFilter;
    pub use crate::position::{PositionEstimator, PositionState};
    pub use crate::providers::*;
    pub use crate::sensors::*;
}
