use crate::quaternion::{Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Z-Y-X (yaw, pitch, roll) Euler angles in radians.
/// The rotation is psi about z, then theta about the new y, then phi about
/// the new x, i.e. R = Rz(psi) * Ry(theta) * Rx(phi).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub phi: f64,
    pub theta: f64,
    pub psi: f64,
}

impl EulerAngles {
    pub fn new(phi: f64, theta: f64, psi: f64) -> Self {
        Self { phi, theta, psi }
    }

    pub fn from_yaw_pitch_roll(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { phi: roll, theta: pitch, psi: yaw }
    }

    /// [yaw, pitch, roll]
    pub fn yaw_pitch_roll(&self) -> [f64; 3] {
        [self.psi, self.theta, self.phi]
    }
}

impl From<&EulerAngles> for UnitQuaternion {
    /// Converts `EulerAngles` to a `UnitQuaternion`.
    /// Reference: Markley & Crassidis, Fundamentals of Spacecraft Attitude Determination & Control
    fn from(euler_angles: &EulerAngles) -> Self {
        let s = |v: f64| (v / 2.0).sin();
        let c = |v: f64| (v / 2.0).cos();

        let (phi, theta, psi) = (euler_angles.phi, euler_angles.theta, euler_angles.psi);

        // product of three unit quaternions, already normalized
        UnitQuaternion(Quaternion::new(
            s(phi) * c(theta) * c(psi) - c(phi) * s(theta) * s(psi),
            c(phi) * s(theta) * c(psi) + s(phi) * c(theta) * s(psi),
            c(phi) * c(theta) * s(psi) - s(phi) * s(theta) * c(psi),
            c(phi) * c(theta) * c(psi) + s(phi) * s(theta) * s(psi),
        ))
    }
}

impl From<&UnitQuaternion> for EulerAngles {
    fn from(q: &UnitQuaternion) -> Self {
        let Quaternion { x, y, z, w } = q.0;

        let phi = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));

        let sin_theta = 2.0 * (w * y - z * x);
        let theta = if sin_theta.abs() >= 1.0 {
            // gimbal lock
            FRAC_PI_2.copysign(sin_theta)
        } else {
            sin_theta.asin()
        };

        let psi = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

        Self { phi, theta, psi }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RotationTrait;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;
    use std::f64::consts::PI;
    const TOL: f64 = 1e-12;

    #[test]
    fn test_euler_pure_yaw() {
        let q = UnitQuaternion::from(&EulerAngles::from_yaw_pitch_roll(PI / 2.0, 0.0, 0.0));
        let v = q.rotate(&Vector3::x());
        assert_abs_diff_eq!(v[0], 0.0, epsilon = TOL);
        assert_abs_diff_eq!(v[1], 1.0, epsilon = TOL);
        assert_abs_diff_eq!(v[2], 0.0, epsilon = TOL);
    }

    #[test]
    fn test_euler_from_quaternion() {
        let angles = EulerAngles::new(0.3, -0.4, 2.5);
        let q = UnitQuaternion::from(&angles);
        let result = EulerAngles::from(&q);

        assert_abs_diff_eq!(result.phi, 0.3, epsilon = TOL);
        assert_abs_diff_eq!(result.theta, -0.4, epsilon = TOL);
        assert_abs_diff_eq!(result.psi, 2.5, epsilon = TOL);

        // same rotation from the other hemisphere
        let result = EulerAngles::from(&-q);
        assert_abs_diff_eq!(result.psi, 2.5, epsilon = TOL);
    }

    #[test]
    fn test_euler_gimbal_lock() {
        let q = UnitQuaternion::from(&EulerAngles::new(0.0, PI / 2.0, 0.0));
        let result = EulerAngles::from(&q);
        assert_abs_diff_eq!(result.theta, PI / 2.0, epsilon = 1e-6);
    }
}
