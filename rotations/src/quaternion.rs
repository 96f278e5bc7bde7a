use crate::RotationTrait;
use nalgebra::{Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Mul, Neg};
use thiserror::Error;

/// A struct representing a quaternion for 3D rotations.
/// The vector part is stored first and the scalar part last, matching the
/// layout of the attitude state vector.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Errors that can occur when creating a `Quaternion`.
#[derive(Debug, Clone, Error, Copy, PartialEq)]
pub enum QuaternionErrors {
    #[error("got zero magnitude quaternion")]
    ZeroMagnitude,
}

impl Quaternion {
    /// Creates an identity quaternion.
    ///
    /// # Returns
    ///
    /// A `Quaternion` representing no rotation.
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Creates a new `Quaternion`, not normalized.
    ///
    /// # Arguments
    ///
    /// * `x` - The x component of the quaternion.
    /// * `y` - The y component of the quaternion.
    /// * `z` - The z component of the quaternion.
    /// * `w` - The scalar component of the quaternion.
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    // Dot product of two quaternions
    pub fn dot(&self, other: &Quaternion) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Conjugate. Equal to the inverse only for unit quaternions.
    pub fn inv(&self) -> Quaternion {
        Quaternion::new(-self.x, -self.y, -self.z, self.w)
    }

    pub fn mag(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalize(&self) -> Result<Self, QuaternionErrors> {
        let mag = self.mag();
        if mag < f64::EPSILON {
            return Err(QuaternionErrors::ZeroMagnitude);
        }
        Ok(Quaternion::new(
            self.x / mag,
            self.y / mag,
            self.z / mag,
            self.w / mag,
        ))
    }

    /// Active rotation by a possibly unnormalized quaternion.
    /// Every term is quadratic in the components, so the result equals the
    /// unit-quaternion rotation scaled by |q|^2.
    pub fn rotate_scaled(&self, v: &Vector3<f64>) -> Vector3<f64> {
        let (q1, q2, q3, q4) = (self.x, self.y, self.z, self.w);

        let out1 = (q1 * q1 - q2 * q2 - q3 * q3 + q4 * q4) * v[0]
            + 2.0 * (q1 * q2 - q3 * q4) * v[1]
            + 2.0 * (q1 * q3 + q2 * q4) * v[2];

        let out2 = 2.0 * (q2 * q1 + q3 * q4) * v[0]
            + (-q1 * q1 + q2 * q2 - q3 * q3 + q4 * q4) * v[1]
            + 2.0 * (q2 * q3 - q1 * q4) * v[2];

        let out3 = 2.0 * (q3 * q1 - q2 * q4) * v[0]
            + 2.0 * (q3 * q2 + q1 * q4) * v[1]
            + (-q1 * q1 - q2 * q2 + q3 * q3 + q4 * q4) * v[2];

        Vector3::new(out1, out2, out3)
    }

    /// Passive rotation by a possibly unnormalized quaternion, i.e. the
    /// rotation by the conjugate. Scaled by |q|^2 like `rotate_scaled`.
    pub fn transform_scaled(&self, v: &Vector3<f64>) -> Vector3<f64> {
        let (q1, q2, q3, q4) = (self.x, self.y, self.z, self.w);

        let out1 = (q1 * q1 - q2 * q2 - q3 * q3 + q4 * q4) * v[0]
            + 2.0 * (q1 * q2 + q3 * q4) * v[1]
            + 2.0 * (q1 * q3 - q2 * q4) * v[2];

        let out2 = 2.0 * (q2 * q1 - q3 * q4) * v[0]
            + (-q1 * q1 + q2 * q2 - q3 * q3 + q4 * q4) * v[1]
            + 2.0 * (q2 * q3 + q1 * q4) * v[2];

        let out3 = 2.0 * (q3 * q1 + q2 * q4) * v[0]
            + 2.0 * (q3 * q2 - q1 * q4) * v[1]
            + (-q1 * q1 - q2 * q2 + q3 * q3 + q4 * q4) * v[2];

        Vector3::new(out1, out2, out3)
    }
}

/// A quaternion known to have unit magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct UnitQuaternion(pub Quaternion);

impl UnitQuaternion {
    pub const IDENTITY: Self = Self(Quaternion::IDENTITY);

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Result<Self, QuaternionErrors> {
        Ok(Self(Quaternion::new(x, y, z, w).normalize()?))
    }

    /// Exponential map of a rotation vector: the exact rotation of angle
    /// |phi| about phi / |phi|. Small angles are handled without dividing
    /// by the angle.
    pub fn exp(phi: &Vector3<f64>) -> Self {
        let angle = phi.magnitude();
        let half = 0.5 * angle;
        // sin(angle/2)/angle tends to 1/2
        let s = if angle > f64::EPSILON {
            half.sin() / angle
        } else {
            0.5
        };
        Self(Quaternion::new(
            phi[0] * s,
            phi[1] * s,
            phi[2] * s,
            half.cos(),
        ))
    }

    /// Propagates the orientation by a body rate held constant over `dt`.
    /// The increment is applied on the right since `omega` is expressed in
    /// the body frame.
    pub fn integrate(&self, omega: &Vector3<f64>, dt: f64) -> Self {
        let q = self.0 * UnitQuaternion::exp(&(omega * dt)).0;
        // product of two unit quaternions, magnitude stays near 1
        Self(q * (1.0 / q.mag()))
    }

    /// Returns whichever of `self` and `-self` lies in the same hemisphere
    /// as `reference`.
    pub fn aligned_with(&self, reference: &UnitQuaternion) -> Self {
        if self.0.dot(&reference.0) < 0.0 {
            -*self
        } else {
            *self
        }
    }

    pub fn dot(&self, other: &UnitQuaternion) -> f64 {
        self.0.dot(&other.0)
    }
}

impl TryFrom<&Quaternion> for UnitQuaternion {
    type Error = QuaternionErrors;
    fn try_from(value: &Quaternion) -> Result<Self, QuaternionErrors> {
        Ok(Self(value.normalize()?))
    }
}

impl From<&UnitQuaternion> for Quaternion {
    fn from(value: &UnitQuaternion) -> Self {
        value.0
    }
}

impl RotationTrait for UnitQuaternion {
    /// Rotates a vector by the quaternion.
    /// Follows the logic from Markley/Crassidis
    /// See Markley/Crassidis section 2.4 and figure 2.2 for details
    fn rotate(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.0.rotate_scaled(v)
    }

    /// Transforms a vector by the quaternion.
    /// Follows the logic from Markley/Crassidis
    /// Section 2.9.3, equations 2.125 and 2.130
    fn transform(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.0.transform_scaled(v)
    }

    fn identity() -> Self {
        Self::IDENTITY
    }

    fn inv(&self) -> Self {
        UnitQuaternion(self.0.inv()) // conjugate of a unit quaternion is still unit
    }
}

impl Default for Quaternion {
    /// Provides the default value for a quaternion.
    ///
    /// # Returns
    ///
    /// The identity quaternion.
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Quaternion> for Quaternion {
    type Output = Self;

    /// Hamilton product.
    /// Composes like DCMs written left to right: for q_b2a and q_c2b,
    /// q_c2a = q_b2a * q_c2b.
    ///
    /// # Arguments
    ///
    /// * `rhs` - The right-hand side quaternion.
    ///
    /// # Returns
    ///
    /// The product of the two quaternions.
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

impl Mul<UnitQuaternion> for UnitQuaternion {
    type Output = Self;
    fn mul(self, rhs: UnitQuaternion) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl Mul<f64> for Quaternion {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs, self.w * rhs)
    }
}

impl Neg for Quaternion {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

impl Neg for UnitQuaternion {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl From<Vector4<f64>> for Quaternion {
    fn from(q: Vector4<f64>) -> Self {
        Self { x: q[0], y: q[1], z: q[2], w: q[3] }
    }
}

impl From<Quaternion> for Vector4<f64> {
    fn from(q: Quaternion) -> Self {
        Vector4::new(q.x, q.y, q.z, q.w)
    }
}

impl fmt::Debug for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Quaternion ")?;
        writeln!(f, "   x: {: >10.6}", self.x)?;
        writeln!(f, "   y: {: >10.6}", self.y)?;
        writeln!(f, "   z: {: >10.6}", self.z)?;
        writeln!(f, "   w: {: >10.6}", self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;
    const TOL: f64 = 1e-12;

    #[test]
    fn test_quaternion_normalization() {
        let qn = UnitQuaternion::new(1.0, 2.0, 3.0, 4.0).unwrap();

        assert_abs_diff_eq!(qn.0.x, 0.18257418583505536, epsilon = TOL);
        assert_abs_diff_eq!(qn.0.y, 0.3651483716701107, epsilon = TOL);
        assert_abs_diff_eq!(qn.0.z, 0.5477225575051661, epsilon = TOL);
        assert_abs_diff_eq!(qn.0.w, 0.7302967433402214, epsilon = TOL);
    }

    #[test]
    fn test_quaternion_zero_magnitude() {
        let result = UnitQuaternion::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(result, Err(QuaternionErrors::ZeroMagnitude));
    }

    #[test]
    fn test_quaternion_rotate_transform_x() {
        let q = UnitQuaternion::exp(&(Vector3::x() * (PI / 4.0)));
        let v = Vector3::new(0.0, 1.0, 0.0);

        let rotated = q.rotate(&v);
        assert_abs_diff_eq!(rotated[0], 0.0, epsilon = TOL);
        assert_abs_diff_eq!(rotated[1], 0.7071067811865475, epsilon = TOL);
        assert_abs_diff_eq!(rotated[2], 0.7071067811865476, epsilon = TOL);

        let transformed = q.transform(&v);
        assert_abs_diff_eq!(transformed[0], 0.0, epsilon = TOL);
        assert_abs_diff_eq!(transformed[1], 0.7071067811865475, epsilon = TOL);
        assert_abs_diff_eq!(transformed[2], -0.7071067811865476, epsilon = TOL);
    }

    #[test]
    fn test_quaternion_scaled_rotation() {
        let q = Quaternion::new(0.3, -0.2, 0.5, 1.1);
        let unit = UnitQuaternion::try_from(&q).unwrap();
        let v = Vector3::new(0.4, -1.2, 2.0);

        let expected = unit.transform(&v) * q.dot(&q);
        let result = q.transform_scaled(&v);
        for i in 0..3 {
            assert_abs_diff_eq!(result[i], expected[i], epsilon = TOL);
        }
    }

    #[test]
    fn test_quaternion_composition() {
        // two successive 45 degree rotations about z make a 90 degree rotation
        let q45 = UnitQuaternion::exp(&(Vector3::z() * (PI / 4.0)));
        let q90 = q45 * q45;
        let result = q90.rotate(&Vector3::x());

        assert_abs_diff_eq!(result[0], 0.0, epsilon = TOL);
        assert_abs_diff_eq!(result[1], 1.0, epsilon = TOL);
        assert_abs_diff_eq!(result[2], 0.0, epsilon = TOL);

        // non commuting pair: rotate about x then about the new z
        let qx = UnitQuaternion::exp(&(Vector3::x() * (PI / 2.0)));
        let qz = UnitQuaternion::exp(&(Vector3::z() * (PI / 2.0)));
        let v = Vector3::y();
        let composed = (qx * qz).rotate(&v);
        let sequential = qx.rotate(&qz.rotate(&v));
        for i in 0..3 {
            assert_abs_diff_eq!(composed[i], sequential[i], epsilon = TOL);
        }
    }

    #[test]
    fn test_quaternion_exp() {
        let q = UnitQuaternion::exp(&Vector3::new(0.0, 0.0, PI / 2.0));
        assert_abs_diff_eq!(q.0.z, (PI / 4.0).sin(), epsilon = TOL);
        assert_abs_diff_eq!(q.0.w, (PI / 4.0).cos(), epsilon = TOL);

        let q = UnitQuaternion::exp(&Vector3::zeros());
        assert_eq!(q, UnitQuaternion::IDENTITY);

        let q = UnitQuaternion::exp(&Vector3::new(1e-20, 0.0, 0.0));
        assert_abs_diff_eq!(q.0.mag(), 1.0, epsilon = TOL);
    }

    #[test]
    fn test_quaternion_integrate() {
        let omega = Vector3::new(0.0, 0.0, 0.3);
        let mut q = UnitQuaternion::IDENTITY;
        for _ in 0..100 {
            q = q.integrate(&omega, 0.01);
        }
        let expected = UnitQuaternion::exp(&Vector3::new(0.0, 0.0, 0.3));
        assert_abs_diff_eq!(q.0.z, expected.0.z, epsilon = 1e-10);
        assert_abs_diff_eq!(q.0.w, expected.0.w, epsilon = 1e-10);
        assert_abs_diff_eq!(q.0.mag(), 1.0, epsilon = TOL);
    }

    #[test]
    fn test_quaternion_aligned_with() {
        let reference = UnitQuaternion::new(0.1, 0.2, 0.3, 0.9).unwrap();
        let flipped = -reference;

        let aligned = flipped.aligned_with(&reference);
        assert!(aligned.dot(&reference) > 0.0);
        assert_eq!(aligned, reference);

        let untouched = reference.aligned_with(&reference);
        assert_eq!(untouched, reference);
    }
}
