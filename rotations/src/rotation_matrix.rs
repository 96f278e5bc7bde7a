use crate::RotationTrait;
use crate::quaternion::UnitQuaternion;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// A struct representing a 3x3 rotation matrix.
/// Columns are the axes of the "from" frame expressed in the "to" frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationMatrix(pub Matrix3<f64>);

impl RotationMatrix {
    pub fn get_value(&self) -> Matrix3<f64> {
        self.0
    }
}

impl From<Matrix3<f64>> for RotationMatrix {
    fn from(value: Matrix3<f64>) -> Self {
        Self(value)
    }
}

impl From<&UnitQuaternion> for RotationMatrix {
    /// Converts a `UnitQuaternion` into a `RotationMatrix`.
    ///
    /// # Arguments
    ///
    /// * `q` - The quaternion to be converted.
    ///
    /// # Returns
    ///
    /// A new `RotationMatrix` performing the same active rotation.
    fn from(q: &UnitQuaternion) -> Self {
        let (x, y, z, s) = (q.0.x, q.0.y, q.0.z, q.0.w);

        Self(Matrix3::new(
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - s * z),
            2.0 * (x * z + s * y),
            2.0 * (x * y + s * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - s * x),
            2.0 * (x * z - s * y),
            2.0 * (y * z + s * x),
            1.0 - 2.0 * (x * x + y * y),
        ))
    }
}

impl Mul<RotationMatrix> for RotationMatrix {
    type Output = Self;
    fn mul(self, rhs: RotationMatrix) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl RotationTrait for RotationMatrix {
    fn rotate(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.0 * v
    }

    fn transform(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.0.transpose() * v
    }

    fn inv(&self) -> Self {
        Self(self.0.transpose())
    }

    fn identity() -> Self {
        Self(Matrix3::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::euler_angles::EulerAngles;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rotation_matrix_matches_quaternion() {
        let q = UnitQuaternion::from(&EulerAngles::new(0.2, -0.7, 1.9));
        let m = RotationMatrix::from(&q);
        let v = Vector3::new(-3.0, 0.5, 1.25);

        let rotated_m = m.rotate(&v);
        let rotated_q = q.rotate(&v);
        let transformed_m = m.transform(&v);
        let transformed_q = q.transform(&v);
        for i in 0..3 {
            assert_abs_diff_eq!(rotated_m[i], rotated_q[i], epsilon = 1e-12);
            assert_abs_diff_eq!(transformed_m[i], transformed_q[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rotation_matrix_inv() {
        let m = RotationMatrix::from(&UnitQuaternion::from(&EulerAngles::new(0.4, 0.1, -1.0)));
        let product = m * m.inv();
        assert_abs_diff_eq!(product.0, Matrix3::identity(), epsilon = 1e-12);
    }
}
