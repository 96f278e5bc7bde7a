pub mod euler_angles;
pub mod quaternion;
pub mod rotation_matrix;

use nalgebra::Vector3;

pub mod prelude {
    pub use crate::RotationTrait;
    pub use crate::euler_angles::*;
    pub use crate::quaternion::*;
    pub use crate::rotation_matrix::*;
}

/// Trait defining rotation and transformation operations.
///
/// Every rotation in this workspace is stored as the rotation that takes
/// a vector expressed in the "from" frame to the "to" frame, e.g. the
/// attitude quaternion maps body frame vectors into the local-level frame.
pub trait RotationTrait {
    /// Rotates a vector by the rotation.
    /// aka Active Rotation or "Alibi"
    ///
    /// # Arguments
    ///
    /// * `v` - The vector to be rotated.
    ///
    /// # Returns
    ///
    /// The rotated vector.
    fn rotate(&self, v: &Vector3<f64>) -> Vector3<f64>;

    /// Transforms a vector by the rotation.
    /// aka Passive Rotation or "Alias", the inverse of `rotate`
    ///
    /// # Arguments
    ///
    /// * `v` - The vector to be transformed.
    ///
    /// # Returns
    ///
    /// The transformed vector.
    fn transform(&self, v: &Vector3<f64>) -> Vector3<f64>;

    fn inv(&self) -> Self;

    fn identity() -> Self;
}
