//! Reference vector measurement model for the attitude filters.
//!
//! A reference vector `r` known in the local-level frame is observed in the
//! body frame as `h(q) = A(q) r / |q|^2`, where `A(q) r` is the passive
//! rotation written as a quadratic form in the (possibly unnormalized)
//! quaternion components. Measurement updates never renormalize the stored
//! quaternion, so the division by `|q|^2` keeps the prediction exact off the
//! unit sphere and the Jacobian has to carry the matching correction term.

use nalgebra::{Matrix3x4, SMatrix, Vector3, Vector4};
use rotations::prelude::Quaternion;

/// Predicted body frame observation of `reference` for state quaternion `q`
/// stored as (x, y, z, w).
pub fn predict_reference(q: &Vector4<f64>, reference: &Vector3<f64>) -> Vector3<f64> {
    Quaternion::from(*q).transform_scaled(reference) / q.norm_squared()
}

/// dh/dq of `predict_reference`, columns ordered (x, y, z, w).
///
/// Each column is the raw derivative of `A(q) r` divided by `|q|^2`, minus
/// `2 q_i / |q|^4` times the unnormalized rotated reference.
pub fn reference_jacobian(q: &Vector4<f64>, reference: &Vector3<f64>) -> Matrix3x4<f64> {
    let n2 = q.norm_squared();
    let rotated = Quaternion::from(*q).transform_scaled(reference);
    raw_jacobian(q, reference) / n2 - rotated * (q * (2.0 / (n2 * n2))).transpose()
}

/// Derivative of the unnormalized `A(q) r` with respect to each component.
fn raw_jacobian(q: &Vector4<f64>, r: &Vector3<f64>) -> Matrix3x4<f64> {
    let (x, y, z, w) = (q[0], q[1], q[2], q[3]);
    let (r0, r1, r2) = (r[0], r[1], r[2]);

    Matrix3x4::new(
        // row 1
        2.0 * (x * r0 + y * r1 + z * r2),
        2.0 * (-y * r0 + x * r1 - w * r2),
        2.0 * (-z * r0 + w * r1 + x * r2),
        2.0 * (w * r0 + z * r1 - y * r2),
        // row 2
        2.0 * (y * r0 - x * r1 + w * r2),
        2.0 * (x * r0 + y * r1 + z * r2),
        2.0 * (-w * r0 - z * r1 + y * r2),
        2.0 * (-z * r0 + w * r1 + x * r2),
        // row 3
        2.0 * (z * r0 - w * r1 - x * r2),
        2.0 * (w * r0 + z * r1 - y * r2),
        2.0 * (x * r0 + y * r1 + z * r2),
        2.0 * (y * r0 - x * r1 + w * r2),
    )
}

/// Embeds a quaternion block into a full state Jacobian. Angular rate
/// columns stay zero since no reference measurement depends on the rate.
pub fn state_jacobian(block: &Matrix3x4<f64>) -> SMatrix<f64, 3, 7> {
    let mut h = SMatrix::<f64, 3, 7>::zeros();
    h.fixed_view_mut::<3, 4>(0, 0).copy_from(block);
    h
}

/// Two stacked reference blocks, first block on top.
pub fn stacked_state_jacobian(
    first: &Matrix3x4<f64>,
    second: &Matrix3x4<f64>,
) -> SMatrix<f64, 6, 7> {
    let mut h = SMatrix::<f64, 6, 7>::zeros();
    h.fixed_view_mut::<3, 4>(0, 0).copy_from(first);
    h.fixed_view_mut::<3, 4>(3, 0).copy_from(second);
    h
}
