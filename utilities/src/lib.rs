use nalgebra::Vector3;
use std::f64::consts::{PI, TAU};

/// Wraps an angle in radians into [-pi, pi).
pub fn wrap_to_pi(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Smallest signed difference `a - b` between two angles in radians.
pub fn angle_difference(a: f64, b: f64) -> f64 {
    wrap_to_pi(a - b)
}

pub fn assert_equal(left: f64, right: f64) {
    assert_equal_reltol(left, right, 1e-9);
}

pub fn assert_equal_reltol(left: f64, right: f64, reltol: f64) {
    let max = left.abs().max(right.abs());
    if max < f64::EPSILON {
        // If both values are close to zero, we consider them equal
        return;
    }
    let abs_diff = (left - right).abs();
    let rel_diff = abs_diff / max;

    assert!(
        rel_diff < reltol,
        "Assertion failed: left ({}) and right ({}) are not approximately equal. Relative difference: {}. Absolute difference: {}",
        left,
        right,
        rel_diff,
        abs_diff,
    );
}

pub fn assert_vector_abstol(left: &Vector3<f64>, right: &Vector3<f64>, abstol: f64) {
    let diff = (left - right).abs().max();
    assert!(
        diff < abstol,
        "Assertion failed: left ({:?}) and right ({:?}) differ by {} in at least one component",
        left.as_slice(),
        right.as_slice(),
        diff,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_to_pi() {
        assert_equal(wrap_to_pi(3.0 * PI / 2.0), -PI / 2.0);
        assert_equal(wrap_to_pi(-3.0 * PI / 2.0), PI / 2.0);
        assert_equal(wrap_to_pi(0.25), 0.25);
        assert_equal(angle_difference(-PI + 0.1, PI - 0.1), 0.2);
    }
}
