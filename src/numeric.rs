/*

    Declare numeric types used throughout this crate.

    Everything is computed in double precision, CSG
    traversal compares distances of independent
    primitives so f32 round-off shows up quickly.

    @date: 2 Oct, 2025
    @author: Bartu
*/

use bevy_math::{DMat4, DVec3, DVec4};
pub type Float = f64;
pub type Vector3 = DVec3;
pub type Matrix4 = DMat4;
pub type Vector4 = DVec4;

pub const X_AXIS: usize = 0;
pub const Y_AXIS: usize = 1;
pub const Z_AXIS: usize = 2;

pub fn transform_point(mat: &Matrix4, v: &Vector3) -> Vector3 {
    let v4 = Vector4::new(v.x, v.y, v.z, 1.0);
    let r = *mat * v4;
    Vector3::new(r.x, r.y, r.z)
}

pub fn transform_dir(mat: &Matrix4, v: &Vector3) -> Vector3 {
    // Only difference from transform_point is that last component
    // w = 0
    let v4 = Vector4::new(v.x, v.y, v.z, 0.0);
    let r = *mat * v4;
    Vector3::new(r.x, r.y, r.z)
}

/// Transform a normal given the *inverse* of the matrix applied to points.
/// Callers always hold both halves of a transform pair, so the inverse
/// is never recomputed here.
pub fn transform_normal(inverse: &Matrix4, n: &Vector3) -> Vector3 {
    let inv_t = inverse.transpose();

    // Normal is a direction, so set w = 0.0
    let n4 = Vector4::new(n.x, n.y, n.z, 0.0);
    let r = inv_t * n4;

    Vector3::new(r.x, r.y, r.z).normalize()
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_point_and_dir_differ_under_translation() {
        let m = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let p = transform_point(&m, &Vector3::ZERO);
        let d = transform_dir(&m, &Vector3::X);
        assert_eq!(p, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(d, Vector3::X);
    }

    #[test]
    fn test_normal_stays_perpendicular_under_scale() {
        // Plane x + y = 0 squashed along x
        let m = Matrix4::from_scale(Vector3::new(2.0, 1.0, 1.0));
        let n = Vector3::new(1.0, 1.0, 0.0).normalize();
        let tangent = Vector3::new(1.0, -1.0, 0.0);

        let n_world = transform_normal(&m.inverse(), &n);
        let t_world = transform_dir(&m, &tangent);
        assert_abs_diff_eq!(n_world.dot(t_world), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(n_world.length(), 1.0, epsilon = 1e-12);
    }
}
