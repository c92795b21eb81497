/*

    Axis Aligned Bounding Box.

    Used as a cheap pre-filter before the exact intersection
    tests of primitives. EMPTY (lower = +inf, upper = -inf) is
    the box of something with no volume, it is hit by nothing,
    contains nothing and is the identity of union().

    @author: bartu
    @date: 9 Nov, 2025
*/


use crate::prelude::*;

use crate::interval::{Interval};
use crate::ray::{Ray};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lower: Vector3,
    pub upper: Vector3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {

    pub const EMPTY: Self = Self {
        lower: Vector3::INFINITY,
        upper: Vector3::NEG_INFINITY,
    };

    pub fn new(lower: Vector3, upper: Vector3) -> Self {
        assert!(lower.cmple(upper).all(), "Invalid bounds, found upper < lower: {:?} {:?}", lower, upper);
        Self { lower, upper }
    }

    /// Smallest box enclosing all points, EMPTY if there are none
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vector3>,
    {
        let mut bbox = Self::EMPTY;
        for p in points {
            bbox.extend(p);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.lower.cmpgt(self.upper).any()
    }

    pub fn extent(&self, axis: usize) -> Float {
        if self.is_empty() { 0.0 } else { self.upper[axis] - self.lower[axis] }
    }

    pub fn centre(&self) -> Vector3 {
        (self.lower + self.upper) * 0.5
    }

    pub fn largest_axis(&self) -> usize {
        let extents = [self.extent(X_AXIS), self.extent(Y_AXIS), self.extent(Z_AXIS)];
        if extents[X_AXIS] >= extents[Y_AXIS] && extents[X_AXIS] >= extents[Z_AXIS] {
            X_AXIS
        } else if extents[Y_AXIS] >= extents[Z_AXIS] {
            Y_AXIS
        } else {
            Z_AXIS
        }
    }

    pub fn hit(&self, ray: &Ray) -> bool {
        self.full_intersection(ray).is_some()
    }

    /// Entry and exit distances of the ray through the box, clipped to
    /// [0, ray.max_distance]. See slides 03, p.5-6
    pub fn full_intersection(&self, ray: &Ray) -> Option<(Float, Float)> {

        if self.is_empty() {
            return None;
        }

        let mut range = Interval::new(0.0, ray.max_distance);
        for axis in [X_AXIS, Y_AXIS, Z_AXIS] {
            let (min, max) = (self.lower[axis], self.upper[axis]);
            let o = ray.origin[axis];
            let d = ray.direction[axis];

            if d == 0.0 {
                // Parallel to the slab: either always inside it or never
                if o < min || o > max {
                    return None;
                }
                continue;
            }

            let mut t1 = (min - o) / d;
            let mut t2 = (max - o) / d;
            if t2 < t1 {
                std::mem::swap(&mut t1, &mut t2);
            }

            range = range.intersect(&Interval::new(t1, t2));
            if !range.validate() {
                return None;
            }
        }
        Some((range.min, range.max))
    }

    /// Inclusive on every face
    pub fn contains(&self, point: Vector3) -> bool {
        point.cmpge(self.lower).all() && point.cmple(self.upper).all()
    }

    /// Grow self into the minimal box enclosing both
    pub fn union(&mut self, other: &BoundingBox) {
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
    }

    pub fn extend(&mut self, point: Vector3) {
        self.lower = self.lower.min(point);
        self.upper = self.upper.max(point);
    }

    pub fn pad(&mut self, padding: Float) {
        if self.is_empty() {
            return;
        }
        self.lower -= Vector3::splat(padding);
        self.upper += Vector3::splat(padding);
    }

    pub fn vertices(&self) -> [Vector3; 8] {
        let (l, u) = (self.lower, self.upper);
        [
            Vector3::new(l.x, l.y, l.z),
            Vector3::new(l.x, l.y, u.z),
            Vector3::new(l.x, u.y, l.z),
            Vector3::new(l.x, u.y, u.z),
            Vector3::new(u.x, l.y, l.z),
            Vector3::new(u.x, l.y, u.z),
            Vector3::new(u.x, u.y, l.z),
            Vector3::new(u.x, u.y, u.z),
        ]
    }

    /// Re-enclose the eight corners after moving them through mat,
    /// then pad to absorb round-off.
    pub fn transformed(&self, mat: &Matrix4, padding: Float) -> BoundingBox {
        if self.is_empty() {
            return Self::EMPTY;
        }
        let mut bbox = Self::from_points(self.vertices().iter().map(|v| transform_point(mat, v)));
        bbox.pad(padding);
        bbox
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Vector3::ZERO, Vector3::ONE)
    }

    #[test]
    fn test_hit_entry_and_exit() {
        let ray = Ray::new_from(Vector3::new(-5.0, 0.5, 0.5), Vector3::X);
        let (near, far) = unit_box().full_intersection(&ray).unwrap();
        assert_abs_diff_eq!(near, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(far, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_ray_outside_slab_misses() {
        let ray = Ray::new_from(Vector3::new(-5.0, 2.0, 0.5), Vector3::X);
        assert!(!unit_box().hit(&ray));
    }

    #[test]
    fn test_ray_pointing_away_misses() {
        let ray = Ray::new_from(Vector3::new(-5.0, 0.5, 0.5), -Vector3::X);
        assert!(!unit_box().hit(&ray));
    }

    #[test]
    fn test_origin_inside_clips_to_zero() {
        let ray = Ray::new_from(Vector3::splat(0.5), Vector3::X);
        let (near, far) = unit_box().full_intersection(&ray).unwrap();
        assert_eq!(near, 0.0);
        assert_abs_diff_eq!(far, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_horizon_stops_short() {
        let ray = Ray::new(Vector3::new(-5.0, 0.5, 0.5), Vector3::X, 0.0, 4.0);
        assert!(!unit_box().hit(&ray));
        assert!(unit_box().hit(&ray.with_max_distance(5.5)));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let bbox = unit_box();
        assert!(bbox.contains(Vector3::ZERO));
        assert!(bbox.contains(Vector3::ONE));
        assert!(bbox.contains(Vector3::splat(0.5)));
        assert!(!bbox.contains(Vector3::new(1.0 + 1e-9, 0.5, 0.5)));
    }

    #[test]
    fn test_union_commutative_and_idempotent() {
        let a = unit_box();
        let b = BoundingBox::new(Vector3::new(-2.0, 0.5, 0.5), Vector3::new(0.5, 3.0, 0.7));

        let mut ab = a;
        ab.union(&b);
        let mut ba = b;
        ba.union(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab, BoundingBox::new(Vector3::new(-2.0, 0.0, 0.0), Vector3::new(1.0, 3.0, 1.0)));

        let mut aa = a;
        aa.union(&a);
        assert_eq!(aa, a);
    }

    #[test]
    fn test_empty_box() {
        let empty = BoundingBox::EMPTY;
        assert!(empty.is_empty());
        assert!(!empty.contains(Vector3::ZERO));
        assert!(!empty.hit(&Ray::new_from(Vector3::new(-1.0, 0.0, 0.0), Vector3::X)));

        let mut bbox = unit_box();
        bbox.union(&empty);
        assert_eq!(bbox, unit_box());

        let mut padded = empty;
        padded.pad(1.0);
        assert!(padded.is_empty());
    }

    #[test]
    fn test_transformed_encloses_rotated_corners() {
        let rot = Matrix4::from_rotation_z(std::f64::consts::FRAC_PI_4);
        let bbox = BoundingBox::new(-Vector3::ONE, Vector3::ONE).transformed(&rot, 1e-9);
        let half_diag = 2.0_f64.sqrt();
        assert_abs_diff_eq!(bbox.upper.x, half_diag + 1e-9, epsilon = 1e-12);
        assert_abs_diff_eq!(bbox.lower.y, -half_diag - 1e-9, epsilon = 1e-12);
        assert_abs_diff_eq!(bbox.upper.z, 1.0 + 1e-9, epsilon = 1e-12);
    }

    #[test]
    fn test_largest_axis() {
        let bbox = BoundingBox::new(Vector3::ZERO, Vector3::new(1.0, 5.0, 2.0));
        assert_eq!(bbox.largest_axis(), Y_AXIS);
        assert_eq!(bbox.centre(), Vector3::new(0.5, 2.5, 1.0));
    }
}
