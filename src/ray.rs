/*

    Ray and the record of a single ray/primitive crossing.

    Distances are parametric: r(t) = o + t d. Rays are moved
    between frames without renormalising the direction, so a
    distance computed in a primitive's local frame is the
    same number in its parent's frame.

    @date: Oct, 2025
    @author: Bartu
*/

use crate::prelude::*;
use crate::shapes::PrimitiveId;
use crate::transform::Transform;


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vector3,
    pub direction: Vector3,
    pub min_distance: Float, // exclusive, rejects re-hitting the surface we start on
    pub max_distance: Float, // inclusive search horizon
}

impl Ray {

    pub fn new(origin: Vector3, direction: Vector3, min_distance: Float, max_distance: Float) -> Self {
        debug_assert!(min_distance <= max_distance, "Ray min_distance {} exceeds max_distance {}", min_distance, max_distance);
        Self {
            origin,
            direction,
            min_distance,
            max_distance,
        }
    }

    pub fn new_from(origin: Vector3, direction: Vector3) -> Self {
        Self::new(origin, direction, 0.0, Float::INFINITY)
    }

    #[inline]
    pub fn at(&self, t: Float) -> Vector3 {
        self.origin + self.direction * t // r(t) = o + dt
    }

    /// Copy of this ray with a narrower (or wider) search horizon
    pub fn with_max_distance(&self, max_distance: Float) -> Ray {
        Ray::new(self.origin, self.direction, self.min_distance, max_distance)
    }

    /// True if t lies in (min_distance, max_distance]
    #[inline]
    pub fn accepts(&self, t: Float) -> bool {
        t > self.min_distance && t <= self.max_distance
    }

    #[inline]
    pub fn transformed(&self, mat: &Matrix4) -> Ray {
        let origin = transform_point(mat, &self.origin);
        let direction = transform_dir(mat, &self.direction);
        // DO NOT NORMALIZE! distances must agree across frames
        Ray::new(origin, direction, self.min_distance, self.max_distance)
    }
}


/// Where and how a ray crossed the surface of a primitive.
///
/// Points and the normal are expressed in the local frame of `primitive`,
/// `to_world`/`to_local` map between that frame and the frame of `ray`.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    pub ray: Ray,
    pub ray_distance: Float,
    pub primitive: PrimitiveId,
    pub hit_point: Vector3,
    pub inside_point: Vector3,  // hit point pushed into the solid
    pub outside_point: Vector3, // hit point pushed out of the solid
    pub normal: Vector3,        // unit, points out of the solid
    pub exiting: bool,
    pub to_local: Matrix4,
    pub to_world: Matrix4,
}

impl Intersection {

    #[inline]
    pub fn world_hit_point(&self) -> Vector3 {
        transform_point(&self.to_world, &self.hit_point)
    }

    #[inline]
    pub fn world_normal(&self) -> Vector3 {
        transform_normal(&self.to_local, &self.normal)
    }

    /// Move the record one level up the hierarchy: geometry is pushed through
    /// the current to_world and the record takes over the enclosing primitive's
    /// identity, ray and frame.
    pub fn reexpress(&mut self, ray: &Ray, primitive: PrimitiveId, frame: &Transform) {
        self.hit_point = transform_point(&self.to_world, &self.hit_point);
        self.inside_point = transform_point(&self.to_world, &self.inside_point);
        self.outside_point = transform_point(&self.to_world, &self.outside_point);
        self.normal = transform_normal(&self.to_local, &self.normal);

        self.to_local = frame.to_local;
        self.to_world = frame.to_world;
        self.primitive = primitive;
        self.ray = *ray;
    }

    /// Turn the surface inside out. Used when a solid's boundary bounds
    /// empty space in the enclosing result.
    pub(crate) fn flip(&mut self) {
        self.normal = -self.normal;
        self.exiting = !self.exiting;
        std::mem::swap(&mut self.inside_point, &mut self.outside_point);
    }
}
