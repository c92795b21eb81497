/*

    Declare the Primitive trait and the leaf solids: BoxPrimitive, NullPrimitive.

    Every primitive answers rays given in its parent's frame
    and reports crossings in its own local frame. hit() starts a
    short session, next_intersection() continues it along the
    same ray until the primitive runs out of recorded crossings.

    @date: Oct, 2025
    @author: bartu
*/

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bbox::BoundingBox;
use crate::config::Tolerances;
use crate::error::GeometryError;
use crate::observer::{ChangeNotifier, ObserverHandle};
use crate::ray::{Ray, Intersection};
use crate::transform::Transform;
use crate::prelude::*;

pub type HeapAllocatedPrimitive = Box<dyn Primitive>;
pub type PrimitiveList = Vec<HeapAllocatedPrimitive>;


/// Process-unique handle naming the primitive an intersection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(u64);

impl PrimitiveId {
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}


// =======================================================================================================
// Primitive Trait
// =======================================================================================================
pub trait Primitive : fmt::Debug + Send + Sync + Any {

    fn id(&self) -> PrimitiveId;

    fn transform(&self) -> &Transform;

    /// Move the primitive within its parent's frame. Notifies the observer.
    fn set_transform(&mut self, transform: Transform);

    /// Point change notifications at a new owner (or nobody)
    fn set_observer(&mut self, observer: Option<ObserverHandle>);

    /// Padded box in the parent's frame
    fn bounding_box(&self) -> BoundingBox;

    /// Nearest crossing with ray.min_distance < distance <= ray.max_distance.
    /// Never narrows the ray; callers do that with the returned distance.
    fn hit(&mut self, ray: &Ray) -> Option<Intersection>;

    /// Next crossing along the ray of the last hit() call, if one was recorded.
    fn next_intersection(&mut self) -> Option<Intersection>;

    /// Is the point (parent frame) inside the solid
    fn contains(&self, point: Vector3) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Primitive {
    pub fn downcast_ref<T: Primitive>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Primitive>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}


/// Identity, placement and outward link every primitive carries
#[derive(Debug)]
pub(crate) struct PrimitiveCore {
    pub(crate) id: PrimitiveId,
    pub(crate) transform: Transform,
    pub(crate) notifier: ChangeNotifier,
}

impl Default for PrimitiveCore {
    fn default() -> Self {
        Self {
            id: PrimitiveId::next(),
            transform: Transform::IDENTITY,
            notifier: ChangeNotifier::default(),
        }
    }
}

impl PrimitiveCore {
    pub(crate) fn notify(&self) {
        self.notifier.notify(self.id);
    }
}


// =======================================================================================================
// NullPrimitive (impl Primitive)
// =======================================================================================================

/// Placeholder for an unconfigured operand slot. Has no volume and is never hit.
#[derive(Debug, Default)]
pub struct NullPrimitive {
    core: PrimitiveCore,
}

impl NullPrimitive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Primitive for NullPrimitive {

    fn id(&self) -> PrimitiveId { self.core.id }

    fn transform(&self) -> &Transform { &self.core.transform }

    fn set_transform(&mut self, transform: Transform) {
        self.core.transform = transform;
        self.core.notify();
    }

    fn set_observer(&mut self, observer: Option<ObserverHandle>) {
        self.core.notifier.set(observer);
    }

    fn bounding_box(&self) -> BoundingBox { BoundingBox::EMPTY }

    fn hit(&mut self, _ray: &Ray) -> Option<Intersection> { None }

    fn next_intersection(&mut self) -> Option<Intersection> { None }

    fn contains(&self, _point: Vector3) -> bool { false }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}


// =======================================================================================================
// BoxPrimitive (impl Primitive)
// =======================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Lower,
    Upper,
}

impl Face {
    fn sign(self) -> Float {
        match self {
            Face::Lower => -1.0,
            Face::Upper => 1.0,
        }
    }
}

/// Where the ray crosses one pair of axis planes
#[derive(Debug, Clone, Copy)]
struct Slab {
    near: Float,
    far: Float,
    near_face: Face,
    far_face: Face,
}

/// Second crossing recorded by hit() for next_intersection()
#[derive(Debug, Clone, Copy)]
struct PendingCrossing {
    ray: Ray,
    origin: Vector3,
    direction: Vector3,
    distance: Float,
    face: Face,
    axis: usize,
}

/// Axis aligned box solid, spanning lower..upper in its local frame.
#[derive(Debug)]
pub struct BoxPrimitive {
    core: PrimitiveCore,
    lower: Vector3,
    upper: Vector3,
    tolerances: Tolerances,
    further: Option<PendingCrossing>,
}

impl BoxPrimitive {

    pub fn new(lower: Vector3, upper: Vector3) -> Result<Self, GeometryError> {
        Self::validate(&lower, &upper).inspect_err(|e| warn!("Cannot create box: {}", e))?;
        Ok(Self {
            core: PrimitiveCore::default(),
            lower,
            upper,
            tolerances: Tolerances::default(),
            further: None,
        })
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.core.transform = transform;
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn lower(&self) -> Vector3 { self.lower }

    pub fn upper(&self) -> Vector3 { self.upper }

    pub fn set_lower(&mut self, lower: Vector3) -> Result<(), GeometryError> {
        self.set_bounds(lower, self.upper)
    }

    pub fn set_upper(&mut self, upper: Vector3) -> Result<(), GeometryError> {
        self.set_bounds(self.lower, upper)
    }

    /// Replace both corners at once. On error the box keeps its old bounds.
    pub fn set_bounds(&mut self, lower: Vector3, upper: Vector3) -> Result<(), GeometryError> {
        Self::validate(&lower, &upper).inspect_err(|e| warn!("Rejected bounds for box {}: {}", self.core.id, e))?;
        self.lower = lower;
        self.upper = upper;
        self.further = None;
        self.core.notify();
        Ok(())
    }

    fn validate(lower: &Vector3, upper: &Vector3) -> Result<(), GeometryError> {
        for axis in [X_AXIS, Y_AXIS, Z_AXIS] {
            if lower[axis] > upper[axis] {
                return Err(GeometryError::InvalidBounds { axis, lower: lower[axis], upper: upper[axis] });
            }
        }
        Ok(())
    }

    fn slab(&self, axis: usize, origin: &Vector3, direction: &Vector3) -> Slab {
        let d = direction[axis];
        if d != 0.0 {
            let lower_t = (self.lower[axis] - origin[axis]) / d;
            let upper_t = (self.upper[axis] - origin[axis]) / d;
            if d > 0.0 {
                Slab { near: lower_t, far: upper_t, near_face: Face::Lower, far_face: Face::Upper }
            } else {
                Slab { near: upper_t, far: lower_t, near_face: Face::Upper, far_face: Face::Lower }
            }
        }
        else if self.lower[axis] <= origin[axis] && origin[axis] <= self.upper[axis] {
            // Parallel and within the slab, places no bound on t
            Slab { near: Float::NEG_INFINITY, far: Float::INFINITY, near_face: Face::Lower, far_face: Face::Upper }
        }
        else {
            // Parallel and outside, near > far rejects the box
            Slab { near: Float::INFINITY, far: Float::NEG_INFINITY, near_face: Face::Lower, far_face: Face::Upper }
        }
    }

    fn generate_intersection(&self, ray: &Ray, origin: Vector3, direction: Vector3, distance: Float, face: Face, axis: usize) -> Intersection {

        let hit_point = origin + direction * distance;

        let mut normal = Vector3::ZERO;
        normal[axis] = face.sign();

        let inside_point = hit_point + self.interior_offset(&hit_point, face, axis);
        let outside_point = hit_point + normal * self.tolerances.surface_offset;

        Intersection {
            ray: *ray,
            ray_distance: distance,
            primitive: self.core.id,
            hit_point,
            inside_point,
            outside_point,
            normal,
            exiting: direction.dot(normal) >= 0.0,
            to_local: self.core.transform.to_local,
            to_world: self.core.transform.to_world,
        }
    }

    /// Offset pushing a surface point into the box. Near an edge or
    /// corner the point is pulled away from the neighbouring faces too,
    /// otherwise it would sit on their boundary.
    fn interior_offset(&self, hit_point: &Vector3, face: Face, axis: usize) -> Vector3 {
        let eps = self.tolerances.surface_offset;
        let mut offset = Vector3::ZERO;
        for a in [X_AXIS, Y_AXIS, Z_AXIS] {
            if a == axis {
                offset[a] = -face.sign() * eps;
            }
            else if hit_point[a] - self.lower[a] < eps {
                offset[a] = eps;
            }
            else if self.upper[a] - hit_point[a] < eps {
                offset[a] = -eps;
            }
        }
        offset
    }
}

impl Primitive for BoxPrimitive {

    fn id(&self) -> PrimitiveId { self.core.id }

    fn transform(&self) -> &Transform { &self.core.transform }

    fn set_transform(&mut self, transform: Transform) {
        self.core.transform = transform;
        self.further = None;
        self.core.notify();
    }

    fn set_observer(&mut self, observer: Option<ObserverHandle>) {
        self.core.notifier.set(observer);
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.lower, self.upper)
            .transformed(&self.core.transform.to_world, self.tolerances.bounding_box_padding)
    }

    fn hit(&mut self, ray: &Ray) -> Option<Intersection> {

        // A new session always discards the previous one
        self.further = None;

        let local_ray = ray.transformed(&self.core.transform.to_local);
        let origin = local_ray.origin;
        let direction = local_ray.direction;
        if direction == Vector3::ZERO {
            return None;
        }

        // Slides 03, p.5-6: largest entry and smallest exit across the three slabs
        let mut near = Float::NEG_INFINITY;
        let mut far = Float::INFINITY;
        let (mut near_face, mut near_axis) = (Face::Lower, X_AXIS);
        let (mut far_face, mut far_axis) = (Face::Upper, X_AXIS);

        for axis in [X_AXIS, Y_AXIS, Z_AXIS] {
            let slab = self.slab(axis, &origin, &direction);
            if slab.near > near {
                near = slab.near;
                near_face = slab.near_face;
                near_axis = axis;
            }
            if slab.far < far {
                far = slab.far;
                far_face = slab.far_face;
                far_axis = axis;
            }
        }

        if near > far || !near.is_finite() || !far.is_finite() {
            return None;
        }

        if ray.accepts(near) {
            if far <= ray.max_distance {
                self.further = Some(PendingCrossing {
                    ray: *ray,
                    origin,
                    direction,
                    distance: far,
                    face: far_face,
                    axis: far_axis,
                });
            }
            Some(self.generate_intersection(ray, origin, direction, near, near_face, near_axis))
        }
        else if ray.accepts(far) {
            Some(self.generate_intersection(ray, origin, direction, far, far_face, far_axis))
        }
        else {
            None
        }
    }

    fn next_intersection(&mut self) -> Option<Intersection> {
        let pending = self.further.take()?;
        Some(self.generate_intersection(&pending.ray, pending.origin, pending.direction, pending.distance, pending.face, pending.axis))
    }

    fn contains(&self, point: Vector3) -> bool {
        let p = self.core.transform.point_to_local(&point);
        p.cmpge(self.lower).all() && p.cmple(self.upper).all()
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
