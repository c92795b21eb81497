/*

    Constructive solid geometry: Union, Intersect, Subtract.

    Compound solids are never meshed. A ray is classified
    against both operands and only the crossings where it
    moves between inside and outside of the *result* are
    reported (ray interval classification, Roth 1982).

    Each node owns its two operands through a private
    sub-root. Mutating an operand goes through OperandMut,
    whose drop rebuilds the cached operand boxes and tells
    whoever owns the node that its geometry changed.

    @date: 14 Nov, 2025
    @author: bartu
*/

use std::any::Any;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::acceleration::AcceleratedPrimitive;
use crate::bbox::BoundingBox;
use crate::config::Tolerances;
use crate::observer::ObserverHandle;
use crate::ray::{Ray, Intersection};
use crate::shapes::{HeapAllocatedPrimitive, NullPrimitive, Primitive, PrimitiveCore, PrimitiveId};
use crate::transform::Transform;
use crate::prelude::*;


// =======================================================================================================
// Operators
// =======================================================================================================
pub trait CsgOperator: Debug + Default + Send + Sync + 'static {

    const NAME: &'static str;

    /// B's surface bounds removed space, so its orientation is reversed in the result
    const INVERTS_B: bool = false;

    /// Is a point in the result given its membership of A and B
    fn combine(in_a: bool, in_b: bool) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnionOperator;

#[derive(Debug, Default, Clone, Copy)]
pub struct IntersectOperator;

#[derive(Debug, Default, Clone, Copy)]
pub struct SubtractOperator;

impl CsgOperator for UnionOperator {
    const NAME: &'static str = "Union";

    fn combine(in_a: bool, in_b: bool) -> bool {
        in_a || in_b
    }
}

impl CsgOperator for IntersectOperator {
    const NAME: &'static str = "Intersect";

    fn combine(in_a: bool, in_b: bool) -> bool {
        in_a && in_b
    }
}

impl CsgOperator for SubtractOperator {
    const NAME: &'static str = "Subtract";
    const INVERTS_B: bool = true;

    fn combine(in_a: bool, in_b: bool) -> bool {
        in_a && !in_b
    }
}

pub type Union = CsgPrimitive<UnionOperator>;
pub type Intersect = CsgPrimitive<IntersectOperator>;
pub type Subtract = CsgPrimitive<SubtractOperator>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    A,
    B,
}


// =======================================================================================================
// Sub-root owning the operands
// =======================================================================================================
#[derive(Debug)]
struct CsgRoot {
    a: AcceleratedPrimitive,
    b: AcceleratedPrimitive,
}

impl CsgRoot {

    fn new(a: HeapAllocatedPrimitive, b: HeapAllocatedPrimitive) -> Self {
        Self {
            a: Self::adopt(a),
            b: Self::adopt(b),
        }
    }

    /// Reparent: the node now owns the operand and tracks its changes itself
    fn adopt(mut primitive: HeapAllocatedPrimitive) -> AcceleratedPrimitive {
        primitive.set_observer(None);
        AcceleratedPrimitive::new(primitive)
    }

    fn operand(&self, which: Operand) -> &AcceleratedPrimitive {
        match which {
            Operand::A => &self.a,
            Operand::B => &self.b,
        }
    }

    fn operand_mut(&mut self, which: Operand) -> &mut AcceleratedPrimitive {
        match which {
            Operand::A => &mut self.a,
            Operand::B => &mut self.b,
        }
    }

    fn replace(&mut self, which: Operand, mut primitive: HeapAllocatedPrimitive) -> HeapAllocatedPrimitive {
        primitive.set_observer(None);
        self.operand_mut(which).replace(primitive)
    }

    /// Either operand changed, cached boxes of both are stale
    fn geometry_changed(&mut self) {
        self.a.rebuild();
        self.b.rebuild();
    }
}


/// Where a traversal stands between hit() and next_intersection() calls
#[derive(Debug)]
struct Traversal {
    ray: Ray,                    // query ray, parent frame
    a: Option<Intersection>,     // next unclassified crossing of A
    b: Option<Intersection>,     // next unclassified crossing of B
    consumed: Operand,           // operand whose crossing was reported last
    coincidence: Float,          // ray distances closer than this are the same surface point
}


// =======================================================================================================
// CsgPrimitive (impl Primitive)
// =======================================================================================================
#[derive(Debug)]
pub struct CsgPrimitive<O: CsgOperator> {
    core: PrimitiveCore,
    root: CsgRoot,
    tolerances: Tolerances,
    traversal: Option<Traversal>,
    operator: PhantomData<O>,
}

impl<O: CsgOperator> Default for CsgPrimitive<O> {
    /// Both operand slots hold placeholders until configured
    fn default() -> Self {
        Self::new(Box::new(NullPrimitive::new()), Box::new(NullPrimitive::new()))
    }
}

impl<O: CsgOperator> CsgPrimitive<O> {

    pub fn new(primitive_a: HeapAllocatedPrimitive, primitive_b: HeapAllocatedPrimitive) -> Self {
        let node = Self {
            core: PrimitiveCore::default(),
            root: CsgRoot::new(primitive_a, primitive_b),
            tolerances: Tolerances::default(),
            traversal: None,
            operator: PhantomData,
        };
        debug!("{} {} created from {} and {}", O::NAME, node.core.id, node.primitive_a().id(), node.primitive_b().id());
        node
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.core.transform = transform;
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn primitive_a(&self) -> &(dyn Primitive + 'static) {
        self.root.a.primitive()
    }

    pub fn primitive_b(&self) -> &(dyn Primitive + 'static) {
        self.root.b.primitive()
    }

    pub fn operand(&self, which: Operand) -> &(dyn Primitive + 'static) {
        self.root.operand(which).primitive()
    }

    /// Swap operand A, returning the one it replaces
    pub fn set_primitive_a(&mut self, primitive: HeapAllocatedPrimitive) -> HeapAllocatedPrimitive {
        self.replace_operand(Operand::A, primitive)
    }

    /// Swap operand B, returning the one it replaces
    pub fn set_primitive_b(&mut self, primitive: HeapAllocatedPrimitive) -> HeapAllocatedPrimitive {
        self.replace_operand(Operand::B, primitive)
    }

    pub fn replace_operand(&mut self, which: Operand, primitive: HeapAllocatedPrimitive) -> HeapAllocatedPrimitive {
        let old = self.root.replace(which, primitive);
        self.operand_changed();
        old
    }

    /// Mutable access to an operand. Dropping the guard rebuilds the
    /// node's cached data and notifies the node's observer.
    pub fn operand_mut(&mut self, which: Operand) -> OperandMut<'_, O> {
        OperandMut { node: self, which }
    }

    pub fn into_operands(self) -> (HeapAllocatedPrimitive, HeapAllocatedPrimitive) {
        (self.root.a.into_inner(), self.root.b.into_inner())
    }

    fn operand_changed(&mut self) {
        self.root.geometry_changed();
        self.traversal = None;
        debug!("{} {} rebuilt after operand change", O::NAME, self.core.id);
        self.core.notify();
    }

    fn advance(&mut self, which: Operand) -> Option<Intersection> {
        self.root.operand_mut(which).next_intersection()
    }

    /// Walk both crossing streams in distance order until one of them
    /// changes membership of the result.
    fn classify(&mut self, mut state: Traversal) -> Option<Intersection> {
        loop {
            // The next crossing of an operand exits it iff we are inside it now
            let in_a = state.a.as_ref().is_some_and(|i| i.exiting);
            let in_b = state.b.as_ref().is_some_and(|i| i.exiting);
            let before = O::combine(in_a, in_b);

            let (cross_a, cross_b) = match (&state.a, &state.b) {
                (None, None) => return None,
                (Some(_), None) => (true, false),
                (None, Some(_)) => (false, true),
                (Some(a), Some(b)) => {
                    let gap = a.ray_distance - b.ray_distance;
                    if gap.abs() <= state.coincidence {
                        (true, true) // coincident faces are crossed together
                    } else {
                        (gap < 0.0, gap > 0.0)
                    }
                }
            };

            if O::combine(in_a ^ cross_a, in_b ^ cross_b) == before {
                // Crossing lies inside or outside the result, skip it
                if cross_a {
                    state.a = self.advance(Operand::A);
                }
                if cross_b {
                    state.b = self.advance(Operand::B);
                }
                continue;
            }

            let reported = if cross_a && (!cross_b || O::combine(!in_a, in_b) != before) {
                Operand::A
            } else {
                Operand::B
            };

            let candidate = match reported {
                Operand::A => {
                    if cross_b {
                        state.b = self.advance(Operand::B);
                    }
                    state.a.take()
                }
                Operand::B => {
                    if cross_a {
                        state.a = self.advance(Operand::A);
                    }
                    state.b.take()
                }
            };
            let mut hit = candidate?;

            if hit.ray_distance > state.ray.max_distance {
                return None;
            }

            if reported == Operand::B && O::INVERTS_B {
                hit.flip();
            }
            hit.reexpress(&state.ray, self.core.id, &self.core.transform);

            state.consumed = reported;
            self.traversal = Some(state);
            return Some(hit);
        }
    }
}

impl<O: CsgOperator> Primitive for CsgPrimitive<O> {

    fn id(&self) -> PrimitiveId { self.core.id }

    fn transform(&self) -> &Transform { &self.core.transform }

    fn set_transform(&mut self, transform: Transform) {
        self.core.transform = transform;
        self.traversal = None;
        self.core.notify();
    }

    fn set_observer(&mut self, observer: Option<ObserverHandle>) {
        self.core.notifier.set(observer);
    }

    fn bounding_box(&self) -> BoundingBox {
        let mut bbox = *self.root.a.bounding_box();
        bbox.union(self.root.b.bounding_box());
        bbox.transformed(&self.core.transform.to_world, self.tolerances.bounding_box_padding)
    }

    fn hit(&mut self, ray: &Ray) -> Option<Intersection> {

        self.traversal = None;

        // Operands must report every crossing, even past the horizon,
        // or we lose track of whether the ray is inside them
        let local_ray = ray
            .transformed(&self.core.transform.to_local)
            .with_max_distance(Float::INFINITY);

        // Distances are parametric, convert the surface tolerance into them
        let speed = local_ray.direction.length();
        let coincidence = if speed > 0.0 {
            self.tolerances.surface_offset / speed
        } else {
            self.tolerances.surface_offset
        };

        let state = Traversal {
            ray: *ray,
            a: self.root.a.hit(&local_ray),
            b: self.root.b.hit(&local_ray),
            consumed: Operand::A,
            coincidence,
        };
        self.classify(state)
    }

    fn next_intersection(&mut self) -> Option<Intersection> {
        let mut state = self.traversal.take()?;
        match state.consumed {
            Operand::A => state.a = self.advance(Operand::A),
            Operand::B => state.b = self.advance(Operand::B),
        }
        self.classify(state)
    }

    fn contains(&self, point: Vector3) -> bool {
        let local = self.core.transform.point_to_local(&point);
        O::combine(self.root.a.contains(local), self.root.b.contains(local))
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}


/// Guard returned by CsgPrimitive::operand_mut
pub struct OperandMut<'a, O: CsgOperator> {
    node: &'a mut CsgPrimitive<O>,
    which: Operand,
}

impl<O: CsgOperator> Deref for OperandMut<'_, O> {
    type Target = dyn Primitive;

    fn deref(&self) -> &Self::Target {
        self.node.root.operand(self.which).primitive()
    }
}

impl<O: CsgOperator> DerefMut for OperandMut<'_, O> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.node.root.operand_mut(self.which).primitive_mut()
    }
}

impl<O: CsgOperator> Drop for OperandMut<'_, O> {
    fn drop(&mut self) {
        self.node.operand_changed();
    }
}
