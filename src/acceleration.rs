/*

    Whole-scene closest hit and containment queries.

    Accelerator is the seam a spatial index plugs into:
    build(), hit() and inside() must answer exactly as the
    linear scan does, only faster.

    @date: 9 Nov, 2025
    @author: bartu
*/

use std::fmt::Debug;
use std::ops::{Deref, DerefMut};
use std::time::Instant;

use crate::bbox::BoundingBox;
use crate::ray::{Ray, Intersection};
use crate::shapes::{HeapAllocatedPrimitive, Primitive, PrimitiveList};
use crate::prelude::*;


// ====================================================================================================
// AcceleratedPrimitive
// ====================================================================================================

/// Primitive paired with its bounding box in the owner's frame.
/// The box goes stale whenever the primitive's geometry changes, owners call rebuild().
#[derive(Debug)]
pub struct AcceleratedPrimitive {
    primitive: HeapAllocatedPrimitive,
    bbox: BoundingBox,
    in_session: bool, // true if the last hit() reached the primitive
}

impl AcceleratedPrimitive {

    pub fn new(primitive: HeapAllocatedPrimitive) -> Self {
        let bbox = primitive.bounding_box();
        Self {
            primitive,
            bbox,
            in_session: false,
        }
    }

    pub fn rebuild(&mut self) {
        self.bbox = self.primitive.bounding_box();
        self.in_session = false;
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn primitive(&self) -> &(dyn Primitive + 'static) {
        self.primitive.as_ref()
    }

    /// Mutable access for owners; they must rebuild() afterwards
    pub(crate) fn primitive_mut(&mut self) -> &mut (dyn Primitive + 'static) {
        self.primitive.as_mut()
    }

    /// Swap in another primitive, returning the old one
    pub(crate) fn replace(&mut self, primitive: HeapAllocatedPrimitive) -> HeapAllocatedPrimitive {
        let old = std::mem::replace(&mut self.primitive, primitive);
        self.rebuild();
        old
    }

    pub fn into_inner(self) -> HeapAllocatedPrimitive {
        self.primitive
    }

    /// Only asks the primitive if the ray enters its box
    pub fn hit(&mut self, ray: &Ray) -> Option<Intersection> {
        self.in_session = self.bbox.hit(ray);
        if !self.in_session {
            return None;
        }
        self.primitive.hit(ray)
    }

    pub fn next_intersection(&mut self) -> Option<Intersection> {
        if !self.in_session {
            return None;
        }
        self.primitive.next_intersection()
    }

    /// Box test first, it is only a pre-filter for the exact test
    pub fn contains(&self, point: Vector3) -> bool {
        self.bbox.contains(point) && self.primitive.contains(point)
    }
}


// ====================================================================================================
// Accelerator trait
// ====================================================================================================
pub trait Accelerator: Debug + Send + Sync {

    /// Index the primitives, replacing whatever was indexed before
    fn build(&mut self, primitives: PrimitiveList);

    /// Closest crossing over all primitives with min_distance < distance < max_distance.
    /// Ties go to the primitive that comes first in build order.
    fn hit(&mut self, ray: &Ray) -> Option<Intersection>;

    /// Every primitive containing the point, in build order
    fn inside(&self, point: Vector3) -> Vec<&dyn Primitive>;

    fn entries(&self) -> &[AcceleratedPrimitive];

    /// Entries expose no way to reshape a primitive, that goes through primitive_mut()
    fn entries_mut(&mut self) -> &mut [AcceleratedPrimitive];

    /// Recompute cached data after the primitive at index changed
    fn refresh(&mut self, index: usize);

    /// Hand back the primitives, leaving the accelerator empty
    fn take_primitives(&mut self) -> PrimitiveList;

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Mutable access to one primitive, refreshed when the guard drops
    fn primitive_mut(&mut self, index: usize) -> Option<PrimitiveMut<'_, Self>>
    where
        Self: Sized,
    {
        if index >= self.len() {
            return None;
        }
        Some(PrimitiveMut { accelerator: self, index })
    }
}

/// Guard returned by Accelerator::primitive_mut
pub struct PrimitiveMut<'a, A: Accelerator + ?Sized> {
    accelerator: &'a mut A,
    index: usize,
}

impl<A: Accelerator + ?Sized> Deref for PrimitiveMut<'_, A> {
    type Target = dyn Primitive;

    fn deref(&self) -> &Self::Target {
        &*self.accelerator.entries()[self.index].primitive
    }
}

impl<A: Accelerator + ?Sized> DerefMut for PrimitiveMut<'_, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.accelerator.entries_mut()[self.index].primitive
    }
}

impl<A: Accelerator + ?Sized> Drop for PrimitiveMut<'_, A> {
    fn drop(&mut self) {
        self.accelerator.refresh(self.index);
    }
}

/// Closest crossing found so far during one accelerator query.
/// Equal distances go to the entry built first, whatever order entries are visited in.
#[derive(Debug)]
struct ClosestHit {
    hit: Option<Intersection>,
    distance: Float,
    index: usize,
}

impl ClosestHit {

    fn new(ray: &Ray) -> Self {
        Self { hit: None, distance: ray.max_distance, index: usize::MAX }
    }

    /// Horizon a candidate must stay within to still compete
    fn horizon(&self, ray: &Ray) -> Ray {
        ray.with_max_distance(self.distance)
    }

    fn offer(&mut self, ray: &Ray, index: usize, candidate: Option<Intersection>) {
        let Some(mut hit) = candidate else { return };
        let d = hit.ray_distance;
        if d <= ray.min_distance {
            return;
        }
        let closer = d < self.distance;
        let tie_won = self.hit.is_some() && d == self.distance && index < self.index;
        if closer || tie_won {
            self.distance = d;
            self.index = index;
            hit.ray = *ray;
            self.hit = Some(hit);
        }
    }
}


// ====================================================================================================
// Linear scan
// ====================================================================================================
#[derive(Debug, Default)]
pub struct LinearAccelerator {
    entries: Vec<AcceleratedPrimitive>,
}

impl LinearAccelerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accelerator for LinearAccelerator {

    fn build(&mut self, primitives: PrimitiveList) {
        let start = Instant::now();
        self.entries = primitives.into_iter().map(AcceleratedPrimitive::new).collect();
        info!("Linear accelerator over {} primitives built in {:?}", self.entries.len(), start.elapsed());
    }

    fn hit(&mut self, ray: &Ray) -> Option<Intersection> {
        let mut closest = ClosestHit::new(ray);
        for (i, entry) in self.entries.iter_mut().enumerate() {
            // Nothing beyond the best so far can win, narrow the horizon
            let candidate = entry.hit(&closest.horizon(ray));
            closest.offer(ray, i, candidate);
        }
        closest.hit
    }

    fn inside(&self, point: Vector3) -> Vec<&dyn Primitive> {
        self.entries
            .iter()
            .filter(|entry| entry.contains(point))
            .map(|entry| entry.primitive())
            .collect()
    }

    fn entries(&self) -> &[AcceleratedPrimitive] {
        &self.entries
    }

    fn entries_mut(&mut self) -> &mut [AcceleratedPrimitive] {
        &mut self.entries
    }

    fn refresh(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.rebuild();
        }
    }

    fn take_primitives(&mut self) -> PrimitiveList {
        self.entries.drain(..).map(AcceleratedPrimitive::into_inner).collect()
    }
}


// ====================================================================================================
// Bounding Volume Hierarchy
// ====================================================================================================
// Binary tree creation is inspired by:
// https://google.github.io/comprehensive-rust/smart-pointers/exercise.html
// Nodes split at the median centre along the widest axis of the centres.

const MAX_LEAF_SIZE: usize = 4;

/// BVH node storing a bounding box, optional children, and entry indices for leaves.
#[derive(Debug)]
struct BVHNode {
    bbox: BoundingBox,
    left: Option<Box<BVHNode>>,
    right: Option<Box<BVHNode>>,
    objects: Vec<usize>,
}

impl BVHNode {

    fn leaf(bbox: BoundingBox, objects: Vec<usize>) -> Self {
        Self { bbox, left: None, right: None, objects }
    }

    fn build(entries: &[AcceleratedPrimitive], mut indices: Vec<usize>) -> Self {

        let mut bbox = BoundingBox::EMPTY;
        for &i in &indices {
            bbox.union(entries[i].bounding_box());
        }

        if indices.len() <= MAX_LEAF_SIZE {
            return Self::leaf(bbox, indices);
        }

        let centres = BoundingBox::from_points(indices.iter().map(|&i| entries[i].bounding_box().centre()));
        let axis = centres.largest_axis();
        if centres.extent(axis) <= 0.0 {
            // All centres coincide, nothing to split on
            return Self::leaf(bbox, indices);
        }

        indices.sort_by(|&a, &b| {
            let ca = entries[a].bounding_box().centre()[axis];
            let cb = entries[b].bounding_box().centre()[axis];
            ca.total_cmp(&cb)
        });
        let right = indices.split_off(indices.len() / 2);

        Self {
            bbox,
            left: Some(Box::new(Self::build(entries, indices))),
            right: Some(Box::new(Self::build(entries, right))),
            objects: Vec::new(),
        }
    }

    fn count(&self) -> usize {
        1 + self.left.as_ref().map_or(0, |n| n.count()) + self.right.as_ref().map_or(0, |n| n.count())
    }

    fn hit(&self, entries: &mut [AcceleratedPrimitive], ray: &Ray, closest: &mut ClosestHit) {

        if !self.bbox.hit(&closest.horizon(ray)) {
            return; // The ray entirely misses this bounding box
        }

        for &i in &self.objects {
            let candidate = entries[i].hit(&closest.horizon(ray));
            closest.offer(ray, i, candidate);
        }

        if let Some(left) = &self.left {
            left.hit(entries, ray, closest);
        }
        if let Some(right) = &self.right {
            right.hit(entries, ray, closest);
        }
    }

    fn inside(&self, entries: &[AcceleratedPrimitive], point: Vector3, found: &mut Vec<usize>) {

        if !self.bbox.contains(point) {
            return;
        }

        found.extend(self.objects.iter().copied().filter(|&i| entries[i].contains(point)));

        if let Some(left) = &self.left {
            left.inside(entries, point, found);
        }
        if let Some(right) = &self.right {
            right.inside(entries, point, found);
        }
    }
}

#[derive(Debug, Default)]
pub struct BVHAccelerator {
    entries: Vec<AcceleratedPrimitive>,
    root: Option<BVHNode>,
}

impl BVHAccelerator {

    pub fn new() -> Self {
        Self::default()
    }

    fn build_tree(&mut self) {
        let start = Instant::now();

        // Entries without volume can never be hit, keep them out of the tree
        let indices: Vec<usize> = (0..self.entries.len())
            .filter(|&i| !self.entries[i].bounding_box().is_empty())
            .collect();

        self.root = if indices.is_empty() {
            None
        } else {
            Some(BVHNode::build(&self.entries, indices))
        };

        info!(
            "BVH over {} primitives built in {:?} ({} nodes)",
            self.entries.len(),
            start.elapsed(),
            self.root.as_ref().map_or(0, |n| n.count())
        );
    }
}

impl Accelerator for BVHAccelerator {

    fn build(&mut self, primitives: PrimitiveList) {
        self.entries = primitives.into_iter().map(AcceleratedPrimitive::new).collect();
        self.build_tree();
    }

    fn hit(&mut self, ray: &Ray) -> Option<Intersection> {
        let mut closest = ClosestHit::new(ray);
        if let Some(root) = &self.root {
            root.hit(&mut self.entries, ray, &mut closest);
        }
        closest.hit
    }

    fn inside(&self, point: Vector3) -> Vec<&dyn Primitive> {
        let mut found = Vec::new();
        if let Some(root) = &self.root {
            root.inside(&self.entries, point, &mut found);
        }
        found.sort_unstable();
        found.into_iter().map(|i| self.entries[i].primitive()).collect()
    }

    fn entries(&self) -> &[AcceleratedPrimitive] {
        &self.entries
    }

    fn entries_mut(&mut self) -> &mut [AcceleratedPrimitive] {
        &mut self.entries
    }

    fn refresh(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.rebuild();
            debug!("Primitive {} changed, rebuilding BVH", entry.primitive().id());
            self.build_tree();
        }
    }

    fn take_primitives(&mut self) -> PrimitiveList {
        self.root = None;
        self.entries.drain(..).map(AcceleratedPrimitive::into_inner).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{BoxPrimitive, NullPrimitive, PrimitiveId};
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn boxed(lower: Vector3, upper: Vector3) -> HeapAllocatedPrimitive {
        Box::new(BoxPrimitive::new(lower, upper).unwrap())
    }

    /// Unit cubes spanning x = 3i .. 3i + 1
    fn row_of_boxes(n: usize) -> PrimitiveList {
        (0..n)
            .map(|i| {
                let x = 3.0 * i as Float;
                boxed(Vector3::new(x, 0.0, 0.0), Vector3::new(x + 1.0, 1.0, 1.0))
            })
            .collect()
    }

    fn ids<A: Accelerator>(accel: &A) -> Vec<PrimitiveId> {
        accel.entries().iter().map(|e| e.primitive().id()).collect()
    }

    fn index_of<A: Accelerator>(accel: &A, id: PrimitiveId) -> Option<usize> {
        accel.entries().iter().position(|e| e.primitive().id() == id)
    }

    fn check_row_of_boxes<A: Accelerator>(accel: &mut A) {
        accel.build(row_of_boxes(8));
        let ids = ids(accel);

        for (i, id) in ids.iter().enumerate() {
            let x = 3.0 * i as Float + 0.5;
            let hit = accel.hit(&Ray::new_from(Vector3::new(x, 0.5, -5.0), Vector3::Z)).unwrap();
            assert_eq!(hit.primitive, *id);
            assert_abs_diff_eq!(hit.ray_distance, 5.0, epsilon = 1e-12);

            // Through the gap after box i
            let gap = Ray::new_from(Vector3::new(x + 1.5, 0.5, -5.0), Vector3::Z);
            assert!(accel.hit(&gap).is_none());
        }

        let forward = accel.hit(&Ray::new_from(Vector3::new(-5.0, 0.5, 0.5), Vector3::X)).unwrap();
        assert_eq!(forward.primitive, ids[0]);

        let backward = accel.hit(&Ray::new_from(Vector3::new(100.0, 0.5, 0.5), -Vector3::X)).unwrap();
        assert_eq!(backward.primitive, ids[7]);
        assert_abs_diff_eq!(backward.ray_distance, 78.0, epsilon = 1e-12);

        // Ray passing above the whole row
        assert!(accel.hit(&Ray::new_from(Vector3::new(-5.0, 5.0, 0.5), Vector3::X)).is_none());
    }

    #[test]
    fn test_linear_row_of_boxes() {
        check_row_of_boxes(&mut LinearAccelerator::new());
    }

    #[test]
    fn test_bvh_row_of_boxes() {
        check_row_of_boxes(&mut BVHAccelerator::new());
    }

    #[test]
    fn test_horizon_and_min_distance() {
        let mut accel = LinearAccelerator::new();
        accel.build(row_of_boxes(3));
        let ids = ids(&accel);
        let origin = Vector3::new(-5.0, 0.5, 0.5);

        assert!(accel.hit(&Ray::new(origin, Vector3::X, 0.0, 4.0)).is_none());
        assert!(accel.hit(&Ray::new(origin, Vector3::X, 0.0, 5.5)).is_some());

        // Skipping the entry leaves the exit of the first box as the closest crossing
        let hit = accel.hit(&Ray::new(origin, Vector3::X, 5.5, Float::INFINITY)).unwrap();
        assert_eq!(hit.primitive, ids[0]);
        assert!(hit.exiting);
        assert_abs_diff_eq!(hit.ray_distance, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hit_reports_query_ray() {
        let mut accel = LinearAccelerator::new();
        accel.build(row_of_boxes(2));
        let ray = Ray::new_from(Vector3::new(-5.0, 0.5, 0.5), Vector3::X);
        assert_eq!(accel.hit(&ray).unwrap().ray, ray);
    }

    #[test]
    fn test_inside() {
        let mut accel = LinearAccelerator::new();
        accel.build(vec![
            boxed(Vector3::ZERO, Vector3::splat(2.0)),
            boxed(Vector3::ONE, Vector3::splat(3.0)),
            boxed(Vector3::splat(10.0), Vector3::splat(11.0)),
        ]);
        let ids = ids(&accel);

        let found: Vec<_> = accel.inside(Vector3::splat(1.5)).iter().map(|p| p.id()).collect();
        assert_eq!(found, vec![ids[0], ids[1]]);
        assert_eq!(accel.inside(Vector3::splat(2.5)).len(), 1);
        assert!(accel.inside(Vector3::splat(5.0)).is_empty());
    }

    #[test]
    fn test_accelerated_primitive_skips_missed_box() {
        let mut entry = AcceleratedPrimitive::new(boxed(-Vector3::ONE, Vector3::ONE));
        assert!(entry.hit(&Ray::new_from(Vector3::new(0.0, 0.0, -5.0), Vector3::Z)).is_some());

        // A miss on the box must not leave the old exit available
        assert!(entry.hit(&Ray::new_from(Vector3::new(5.0, 5.0, -5.0), Vector3::Z)).is_none());
        assert!(entry.next_intersection().is_none());
    }

    #[test]
    fn test_primitive_mut_refreshes_box() {
        let mut accel = BVHAccelerator::new();
        accel.build(row_of_boxes(6));
        let ray = Ray::new_from(Vector3::new(3.5, 5.0, -5.0), Vector3::Z);
        assert!(accel.hit(&ray).is_none());
        {
            let mut guard = accel.primitive_mut(1).unwrap();
            guard
                .downcast_mut::<BoxPrimitive>()
                .unwrap()
                .set_upper(Vector3::new(4.0, 10.0, 1.0))
                .unwrap();
        }
        let hit = accel.hit(&ray).unwrap();
        assert_eq!(index_of(&accel, hit.primitive), Some(1));
        assert!(accel.primitive_mut(6).is_none());
    }

    #[test]
    fn test_null_primitives_are_never_hit() {
        let mut accel = BVHAccelerator::new();
        accel.build(vec![Box::new(NullPrimitive::new()) as HeapAllocatedPrimitive, boxed(-Vector3::ONE, Vector3::ONE)]);
        let hit = accel.hit(&Ray::new_from(Vector3::new(0.0, 0.0, -5.0), Vector3::Z)).unwrap();
        assert_eq!(index_of(&accel, hit.primitive), Some(1));
        assert_eq!(accel.inside(Vector3::ZERO).len(), 1);
    }

    #[test]
    fn test_take_primitives_empties() {
        let mut accel = BVHAccelerator::new();
        accel.build(row_of_boxes(5));
        let prims = accel.take_primitives();
        assert_eq!(prims.len(), 5);
        assert!(accel.is_empty());
        assert!(accel.hit(&Ray::new_from(Vector3::new(0.5, 0.5, -5.0), Vector3::Z)).is_none());

        // Rebuilding replaces the index
        accel.build(prims);
        assert_eq!(accel.len(), 5);
    }

    /// Random boxes, the first 30 of them repeated at the end so rays hit exact ties
    fn random_scene(seed: u64) -> PrimitiveList {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut corners: Vec<(Vector3, Vector3)> = (0..150)
            .map(|_| {
                let lower = Vector3::new(
                    rng.random_range(-20.0..20.0),
                    rng.random_range(-20.0..20.0),
                    rng.random_range(-20.0..20.0),
                );
                let size = Vector3::new(
                    rng.random_range(0.1..3.0),
                    rng.random_range(0.1..3.0),
                    rng.random_range(0.1..3.0),
                );
                (lower, lower + size)
            })
            .collect();
        corners.extend_from_within(..30);
        corners.into_iter().map(|(lower, upper)| boxed(lower, upper)).collect()
    }

    /// Entries 0 and 5 share the face z = 0 around x = 0.5, the BVH leaf holds 5 ahead of 0
    fn tie_scene() -> PrimitiveList {
        let mut scene = vec![boxed(Vector3::ZERO, Vector3::new(2.0, 1.0, 1.0))];
        for i in 1..=4 {
            let x = 100.0 * i as Float;
            scene.push(boxed(Vector3::new(x, 0.0, 0.0), Vector3::new(x + 1.0, 1.0, 1.0)));
        }
        scene.push(boxed(Vector3::new(-1.0, 0.0, 0.0), Vector3::ONE));
        scene
    }

    #[test]
    fn test_equal_distance_goes_to_first_built() {
        let mut linear = LinearAccelerator::new();
        let mut bvh = BVHAccelerator::new();
        linear.build(tie_scene());
        bvh.build(tie_scene());

        let ray = Ray::new_from(Vector3::new(0.5, 0.5, -5.0), Vector3::Z);
        let a = linear.hit(&ray).unwrap();
        let b = bvh.hit(&ray).unwrap();
        assert_abs_diff_eq!(b.ray_distance, 5.0, epsilon = 1e-12);
        assert_eq!(index_of(&linear, a.primitive), Some(0));
        assert_eq!(index_of(&bvh, b.primitive), Some(0));
    }

    #[test]
    fn test_bvh_agrees_with_linear_scan() {
        let mut linear = LinearAccelerator::new();
        let mut bvh = BVHAccelerator::new();
        linear.build(random_scene(7));
        bvh.build(random_scene(7));

        // Aim a share of the rays at the repeated boxes
        let repeated: Vec<Vector3> = linear.entries()[..30].iter().map(|e| e.bounding_box().centre()).collect();

        let mut rng = StdRng::seed_from_u64(11);
        for n in 0..500 {
            let origin = Vector3::new(
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
            );
            let target = if n % 5 == 0 {
                repeated[n / 5 % repeated.len()]
            } else {
                Vector3::new(
                    rng.random_range(-20.0..20.0),
                    rng.random_range(-20.0..20.0),
                    rng.random_range(-20.0..20.0),
                )
            };
            let ray = Ray::new_from(origin, (target - origin).normalize());

            let a = linear.hit(&ray);
            let b = bvh.hit(&ray);
            assert_eq!(a.is_some(), b.is_some());
            if let (Some(a), Some(b)) = (a, b) {
                assert_abs_diff_eq!(a.ray_distance, b.ray_distance, epsilon = 1e-12);
                assert_eq!(index_of(&linear, a.primitive), index_of(&bvh, b.primitive));
            }

            let in_linear: Vec<_> = linear.inside(origin).iter().filter_map(|p| index_of(&linear, p.id())).collect();
            let in_bvh: Vec<_> = bvh.inside(origin).iter().filter_map(|p| index_of(&bvh, p.id())).collect();
            assert_eq!(in_linear, in_bvh);
        }
    }
}
