/*

    Ray intersection for solid primitives and constructive
    solid geometry.

    @date: 8 Nov, 2025
    @author: bartu
*/

pub mod numeric;
pub mod interval;
pub mod transform;
pub mod config;
pub mod error;
pub mod observer;
pub mod ray;
pub mod bbox;
pub mod shapes;
pub mod acceleration;
pub mod csg;

pub mod prelude;

pub use acceleration::{Accelerator, AcceleratedPrimitive, BVHAccelerator, LinearAccelerator, PrimitiveMut};
pub use bbox::BoundingBox;
pub use config::Tolerances;
pub use csg::{CsgOperator, CsgPrimitive, Intersect, Operand, OperandMut, Subtract, Union};
pub use error::GeometryError;
pub use observer::{ChangeNotifier, GeometryObserver, ObserverHandle};
pub use ray::{Intersection, Ray};
pub use shapes::{BoxPrimitive, HeapAllocatedPrimitive, NullPrimitive, Primitive, PrimitiveId, PrimitiveList};
pub use transform::Transform;
