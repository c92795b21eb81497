/*

    Local <-> world transform pair.

    Composing parent/child transforms belongs to the scene
    graph, primitives only store the pair they were given.
    "World" here means the frame of whoever owns the primitive:
    the accelerator's frame for top-level primitives, the
    local frame of the CSG node for its operands.

    @date: 12 Nov, 2025
    @author: bartu
*/

use crate::error::GeometryError;
use crate::numeric::{*};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub to_world: Matrix4,
    pub to_local: Matrix4,
}

impl Transform {

    pub const IDENTITY: Self = Self {
        to_world: Matrix4::IDENTITY,
        to_local: Matrix4::IDENTITY,
    };

    /// Build the pair from the local-to-world matrix, rejecting
    /// matrices that cannot be inverted.
    pub fn new(to_world: Matrix4) -> Result<Self, GeometryError> {
        let det = to_world.determinant();
        if !det.is_finite() || det == 0.0 {
            return Err(GeometryError::SingularTransform { determinant: det });
        }
        Ok(Self {
            to_world,
            to_local: to_world.inverse(),
        })
    }

    pub fn translation(offset: Vector3) -> Self {
        Self {
            to_world: Matrix4::from_translation(offset),
            to_local: Matrix4::from_translation(-offset),
        }
    }

    #[inline]
    pub fn point_to_local(&self, p: &Vector3) -> Vector3 {
        transform_point(&self.to_local, p)
    }

    #[inline]
    pub fn point_to_world(&self, p: &Vector3) -> Vector3 {
        transform_point(&self.to_world, p)
    }
}
