/*

    Numeric tolerances shared by primitives.

    Defaults are good for scenes measured in metres. A host
    application can embed these in its own scene description,
    keys follow the PascalCase convention of the scene JSON:

        { "SurfaceOffset": 1e-9, "BoundingBoxPadding": 1e-9 }

    @date: 12 Nov, 2025
    @author: bartu
*/

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, SmartDefault)]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct Tolerances {
    /// Distance hit points are pushed off a surface to produce
    /// inside/outside points. Also the edge threshold for boxes.
    #[default = 1e-9]
    pub surface_offset: Float,

    /// Padding added around every bounding box to absorb
    /// round-off at shared primitive boundaries.
    #[default = 1e-9]
    pub bounding_box_padding: Float,
}
