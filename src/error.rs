/*

    Errors raised while configuring primitives.

    Only construction and mutation can fail, a ray that
    misses is reported as None by the intersection routines.

    @date: 12 Nov, 2025
    @author: bartu
*/

use thiserror::Error;

use crate::numeric::Float;

/// Errors raised when a primitive is configured with invalid geometry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Lower corner exceeds the upper corner on some axis.
    #[error("Invalid bounds on axis {axis}: lower {lower} is greater than upper {upper}")]
    InvalidBounds {
        /// Offending axis (0 = x, 1 = y, 2 = z).
        axis: usize,
        /// Lower bound component.
        lower: Float,
        /// Upper bound component.
        upper: Float,
    },

    /// A transform matrix with no inverse was supplied.
    #[error("Transform is not invertible (determinant {determinant})")]
    SingularTransform {
        /// Determinant of the rejected matrix.
        determinant: Float,
    },
}
