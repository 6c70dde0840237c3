//! Mass properties of a shape.

use crate::math::{Matrix, Real};

/// The mass and inertia of a shape.
///
/// Mesh shapes are static: they always report the default properties, with no
/// mass and an identity inertia tensor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// The mass, in kilograms.
    pub mass: Real,
    /// The inertia tensor, in local space.
    pub inertia: Matrix<Real>,
}

impl Default for MassProperties {
    fn default() -> Self {
        MassProperties {
            mass: 0.0,
            inertia: Matrix::identity(),
        }
    }
}
