//! Whole body control contact constraints
//!
//! Each leg in contact with the ground holds a [`ContactConstraint`], which
//! every control cycle recomputes the quantities the force optimiser needs:
//!
//! - the contact Jacobian, mapping the generalised velocity onto the contact
//!   space,
//! - the bias term, the part of the contact acceleration produced by the
//!   generalised velocity alone,
//! - the friction constraint system `Uf * f <= ieq` bounding the reaction
//!   force `f`.
//!
//! The [`ContactStack`] gathers the active legs into the single system given
//! to the optimiser.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod contact;
mod edge_foot;
mod point_foot;
mod stack;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use contact::*;
pub use edge_foot::*;
pub use point_foot::*;
pub use stack::*;

use crate::robot::LegId;
use nalgebra::{Matrix3, Vector3};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur while updating a contact constraint.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ContactError {
    #[error("Kinematic state for leg {0:?} contains non-finite values")]
    NonFiniteState(LegId),

    #[error("Contact {1} of leg {0:?} is not finite")]
    NonFiniteResult(LegId, &'static str),

    #[error("Expected a vector of length {expected} in the contact space, found {found}")]
    DimMismatch { expected: usize, found: usize },
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Cross product matrix of a vector, `skew(a) * b == a.cross(b)`.
pub fn skew_symmetric(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}
