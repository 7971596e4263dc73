//! Stacked contact constraints of all legs in contact

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

// Internal imports
use super::{ContactConstraint, ContactModel};
use crate::robot::{LegId, NUM_GEN_COORDS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The contact constraints of all active legs, stacked into a single system
/// for the force optimiser.
///
/// The reaction force vector of the stack is the concatenation of the active
/// legs' contact space forces, in the order the legs were given.
#[derive(Debug, Clone, Serialize)]
pub struct ContactStack {
    /// Legs in the stack with the offset of their forces in the stacked
    /// reaction force vector.
    pub legs: Vec<(LegId, usize)>,

    /// Stacked contact Jacobians, `dim x NUM_GEN_COORDS`.
    pub jacobian: DMatrix<f64>,

    /// Stacked bias terms.
    pub bias: DVector<f64>,

    /// Block diagonal friction constraint matrix.
    pub friction_matrix: DMatrix<f64>,

    /// Stacked friction constraint right hand sides.
    pub friction_vector: DVector<f64>,

    /// Stacked desired reaction forces.
    pub desired_reaction_force: DVector<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ContactStack {
    /// Stack the given contacts. Inactive contacts are skipped.
    pub fn from_contacts<'a, M, I>(contacts: I) -> Self
    where
        M: ContactModel + 'a,
        I: IntoIterator<Item = &'a ContactConstraint<M>>,
    {
        let active: Vec<&ContactConstraint<M>> =
            contacts.into_iter().filter(|c| c.is_active()).collect();

        let dim: usize = active.iter().map(|c| c.get_dim()).sum();
        let num_rf: usize = active.iter().map(|c| c.get_dim_rf_constraint()).sum();

        let mut stack = Self {
            legs: Vec::with_capacity(active.len()),
            jacobian: DMatrix::zeros(dim, NUM_GEN_COORDS),
            bias: DVector::zeros(dim),
            friction_matrix: DMatrix::zeros(num_rf, dim),
            friction_vector: DVector::zeros(num_rf),
            desired_reaction_force: DVector::zeros(dim),
        };

        let mut row = 0;
        let mut rf_row = 0;

        for c in active {
            let d = c.get_dim();
            let n = c.get_dim_rf_constraint();

            stack
                .jacobian
                .rows_mut(row, d)
                .copy_from(c.get_contact_jacobian());
            stack.bias.rows_mut(row, d).copy_from(c.get_bias_term());
            stack
                .desired_reaction_force
                .rows_mut(row, d)
                .copy_from(c.get_desired_reaction_force());
            stack
                .friction_matrix
                .view_mut((rf_row, row), (n, d))
                .copy_from(c.get_friction_constraint_matrix());
            stack
                .friction_vector
                .rows_mut(rf_row, n)
                .copy_from(c.get_friction_constraint_vector());

            stack.legs.push((c.leg(), row));

            row += d;
            rf_row += n;
        }

        trace!(
            "Contact stack built with {} legs, {} force components",
            stack.legs.len(),
            dim
        );

        stack
    }

    /// Number of legs in the stack.
    pub fn num_contacts(&self) -> usize {
        self.legs.len()
    }

    /// Returns true if no leg is in contact.
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Total dimension of the stacked reaction force.
    pub fn dim(&self) -> usize {
        self.jacobian.nrows()
    }

    /// Total number of friction constraint rows.
    pub fn num_rf_constraints(&self) -> usize {
        self.friction_matrix.nrows()
    }

    /// Offset of a leg's forces in the stacked reaction force, or `None` if
    /// the leg is not in the stack.
    pub fn force_offset(&self, leg: LegId) -> Option<usize> {
        self.legs
            .iter()
            .find(|(l, _)| *l == leg)
            .map(|(_, offset)| *offset)
    }
}
