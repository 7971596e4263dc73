//! Per-leg contact constraint and the contact model trait

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::{DMatrix, DVector};

// Internal imports
use super::{ContactError, EdgeFoot, PointFoot};
use crate::robot::{KinematicState, LegId, RobotParams, NUM_GEN_COORDS};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The geometry of a contact between a foot and the ground.
///
/// A model computes the four quantities of a [`ContactConstraint`], always
/// called in the order they are declared here. Later steps may use values
/// cached by earlier ones in the same update. Each step writes into a buffer
/// which has already been sized from [`ContactModel::dim`] and
/// [`ContactModel::num_rf_constraints`], and must overwrite all of it.
pub trait ContactModel {
    /// The leg this contact belongs to.
    fn leg(&self) -> LegId;

    /// Dimension of the contact space. The normal force is always the last
    /// component, so this must be at least one.
    fn dim(&self) -> usize;

    /// Number of rows in the friction constraint system.
    fn num_rf_constraints(&self) -> usize;

    /// Compute the contact Jacobian, `dim x NUM_GEN_COORDS`.
    fn update_jacobian(
        &mut self,
        params: &RobotParams,
        state: &KinematicState,
        jacobian: &mut DMatrix<f64>,
    ) -> Result<(), ContactError>;

    /// Compute the bias term, `dim`.
    fn update_bias(
        &mut self,
        params: &RobotParams,
        state: &KinematicState,
        bias: &mut DVector<f64>,
    ) -> Result<(), ContactError>;

    /// Compute the friction constraint matrix, `num_rf_constraints x dim`.
    fn update_friction_matrix(
        &mut self,
        params: &RobotParams,
        matrix: &mut DMatrix<f64>,
    ) -> Result<(), ContactError>;

    /// Compute the right hand side of the friction constraint,
    /// `num_rf_constraints`.
    fn update_ineq_vector(
        &mut self,
        params: &RobotParams,
        vector: &mut DVector<f64>,
    ) -> Result<(), ContactError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Contact constraint of a single leg.
///
/// All buffers are allocated on construction and rewritten in place by
/// [`ContactConstraint::update_contact_constraint`]. Until the first
/// successful update they are all zero and the contact is inactive.
#[derive(Debug, Clone)]
pub struct ContactConstraint<M = ContactGeometry> {
    model: M,

    fz_index: usize,

    jacobian: DMatrix<f64>,
    bias: DVector<f64>,
    friction_matrix: DMatrix<f64>,
    friction_vector: DVector<f64>,

    desired_reaction_force: DVector<f64>,

    is_active: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The available contact models.
#[derive(Debug, Clone)]
pub enum ContactGeometry {
    PointFoot(PointFoot),
    EdgeFoot(EdgeFoot),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ContactModel for ContactGeometry {
    fn leg(&self) -> LegId {
        match self {
            ContactGeometry::PointFoot(m) => m.leg(),
            ContactGeometry::EdgeFoot(m) => m.leg(),
        }
    }

    fn dim(&self) -> usize {
        match self {
            ContactGeometry::PointFoot(m) => m.dim(),
            ContactGeometry::EdgeFoot(m) => m.dim(),
        }
    }

    fn num_rf_constraints(&self) -> usize {
        match self {
            ContactGeometry::PointFoot(m) => m.num_rf_constraints(),
            ContactGeometry::EdgeFoot(m) => m.num_rf_constraints(),
        }
    }

    fn update_jacobian(
        &mut self,
        params: &RobotParams,
        state: &KinematicState,
        jacobian: &mut DMatrix<f64>,
    ) -> Result<(), ContactError> {
        match self {
            ContactGeometry::PointFoot(m) => m.update_jacobian(params, state, jacobian),
            ContactGeometry::EdgeFoot(m) => m.update_jacobian(params, state, jacobian),
        }
    }

    fn update_bias(
        &mut self,
        params: &RobotParams,
        state: &KinematicState,
        bias: &mut DVector<f64>,
    ) -> Result<(), ContactError> {
        match self {
            ContactGeometry::PointFoot(m) => m.update_bias(params, state, bias),
            ContactGeometry::EdgeFoot(m) => m.update_bias(params, state, bias),
        }
    }

    fn update_friction_matrix(
        &mut self,
        params: &RobotParams,
        matrix: &mut DMatrix<f64>,
    ) -> Result<(), ContactError> {
        match self {
            ContactGeometry::PointFoot(m) => m.update_friction_matrix(params, matrix),
            ContactGeometry::EdgeFoot(m) => m.update_friction_matrix(params, matrix),
        }
    }

    fn update_ineq_vector(
        &mut self,
        params: &RobotParams,
        vector: &mut DVector<f64>,
    ) -> Result<(), ContactError> {
        match self {
            ContactGeometry::PointFoot(m) => m.update_ineq_vector(params, vector),
            ContactGeometry::EdgeFoot(m) => m.update_ineq_vector(params, vector),
        }
    }
}

impl ContactConstraint<ContactGeometry> {
    /// Create a point foot contact for the given leg.
    pub fn point_foot(leg: LegId) -> Self {
        Self::new(ContactGeometry::PointFoot(PointFoot::new(leg)))
    }

    /// Create an edge foot contact for the given leg.
    pub fn edge_foot(leg: LegId) -> Self {
        Self::new(ContactGeometry::EdgeFoot(EdgeFoot::new(leg)))
    }
}

impl<M: ContactModel> ContactConstraint<M> {
    /// Create a new inactive contact using the given model.
    ///
    /// Panics if the model has a zero dimensional contact space.
    pub fn new(model: M) -> Self {
        let dim = model.dim();
        let num_rf = model.num_rf_constraints();

        assert!(dim > 0, "Contact model for leg {:?} has no force components", model.leg());

        Self {
            model,
            fz_index: dim - 1,
            jacobian: DMatrix::zeros(dim, NUM_GEN_COORDS),
            bias: DVector::zeros(dim),
            friction_matrix: DMatrix::zeros(num_rf, dim),
            friction_vector: DVector::zeros(num_rf),
            desired_reaction_force: DVector::zeros(dim),
            is_active: false,
        }
    }

    /// Recompute the contact quantities from the current state.
    ///
    /// The Jacobian, bias, friction matrix and friction vector are computed
    /// in that order. The contact only becomes active once all four have
    /// been computed, if any step fails it is left inactive.
    pub fn update_contact_constraint(
        &mut self,
        params: &RobotParams,
        state: &KinematicState,
    ) -> Result<(), ContactError> {
        self.is_active = false;

        let leg = self.model.leg();

        if !state.is_finite() {
            return Err(ContactError::NonFiniteState(leg));
        }

        self.model
            .update_jacobian(params, state, &mut self.jacobian)?;
        if !self.jacobian.iter().all(|v| v.is_finite()) {
            return Err(ContactError::NonFiniteResult(leg, "Jacobian"));
        }

        self.model.update_bias(params, state, &mut self.bias)?;
        if !self.bias.iter().all(|v| v.is_finite()) {
            return Err(ContactError::NonFiniteResult(leg, "bias term"));
        }

        self.model
            .update_friction_matrix(params, &mut self.friction_matrix)?;
        self.model
            .update_ineq_vector(params, &mut self.friction_vector)?;

        self.is_active = true;

        trace!("Contact constraint for leg {:?} updated", leg);

        Ok(())
    }

    /// Mark the leg as out of contact.
    ///
    /// The cached quantities are left as they are.
    pub fn unset_contact(&mut self) {
        self.is_active = false;
    }

    /// Returns true if the last update completed.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// The leg this contact belongs to.
    pub fn leg(&self) -> LegId {
        self.model.leg()
    }

    /// The contact model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Dimension of the contact space.
    pub fn get_dim(&self) -> usize {
        self.jacobian.nrows()
    }

    /// Index of the normal force in the contact space.
    pub fn get_fz_index(&self) -> usize {
        self.fz_index
    }

    /// Number of rows in the friction constraint system.
    pub fn get_dim_rf_constraint(&self) -> usize {
        self.friction_matrix.nrows()
    }

    pub fn get_contact_jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    pub fn get_bias_term(&self) -> &DVector<f64> {
        &self.bias
    }

    pub fn get_friction_constraint_matrix(&self) -> &DMatrix<f64> {
        &self.friction_matrix
    }

    pub fn get_friction_constraint_vector(&self) -> &DVector<f64> {
        &self.friction_vector
    }

    pub fn get_desired_reaction_force(&self) -> &DVector<f64> {
        &self.desired_reaction_force
    }

    /// Set the reaction force the optimiser should aim for.
    ///
    /// The force must have the contact space's dimension.
    pub fn set_desired_reaction_force(&mut self, force: &DVector<f64>) -> Result<(), ContactError> {
        if force.len() != self.get_dim() {
            return Err(ContactError::DimMismatch {
                expected: self.get_dim(),
                found: force.len(),
            });
        }

        self.desired_reaction_force.copy_from(force);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::robot::test_params;
    use std::{cell::RefCell, rc::Rc};

    /// Model that records the order of the update steps and can be told to
    /// fail at one of them.
    struct RecordingModel {
        calls: Rc<RefCell<Vec<&'static str>>>,
        fail_at: Option<&'static str>,
        dim: usize,
    }

    impl RecordingModel {
        fn step(&self, name: &'static str) -> Result<(), ContactError> {
            self.calls.borrow_mut().push(name);
            if self.fail_at == Some(name) {
                Err(ContactError::NonFiniteResult(LegId::FL, name))
            }
            else {
                Ok(())
            }
        }
    }

    impl ContactModel for RecordingModel {
        fn leg(&self) -> LegId {
            LegId::FL
        }

        fn dim(&self) -> usize {
            self.dim
        }

        fn num_rf_constraints(&self) -> usize {
            3
        }

        fn update_jacobian(
            &mut self,
            _: &RobotParams,
            _: &KinematicState,
            jacobian: &mut DMatrix<f64>,
        ) -> Result<(), ContactError> {
            jacobian.fill(1.0);
            self.step("jacobian")
        }

        fn update_bias(
            &mut self,
            _: &RobotParams,
            _: &KinematicState,
            bias: &mut DVector<f64>,
        ) -> Result<(), ContactError> {
            bias.fill(2.0);
            self.step("bias")
        }

        fn update_friction_matrix(
            &mut self,
            _: &RobotParams,
            matrix: &mut DMatrix<f64>,
        ) -> Result<(), ContactError> {
            matrix.fill(3.0);
            self.step("friction_matrix")
        }

        fn update_ineq_vector(
            &mut self,
            _: &RobotParams,
            vector: &mut DVector<f64>,
        ) -> Result<(), ContactError> {
            vector.fill(4.0);
            self.step("ineq_vector")
        }
    }

    fn recording_contact(
        fail_at: Option<&'static str>,
    ) -> (ContactConstraint<RecordingModel>, Rc<RefCell<Vec<&'static str>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let contact = ContactConstraint::new(RecordingModel {
            calls: calls.clone(),
            fail_at,
            dim: 2,
        });
        (contact, calls)
    }

    #[test]
    #[should_panic(expected = "has no force components")]
    fn test_zero_dim_model_rejected() {
        ContactConstraint::new(RecordingModel {
            calls: Rc::new(RefCell::new(Vec::new())),
            fail_at: None,
            dim: 0,
        });
    }

    #[test]
    fn test_defaults_before_update() {
        let contact = ContactConstraint::point_foot(LegId::RR);

        assert!(!contact.is_active());
        assert_eq!(contact.leg(), LegId::RR);
        assert_eq!(contact.get_dim(), 3);
        assert_eq!(contact.get_fz_index(), 2);
        assert_eq!(contact.get_dim_rf_constraint(), 6);
        assert_eq!(contact.get_contact_jacobian().shape(), (3, NUM_GEN_COORDS));
        assert!(contact.get_contact_jacobian().iter().all(|v| *v == 0.0));
        assert!(contact.get_bias_term().iter().all(|v| *v == 0.0));
        assert!(contact.get_friction_constraint_matrix().iter().all(|v| *v == 0.0));
        assert!(contact.get_friction_constraint_vector().iter().all(|v| *v == 0.0));
        assert_eq!(contact.get_desired_reaction_force(), &DVector::zeros(3));

        let contact = ContactConstraint::edge_foot(LegId::FL);
        assert_eq!(contact.get_dim(), 4);
        assert_eq!(contact.get_fz_index(), 3);
        assert_eq!(contact.get_dim_rf_constraint(), 8);
    }

    #[test]
    fn test_update_order() {
        let params = test_params();
        let (mut contact, calls) = recording_contact(None);

        contact
            .update_contact_constraint(&params, &KinematicState::default())
            .unwrap();

        assert!(contact.is_active());
        assert_eq!(
            *calls.borrow(),
            vec!["jacobian", "bias", "friction_matrix", "ineq_vector"]
        );
        assert_eq!(contact.get_dim_rf_constraint(), 3);
        assert!(contact.get_friction_constraint_vector().iter().all(|v| *v == 4.0));
    }

    #[test]
    fn test_failed_step_leaves_contact_inactive() {
        let params = test_params();

        for (i, step) in ["jacobian", "bias", "friction_matrix", "ineq_vector"]
            .iter()
            .enumerate()
        {
            let (mut contact, calls) = recording_contact(Some(*step));

            assert!(contact
                .update_contact_constraint(&params, &KinematicState::default())
                .is_err());
            assert!(!contact.is_active());

            // Nothing after the failing step runs
            assert_eq!(calls.borrow().len(), i + 1);
        }
    }

    #[test]
    fn test_failed_update_clears_active() {
        let params = test_params();
        let mut contact = ContactConstraint::point_foot(LegId::FR);

        let mut state = KinematicState::at_rest(nalgebra::SVector::repeat(-0.5));
        contact.update_contact_constraint(&params, &state).unwrap();
        assert!(contact.is_active());

        state.base_ang_vel_rads_rb[1] = f64::NAN;
        assert_eq!(
            contact.update_contact_constraint(&params, &state),
            Err(ContactError::NonFiniteState(LegId::FR))
        );
        assert!(!contact.is_active());
    }

    #[test]
    fn test_unset_contact_keeps_cached_values() {
        let params = test_params();
        let (mut contact, _) = recording_contact(None);

        contact
            .update_contact_constraint(&params, &KinematicState::default())
            .unwrap();
        let jacobian = contact.get_contact_jacobian().clone();
        let bias = contact.get_bias_term().clone();

        contact.unset_contact();

        assert!(!contact.is_active());
        assert_eq!(contact.get_contact_jacobian(), &jacobian);
        assert_eq!(contact.get_bias_term(), &bias);
        assert!(contact.get_friction_constraint_matrix().iter().all(|v| *v == 3.0));
    }

    #[test]
    fn test_desired_reaction_force() {
        let mut contact = ContactConstraint::point_foot(LegId::FL);

        let force = DVector::from_vec(vec![1.0, -2.0, 30.0]);
        contact.set_desired_reaction_force(&force).unwrap();
        assert_eq!(contact.get_desired_reaction_force(), &force);

        assert_eq!(
            contact.set_desired_reaction_force(&DVector::zeros(4)),
            Err(ContactError::DimMismatch {
                expected: 3,
                found: 4
            })
        );
        assert_eq!(contact.get_desired_reaction_force(), &force);
    }
}
