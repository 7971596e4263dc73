//! Edge foot contact model
//!
//! The foot rests on the ground along a short edge lying on its pitch axis.
//! On top of the point contact this stops the foot rolling about that axis,
//! so the contact space is `[tau, fx, fy, fz]` where `tau` is the reaction
//! torque about the pitch axis. The torque is bounded by the centre of
//! pressure staying on the edge, `|tau| <= a * fz` with `a` the edge half
//! length.
//!
//! As for the point foot the friction pyramid uses the body frame axes, so a
//! level body over flat ground is assumed. Only the Jacobian follows the
//! foot's pitch axis.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector, Rotation3, Vector3};

// Internal imports
use super::point_foot::{fill_friction_cone, fill_linear_jacobian, linear_bias, FootKinematics};
use super::{ContactError, ContactModel};
use crate::robot::{KinematicState, LegId, RobotParams, JOINT_COORD_OFFSET};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A foot in contact with the ground along an edge.
#[derive(Debug, Clone)]
pub struct EdgeFoot {
    leg: LegId,

    foot: FootKinematics,

    /// Pitch axis of the foot.
    ///
    /// Frame: Robot body
    pitch_axis_rb: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl EdgeFoot {
    /// Dimension of the contact space.
    pub const DIM: usize = 4;

    /// Rows in the friction constraint: unilateral, four cone faces, two
    /// centre of pressure bounds and the normal force limit.
    pub const NUM_RF_CONSTRAINTS: usize = 8;

    pub fn new(leg: LegId) -> Self {
        Self {
            leg,
            foot: FootKinematics::default(),
            pitch_axis_rb: Vector3::y(),
        }
    }

    /// Foot pitch axis computed by the last Jacobian update.
    pub fn pitch_axis_rb(&self) -> Vector3<f64> {
        self.pitch_axis_rb
    }
}

impl ContactModel for EdgeFoot {
    fn leg(&self) -> LegId {
        self.leg
    }

    fn dim(&self) -> usize {
        Self::DIM
    }

    fn num_rf_constraints(&self) -> usize {
        Self::NUM_RF_CONSTRAINTS
    }

    fn update_jacobian(
        &mut self,
        params: &RobotParams,
        state: &KinematicState,
        jacobian: &mut DMatrix<f64>,
    ) -> Result<(), ContactError> {
        jacobian.fill(0.0);

        // The hip and knee both turn about the abducted Y axis, so the foot's
        // rate about it is the body's plus both joint rates
        let abd_rad = state.joint_pos_rad[self.leg.first_joint()];
        self.pitch_axis_rb = Rotation3::from_axis_angle(&Vector3::x_axis(), abd_rad) * Vector3::y();

        jacobian
            .fixed_view_mut::<1, 3>(0, 0)
            .copy_from(&self.pitch_axis_rb.transpose());

        let hip_col = JOINT_COORD_OFFSET + self.leg.first_joint() + 1;
        jacobian[(0, hip_col)] = 1.0;
        jacobian[(0, hip_col + 1)] = 1.0;

        self.foot = fill_linear_jacobian(params, state, self.leg, jacobian, 1);

        Ok(())
    }

    fn update_bias(
        &mut self,
        params: &RobotParams,
        state: &KinematicState,
        bias: &mut DVector<f64>,
    ) -> Result<(), ContactError> {
        let w = state.base_ang_vel_rads_rb;
        let abd_rate = state.joint_rate_rads[self.leg.first_joint()];

        // Only the pitch axis moves with the joints
        let axis_rate = abd_rate * Vector3::x().cross(&self.pitch_axis_rb);

        bias[0] = axis_rate.dot(&w);
        bias.fixed_rows_mut::<3>(1)
            .copy_from(&linear_bias(params, state, self.leg, &self.foot));

        Ok(())
    }

    fn update_friction_matrix(
        &mut self,
        params: &RobotParams,
        matrix: &mut DMatrix<f64>,
    ) -> Result<(), ContactError> {
        let a = params.contact.edge_half_length_m;

        matrix.fill(0.0);
        fill_friction_cone(matrix, params.contact.friction_coeff, 1);

        // Centre of pressure on the edge
        matrix[(5, 0)] = 1.0;
        matrix[(5, 3)] = -a;
        matrix[(6, 0)] = -1.0;
        matrix[(6, 3)] = -a;

        // Normal force limit
        matrix[(7, 3)] = 1.0;

        Ok(())
    }

    fn update_ineq_vector(
        &mut self,
        params: &RobotParams,
        vector: &mut DVector<f64>,
    ) -> Result<(), ContactError> {
        vector.fill(0.0);
        vector[7] = params.contact.max_normal_force_n;

        Ok(())
    }
}
