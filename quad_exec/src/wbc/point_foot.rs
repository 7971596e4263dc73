//! Point foot contact model
//!
//! The foot touches the ground at a single point which cannot move, so the
//! contact space is the linear reaction force `[fx, fy, fz]`.
//!
//! Base velocities in the generalised velocity are taken in an inertial
//! frame instantaneously aligned with the body, so the bias term holds the
//! centripetal and Coriolis accelerations of the foot plus the leg's own
//! `dJ/dt * qd`.
//!
//! The friction pyramid is built on the body frame axes, with `fz` along the
//! body z axis. This assumes the body is level over flat ground. A pitched or
//! rolled body tilts the pyramid with it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

// Internal imports
use super::{skew_symmetric, ContactError, ContactModel};
use crate::robot::{KinematicState, LegId, RobotParams, JOINT_COORD_OFFSET};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A foot in contact with the ground at a single point.
#[derive(Debug, Clone)]
pub struct PointFoot {
    leg: LegId,

    foot: FootKinematics,
}

/// Foot quantities computed with the contact Jacobian and reused by the bias
/// term.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct FootKinematics {
    /// Units: meters,
    /// Frame: Robot body
    pub pos_m_rb: Vector3<f64>,

    /// Foot velocity relative to the body due to the joint rates.
    ///
    /// Units: meters/second,
    /// Frame: Robot body
    pub rel_vel_ms_rb: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PointFoot {
    /// Dimension of the contact space.
    pub const DIM: usize = 3;

    /// Rows in the friction constraint: unilateral, four cone faces and the
    /// normal force limit.
    pub const NUM_RF_CONSTRAINTS: usize = 6;

    pub fn new(leg: LegId) -> Self {
        Self {
            leg,
            foot: FootKinematics::default(),
        }
    }

    /// Foot position computed by the last Jacobian update.
    pub fn foot_position_m_rb(&self) -> Vector3<f64> {
        self.foot.pos_m_rb
    }
}

impl ContactModel for PointFoot {
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
        self.foot = fill_linear_jacobian(params, state, self.leg, jacobian, 0);

        Ok(())
    }

    fn update_bias(
        &mut self,
        params: &RobotParams,
        state: &KinematicState,
        bias: &mut DVector<f64>,
    ) -> Result<(), ContactError> {
        bias.copy_from(&linear_bias(params, state, self.leg, &self.foot));

        Ok(())
    }

    fn update_friction_matrix(
        &mut self,
        params: &RobotParams,
        matrix: &mut DMatrix<f64>,
    ) -> Result<(), ContactError> {
        matrix.fill(0.0);
        fill_friction_cone(matrix, params.contact.friction_coeff, 0);

        // Normal force limit
        matrix[(5, 2)] = 1.0;

        Ok(())
    }

    fn update_ineq_vector(
        &mut self,
        params: &RobotParams,
        vector: &mut DVector<f64>,
    ) -> Result<(), ContactError> {
        vector.fill(0.0);
        vector[5] = params.contact.max_normal_force_n;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Write the three linear velocity rows of a foot into a contact Jacobian,
/// starting at `row`.
///
/// The foot velocity is `v + w x r + J * qd`, so the rows are
/// `[-skew(r) | I | J]` with `J` in the leg's joint columns.
pub(super) fn fill_linear_jacobian(
    params: &RobotParams,
    state: &KinematicState,
    leg: LegId,
    jacobian: &mut DMatrix<f64>,
    row: usize,
) -> FootKinematics {
    let q = state.leg_pos_rad(leg);
    let qd = state.leg_rate_rads(leg);

    let pos_m_rb = params.joint_angles_to_foot_position_in_hip_frame(&q, leg)
        + params.hip_origin_m_rb(leg);
    let leg_jac = params.analytical_leg_jacobian(&q, leg);

    jacobian
        .fixed_view_mut::<3, 3>(row, 0)
        .copy_from(&(-skew_symmetric(&pos_m_rb)));
    jacobian
        .fixed_view_mut::<3, 3>(row, 3)
        .copy_from(&Matrix3::identity());
    jacobian
        .fixed_view_mut::<3, 3>(row, JOINT_COORD_OFFSET + leg.first_joint())
        .copy_from(&leg_jac);

    FootKinematics {
        pos_m_rb,
        rel_vel_ms_rb: leg_jac * qd,
    }
}

/// Bias term of the foot's linear acceleration.
pub(super) fn linear_bias(
    params: &RobotParams,
    state: &KinematicState,
    leg: LegId,
    foot: &FootKinematics,
) -> Vector3<f64> {
    let w = state.base_ang_vel_rads_rb;

    w.cross(&w.cross(&foot.pos_m_rb))
        + 2.0 * w.cross(&foot.rel_vel_ms_rb)
        + params.leg_jacobian_dot_qdot(&state.leg_pos_rad(leg), &state.leg_rate_rads(leg), leg)
}

/// Write the linearised friction cone into the first five rows of a friction
/// constraint matrix.
///
/// `fx_col` is the column of `fx`, with `fy` and `fz` following it. The rows
/// are `-fz <= 0` then `+-fx - mu fz <= 0` and `+-fy - mu fz <= 0`.
pub(super) fn fill_friction_cone(matrix: &mut DMatrix<f64>, mu: f64, fx_col: usize) {
    let fy_col = fx_col + 1;
    let fz_col = fx_col + 2;

    matrix[(0, fz_col)] = -1.0;

    matrix[(1, fx_col)] = 1.0;
    matrix[(1, fz_col)] = -mu;

    matrix[(2, fx_col)] = -1.0;
    matrix[(2, fz_col)] = -mu;

    matrix[(3, fy_col)] = 1.0;
    matrix[(3, fz_col)] = -mu;

    matrix[(4, fy_col)] = -1.0;
    matrix[(4, fz_col)] = -mu;
}
