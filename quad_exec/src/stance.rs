//! Standing controller
//!
//! Holds the robot on all four feet under the body, leaning the body towards
//! the commanded velocity. Each cycle the foot targets are converted into
//! joint angle demands, the contact constraints of the feet on the ground are
//! updated and stacked for the force optimiser, and the body weight is shared
//! between the feet as the desired reaction forces.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{trace, warn};
use nalgebra::{DVector, Matrix3x4, SMatrix, SVector, Vector3};

// Internal imports
use crate::robot::{
    KinematicState, LegId, MotorMode, Robot, RobotParams, NUM_HYBRID_ROWS, NUM_LEGS, NUM_MOTORS,
};
use crate::vel_cmd::VelocityCmd;
use crate::wbc::{ContactConstraint, ContactStack};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Gravitational acceleration.
///
/// Units: meters/second^2
pub const GRAVITY_MSS: f64 = 9.81;

/// Body displacement per unit of commanded linear velocity.
///
/// Units: seconds
pub const LEAN_GAIN_S: f64 = 0.05;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Standing controller state.
pub struct StanceCtrl {
    contacts: Vec<ContactConstraint>,

    /// Desired reaction force of each contact, reused every cycle.
    desired_forces: Vec<DVector<f64>>,
}

/// Output of one cycle of the standing controller.
#[derive(Debug, Clone)]
pub struct StanceOutput {
    /// Joint angle demands.
    ///
    /// Units: radians
    pub joint_pos_dems_rad: SVector<f64, NUM_MOTORS>,

    /// Feed-forward joint torques supporting the body weight.
    ///
    /// Units: newton meters
    pub joint_torques_nm: SVector<f64, NUM_MOTORS>,

    /// True for each leg whose foot target was out of reach.
    pub reach_limited: [bool; NUM_LEGS],

    /// Contact constraints of the feet on the ground.
    pub stack: ContactStack,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for StanceCtrl {
    fn default() -> Self {
        Self::new()
    }
}

impl StanceCtrl {
    /// Create a standing controller with a point contact on every foot.
    pub fn new() -> Self {
        let contacts: Vec<ContactConstraint> = LegId::ALL
            .iter()
            .map(|leg| ContactConstraint::point_foot(*leg))
            .collect();
        let desired_forces = contacts
            .iter()
            .map(|c| DVector::zeros(c.get_dim()))
            .collect();

        Self {
            contacts,
            desired_forces,
        }
    }

    /// The contact constraint of each leg.
    pub fn contacts(&self) -> &[ContactConstraint] {
        &self.contacts
    }

    /// Foot targets in the body frame, one column per leg.
    ///
    /// Each foot sits below its hip at the standing height, offset outwards
    /// by the hip link, and shifted back by the commanded lean.
    pub fn foot_targets_m_rb(params: &RobotParams, vel_cmd: &VelocityCmd) -> Matrix3x4<f64> {
        let lean = Vector3::new(vel_cmd.linear_ms_rb.x, vel_cmd.linear_ms_rb.y, 0.0) * LEAN_GAIN_S;

        let mut targets = Matrix3x4::zeros();
        for leg in LegId::ALL.iter() {
            let target = params.hip_origin_m_rb(*leg)
                + Vector3::new(0.0, params.signed_hip_length_m(*leg), -params.body_height_m)
                - lean;
            targets.set_column(leg.index(), &target);
        }

        targets
    }

    /// Run one cycle of the standing controller and set the robot's motor
    /// commands according to its control mode.
    ///
    /// `in_contact` gives, for each leg, whether the foot is on the ground.
    pub fn proc(
        &mut self,
        robot: &mut Robot,
        state: &KinematicState,
        vel_cmd: &VelocityCmd,
        in_contact: &[bool; NUM_LEGS],
    ) -> StanceOutput {
        let params = robot.params();

        // ---- JOINT DEMANDS ----

        let targets = Self::foot_targets_m_rb(params, vel_cmd);
        let mut joint_pos_dems_rad = SVector::<f64, NUM_MOTORS>::zeros();
        let mut reach_limited = [false; NUM_LEGS];

        for leg in LegId::ALL.iter() {
            let sol = params.foot_position_in_hip_frame_to_joint_angles(
                &(targets.column(leg.index()) - params.hip_origin_m_rb(*leg)),
                *leg,
            );

            joint_pos_dems_rad
                .fixed_rows_mut::<3>(leg.first_joint())
                .copy_from(&sol.angles);
            reach_limited[leg.index()] = sol.reach_limited;
        }

        // ---- CONTACTS ----

        for contact in self.contacts.iter_mut() {
            let leg = contact.leg();

            if in_contact[leg.index()] {
                if let Err(e) = contact.update_contact_constraint(params, state) {
                    warn!("Could not update the contact of leg {:?}: {}", leg, e);
                }
            }
            else {
                contact.unset_contact();
            }
        }

        // Share the weight equally between the feet on the ground
        let num_active = self.contacts.iter().filter(|c| c.is_active()).count();
        let normal_force_n = if num_active > 0 {
            params.body_mass() * GRAVITY_MSS / num_active as f64
        }
        else {
            0.0
        };

        let mut joint_torques_nm = SVector::<f64, NUM_MOTORS>::zeros();

        for (contact, force) in self.contacts.iter_mut().zip(self.desired_forces.iter_mut()) {
            force.fill(0.0);
            if contact.is_active() {
                force[contact.get_fz_index()] = normal_force_n;
            }

            // Always the contact's own dimension
            if let Err(e) = contact.set_desired_reaction_force(force) {
                warn!("Could not set the desired force of leg {:?}: {}", contact.leg(), e);
                continue;
            }

            if contact.is_active() {
                // The motors push the foot into the ground against the
                // reaction force
                let leg = contact.leg();
                let linear_force = force.fixed_rows::<3>(contact.get_dim() - 3).into_owned();
                let leg_jac = params.analytical_leg_jacobian(&state.leg_pos_rad(leg), leg);

                joint_torques_nm
                    .fixed_rows_mut::<3>(leg.first_joint())
                    .copy_from(&(-leg_jac.transpose() * linear_force));
            }
        }

        let stack = ContactStack::from_contacts(&self.contacts);

        trace!(
            "Stance cycle: {} feet in contact, {:.2} N per foot",
            num_active, normal_force_n
        );

        // ---- MOTOR COMMANDS ----

        let mode = params.control_mode;
        let kps = params.kps();
        let kds = params.kds();

        match mode {
            MotorMode::Position => robot.set_angle_cmd(&joint_pos_dems_rad),
            MotorMode::Torque => robot.set_torque_cmd(&joint_torques_nm),
            MotorMode::Hybrid => {
                let values = SMatrix::<f64, NUM_HYBRID_ROWS, NUM_MOTORS>::from_fn(|r, c| match r {
                    0 => joint_pos_dems_rad[c],
                    1 => 0.0,
                    2 => kps[c],
                    3 => kds[c],
                    _ => joint_torques_nm[c],
                });
                robot.set_hybrid_cmd(&values);
            }
        }

        StanceOutput {
            joint_pos_dems_rad,
            joint_torques_nm,
            reach_limited,
            stack,
        }
    }
}
