//! Kinematic state of the robot used as input to each control cycle

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{SVector, Vector3};
use serde::Serialize;

use super::{kinematics::leg_joints, LegId, NUM_MOTORS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Sensed state of the robot for a single control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KinematicState {
    /// Angular velocity of the body.
    ///
    /// Units: radians/second,
    /// Frame: Robot body
    pub base_ang_vel_rads_rb: Vector3<f64>,

    /// Angle of each joint, indexed leg-major.
    ///
    /// Units: radians
    pub joint_pos_rad: SVector<f64, NUM_MOTORS>,

    /// Rate of each joint, indexed leg-major.
    ///
    /// Units: radians/second
    pub joint_rate_rads: SVector<f64, NUM_MOTORS>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for KinematicState {
    fn default() -> Self {
        Self {
            base_ang_vel_rads_rb: Vector3::zeros(),
            joint_pos_rad: SVector::zeros(),
            joint_rate_rads: SVector::zeros(),
        }
    }
}

impl KinematicState {
    /// A stationary robot with the given joint angles.
    pub fn at_rest(joint_pos_rad: SVector<f64, NUM_MOTORS>) -> Self {
        Self {
            joint_pos_rad,
            ..Default::default()
        }
    }

    /// Returns true if every value in the state is finite.
    pub fn is_finite(&self) -> bool {
        self.base_ang_vel_rads_rb.iter().all(|v| v.is_finite())
            && self.joint_pos_rad.iter().all(|v| v.is_finite())
            && self.joint_rate_rads.iter().all(|v| v.is_finite())
    }

    /// Joint angles of a single leg.
    pub fn leg_pos_rad(&self, leg: LegId) -> Vector3<f64> {
        leg_joints(&self.joint_pos_rad, leg)
    }

    /// Joint rates of a single leg.
    pub fn leg_rate_rads(&self, leg: LegId) -> Vector3<f64> {
        leg_joints(&self.joint_rate_rads, leg)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_leg_slices() {
        let q = SVector::<f64, NUM_MOTORS>::from_fn(|i, _| i as f64);
        let mut state = KinematicState::at_rest(q);

        assert_eq!(state.leg_pos_rad(LegId::RR), Vector3::new(6.0, 7.0, 8.0));
        assert_eq!(state.leg_rate_rads(LegId::FL), Vector3::zeros());
        assert!(state.is_finite());

        state.joint_rate_rads[4] = f64::NAN;
        assert!(!state.is_finite());
    }
}
