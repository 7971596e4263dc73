//! Robot module
//!
//! Holds the robot's physical parameters, the analytic leg kinematics built
//! on them, and the assembly of per-joint motor commands.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod kinematics;
mod motor_cmd;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use kinematics::*;
pub use motor_cmd::*;
pub use params::*;
pub use state::*;

#[cfg(test)]
pub(crate) use params::test::{test_params, TEST_PARAMS_TOML};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of legs on the robot.
pub const NUM_LEGS: usize = 4;

/// The number of actuated joints in each leg (abduction, hip, knee).
pub const DOF_PER_LEG: usize = 3;

/// The number of motors on the robot.
pub const NUM_MOTORS: usize = NUM_LEGS * DOF_PER_LEG;

/// The number of generalised coordinates: floating base angular and linear
/// velocity followed by the joint rates.
pub const NUM_GEN_COORDS: usize = 6 + NUM_MOTORS;

/// Column of the first joint rate in the generalised velocity vector.
pub const JOINT_COORD_OFFSET: usize = 6;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Identifies one of the four legs.
///
/// The discriminant is the leg's index in every 4-leg or 12-joint array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegId {
    /// Front right
    FR = 0,
    /// Front left
    FL = 1,
    /// Rear right
    RR = 2,
    /// Rear left
    RL = 3,
}

/// Possible errors that can occur during Robot operation.
#[derive(Debug, thiserror::Error)]
pub enum RobotError {
    #[error("Could not load the robot parameters: {0}")]
    ParamsLoadError(#[from] util::params::LoadError),

    #[error("Invalid robot parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Expected motor command values of shape {expected:?} for {mode:?} mode, found {found:?}")]
    CmdShapeMismatch {
        mode: MotorMode,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LegId {
    /// All legs in index order.
    pub const ALL: [LegId; NUM_LEGS] = [LegId::FR, LegId::FL, LegId::RR, LegId::RL];

    /// Get the leg with the given index, or `None` if the index is not in
    /// `0..NUM_LEGS`.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The leg's index.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Index of this leg's first joint in a 12-joint array.
    pub fn first_joint(self) -> usize {
        self.index() * DOF_PER_LEG
    }

    /// Mirror factor of the leg.
    ///
    /// Right legs (FR, RR) are `-1` and left legs (FL, RL) are `+1`, so that
    /// the lateral hip offset `hip_length_m * hip_sign` points outwards.
    pub fn hip_sign(self) -> f64 {
        match self {
            LegId::FR | LegId::RR => -1.0,
            LegId::FL | LegId::RL => 1.0,
        }
    }
}
