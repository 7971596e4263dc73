//! Parameters structure for the Robot

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix3, Matrix3x4, SVector, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{LegId, MotorMode, NUM_LEGS, NUM_MOTORS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Physical parameters of the robot.
///
/// Loaded once at startup and only changed through an explicit reload, never
/// while a control cycle is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotParams {
    // ---- BODY ----
    /// Mass of the main body.
    ///
    /// Units: kilograms
    pub body_mass_kg: f64,

    /// Nominal standing height of the main body.
    ///
    /// Units: meters
    pub body_height_m: f64,

    /// Offset of the centre of mass from the base frame origin.
    ///
    /// Units: meters,
    /// Frame: Robot body
    pub com_offset_m_rb: [f64; 3],

    /// Inertia tensor of the main body, row major.
    ///
    /// Units: kilogram meters squared,
    /// Frame: Robot body
    pub body_inertia_kgm2: [[f64; 3]; 3],

    /// Yaw offset applied to the body heading.
    ///
    /// Units: radians
    #[serde(default)]
    pub yaw_offset_rad: f64,

    // ---- GEOMETRY ----
    /// Length of the hip (abduction) link.
    ///
    /// Units: meters
    pub hip_length_m: f64,

    /// Length of the upper (thigh) link.
    ///
    /// Units: meters
    pub upper_length_m: f64,

    /// Length of the lower (calf) link.
    ///
    /// Units: meters
    pub lower_length_m: f64,

    /// Default position of each leg's mounting point in the body frame,
    /// indexed by `LegId`.
    ///
    /// Units: meters,
    /// Frame: Robot body
    pub default_hip_pos_m_rb: [[f64; 3]; NUM_LEGS],

    /// Fixed offset from each leg's mounting point to its hip joint frame,
    /// indexed by `LegId`.
    ///
    /// Units: meters,
    /// Frame: Robot body
    pub hip_offset_m_rb: [[f64; 3]; NUM_LEGS],

    // ---- MOTORS ----
    /// Position gain of each motor, indexed leg-major.
    ///
    /// Units: newton meters/radian
    pub motor_kps: [f64; NUM_MOTORS],

    /// Velocity gain of each motor, indexed leg-major.
    ///
    /// Units: newton meters/(radian/second)
    pub motor_kds: [f64; NUM_MOTORS],

    // ---- MODES ----
    /// Motor control mode used when no explicit mode is given.
    pub control_mode: MotorMode,

    /// True when running against a simulator rather than hardware.
    #[serde(default)]
    pub is_sim: bool,

    // ---- NUMERICS ----
    #[serde(default)]
    pub kinematics: KinematicsParams,

    // ---- CONTACT ----
    #[serde(default)]
    pub contact: ContactParams,
}

/// Numerical tuning for the leg kinematics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsParams {
    /// Singular values at or below this are treated as zero by the
    /// pseudo-inverse.
    pub singular_value_threshold: f64,

    /// Ratio of smallest to largest singular value of a leg Jacobian below
    /// which the Jacobian is treated as singular and the pseudo-inverse is
    /// used for velocity mapping.
    pub min_condition_ratio: f64,
}

/// Ground contact properties used to build the friction constraints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactParams {
    /// Coulomb friction coefficient between foot and ground.
    pub friction_coeff: f64,

    /// Largest normal force a single foot may exert.
    ///
    /// Units: newtons
    pub max_normal_force_n: f64,

    /// Half the length of the foot's contact edge, used by edge contacts.
    ///
    /// Units: meters
    pub edge_half_length_m: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a set of robot parameters can be rejected.
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("Parameter `{0}` must be strictly positive, found {1}")]
    NotPositive(&'static str, f64),

    #[error("Parameter `{0}` must be finite and non-negative, found {1}")]
    NotNonNegative(&'static str, f64),

    #[error("Parameter `{0}` must be finite and non-negative, found {1} at index {2}")]
    InvalidGain(&'static str, f64, usize),

    #[error("Parameter `{0}` contains a non-finite value")]
    NotFinite(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for KinematicsParams {
    fn default() -> Self {
        Self {
            singular_value_threshold: 1e-4,
            min_condition_ratio: 1e-3,
        }
    }
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            friction_coeff: 0.4,
            max_normal_force_n: 1500.0,
            edge_half_length_m: 0.02,
        }
    }
}

impl RobotParams {
    /// Check the parameters describe a physically valid robot.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let positive = [
            ("body_mass_kg", self.body_mass_kg),
            ("hip_length_m", self.hip_length_m),
            ("upper_length_m", self.upper_length_m),
            ("lower_length_m", self.lower_length_m),
            ("contact.friction_coeff", self.contact.friction_coeff),
            ("contact.max_normal_force_n", self.contact.max_normal_force_n),
            ("contact.edge_half_length_m", self.contact.edge_half_length_m),
            (
                "kinematics.singular_value_threshold",
                self.kinematics.singular_value_threshold,
            ),
        ];

        for (name, value) in positive.iter() {
            // Written this way round so that NaN is rejected too
            if !(*value > 0.0) || !value.is_finite() {
                return Err(ParamsError::NotPositive(*name, *value));
            }
        }

        if !(self.kinematics.min_condition_ratio >= 0.0)
            || !self.kinematics.min_condition_ratio.is_finite()
        {
            return Err(ParamsError::NotNonNegative(
                "kinematics.min_condition_ratio",
                self.kinematics.min_condition_ratio,
            ));
        }

        for (name, gains) in [("motor_kps", &self.motor_kps), ("motor_kds", &self.motor_kds)].iter() {
            for (i, g) in gains.iter().enumerate() {
                if !(*g >= 0.0) || !g.is_finite() {
                    return Err(ParamsError::InvalidGain(*name, *g, i));
                }
            }
        }

        let finite = |v: &[f64]| v.iter().all(|x| x.is_finite());

        if !finite(&self.com_offset_m_rb[..]) {
            return Err(ParamsError::NotFinite("com_offset_m_rb"));
        }
        if !self.body_inertia_kgm2.iter().all(|r| finite(&r[..])) {
            return Err(ParamsError::NotFinite("body_inertia_kgm2"));
        }
        if !self.default_hip_pos_m_rb.iter().all(|r| finite(&r[..])) {
            return Err(ParamsError::NotFinite("default_hip_pos_m_rb"));
        }
        if !self.hip_offset_m_rb.iter().all(|r| finite(&r[..])) {
            return Err(ParamsError::NotFinite("hip_offset_m_rb"));
        }
        if !self.body_height_m.is_finite() || !self.yaw_offset_rad.is_finite() {
            return Err(ParamsError::NotFinite("body_height_m/yaw_offset_rad"));
        }

        Ok(())
    }

    /// Lateral offset of the leg's hip link, signed by the leg's side.
    ///
    /// Units: meters
    pub fn signed_hip_length_m(&self, leg: LegId) -> f64 {
        self.hip_length_m * leg.hip_sign()
    }

    /// Get the default hip positions of all legs, one column per leg.
    pub fn hip_positions_in_base_frame(&self) -> Matrix3x4<f64> {
        Matrix3x4::from_fn(|r, c| self.default_hip_pos_m_rb[c][r])
    }

    /// Position of the leg's hip joint frame origin in the body frame.
    ///
    /// This is the leg's default hip position plus its hip offset.
    pub fn hip_origin_m_rb(&self, leg: LegId) -> Vector3<f64> {
        let i = leg.index();
        Vector3::from(self.default_hip_pos_m_rb[i]) + Vector3::from(self.hip_offset_m_rb[i])
    }

    /// Get the position gains of all motors.
    pub fn kps(&self) -> SVector<f64, NUM_MOTORS> {
        SVector::from(self.motor_kps)
    }

    /// Get the velocity gains of all motors.
    pub fn kds(&self) -> SVector<f64, NUM_MOTORS> {
        SVector::from(self.motor_kds)
    }

    /// Get the body inertia tensor.
    pub fn body_inertia(&self) -> Matrix3<f64> {
        Matrix3::from_fn(|r, c| self.body_inertia_kgm2[r][c])
    }

    /// Get the body mass in kilograms.
    pub fn body_mass(&self) -> f64 {
        self.body_mass_kg
    }

    /// Get the centre of mass offset in the body frame.
    pub fn com_offset(&self) -> Vector3<f64> {
        Vector3::from(self.com_offset_m_rb)
    }

    pub fn set_yaw_offset(&mut self, yaw_offset_rad: f64) {
        self.yaw_offset_rad = yaw_offset_rad;
    }
}
