//! Motor command assembly
//!
//! Turns the output of the controller into the array of per-joint commands
//! sent to the actuators. Each command is a PD target plus a feed-forward
//! torque, evaluated by the motor driver as
//!
//! `torque = pos_gain * (pos_rad - q) + rate_gain * (rate_rads - qd) + torque_nm`

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, warn};
use nalgebra::{DMatrix, SMatrix, SVector};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Internal imports
use super::*;
use util::params;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of rows in a hybrid command matrix.
pub const NUM_HYBRID_ROWS: usize = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command for a single motor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorCmd {
    /// Target position.
    ///
    /// Units: radians
    pub pos_rad: f64,

    /// Position gain.
    ///
    /// Units: newton meters/radian
    pub pos_gain: f64,

    /// Target velocity.
    ///
    /// Units: radians/second
    pub rate_rads: f64,

    /// Velocity gain.
    ///
    /// Units: newton meters/(radian/second)
    pub rate_gain: f64,

    /// Feed-forward torque.
    ///
    /// Units: newton meters
    pub torque_nm: f64,
}

/// The robot: its parameters and the motor commands for the current cycle.
#[derive(Debug, Clone)]
pub struct Robot {
    params: RobotParams,

    cmds: [MotorCmd; NUM_MOTORS],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Ways the motors can be commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorMode {
    /// Joint angles tracked with the configured PD gains.
    Position,

    /// Pure feed-forward joint torques.
    Torque,

    /// Every field of every command supplied by the caller.
    Hybrid,
}

/// Motor demands from the controller, one variant per [`MotorMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum MotorDems {
    /// Target angle of each joint.
    ///
    /// Units: radians
    Position(SVector<f64, NUM_MOTORS>),

    /// Torque of each joint.
    ///
    /// Units: newton meters
    Torque(SVector<f64, NUM_MOTORS>),

    /// One column per joint, rows are target angle, target velocity, position
    /// gain, velocity gain and feed-forward torque.
    Hybrid(SMatrix<f64, NUM_HYBRID_ROWS, NUM_MOTORS>),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotorCmd {
    /// Command that only damps the joint.
    ///
    /// Used in place of any command built from non-finite values.
    pub fn damping(rate_gain: f64) -> Self {
        Self {
            rate_gain,
            ..Default::default()
        }
    }

    /// Returns true if every field is finite.
    pub fn is_finite(&self) -> bool {
        [
            self.pos_rad,
            self.pos_gain,
            self.rate_rads,
            self.rate_gain,
            self.torque_nm,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl MotorDems {
    /// The mode these demands are for.
    pub fn mode(&self) -> MotorMode {
        match self {
            MotorDems::Position(_) => MotorMode::Position,
            MotorDems::Torque(_) => MotorMode::Torque,
            MotorDems::Hybrid(_) => MotorMode::Hybrid,
        }
    }
}

impl Robot {
    /// Create a new robot from the given parameters.
    ///
    /// The parameters are validated first, all commands start at zero.
    pub fn new(params: RobotParams) -> Result<Self, RobotError> {
        params.validate()?;

        Ok(Self {
            params,
            cmds: [MotorCmd::default(); NUM_MOTORS],
        })
    }

    /// Load the robot from a parameter file relative to the params directory.
    pub fn load(param_file_path: &str) -> Result<Self, RobotError> {
        let params: RobotParams = params::load(param_file_path)?;

        info!("Robot parameters loaded from {}", param_file_path);

        Self::new(params)
    }

    /// Load the robot from a parameter file at an explicit path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, RobotError> {
        let params: RobotParams = params::load_from_path(path)?;

        Self::new(params)
    }

    /// Reload the parameters from a file relative to the params directory.
    ///
    /// If the new parameters cannot be loaded or are invalid the current
    /// parameters are kept.
    pub fn reload(&mut self, param_file_path: &str) -> Result<(), RobotError> {
        let params = params::load(param_file_path)?;

        self.replace_params(params)
    }

    /// Reload the parameters from an explicit path, keeping the current
    /// parameters on failure.
    pub fn reload_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RobotError> {
        let params = params::load_from_path(path)?;

        self.replace_params(params)
    }

    /// Get the robot's parameters.
    pub fn params(&self) -> &RobotParams {
        &self.params
    }

    /// Get the motor commands for this cycle.
    pub fn get_cmd(&self) -> &[MotorCmd; NUM_MOTORS] {
        &self.cmds
    }

    /// Set the motor commands from a pre-built array.
    ///
    /// Commands are taken as they are, except for any containing a
    /// non-finite value which are replaced by a damping command.
    pub fn set_cmd(&mut self, cmds: &[MotorCmd; NUM_MOTORS]) {
        for (i, cmd) in cmds.iter().enumerate() {
            self.cmds[i] = if cmd.is_finite() {
                *cmd
            }
            else {
                self.safe_cmd(i)
            };
        }
    }

    /// Set the motor commands from the controller's demands.
    pub fn set_motor_cmds(&mut self, dems: &MotorDems) {
        match dems {
            MotorDems::Position(angles) => self.set_angle_cmd(angles),
            MotorDems::Torque(torques) => self.set_torque_cmd(torques),
            MotorDems::Hybrid(values) => self.set_hybrid_cmd(values),
        }
    }

    /// Position mode: track the given joint angles with the configured gains.
    pub fn set_angle_cmd(&mut self, angles_rad: &SVector<f64, NUM_MOTORS>) {
        for i in 0..NUM_MOTORS {
            self.cmds[i] = if angles_rad[i].is_finite() {
                MotorCmd {
                    pos_rad: angles_rad[i],
                    pos_gain: self.params.motor_kps[i],
                    rate_rads: 0.0,
                    rate_gain: self.params.motor_kds[i],
                    torque_nm: 0.0,
                }
            }
            else {
                self.safe_cmd(i)
            };
        }
    }

    /// Torque mode: apply the given joint torques with no feedback.
    pub fn set_torque_cmd(&mut self, torques_nm: &SVector<f64, NUM_MOTORS>) {
        for i in 0..NUM_MOTORS {
            self.cmds[i] = if torques_nm[i].is_finite() {
                MotorCmd {
                    torque_nm: torques_nm[i],
                    ..Default::default()
                }
            }
            else {
                self.safe_cmd(i)
            };
        }
    }

    /// Hybrid mode: every field given by the caller.
    ///
    /// Column `i` holds joint `i`'s target angle, target velocity, position
    /// gain, velocity gain and feed-forward torque, in that order.
    pub fn set_hybrid_cmd(&mut self, values: &SMatrix<f64, NUM_HYBRID_ROWS, NUM_MOTORS>) {
        for i in 0..NUM_MOTORS {
            let cmd = MotorCmd {
                pos_rad: values[(0, i)],
                rate_rads: values[(1, i)],
                pos_gain: values[(2, i)],
                rate_gain: values[(3, i)],
                torque_nm: values[(4, i)],
            };

            self.cmds[i] = if cmd.is_finite() {
                cmd
            }
            else {
                self.safe_cmd(i)
            };
        }
    }

    /// Set the motor commands from a dynamically sized matrix, as produced by
    /// the force optimiser.
    ///
    /// Position and torque modes expect 12 values as either a row or a column,
    /// hybrid mode expects a 5x12 matrix. On a shape mismatch an error is
    /// returned and the current commands are left unchanged.
    pub fn set_cmd_from_matrix(
        &mut self,
        values: &DMatrix<f64>,
        mode: MotorMode,
    ) -> Result<(), RobotError> {
        let shape = values.shape();

        match mode {
            MotorMode::Position | MotorMode::Torque => {
                if values.len() != NUM_MOTORS || (shape.0 != 1 && shape.1 != 1) {
                    return Err(RobotError::CmdShapeMismatch {
                        mode,
                        expected: (NUM_MOTORS, 1),
                        found: shape,
                    });
                }

                let vals = SVector::<f64, NUM_MOTORS>::from_iterator(values.iter().copied());

                match mode {
                    MotorMode::Position => self.set_angle_cmd(&vals),
                    _ => self.set_torque_cmd(&vals),
                }
            }
            MotorMode::Hybrid => {
                if shape != (NUM_HYBRID_ROWS, NUM_MOTORS) {
                    return Err(RobotError::CmdShapeMismatch {
                        mode,
                        expected: (NUM_HYBRID_ROWS, NUM_MOTORS),
                        found: shape,
                    });
                }

                let vals = SMatrix::<f64, NUM_HYBRID_ROWS, NUM_MOTORS>::from_iterator(
                    values.iter().copied(),
                );
                self.set_hybrid_cmd(&vals);
            }
        }

        Ok(())
    }

    fn replace_params(&mut self, params: RobotParams) -> Result<(), RobotError> {
        params.validate()?;
        self.params = params;

        debug!("Robot parameters reloaded");

        Ok(())
    }

    fn safe_cmd(&self, motor: usize) -> MotorCmd {
        warn!(
            "Non-finite command for motor {}, falling back to damping only",
            motor
        );
        MotorCmd::damping(self.params.motor_kds[motor])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_robot() -> Robot {
        Robot::new(test_params()).unwrap()
    }

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("quad_exec_{}_{}.toml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_new_rejects_invalid_params() {
        let mut p = test_params();
        p.hip_length_m = -0.08;

        assert!(matches!(
            Robot::new(p),
            Err(RobotError::InvalidParams(ParamsError::NotPositive(
                "hip_length_m",
                _
            )))
        ));
    }

    #[test]
    fn test_initial_cmds_are_zero() {
        let robot = test_robot();
        assert!(robot.get_cmd().iter().all(|c| *c == MotorCmd::default()));
    }

    #[test]
    fn test_position_mode() {
        let mut robot = test_robot();
        let angles = SVector::<f64, NUM_MOTORS>::from_fn(|i, _| 0.1 * i as f64);

        robot.set_angle_cmd(&angles);

        for (i, cmd) in robot.get_cmd().iter().enumerate() {
            assert_eq!(cmd.pos_rad, angles[i]);
            assert_eq!(cmd.pos_gain, robot.params().motor_kps[i]);
            assert_eq!(cmd.rate_rads, 0.0);
            assert_eq!(cmd.rate_gain, robot.params().motor_kds[i]);
            assert_eq!(cmd.torque_nm, 0.0);
        }
    }

    #[test]
    fn test_torque_mode() {
        let mut robot = test_robot();
        let torques = SVector::<f64, NUM_MOTORS>::from_fn(|i, _| i as f64 - 6.0);

        robot.set_motor_cmds(&MotorDems::Torque(torques));

        for (i, cmd) in robot.get_cmd().iter().enumerate() {
            assert_eq!(
                *cmd,
                MotorCmd {
                    torque_nm: torques[i],
                    ..Default::default()
                }
            );
        }
    }

    #[test]
    fn test_hybrid_mode() {
        let mut robot = test_robot();
        let values = SMatrix::<f64, NUM_HYBRID_ROWS, NUM_MOTORS>::from_fn(|r, c| {
            (r as f64 + 1.0) * 10.0 + c as f64
        });

        robot.set_motor_cmds(&MotorDems::Hybrid(values));

        // Caller values passed through untouched, gains from the parameters
        // are not used
        for (i, cmd) in robot.get_cmd().iter().enumerate() {
            assert_eq!(cmd.pos_rad, 10.0 + i as f64);
            assert_eq!(cmd.rate_rads, 20.0 + i as f64);
            assert_eq!(cmd.pos_gain, 30.0 + i as f64);
            assert_eq!(cmd.rate_gain, 40.0 + i as f64);
            assert_eq!(cmd.torque_nm, 50.0 + i as f64);
        }
    }

    #[test]
    fn test_prebuilt_cmds() {
        let mut robot = test_robot();
        let mut cmds = [MotorCmd::default(); NUM_MOTORS];
        cmds[3] = MotorCmd {
            pos_rad: 0.5,
            pos_gain: 20.0,
            rate_rads: -1.0,
            rate_gain: 0.5,
            torque_nm: 2.0,
        };

        robot.set_cmd(&cmds);
        assert_eq!(robot.get_cmd(), &cmds);
    }

    #[test]
    fn test_non_finite_values_degrade_to_damping() {
        let mut robot = test_robot();

        let mut angles = SVector::<f64, NUM_MOTORS>::repeat(0.3);
        angles[2] = f64::NAN;
        robot.set_angle_cmd(&angles);

        assert_eq!(robot.get_cmd()[2], MotorCmd::damping(2.0));
        assert_eq!(robot.get_cmd()[1].pos_rad, 0.3);

        let mut torques = SVector::<f64, NUM_MOTORS>::repeat(1.0);
        torques[9] = f64::INFINITY;
        robot.set_torque_cmd(&torques);
        assert_eq!(robot.get_cmd()[9], MotorCmd::damping(1.0));
        assert_eq!(robot.get_cmd()[8].torque_nm, 1.0);

        let mut values = SMatrix::<f64, NUM_HYBRID_ROWS, NUM_MOTORS>::repeat(1.0);
        values[(3, 5)] = f64::NAN;
        robot.set_hybrid_cmd(&values);
        assert_eq!(robot.get_cmd()[5], MotorCmd::damping(2.0));
        assert!(robot.get_cmd().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_cmd_from_matrix() {
        let mut robot = test_robot();

        // Row or column of 12 values
        let row = DMatrix::from_fn(1, NUM_MOTORS, |_, c| c as f64);
        robot.set_cmd_from_matrix(&row, MotorMode::Torque).unwrap();
        assert_eq!(robot.get_cmd()[7].torque_nm, 7.0);

        let col = DMatrix::from_element(NUM_MOTORS, 1, 0.2);
        robot.set_cmd_from_matrix(&col, MotorMode::Position).unwrap();
        assert_eq!(robot.get_cmd()[7].pos_rad, 0.2);
        assert_eq!(robot.get_cmd()[7].pos_gain, 100.0);

        let hybrid = DMatrix::from_fn(NUM_HYBRID_ROWS, NUM_MOTORS, |r, c| (r * 100 + c) as f64);
        robot.set_cmd_from_matrix(&hybrid, MotorMode::Hybrid).unwrap();
        assert_eq!(robot.get_cmd()[4].rate_rads, 104.0);
        assert_eq!(robot.get_cmd()[4].torque_nm, 404.0);
    }

    #[test]
    fn test_cmd_from_matrix_shape_mismatch() {
        let mut robot = test_robot();
        robot.set_angle_cmd(&SVector::repeat(0.1));
        let before = *robot.get_cmd();

        let res = robot.set_cmd_from_matrix(&DMatrix::zeros(11, 1), MotorMode::Position);
        assert!(matches!(
            res,
            Err(RobotError::CmdShapeMismatch {
                mode: MotorMode::Position,
                expected: (12, 1),
                found: (11, 1),
            })
        ));

        let res = robot.set_cmd_from_matrix(&DMatrix::zeros(3, 4), MotorMode::Torque);
        assert!(res.is_err());

        let res = robot.set_cmd_from_matrix(&DMatrix::zeros(12, 5), MotorMode::Hybrid);
        assert!(matches!(
            res,
            Err(RobotError::CmdShapeMismatch {
                expected: (5, 12),
                ..
            })
        ));

        assert_eq!(robot.get_cmd(), &before);
    }

    #[test]
    fn test_reload_keeps_old_params_on_failure() {
        let mut robot = test_robot();

        // Parses but fails validation
        let invalid = TEST_PARAMS_TOML.replace("upper_length_m = 0.2", "upper_length_m = 0.0");
        let path = write_temp("reload_invalid", &invalid);
        assert!(matches!(
            robot.reload_from_path(&path),
            Err(RobotError::InvalidParams(_))
        ));
        assert_eq!(robot.params().upper_length_m, 0.2);
        std::fs::remove_file(&path).unwrap();

        // Does not parse
        let path = write_temp("reload_broken", "body_mass_kg = ");
        assert!(matches!(
            robot.reload_from_path(&path),
            Err(RobotError::ParamsLoadError(_))
        ));
        assert_eq!(robot.params().body_mass_kg, 12.0);
        std::fs::remove_file(&path).unwrap();

        // Valid file is taken
        let heavier = TEST_PARAMS_TOML.replace("body_mass_kg = 12.0", "body_mass_kg = 15.0");
        let path = write_temp("reload_valid", &heavier);
        robot.reload_from_path(&path).unwrap();
        assert_eq!(robot.params().body_mass(), 15.0);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_mode_deserialise() {
        #[derive(Deserialize)]
        struct ModeOnly {
            control_mode: MotorMode,
        }

        let m: ModeOnly = toml::from_str("control_mode = \"hybrid\"").unwrap();
        assert_eq!(m.control_mode, MotorMode::Hybrid);
        assert_eq!(MotorDems::Torque(SVector::zeros()).mode(), MotorMode::Torque);
    }
}
