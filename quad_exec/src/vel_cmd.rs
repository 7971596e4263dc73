//! Cached body velocity command
//!
//! The velocity command arrives asynchronously from the messaging layer and
//! is read once per control cycle. Only the latest command matters, so a
//! single slot is kept which the writer replaces and the control loop reads
//! without ever blocking.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use arc_swap::ArcSwap;
use log::trace;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Commanded body twist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VelocityCmd {
    /// Units: meters/second,
    /// Frame: Robot body
    pub linear_ms_rb: Vector3<f64>,

    /// Units: radians/second,
    /// Frame: Robot body
    pub angular_rads_rb: Vector3<f64>,
}

/// Velocity command as sent over the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityCmdMsg {
    pub linear: Vec3Msg,
    pub angular: Vec3Msg,
}

/// A 3D vector as sent over the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Msg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Last-write-wins store of the velocity command.
///
/// Wrap in an `Arc` to share between the writer and the control loop.
#[derive(Debug)]
pub struct VelCmdCache {
    slot: ArcSwap<VelocityCmd>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for VelocityCmd {
    fn default() -> Self {
        Self {
            linear_ms_rb: Vector3::zeros(),
            angular_rads_rb: Vector3::zeros(),
        }
    }
}

impl From<Vec3Msg> for Vector3<f64> {
    fn from(v: Vec3Msg) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

impl From<VelocityCmdMsg> for VelocityCmd {
    fn from(msg: VelocityCmdMsg) -> Self {
        Self {
            linear_ms_rb: msg.linear.into(),
            angular_rads_rb: msg.angular.into(),
        }
    }
}

impl Default for VelCmdCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VelCmdCache {
    /// Create a new cache holding a zero command.
    pub fn new() -> Self {
        Self {
            slot: ArcSwap::from_pointee(VelocityCmd::default()),
        }
    }

    /// Replace the held command.
    pub fn update(&self, cmd: VelocityCmd) {
        self.slot.store(std::sync::Arc::new(cmd));
    }

    /// Replace the held command with one received over the wire.
    pub fn update_from_msg(&self, msg: VelocityCmdMsg) {
        trace!("New velocity command: {:?}", msg);
        self.update(msg.into());
    }

    /// Replace the held command with a JSON encoded message.
    ///
    /// If the message cannot be decoded the held command is unchanged.
    pub fn update_from_json(&self, json: &str) -> Result<(), serde_json::Error> {
        let msg: VelocityCmdMsg = serde_json::from_str(json)?;
        self.update_from_msg(msg);

        Ok(())
    }

    /// Get the latest command.
    pub fn get(&self) -> VelocityCmd {
        **self.slot.load()
    }

    /// Get the latest commanded linear velocity.
    pub fn linear_velocity(&self) -> Vector3<f64> {
        self.slot.load().linear_ms_rb
    }

    /// Get the latest commanded angular velocity.
    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.slot.load().angular_rads_rb
    }

    /// Get one axis of the latest commanded angular velocity, or `None` if
    /// the axis is not 0, 1 or 2.
    pub fn angular_velocity_axis(&self, axis: usize) -> Option<f64> {
        if axis < 3 {
            Some(self.slot.load().angular_rads_rb[axis])
        }
        else {
            None
        }
    }
}
