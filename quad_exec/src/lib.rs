//! # Quadruped library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to
//! access items defined inside the quadruped crate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Robot - physical parameters, leg kinematics and motor command assembly
pub mod robot;

/// Standing controller - holds the body up on all four feet
pub mod stance;

/// Velocity command cache - latest body twist demanded by the operator
pub mod vel_cmd;

/// Whole body control - per leg contact constraints for the force optimiser
pub mod wbc;
