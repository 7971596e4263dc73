//! Main quadruped executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and robot parameters
//!     - Start the velocity command reader
//!     - Main loop:
//!         - Read the latest velocity command
//!         - Standing controller processing:
//!             - Joint demands from the foot targets
//!             - Contact constraint update and stacking
//!         - Motor command output
//!
//! Velocity commands are read from stdin as one JSON message per line, e.g.
//! `{"linear": {"x": 0.2, "y": 0.0, "z": 0.0}, "angular": {"x": 0.0, "y": 0.0, "z": 0.0}}`.
//!
//! An optional single argument gives the number of cycles to run, otherwise
//! the loop runs until stopped.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, trace, warn};
use std::env;
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

// Internal
use quad_lib::{
    robot::{KinematicState, LegId, Robot, NUM_LEGS},
    stance::StanceCtrl,
    vel_cmd::VelCmdCache,
};
use util::{
    logger::{logger_init, LoggerParams},
    session::Session,
    time::seconds_to_std_duration,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.002;

/// Number of cycles between status reports in the log.
const STATUS_REPORT_CYCLES: u64 = 500;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("quad_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let logger_params: LoggerParams =
        util::params::load("logger.toml").wrap_err("Failed to load the logger parameters")?;
    logger_init(&logger_params, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Quadruped Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let max_cycles: Option<u64> = match args.get(1) {
        Some(a) => Some(
            a.parse::<u64>()
                .wrap_err_with(|| format!("Invalid number of cycles \"{}\"", a))?,
        ),
        None => None,
    };

    // ---- LOAD PARAMETERS ----

    let mut robot = Robot::load("robot.toml").wrap_err("Failed to load the robot")?;

    info!(
        "Robot loaded, {:.1} kg, control mode {:?}",
        robot.params().body_mass(),
        robot.params().control_mode
    );

    // ---- INITIALISE MODULES ----

    let vel_cache = Arc::new(VelCmdCache::new());
    spawn_vel_cmd_reader(vel_cache.clone());

    let mut stance_ctrl = StanceCtrl::new();

    // Without state estimation the robot is taken to be where it was last
    // commanded, starting from its nominal stance
    let mut state = KinematicState::default();
    let targets = StanceCtrl::foot_targets_m_rb(robot.params(), &vel_cache.get());
    for leg in LegId::ALL.iter() {
        let angles = robot.params().foot_position_in_base_frame_to_joint_angles(
            &targets.column(leg.index()).into_owned(),
            *leg,
        );
        state
            .joint_pos_rad
            .fixed_rows_mut::<3>(leg.first_joint())
            .copy_from(&angles);
    }

    info!("Initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut num_cycles: u64 = 0;

    loop {
        if let Some(max) = max_cycles {
            if num_cycles >= max {
                break;
            }
        }

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        let vel_cmd = vel_cache.get();

        let output = stance_ctrl.proc(&mut robot, &state, &vel_cmd, &[true; NUM_LEGS]);

        if output.reach_limited.iter().any(|r| *r) {
            warn!("Foot targets out of reach: {:?}", output.reach_limited);
        }

        trace!("Motor commands: {:?}", robot.get_cmd());

        // Follow the demands
        state.joint_pos_rad = output.joint_pos_dems_rad;

        if num_cycles % STATUS_REPORT_CYCLES == 0 {
            info!(
                "Cycle {}: {} feet in contact, velocity demand {:?}",
                num_cycles,
                output.stack.num_contacts(),
                vel_cmd.linear_ms_rb.as_slice()
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match seconds_to_std_duration(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
            ),
        }

        // Increment cycle counter
        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("End of execution after {} cycles", num_cycles);

    Ok(())
}

/// Start a thread which reads velocity commands from stdin into the cache.
fn spawn_vel_cmd_reader(cache: Arc<VelCmdCache>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();

        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("Could not read velocity command: {}", e);
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            if let Err(e) = cache.update_from_json(&line) {
                warn!("Invalid velocity command \"{}\": {}", line, e);
            }
        }

        debug!("Velocity command input closed");
    });
}
