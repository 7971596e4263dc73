//! Logger setup with per-module levels
//!
//! Everything is written to stdout and to the session's log file. The control
//! modules log every cycle at debug or trace, so the level can be raised for
//! individual module paths without losing the detail from the rest of the
//! executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use fern;
use log::{self, info};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Logger parameters, normally loaded from `logger.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggerParams {
    /// Level for any target without its own entry in `module_levels`.
    pub level: LevelFilter,

    /// Levels for individual module paths. An entry also covers every
    /// submodule of its path, the longest matching path wins.
    pub module_levels: BTreeMap<String, LevelFilter>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error, PartialEq)]
pub enum LoggerInitError {
    #[error("The log level must include `INFO` messages, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("The log level for `{0}` must include `WARN` messages, found `{1}`")]
    InvalidModuleLevel(String, LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(String),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LoggerParams {
    fn default() -> Self {
        Self {
            level: LevelFilter::Debug,
            module_levels: BTreeMap::new(),
        }
    }
}

impl LoggerParams {
    /// Check the levels never hide information or warnings.
    ///
    /// Individual modules may be quietened down to `WARN`, the general level
    /// must stay at `INFO` or more verbose.
    pub fn validate(&self) -> Result<(), LoggerInitError> {
        if self.level < log::Level::Info {
            return Err(LoggerInitError::InvalidMinLogLevel(self.level));
        }

        for (module, level) in self.module_levels.iter() {
            if *level < log::Level::Warn {
                return Err(LoggerInitError::InvalidModuleLevel(module.clone(), *level));
            }
        }

        Ok(())
    }

    /// Level applied to messages from the given target.
    pub fn get_level_for(&self, target: &str) -> LevelFilter {
        self.module_levels
            .iter()
            .filter(|(module, _)| is_within_module(target, module))
            .max_by_key(|(module, _)| module.len())
            .map(|(_, level)| *level)
            .unwrap_or(self.level)
    }

    /// The most verbose level of any target.
    pub fn get_max_level(&self) -> LevelFilter {
        self.module_levels
            .values()
            .copied()
            .fold(self.level, std::cmp::max)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    params: &LoggerParams,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    params.validate()?;

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(|e| LoggerInitError::LogFileInitError(e.to_string()))?;

    let filter_params = params.clone();

    // Setup the logger using fern's builder pattern
    fern::Dispatch::new()
        .format(|out, message, record| {
            // If debug or trace include the target, otherwise don't include it
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    record.target(),
                    message
                ))
            }
            else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    message
                ))
            }
        })
        .level(params.get_max_level())
        .filter(move |metadata| metadata.level() <= filter_params.get_level_for(metadata.target()))
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(|e| LoggerInitError::FernInitError(e.to_string()))?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", params.level);
    for (module, level) in params.module_levels.iter() {
        info!("    Log level for {}: {:?}", module, level);
    }
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Whether `target` is `module` or one of its submodules.
fn is_within_module(target: &str, module: &str) -> bool {
    match target.strip_prefix(module) {
        Some(rest) => rest.is_empty() || rest.starts_with("::"),
        None => false,
    }
}

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info => "INF".normal(),
        log::Level::Warn => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn quiet_control_params() -> LoggerParams {
        toml::from_str(
            r#"
            level = "trace"

            [module_levels]
            "quad_lib::wbc" = "info"
            "quad_lib::wbc::contact" = "warn"
            "quad_lib::stance" = "debug"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_level_to_str() {
        assert!(level_to_str(log::Level::Warn).to_string().contains("WRN"));
        assert!(level_to_str(log::Level::Error).to_string().contains("ERR"));
    }

    #[test]
    fn test_deserialise() {
        let p = quiet_control_params();
        assert_eq!(p.level, LevelFilter::Trace);
        assert_eq!(p.module_levels.len(), 3);
        assert_eq!(p.module_levels["quad_lib::stance"], LevelFilter::Debug);

        // Everything optional
        let p: LoggerParams = toml::from_str("").unwrap();
        assert_eq!(p, LoggerParams::default());
        assert_eq!(p.level, LevelFilter::Debug);
    }

    #[test]
    fn test_level_for_target() {
        let p = quiet_control_params();

        assert_eq!(p.get_level_for("quad_exec"), LevelFilter::Trace);
        assert_eq!(p.get_level_for("quad_lib::wbc"), LevelFilter::Info);
        assert_eq!(p.get_level_for("quad_lib::wbc::stack"), LevelFilter::Info);
        assert_eq!(p.get_level_for("quad_lib::wbc::contact"), LevelFilter::Warn);
        assert_eq!(p.get_level_for("quad_lib::stance"), LevelFilter::Debug);

        // Same prefix but not a submodule
        assert_eq!(p.get_level_for("quad_lib::wbc_extra"), LevelFilter::Trace);
        assert_eq!(p.get_level_for("quad_lib::stancectrl"), LevelFilter::Trace);
    }

    #[test]
    fn test_max_level() {
        let mut p = LoggerParams::default();
        p.level = LevelFilter::Info;
        assert_eq!(p.get_max_level(), LevelFilter::Info);

        p.module_levels.insert("quad_lib::stance".into(), LevelFilter::Trace);
        assert_eq!(p.get_max_level(), LevelFilter::Trace);
    }

    #[test]
    fn test_validate() {
        assert_eq!(quiet_control_params().validate(), Ok(()));

        let mut p = LoggerParams::default();
        p.level = LevelFilter::Warn;
        assert_eq!(
            p.validate(),
            Err(LoggerInitError::InvalidMinLogLevel(LevelFilter::Warn))
        );

        let mut p = LoggerParams::default();
        p.module_levels.insert("quad_lib::wbc".into(), LevelFilter::Error);
        assert_eq!(
            p.validate(),
            Err(LoggerInitError::InvalidModuleLevel(
                "quad_lib::wbc".into(),
                LevelFilter::Error
            ))
        );
    }
}
