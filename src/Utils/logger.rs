//! Logging backend for the `log` facade used across the crate.
//!
//! A `CombinedLogger` with a terminal sink and, when a path is given, a file sink at the same level.

use log::warn;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::path::Path;

/// Installs the global logger.
///
/// # Arguments
/// * `level` - maximum level for every sink
/// * `file` - optional log file, created (or truncated) on the spot
/// # Returns
/// `true` when this call installed the logger, `false` when one was already installed
///
/// # Examples
/// ```rust, ignore
/// init_logger(LevelFilter::Debug, Some(Path::new("calc.log")));
/// ```
pub fn init_logger(level: LevelFilter, file: Option<&Path>) -> bool {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let mut file_error = None;
    if let Some(path) = file {
        match File::create(path) {
            Ok(sink) => loggers.push(WriteLogger::new(level, Config::default(), sink)),
            Err(e) => file_error = Some((path.display().to_string(), e)),
        }
    }
    let installed = CombinedLogger::init(loggers).is_ok();
    if let Some((path, e)) = file_error {
        warn!("log file {} could not be created: {}", path, e);
    }
    installed
}
