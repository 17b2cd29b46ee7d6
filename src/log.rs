//! Logging facilities for simulation internals.
//!
//! Not to be confused with _reports_, which record model outputs. This module re-exports the
//! five `log` macros and installs a `log4rs` console logger whose filters can be changed at
//! any time:
//!
//!  - `enable_logging()`: turns on all log messages
//!  - `disable_logging()`: turns off all log messages
//!  - `set_log_level(level: LevelFilter)`: enables only log messages with priority at least `level`
//!  - `set_module_filter()` / `remove_module_filter()`: per-module filters
//!
//! ```rust
//! use contagion::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! set_log_level(LevelFilter::Info);
//! set_module_filter("contagion::transmission", LevelFilter::Trace);
//! ```
//!
//! Logging is disabled by default.

use std::collections::hash_map::Entry;
use std::sync::{LazyLock, Mutex, MutexGuard};

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::{Config, Handle};
pub use log::{debug, error, info, trace, warn, LevelFilter};

use crate::error::SimulationError;
use crate::hashing::HashMap;

// Logging disabled
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;
// One trace line per scheduled plan drowns everything else.
const DEFAULT_MODULE_FILTERS: [(&str, LevelFilter); 1] = [("contagion::plan", LevelFilter::Info)];
// ISO 8601 timestamp, color coded level tag and target.
const DEFAULT_LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// Holds the global and per-module filter levels and the handle to the installed logger.
struct LogConfiguration {
    global_log_level: LevelFilter,
    module_levels: HashMap<String, LevelFilter>,
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_levels: DEFAULT_MODULE_FILTERS
                .iter()
                .map(|(module, level)| ((*module).to_string(), *level))
                .collect(),
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    /// Installs or reconfigures the global `log4rs` logger to match this configuration.
    fn set_config(&mut self) {
        let encoder = Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN));
        let stdout = ConsoleAppender::builder().encoder(encoder).build();
        let mut config =
            Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));

        let mut modules: Vec<_> = self.module_levels.iter().collect();
        modules.sort();
        for (module, level) in modules {
            config = config.logger(Logger::builder().build(module.clone(), *level));
        }

        let root = Root::builder()
            .appender("stdout")
            .build(self.global_log_level);
        let new_config = match config.build(root) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to build log config: {e}");
                return;
            }
        };

        match self.root_handle {
            Some(ref handle) => handle.set_config(new_config),
            None => match log4rs::init_config(new_config) {
                Ok(handle) => self.root_handle = Some(handle),
                Err(e) => eprintln!("failed to install logger: {e}"),
            },
        }
    }

    fn insert_module_filter(&mut self, module: &str, level: LevelFilter) -> bool {
        match self.module_levels.entry(module.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() == level {
                    return false;
                }
                entry.insert(level);
            }
            Entry::Vacant(entry) => {
                entry.insert(level);
            }
        }
        true
    }
}

/// Enables all log messages. Equivalent to `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level. `LevelFilter::Off` disables logging.
pub fn set_log_level(level: LevelFilter) {
    let mut log_configuration = get_log_configuration();
    log_configuration.global_log_level = level;
    log_configuration.set_config();
}

/// Sets a level filter for the given module path.
pub fn set_module_filter(module_path: &str, level: LevelFilter) {
    let mut log_configuration = get_log_configuration();
    if log_configuration.insert_module_filter(module_path, level) {
        log_configuration.set_config();
    }
}

/// Removes the filter for `module_path`; the global level applies to it again.
pub fn remove_module_filter(module_path: &str) {
    let mut log_configuration = get_log_configuration();
    if log_configuration.module_levels.remove(module_path).is_some() {
        log_configuration.set_config();
    }
}

/// Applies a log level specification such as `"info"` or
/// `"warn,contagion::transmission=trace"`. A bare level sets the global level, and
/// `module=level` entries set module filters.
///
/// # Errors
///
/// Returns a `ConfigurationError` when a level name is not recognized.
pub fn apply_log_spec(spec: &str) -> Result<(), SimulationError> {
    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once('=') {
            Some((module, level)) => set_module_filter(module.trim(), parse_level(level)?),
            None => set_log_level(parse_level(entry)?),
        }
    }
    Ok(())
}

fn parse_level(level: &str) -> Result<LevelFilter, SimulationError> {
    level.trim().parse().map_err(|_| {
        SimulationError::ConfigurationError(format!("unknown log level '{}'", level.trim()))
    })
}

fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION.lock().expect("Mutex poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Force logging tests to run serially for consistent behavior.
    static TEST_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    #[test]
    fn test_set_log_level() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_log_level(LevelFilter::Error);
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Error);
        error!("test_set_log_level: global set to error");
        trace!("test_set_log_level: NOT EMITTED");
        disable_logging();
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Off);
    }

    #[test]
    fn test_set_remove_module_filters() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_module_filter("contagion::strategy", LevelFilter::Debug);
        assert_eq!(
            get_log_configuration()
                .module_levels
                .get("contagion::strategy"),
            Some(&LevelFilter::Debug)
        );
        remove_module_filter("contagion::strategy");
        assert!(!get_log_configuration()
            .module_levels
            .contains_key("contagion::strategy"));
        // Default filter survives.
        assert_eq!(
            get_log_configuration().module_levels.get("contagion::plan"),
            Some(&LevelFilter::Info)
        );
        disable_logging();
    }

    #[test]
    fn test_apply_log_spec() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        apply_log_spec("warn, contagion::transmission=trace").unwrap();
        {
            let config = get_log_configuration();
            assert_eq!(config.global_log_level, LevelFilter::Warn);
            assert_eq!(
                config.module_levels.get("contagion::transmission"),
                Some(&LevelFilter::Trace)
            );
        }
        assert!(matches!(
            apply_log_spec("loud"),
            Err(SimulationError::ConfigurationError(_))
        ));
        remove_module_filter("contagion::transmission");
        disable_logging();
    }
}
