use std::fmt::{self, Debug, Display};
use std::io;

/// The error type for every fallible operation in the crate.
///
/// `ConfigurationError` is raised before any timestep runs and names the
/// offending parameter. `InvariantViolation` flags a request the model cannot
/// honor (for example isolating an id outside the population); the episode
/// driver logs it and carries on.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimulationError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    ConfigurationError(String),
    InvariantViolation(String),
    ReportError(String),
}

impl From<io::Error> for SimulationError {
    fn from(error: io::Error) -> Self {
        SimulationError::IoError(error)
    }
}

impl From<serde_json::Error> for SimulationError {
    fn from(error: serde_json::Error) -> Self {
        SimulationError::JsonError(error)
    }
}

impl From<csv::Error> for SimulationError {
    fn from(error: csv::Error) -> Self {
        SimulationError::CsvError(error)
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::IoError(error) => Some(error),
            SimulationError::JsonError(error) => Some(error),
            SimulationError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimulationError::IoError(error) => write!(f, "I/O error: {error}"),
            SimulationError::JsonError(error) => write!(f, "JSON error: {error}"),
            SimulationError::CsvError(error) => write!(f, "CSV error: {error}"),
            SimulationError::ConfigurationError(message) => {
                write!(f, "Configuration error: {message}")
            }
            SimulationError::InvariantViolation(message) => {
                write!(f, "Invariant violation: {message}")
            }
            SimulationError::ReportError(message) => write!(f, "Report error: {message}"),
        }
    }
}
