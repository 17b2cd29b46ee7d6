//! The immutable configuration bundle of a simulation.
//!
//! `Parameters` deserializes from JSON with every field optional; missing fields
//! take the defaults below. `validate` rejects out-of-range values before any
//! episode starts, and nothing is ever clamped.
use std::fmt::{self, Display};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::SimulationError;

/// Letter codes of the testing and isolation strategies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyCode {
    /// Direct test-and-isolate.
    A,
    /// Test, isolate and trace every contact.
    B,
    /// Test, isolate and trace contacts with imperfect recall.
    C,
    /// Unmitigated spread.
    D,
    /// Complete lockdown.
    E,
    /// Lockdown, then pooled testing with isolation and conservative tracing.
    F,
    /// Lockdown, then pooled testing with isolation and no tracing.
    G,
    /// Lockdown, then pooled testing with individual follow-up and noisy tracing.
    H,
}

impl StrategyCode {
    pub const ALL: [StrategyCode; 8] = [
        StrategyCode::A,
        StrategyCode::B,
        StrategyCode::C,
        StrategyCode::D,
        StrategyCode::E,
        StrategyCode::F,
        StrategyCode::G,
        StrategyCode::H,
    ];

    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            StrategyCode::A => "direct test and isolate",
            StrategyCode::B => "full contact trace",
            StrategyCode::C => "noisy contact trace",
            StrategyCode::D => "unmitigated spread",
            StrategyCode::E => "complete lockdown",
            StrategyCode::F => "lockdown, then pooled isolation with conservative tracing",
            StrategyCode::G => "lockdown, then pooled isolation without tracing",
            StrategyCode::H => "lockdown, then pooled follow-up testing with noisy tracing",
        }
    }
}

impl Display for StrategyCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl FromStr for StrategyCode {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        StrategyCode::ALL
            .into_iter()
            .find(|candidate| candidate.to_string() == code)
            .ok_or_else(|| {
                SimulationError::ConfigurationError(format!(
                    "unknown strategy code '{s}', expected one of A..H"
                ))
            })
    }
}

/// How the contact graph is generated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Topology {
    /// Every pair is connected independently with probability `mean_degree / population`.
    Random { mean_degree: f64 },
    /// Configuration model where every node starts with `degree` stubs.
    Regular { degree: usize },
    /// An explicit list of undirected edges.
    Edges { edges: Vec<(usize, usize)> },
    /// A CSV edge list with columns `v1,v2`.
    EdgeListFile { path: PathBuf },
}

impl Default for Topology {
    fn default() -> Self {
        Topology::Random { mean_degree: 20.0 }
    }
}

/// The health state that seeded individuals start in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedState {
    #[default]
    Infectious,
    Incubating,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    pub strategy: StrategyCode,
    pub population: usize,
    /// Test units available per timestep. A pool consumes one unit.
    pub test_capacity: usize,
    pub pool_size: usize,
    pub iterations: usize,
    pub num_simulations: usize,
    pub r_0: f64,
    /// Probability that an infected individual tests positive.
    pub test_positive: f64,
    pub p_init_sick: f64,
    pub visualize: bool,
    pub verbose: bool,
    pub save_dir: Option<PathBuf>,
    /// Base seed; episode `i` uses `seed + i`.
    pub seed: u64,
    pub topology: Topology,
    /// Mean timesteps spent Incubating.
    pub incubation_period: f64,
    /// Mean timesteps spent Infectious.
    pub infectious_period: f64,
    /// Shape of the Gamma distributions of stage durations.
    pub duration_shape: f64,
    pub seed_state: SeedState,
    /// Whether incubating individuals can test positive.
    pub detect_incubating: bool,
    pub false_positive_rate: f64,
    /// Per-neighbor probability that a noisy trace reaches a contact.
    pub trace_probability: f64,
    /// Per-neighbor trace probability used by the conservative pooled strategy.
    pub conservative_trace_probability: f64,
    /// Fractional sensitivity lost per additional pool member.
    pub dilution_penalty: f64,
    /// Timesteps of lockdown before a phased strategy switches over.
    pub lockdown_duration: usize,
    /// Worker threads for independent episodes. Defaults to the available parallelism.
    pub threads: Option<usize>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            strategy: StrategyCode::D,
            population: 1000,
            test_capacity: 100,
            pool_size: 5,
            iterations: 50,
            num_simulations: 1,
            r_0: 5.7,
            test_positive: 0.7,
            p_init_sick: 0.01,
            visualize: false,
            verbose: false,
            save_dir: None,
            seed: 0,
            topology: Topology::default(),
            incubation_period: 3.0,
            infectious_period: 5.0,
            duration_shape: 4.0,
            seed_state: SeedState::default(),
            detect_incubating: true,
            false_positive_rate: 0.0,
            trace_probability: 0.25,
            conservative_trace_probability: 0.5,
            dilution_penalty: 0.05,
            lockdown_duration: 14,
            threads: None,
        }
    }
}

fn config_error(message: String) -> SimulationError {
    SimulationError::ConfigurationError(message)
}

fn check_positive_count(name: &str, value: usize) -> Result<(), SimulationError> {
    if value == 0 {
        return Err(config_error(format!("{name} must be greater than 0")));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), SimulationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(config_error(format!(
            "{name} must be a positive finite number, got {value}"
        )));
    }
    Ok(())
}

fn check_probability(name: &str, value: f64) -> Result<(), SimulationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(config_error(format!(
            "{name} must be a probability in [0, 1], got {value}"
        )));
    }
    Ok(())
}

impl Parameters {
    /// Checks every parameter against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` naming the first offending parameter.
    pub fn validate(&self) -> Result<(), SimulationError> {
        check_positive_count("population", self.population)?;
        check_positive_count("pool_size", self.pool_size)?;
        check_positive_count("iterations", self.iterations)?;
        check_positive_count("num_simulations", self.num_simulations)?;
        if let Some(threads) = self.threads {
            check_positive_count("threads", threads)?;
        }

        check_positive("r_0", self.r_0)?;
        check_positive("incubation_period", self.incubation_period)?;
        check_positive("infectious_period", self.infectious_period)?;
        check_positive("duration_shape", self.duration_shape)?;

        check_probability("test_positive", self.test_positive)?;
        check_probability("p_init_sick", self.p_init_sick)?;
        check_probability("false_positive_rate", self.false_positive_rate)?;
        check_probability("trace_probability", self.trace_probability)?;
        check_probability(
            "conservative_trace_probability",
            self.conservative_trace_probability,
        )?;
        check_probability("dilution_penalty", self.dilution_penalty)?;

        match &self.topology {
            Topology::Random { mean_degree } => {
                if !mean_degree.is_finite() || *mean_degree < 0.0 {
                    return Err(config_error(format!(
                        "topology mean_degree must be a non-negative finite number, got {mean_degree}"
                    )));
                }
            }
            Topology::Regular { degree } => {
                if *degree >= self.population.max(1) {
                    return Err(config_error(format!(
                        "topology degree {degree} must be smaller than the population {}",
                        self.population
                    )));
                }
            }
            Topology::Edges { edges } => {
                if let Some((a, b)) = edges
                    .iter()
                    .find(|(a, b)| *a >= self.population || *b >= self.population)
                {
                    return Err(config_error(format!(
                        "edge ({a}, {b}) refers to a person outside the population of {}",
                        self.population
                    )));
                }
            }
            Topology::EdgeListFile { .. } => {}
        }
        Ok(())
    }

    /// Number of individuals seeded at timestep 0.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn initial_infections(&self) -> usize {
        ((self.p_init_sick * self.population as f64).round() as usize).min(self.population)
    }

    /// Reads parameters from a JSON file and validates them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if validation fails.
    pub fn from_json_file(path: &Path) -> Result<Parameters, SimulationError> {
        trace!("loading parameters from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let parameters: Parameters = serde_json::from_str(&contents)?;
        parameters.validate()?;
        Ok(parameters)
    }
}

define_data_plugin!(ParametersPlugin, Option<Parameters>, None);

pub trait ContextParametersExt {
    /// Validates `parameters` and installs them in the context.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if validation fails.
    fn set_parameters(&mut self, parameters: Parameters) -> Result<(), SimulationError>;

    /// # Panics
    ///
    /// Panics if `set_parameters` has not been called.
    fn get_params(&self) -> &Parameters;
}

impl ContextParametersExt for Context {
    fn set_parameters(&mut self, parameters: Parameters) -> Result<(), SimulationError> {
        parameters.validate()?;
        *self.get_data_mut(ParametersPlugin) = Some(parameters);
        Ok(())
    }

    fn get_params(&self) -> &Parameters {
        self.get_data(ParametersPlugin)
            .and_then(Option::as_ref)
            .expect("Parameters have not been set")
    }
}
