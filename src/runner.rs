//! The `contagion` command line.
//!
//! Parameters come from an optional JSON config file; any flag given on the
//! command line overrides the value from the file.
use std::path::PathBuf;

use clap::Parser;

use crate::error::SimulationError;
use crate::log::{apply_log_spec, set_log_level, LevelFilter};
use crate::parameters::{Parameters, StrategyCode};
use crate::simulation::{run_simulations, EpisodeOutcome, OutcomeDistribution, SimulationSummary};

fn parse_strategy(value: &str) -> Result<StrategyCode, String> {
    value.parse().map_err(|error: SimulationError| error.to_string())
}

/// Simulate an outbreak on a contact graph under a testing and isolation strategy
#[derive(Parser, Debug, Default)]
#[command(name = "contagion", version)]
pub struct Args {
    /// Optional path to a JSON parameters file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Strategy code, A to H
    #[arg(short, long, value_parser = parse_strategy)]
    pub strategy: Option<StrategyCode>,

    /// Number of individuals
    #[arg(short = 'n', long)]
    pub population: Option<usize>,

    /// Tests (or pools) available per timestep
    #[arg(long)]
    pub test_capacity: Option<usize>,

    /// Individuals per pool for pooled strategies
    #[arg(long)]
    pub pool_size: Option<usize>,

    /// Maximum number of timesteps per episode
    #[arg(short, long)]
    pub iterations: Option<usize>,

    /// Number of independent episodes
    #[arg(long)]
    pub num_simulations: Option<usize>,

    /// Basic reproductive number
    #[arg(long = "r0")]
    pub r_0: Option<f64>,

    /// Probability that an infected individual tests positive
    #[arg(long)]
    pub test_positive: Option<f64>,

    /// Fraction of the population infected at the start
    #[arg(long)]
    pub p_init_sick: Option<f64>,

    /// Random seed of the first episode
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional directory for report output
    #[arg(short = 'o', long)]
    pub save_dir: Option<PathBuf>,

    /// Export the final contact graph of the first episode
    #[arg(long)]
    pub visualize: bool,

    /// Log episode progress
    #[arg(short, long)]
    pub verbose: bool,

    /// Log level specification, such as "debug" or "warn,contagion::strategy=debug"
    #[arg(long)]
    pub log_level: Option<String>,

    /// Worker threads for running episodes
    #[arg(short, long)]
    pub threads: Option<usize>,
}

impl Args {
    /// Builds validated parameters from the config file and the flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the resulting
    /// parameters are invalid.
    pub fn to_parameters(&self) -> Result<Parameters, SimulationError> {
        let mut parameters = match &self.config {
            Some(path) => Parameters::from_json_file(path)?,
            None => Parameters::default(),
        };

        if let Some(strategy) = self.strategy {
            parameters.strategy = strategy;
        }
        if let Some(population) = self.population {
            parameters.population = population;
        }
        if let Some(test_capacity) = self.test_capacity {
            parameters.test_capacity = test_capacity;
        }
        if let Some(pool_size) = self.pool_size {
            parameters.pool_size = pool_size;
        }
        if let Some(iterations) = self.iterations {
            parameters.iterations = iterations;
        }
        if let Some(num_simulations) = self.num_simulations {
            parameters.num_simulations = num_simulations;
        }
        if let Some(r_0) = self.r_0 {
            parameters.r_0 = r_0;
        }
        if let Some(test_positive) = self.test_positive {
            parameters.test_positive = test_positive;
        }
        if let Some(p_init_sick) = self.p_init_sick {
            parameters.p_init_sick = p_init_sick;
        }
        if let Some(seed) = self.random_seed {
            parameters.seed = seed;
        }
        if let Some(save_dir) = &self.save_dir {
            parameters.save_dir = Some(save_dir.clone());
        }
        if let Some(threads) = self.threads {
            parameters.threads = Some(threads);
        }
        parameters.visualize |= self.visualize;
        parameters.verbose |= self.verbose;

        parameters.validate()?;
        Ok(parameters)
    }
}

fn configure_logging(parameters: &Parameters, log_level: Option<&str>) -> Result<(), SimulationError> {
    if parameters.verbose {
        set_log_level(LevelFilter::Info);
    }
    if let Some(spec) = log_level {
        apply_log_spec(spec)?;
    }
    Ok(())
}

fn format_distribution(distribution: &OutcomeDistribution) -> String {
    format!(
        "mean {:.1}, sd {:.1}, min {:.0}, max {:.0}",
        distribution.mean, distribution.std_dev, distribution.min, distribution.max
    )
}

fn format_outcome(index: usize, outcome: &EpisodeOutcome) -> String {
    let ending = match outcome.time_to_extinction {
        Some(step) => format!("died out at timestep {step}"),
        None => format!("still active after {} timesteps", outcome.steps_run()),
    };
    format!(
        "episode {index} (seed {}): peak {} infected at timestep {}, {} infected in total, {ending}",
        outcome.seed, outcome.peak_infections, outcome.peak_step, outcome.total_infected
    )
}

/// Formats the report printed at the end of a run.
#[must_use]
pub fn format_summary(parameters: &Parameters, summary: &SimulationSummary) -> String {
    let mut lines: Vec<String> = summary
        .outcomes
        .iter()
        .enumerate()
        .map(|(index, outcome)| format_outcome(index, outcome))
        .collect();
    lines.push(format!(
        "strategy {} ({}), {} episodes",
        parameters.strategy,
        parameters.strategy.describe(),
        summary.outcomes.len()
    ));
    lines.push(format!(
        "peak infections: {}",
        format_distribution(&summary.peak_infections)
    ));
    lines.push(format!(
        "total infected: {}",
        format_distribution(&summary.total_infected)
    ));
    lines.push(match &summary.time_to_extinction {
        Some(distribution) => format!(
            "time to extinction ({} of {} died out): {}",
            summary.extinguished(),
            summary.outcomes.len(),
            format_distribution(distribution)
        ),
        None => "time to extinction: no outbreak died out".to_string(),
    });
    lines.join("\n")
}

/// Runs the simulations described by `args` and prints the results.
///
/// # Errors
///
/// Returns an error if the parameters are invalid or a simulation or report fails.
pub fn run_with_args(args: &Args) -> Result<SimulationSummary, SimulationError> {
    let parameters = args.to_parameters()?;
    configure_logging(&parameters, args.log_level.as_deref())?;
    let summary = run_simulations(&parameters)?;
    println!("{}", format_summary(&parameters, &summary));
    Ok(summary)
}

/// Parses the process arguments and runs.
///
/// # Errors
///
/// Returns an error if the run fails.
pub fn run() -> Result<SimulationSummary, SimulationError> {
    run_with_args(&Args::parse())
}
