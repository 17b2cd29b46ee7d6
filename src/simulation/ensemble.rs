use std::num::NonZeroUsize;
use std::thread;

use log::{info, warn};

use super::{run_episode, write_reports, EpisodeOutcome, SimulationSummary};
use crate::error::SimulationError;
use crate::parameters::Parameters;

/// The number of worker threads used when `threads` is not set.
#[must_use]
pub fn default_threads() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Runs `num_simulations` independent episodes and summarizes them.
///
/// Episode `i` uses seed `seed + i`. Episodes are spread over worker threads,
/// each episode owning its own context, and the outcomes are put back in
/// episode order, so the summary does not depend on the number of threads.
/// When `save_dir` is set the reports are written there; `visualize` without
/// `save_dir` only logs a warning.
///
/// # Errors
///
/// Returns the error of the first failing episode, or an error writing the reports.
pub fn run_simulations(parameters: &Parameters) -> Result<SimulationSummary, SimulationError> {
    parameters.validate()?;
    let episodes = parameters.num_simulations;
    let threads = parameters
        .threads
        .unwrap_or_else(default_threads)
        .clamp(1, episodes);
    info!(
        "running {episodes} episodes of strategy {} ({}) on {threads} threads",
        parameters.strategy,
        parameters.strategy.describe()
    );

    let mut results: Vec<(usize, Result<EpisodeOutcome, SimulationError>)> =
        thread::scope(|scope| {
            let workers: Vec<_> = (0..threads)
                .map(|worker| {
                    scope.spawn(move || {
                        (worker..episodes)
                            .step_by(threads)
                            .map(|index| {
                                let seed = parameters.seed.wrapping_add(index as u64);
                                (index, run_episode(parameters, seed))
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| {
                    worker
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });
    results.sort_by_key(|(index, _)| *index);

    let outcomes = results
        .into_iter()
        .map(|(_, outcome)| outcome)
        .collect::<Result<Vec<_>, _>>()?;
    let summary = SimulationSummary::from_outcomes(outcomes);
    info!(
        "peak infections {:.1} (sd {:.1}), total infected {:.1}, {} of {episodes} outbreaks died out",
        summary.peak_infections.mean,
        summary.peak_infections.std_dev,
        summary.total_infected.mean,
        summary.extinguished()
    );

    match &parameters.save_dir {
        Some(directory) => write_reports(&summary, parameters, directory)?,
        None if parameters.visualize => {
            warn!("visualize is set without save_dir; the final graph is not exported");
        }
        None => {}
    }
    Ok(summary)
}
