use std::path::Path;

use serde::Serialize;

use super::SimulationSummary;
use crate::create_report_trait;
use crate::error::SimulationError;
use crate::parameters::{Parameters, StrategyCode};
use crate::plan::Timestep;
use crate::population::{HealthState, IsolationState};
use crate::report::{ReportOptions, ReportWriter};

#[derive(Serialize)]
struct CountsReport {
    episode: usize,
    seed: u64,
    step: Timestep,
    susceptible: usize,
    incubating: usize,
    infectious: usize,
    recovered: usize,
    isolated: usize,
    new_infections: usize,
    tests_used: usize,
}

#[derive(Serialize)]
struct SummaryReport {
    episode: usize,
    seed: u64,
    strategy: StrategyCode,
    steps: usize,
    peak_infections: usize,
    peak_step: Timestep,
    total_infected: usize,
    time_to_extinction: Option<Timestep>,
}

#[derive(Serialize)]
struct NodeReport {
    id: usize,
    health_state: HealthState,
    isolation_state: IsolationState,
    infected_at: Option<Timestep>,
}

#[derive(Serialize)]
struct EdgeReport {
    v1: usize,
    v2: usize,
}

create_report_trait!(CountsReport);
create_report_trait!(SummaryReport);
create_report_trait!(NodeReport);
create_report_trait!(EdgeReport);

/// Writes `counts.csv` and `summary.csv` for every episode into `directory`.
/// With `visualize` set, also writes the final state of the first episode to
/// `graph_nodes.csv` and `graph_edges.csv` for plotting.
///
/// # Errors
///
/// Returns an error if a report file cannot be created or written.
pub fn write_reports(
    summary: &SimulationSummary,
    parameters: &Parameters,
    directory: &Path,
) -> Result<(), SimulationError> {
    let mut writer = ReportWriter::new(ReportOptions::new(directory));
    writer.add_report::<CountsReport>("counts")?;
    writer.add_report::<SummaryReport>("summary")?;

    for (episode, outcome) in summary.outcomes.iter().enumerate() {
        for counts in &outcome.counts {
            writer.send_report(&CountsReport {
                episode,
                seed: outcome.seed,
                step: counts.step,
                susceptible: counts.susceptible,
                incubating: counts.incubating,
                infectious: counts.infectious,
                recovered: counts.recovered,
                isolated: counts.isolated,
                new_infections: counts.new_infections,
                tests_used: counts.tests_used,
            })?;
        }
        writer.send_report(&SummaryReport {
            episode,
            seed: outcome.seed,
            strategy: outcome.strategy,
            steps: outcome.steps_run(),
            peak_infections: outcome.peak_infections,
            peak_step: outcome.peak_step,
            total_infected: outcome.total_infected,
            time_to_extinction: outcome.time_to_extinction,
        })?;
    }

    if parameters.visualize {
        if let Some(first) = summary.outcomes.first() {
            writer.add_report::<NodeReport>("graph_nodes")?;
            writer.add_report::<EdgeReport>("graph_edges")?;
            for individual in &first.final_state.individuals {
                writer.send_report(&NodeReport {
                    id: individual.id().index(),
                    health_state: individual.health_state(),
                    isolation_state: individual.isolation_state(),
                    infected_at: individual.infected_at(),
                })?;
            }
            for (v1, v2) in &first.final_state.edges {
                writer.send_report(&EdgeReport {
                    v1: v1.index(),
                    v2: v2.index(),
                })?;
            }
        }
    }
    writer.flush()
}
