//! Episode orchestration and ensembles of independent episodes.
mod ensemble;
mod episode;
mod output;

use serde::Serialize;

pub use ensemble::{default_threads, run_simulations};
pub use episode::run_episode;
pub use output::write_reports;

use crate::parameters::StrategyCode;
use crate::plan::Timestep;
use crate::population::{Individual, PersonId};

/// Population counts recorded at the end of one timestep.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepCounts {
    pub step: Timestep,
    pub susceptible: usize,
    pub incubating: usize,
    pub infectious: usize,
    pub recovered: usize,
    pub isolated: usize,
    /// Infections that happened during this timestep. At timestep 0 this is
    /// the number of seeded individuals.
    pub new_infections: usize,
    pub tests_used: usize,
}

impl StepCounts {
    #[must_use]
    pub fn active_infections(&self) -> usize {
        self.incubating + self.infectious
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.susceptible + self.incubating + self.infectious + self.recovered
    }
}

/// The individuals and contact graph at the end of an episode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalState {
    pub individuals: Vec<Individual>,
    pub edges: Vec<(PersonId, PersonId)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeOutcome {
    pub seed: u64,
    pub strategy: StrategyCode,
    pub counts: Vec<StepCounts>,
    /// Largest number of simultaneously infected (Incubating or Infectious) individuals.
    pub peak_infections: usize,
    /// First timestep at which `peak_infections` was reached.
    pub peak_step: Timestep,
    /// Everyone who was ever infected, seeds included.
    pub total_infected: usize,
    /// The timestep at which no infection remained, if the outbreak died out.
    pub time_to_extinction: Option<Timestep>,
    pub final_state: FinalState,
}

impl EpisodeOutcome {
    /// Number of timesteps that ran after the initial state.
    #[must_use]
    pub fn steps_run(&self) -> usize {
        self.counts.last().map_or(0, |counts| counts.step)
    }
}

/// Summary statistics of one outcome over an ensemble of episodes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct OutcomeDistribution {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl OutcomeDistribution {
    /// Returns `None` for an empty sample.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: &[f64]) -> Option<OutcomeDistribution> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values
            .iter()
            .map(|value| (value - mean).powi(2))
            .sum::<f64>()
            / count as f64;
        Some(OutcomeDistribution {
            count,
            mean,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev: variance.sqrt(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationSummary {
    /// Outcomes in episode order; episode `i` ran with seed `base_seed + i`.
    pub outcomes: Vec<EpisodeOutcome>,
    pub peak_infections: OutcomeDistribution,
    pub total_infected: OutcomeDistribution,
    /// Over the episodes in which the outbreak died out; `None` if none did.
    pub time_to_extinction: Option<OutcomeDistribution>,
}

impl SimulationSummary {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_outcomes(outcomes: Vec<EpisodeOutcome>) -> SimulationSummary {
        let collect = |value: fn(&EpisodeOutcome) -> Option<usize>| -> Vec<f64> {
            outcomes
                .iter()
                .filter_map(value)
                .map(|value| value as f64)
                .collect()
        };
        let peak_infections = collect(|outcome| Some(outcome.peak_infections));
        let total_infected = collect(|outcome| Some(outcome.total_infected));
        let time_to_extinction = collect(|outcome| outcome.time_to_extinction);

        SimulationSummary {
            peak_infections: OutcomeDistribution::from_values(&peak_infections).unwrap_or_default(),
            total_infected: OutcomeDistribution::from_values(&total_infected).unwrap_or_default(),
            time_to_extinction: OutcomeDistribution::from_values(&time_to_extinction),
            outcomes,
        }
    }

    /// Number of episodes in which the outbreak died out.
    #[must_use]
    pub fn extinguished(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.time_to_extinction.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn outcome(peak: usize, total: usize, extinction: Option<usize>) -> EpisodeOutcome {
        EpisodeOutcome {
            seed: 0,
            strategy: StrategyCode::D,
            counts: Vec::new(),
            peak_infections: peak,
            peak_step: 0,
            total_infected: total,
            time_to_extinction: extinction,
            final_state: FinalState {
                individuals: Vec::new(),
                edges: Vec::new(),
            },
        }
    }

    #[test]
    fn distribution_statistics() {
        let distribution = OutcomeDistribution::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0])
            .unwrap();
        assert_eq!(distribution.count, 8);
        assert_approx_eq!(distribution.mean, 5.0);
        assert_approx_eq!(distribution.std_dev, 2.0);
        assert_approx_eq!(distribution.min, 2.0);
        assert_approx_eq!(distribution.max, 9.0);
        assert!(OutcomeDistribution::from_values(&[]).is_none());
    }

    #[test]
    fn extinction_is_summarized_over_extinguished_episodes() {
        let summary = SimulationSummary::from_outcomes(vec![
            outcome(10, 40, Some(12)),
            outcome(20, 60, None),
            outcome(30, 80, Some(20)),
        ]);
        assert_eq!(summary.extinguished(), 2);
        assert_approx_eq!(summary.peak_infections.mean, 20.0);
        assert_approx_eq!(summary.total_infected.max, 80.0);
        let extinction = summary.time_to_extinction.unwrap();
        assert_eq!(extinction.count, 2);
        assert_approx_eq!(extinction.mean, 16.0);

        let never = SimulationSummary::from_outcomes(vec![outcome(1, 1, None)]);
        assert!(never.time_to_extinction.is_none());
    }
}
