use log::{debug, info};

use super::{EpisodeOutcome, FinalState, StepCounts};
use crate::context::{Context, ExecutionPhase};
use crate::define_data_plugin;
use crate::error::SimulationError;
use crate::network::ContextNetworkExt;
use crate::parameters::{ContextParametersExt, Parameters};
use crate::plan::Timestep;
use crate::population::{ContextPopulationExt, StageDurations};
use crate::progression::ContextProgressionExt;
use crate::random::ContextRandomExt;
use crate::strategy::{build_strategy, ContextStrategyExt};
use crate::transmission::ContextTransmissionExt;

#[derive(Default)]
struct EpisodeData {
    counts: Vec<StepCounts>,
    new_infections: usize,
    tests_used: usize,
    time_to_extinction: Option<Timestep>,
}

define_data_plugin!(EpisodePlugin, EpisodeData, EpisodeData::default());

/// Runs one episode with its own context and random streams.
///
/// The episode stops after `iterations` timesteps, or earlier once no one is
/// Incubating or Infectious.
///
/// # Errors
///
/// Returns a `ConfigurationError` for invalid parameters, including a
/// transmission calibration above 1, and an I/O error if an edge list file
/// cannot be read. No timestep runs if an error is returned.
pub fn run_episode(parameters: &Parameters, seed: u64) -> Result<EpisodeOutcome, SimulationError> {
    let mut context = prepare_episode(parameters, seed)?;
    context.execute();
    Ok(collect_outcome(&mut context, parameters, seed))
}

/// Builds the episode context, records timestep 0 and schedules the timestep
/// phases unless nobody is infected.
fn prepare_episode(parameters: &Parameters, seed: u64) -> Result<Context, SimulationError> {
    let mut context = Context::new();
    context.set_parameters(parameters.clone())?;
    context.init_random(seed);

    let population = parameters.population;
    context.generate_contact_graph(population, &parameters.topology)?;
    context.init_transmission()?;
    context.add_population(
        population,
        StageDurations::new(
            parameters.incubation_period,
            parameters.infectious_period,
            parameters.duration_shape,
        )?,
    )?;
    let seeded = context.seed_infections(parameters.initial_infections(), parameters.seed_state);
    context.set_strategy(build_strategy(parameters));
    debug!(
        "episode with seed {seed}: {} seeded, strategy {}",
        seeded.len(),
        parameters.strategy
    );

    context.get_data_mut(EpisodePlugin).new_infections = seeded.len();
    let initial = record_step(&mut context);
    if initial.active_infections() == 0 {
        context.get_data_mut(EpisodePlugin).time_to_extinction = Some(0);
    } else {
        schedule_timesteps(&mut context);
    }
    Ok(context)
}

fn schedule_timesteps(context: &mut Context) {
    context.add_periodic_plan_with_phase(
        1,
        |context| {
            let infected = context.spread_infection();
            context.get_data_mut(EpisodePlugin).new_infections = infected.len();
        },
        ExecutionPhase::Transmission,
    );
    context.add_periodic_plan_with_phase(
        1,
        |context| {
            context.progress_infections();
        },
        ExecutionPhase::Progression,
    );
    context.add_periodic_plan_with_phase(
        1,
        |context| {
            let summary = context.run_intervention();
            context.get_data_mut(EpisodePlugin).tests_used = summary.tests_used;
        },
        ExecutionPhase::Intervention,
    );
    context.add_periodic_plan_with_phase(1, observe, ExecutionPhase::Observation);
}

fn observe(context: &mut Context) {
    let counts = record_step(context);
    info!(
        "Number of people infected at timestep {}: {}",
        counts.step,
        counts.active_infections()
    );
    if counts.active_infections() == 0 {
        debug!("outbreak died out at timestep {}", counts.step);
        context.get_data_mut(EpisodePlugin).time_to_extinction = Some(counts.step);
        context.shutdown();
    } else if counts.step >= context.get_params().iterations {
        context.shutdown();
    }
}

fn record_step(context: &mut Context) -> StepCounts {
    let population = context.count_population();
    let step = context.get_current_step();
    let data = context.get_data_mut(EpisodePlugin);
    let counts = StepCounts {
        step,
        susceptible: population.susceptible,
        incubating: population.incubating,
        infectious: population.infectious,
        recovered: population.recovered,
        isolated: population.isolated,
        new_infections: std::mem::take(&mut data.new_infections),
        tests_used: std::mem::take(&mut data.tests_used),
    };
    data.counts.push(counts);
    counts
}

fn collect_outcome(context: &mut Context, parameters: &Parameters, seed: u64) -> EpisodeOutcome {
    let data = std::mem::take(context.get_data_mut(EpisodePlugin));
    let (peak_step, peak_infections) = data
        .counts
        .iter()
        .map(|counts| (counts.step, counts.active_infections()))
        .fold((0, 0), |best, current| if current.1 > best.1 { current } else { best });
    let final_susceptible = data.counts.last().map_or(0, |counts| counts.susceptible);

    EpisodeOutcome {
        seed,
        strategy: parameters.strategy,
        peak_infections,
        peak_step,
        total_infected: parameters.population - final_susceptible,
        time_to_extinction: data.time_to_extinction,
        counts: data.counts,
        final_state: FinalState {
            individuals: context.get_individuals().to_vec(),
            edges: context.get_contact_graph().edges().collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{StrategyCode, Topology};
    use crate::population::{HealthState, Individual};

    define_data_plugin!(HealthHistory, Vec<Vec<HealthState>>, Vec::new());

    fn health_states(context: &Context) -> Vec<HealthState> {
        context
            .get_individuals()
            .iter()
            .map(Individual::health_state)
            .collect()
    }

    fn small(strategy: StrategyCode) -> Parameters {
        Parameters {
            strategy,
            population: 200,
            iterations: 30,
            p_init_sick: 0.05,
            r_0: 2.5,
            test_capacity: 20,
            topology: Topology::Random { mean_degree: 8.0 },
            ..Parameters::default()
        }
    }

    #[test]
    fn counts_cover_every_timestep() {
        let outcome = run_episode(&small(StrategyCode::D), 1).unwrap();
        assert_eq!(outcome.counts[0].step, 0);
        assert_eq!(outcome.counts[0].new_infections, 10);
        assert_eq!(outcome.counts[0].infectious, 10);
        for (index, counts) in outcome.counts.iter().enumerate() {
            assert_eq!(counts.step, index);
            assert_eq!(counts.total(), 200);
        }
        assert!(outcome.steps_run() <= 30);
        match outcome.time_to_extinction {
            Some(step) => assert_eq!(step, outcome.steps_run()),
            None => assert_eq!(outcome.steps_run(), 30),
        }
    }

    #[test]
    fn no_seeds_means_immediate_extinction() {
        let parameters = Parameters {
            p_init_sick: 0.0,
            ..small(StrategyCode::A)
        };
        let outcome = run_episode(&parameters, 3).unwrap();
        assert_eq!(outcome.counts.len(), 1);
        assert_eq!(outcome.time_to_extinction, Some(0));
        assert_eq!(outcome.total_infected, 0);
        assert_eq!(outcome.peak_infections, 0);
    }

    #[test]
    fn calibration_above_one_fails_before_running() {
        let parameters = Parameters {
            r_0: 100.0,
            topology: Topology::Regular { degree: 2 },
            ..small(StrategyCode::D)
        };
        assert!(matches!(
            run_episode(&parameters, 0),
            Err(SimulationError::ConfigurationError(_))
        ));
    }

    #[test]
    fn invalid_parameters_fail() {
        let parameters = Parameters {
            population: 0,
            ..small(StrategyCode::D)
        };
        assert!(run_episode(&parameters, 0).is_err());
    }

    #[test]
    fn same_seed_same_outcome() {
        for strategy in StrategyCode::ALL {
            let parameters = Parameters {
                lockdown_duration: 3,
                ..small(strategy)
            };
            let first = run_episode(&parameters, 99).unwrap();
            let second = run_episode(&parameters, 99).unwrap();
            assert_eq!(first, second, "strategy {strategy} is not reproducible");
        }
    }

    #[test]
    fn final_state_matches_the_last_counts() {
        let outcome = run_episode(&small(StrategyCode::C), 4).unwrap();
        let last = outcome.counts.last().unwrap();
        let isolated = outcome
            .final_state
            .individuals
            .iter()
            .filter(|individual| individual.is_isolated())
            .count();
        assert_eq!(isolated, last.isolated);
        assert_eq!(outcome.final_state.individuals.len(), 200);
        assert!(!outcome.final_state.edges.is_empty());
        assert_eq!(
            outcome.total_infected,
            200 - last.susceptible
        );
    }

    #[test]
    fn no_individual_ever_moves_back_a_stage() {
        for strategy in StrategyCode::ALL {
            let parameters = Parameters {
                lockdown_duration: 4,
                ..small(strategy)
            };
            let mut context = prepare_episode(&parameters, 17).unwrap();
            assert!(context
                .get_data(EpisodePlugin)
                .is_some_and(|data| data.time_to_extinction.is_none()));
            let initial = health_states(&context);
            context.get_data_mut(HealthHistory).push(initial);
            context.add_periodic_plan_with_phase(
                1,
                |context| {
                    let states = health_states(context);
                    context.get_data_mut(HealthHistory).push(states);
                },
                ExecutionPhase::Intervention,
            );
            context.execute();

            let history = context.get_data(HealthHistory).unwrap();
            assert!(history.len() > 2, "strategy {strategy} stopped too early");
            for (step, pair) in history.windows(2).enumerate() {
                for (person, (before, after)) in pair[0].iter().zip(&pair[1]).enumerate() {
                    assert!(
                        after >= before,
                        "strategy {strategy}: person {person} went from {before:?} to {after:?} at timestep {}",
                        step + 1
                    );
                }
            }
        }
    }
}
