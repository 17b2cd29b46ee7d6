//! The individuals of an episode and their state transitions.
//!
//! Every node of the contact graph is an [`Individual`] identified by a dense
//! [`PersonId`] in `0..population`. The population is created once per
//! episode and never grows or shrinks. Model code changes an individual only
//! through [`ContextPopulationExt`], which draws from the `DiseaseRng` stream
//! and reports unknown ids as `InvariantViolation`s.
mod durations;
mod individual;

use std::fmt::{self, Debug, Display, Formatter};

use log::{debug, trace};
use serde::Serialize;

pub use durations::StageDurations;
pub use individual::{HealthState, Individual, IsolationState, TestResult, TestState};

use crate::context::Context;
use crate::error::SimulationError;
use crate::parameters::SeedState;
use crate::random::{sample_multiple_from_known_length, ContextRandomExt};
use crate::{define_data_plugin, define_rng};

define_rng!(DiseaseRng);
define_rng!(SeedingRng);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PersonId(pub(crate) usize);

impl PersonId {
    #[must_use]
    pub fn new(index: usize) -> PersonId {
        PersonId(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for PersonId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Person {}", self.0)
    }
}

/// Number of individuals in each state at one instant.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PopulationCounts {
    pub susceptible: usize,
    pub incubating: usize,
    pub infectious: usize,
    pub recovered: usize,
    pub isolated: usize,
}

impl PopulationCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.susceptible + self.incubating + self.infectious + self.recovered
    }

    /// Individuals currently carrying the disease.
    #[must_use]
    pub fn active_infections(&self) -> usize {
        self.incubating + self.infectious
    }
}

struct PopulationData {
    individuals: Vec<Individual>,
    durations: Option<StageDurations>,
}

define_data_plugin!(
    PopulationPlugin,
    PopulationData,
    PopulationData {
        individuals: Vec::new(),
        durations: None,
    }
);

fn unknown_person(id: PersonId) -> SimulationError {
    SimulationError::InvariantViolation(format!("no individual with id {id}"))
}

pub trait ContextPopulationExt {
    /// Creates `size` Susceptible individuals whose stage durations are drawn from `durations`.
    ///
    /// # Errors
    ///
    /// Returns an `InvariantViolation` if the population already exists.
    fn add_population(
        &mut self,
        size: usize,
        durations: StageDurations,
    ) -> Result<(), SimulationError>;

    fn get_population(&self) -> usize;

    /// Every individual, indexed by `PersonId`.
    fn get_individuals(&self) -> &[Individual];

    /// # Errors
    ///
    /// Returns an `InvariantViolation` if `id` is not part of the population.
    fn get_individual(&self, id: PersonId) -> Result<&Individual, SimulationError>;

    /// Ids of everyone who is not isolated, in id order.
    fn get_free_individuals(&self) -> Vec<PersonId>;

    /// Seeds `count` individuals chosen uniformly at random into `state`.
    fn seed_infections(&mut self, count: usize, state: SeedState) -> Vec<PersonId>;

    /// Infects `id` if they are Susceptible. Returns whether they were infected.
    ///
    /// # Errors
    ///
    /// Returns an `InvariantViolation` if `id` is not part of the population.
    fn expose_person(&mut self, id: PersonId) -> Result<bool, SimulationError>;

    /// Advances the disease clock of `id` by one timestep.
    ///
    /// # Errors
    ///
    /// Returns an `InvariantViolation` if `id` is not part of the population.
    fn advance_person(&mut self, id: PersonId) -> Result<Option<HealthState>, SimulationError>;

    /// # Errors
    ///
    /// Returns an `InvariantViolation` if `id` is not part of the population.
    fn isolate_person(&mut self, id: PersonId) -> Result<bool, SimulationError>;

    /// # Errors
    ///
    /// Returns an `InvariantViolation` if `id` is not part of the population.
    fn release_person(&mut self, id: PersonId) -> Result<bool, SimulationError>;

    /// # Errors
    ///
    /// Returns an `InvariantViolation` if `id` is not part of the population.
    fn set_test_state(&mut self, id: PersonId, state: TestState) -> Result<(), SimulationError>;

    /// Starts a new testing cycle by marking everyone Untested.
    fn reset_test_states(&mut self);

    fn count_population(&self) -> PopulationCounts;
}

impl ContextPopulationExt for Context {
    fn add_population(
        &mut self,
        size: usize,
        durations: StageDurations,
    ) -> Result<(), SimulationError> {
        let data = self.get_data_mut(PopulationPlugin);
        if !data.individuals.is_empty() {
            return Err(SimulationError::InvariantViolation(
                "the population has already been created".to_string(),
            ));
        }
        data.individuals = (0..size).map(|i| Individual::new(PersonId(i))).collect();
        data.durations = Some(durations);
        debug!("created a population of {size}");
        Ok(())
    }

    fn get_population(&self) -> usize {
        self.get_individuals().len()
    }

    fn get_individuals(&self) -> &[Individual] {
        self.get_data(PopulationPlugin)
            .map_or(&[], |data| data.individuals.as_slice())
    }

    fn get_individual(&self, id: PersonId) -> Result<&Individual, SimulationError> {
        self.get_individuals()
            .get(id.0)
            .ok_or_else(|| unknown_person(id))
    }

    fn get_free_individuals(&self) -> Vec<PersonId> {
        self.get_individuals()
            .iter()
            .filter(|individual| !individual.is_isolated())
            .map(Individual::id)
            .collect()
    }

    fn seed_infections(&mut self, count: usize, state: SeedState) -> Vec<PersonId> {
        let population = self.get_population();
        let chosen = self.sample(SeedingRng, |rng| {
            sample_multiple_from_known_length(rng, 0..population, count)
        });
        let Some(durations) = self
            .get_data(PopulationPlugin)
            .and_then(|data| data.durations.clone())
        else {
            return Vec::new();
        };

        let mut seeded = Vec::with_capacity(chosen.len());
        for index in chosen {
            let mut individual = self.get_individuals()[index];
            if self.sample(DiseaseRng, |rng| individual.seed(rng, &durations, state)) {
                seeded.push(individual.id());
            }
            self.get_data_mut(PopulationPlugin).individuals[index] = individual;
        }
        debug!("seeded {} individuals as {state:?}", seeded.len());
        seeded
    }

    fn expose_person(&mut self, id: PersonId) -> Result<bool, SimulationError> {
        let timestep = self.get_current_step();
        update_with_durations(self, id, |individual, rng, durations| {
            individual.expose(rng, durations, timestep)
        })
        .inspect(|infected| {
            if *infected {
                trace!("{id:?} infected at timestep {timestep}");
            }
        })
    }

    fn advance_person(&mut self, id: PersonId) -> Result<Option<HealthState>, SimulationError> {
        update_with_durations(self, id, |individual, rng, durations| {
            individual.advance_timestep(rng, durations)
        })
    }

    fn isolate_person(&mut self, id: PersonId) -> Result<bool, SimulationError> {
        update(self, id, Individual::isolate)
    }

    fn release_person(&mut self, id: PersonId) -> Result<bool, SimulationError> {
        update(self, id, Individual::release)
    }

    fn set_test_state(&mut self, id: PersonId, state: TestState) -> Result<(), SimulationError> {
        update(self, id, |individual| individual.set_test_state(state))
    }

    fn reset_test_states(&mut self) {
        for individual in &mut self.get_data_mut(PopulationPlugin).individuals {
            individual.set_test_state(TestState::Untested);
        }
    }

    fn count_population(&self) -> PopulationCounts {
        let mut counts = PopulationCounts::default();
        for individual in self.get_individuals() {
            match individual.health_state() {
                HealthState::Susceptible => counts.susceptible += 1,
                HealthState::Incubating => counts.incubating += 1,
                HealthState::Infectious => counts.infectious += 1,
                HealthState::Recovered => counts.recovered += 1,
            }
            if individual.is_isolated() {
                counts.isolated += 1;
            }
        }
        counts
    }
}

fn update<T>(
    context: &mut Context,
    id: PersonId,
    change: impl FnOnce(&mut Individual) -> T,
) -> Result<T, SimulationError> {
    context
        .get_data_mut(PopulationPlugin)
        .individuals
        .get_mut(id.0)
        .map(change)
        .ok_or_else(|| unknown_person(id))
}

// The individual is copied out so that the random stream and the population
// are never borrowed from the context at the same time.
fn update_with_durations<T>(
    context: &mut Context,
    id: PersonId,
    change: impl FnOnce(&mut Individual, &mut rand::rngs::SmallRng, &StageDurations) -> T,
) -> Result<T, SimulationError> {
    let data = context
        .get_data(PopulationPlugin)
        .ok_or_else(|| unknown_person(id))?;
    let mut individual = *data.individuals.get(id.0).ok_or_else(|| unknown_person(id))?;
    let durations = data.durations.clone().ok_or_else(|| unknown_person(id))?;

    let result = context.sample(DiseaseRng, |rng| change(&mut individual, rng, &durations));
    context.get_data_mut(PopulationPlugin).individuals[id.0] = individual;
    Ok(result)
}
