use rand::Rng;
use serde::Serialize;

use super::durations::StageDurations;
use super::PersonId;
use crate::parameters::SeedState;
use crate::plan::Timestep;

/// Disease stage of an individual. Stages only ever move forward, in declaration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum HealthState {
    Susceptible,
    Incubating,
    Infectious,
    Recovered,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum IsolationState {
    #[default]
    Free,
    Isolated,
}

/// Outcome of the current testing cycle. Reset to `Untested` every timestep.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum TestState {
    #[default]
    Untested,
    Pending,
    Positive,
    Negative,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TestResult {
    Positive,
    Negative,
}

impl From<TestResult> for TestState {
    fn from(result: TestResult) -> Self {
        match result {
            TestResult::Positive => TestState::Positive,
            TestResult::Negative => TestState::Negative,
        }
    }
}

/// The infection, isolation and testing status of one node of the contact graph.
///
/// Invalid requests, such as exposing someone who is already infected or
/// isolating someone who is already isolated, leave the individual unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Individual {
    id: PersonId,
    health_state: HealthState,
    isolation_state: IsolationState,
    test_state: TestState,
    infection_timer: u32,
    infected_at: Option<Timestep>,
}

impl Individual {
    #[must_use]
    pub fn new(id: PersonId) -> Individual {
        Individual {
            id,
            health_state: HealthState::Susceptible,
            isolation_state: IsolationState::Free,
            test_state: TestState::Untested,
            infection_timer: 0,
            infected_at: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> PersonId {
        self.id
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        self.health_state
    }

    #[must_use]
    pub fn isolation_state(&self) -> IsolationState {
        self.isolation_state
    }

    #[must_use]
    pub fn test_state(&self) -> TestState {
        self.test_state
    }

    /// Timesteps left in the current Incubating or Infectious stage.
    #[must_use]
    pub fn infection_timer(&self) -> u32 {
        self.infection_timer
    }

    /// The timestep at which this individual was infected or seeded.
    #[must_use]
    pub fn infected_at(&self) -> Option<Timestep> {
        self.infected_at
    }

    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.isolation_state == IsolationState::Isolated
    }

    /// Whether a test can detect this individual's infection.
    #[must_use]
    pub fn is_detectable(&self, detect_incubating: bool) -> bool {
        match self.health_state {
            HealthState::Infectious => true,
            HealthState::Incubating => detect_incubating,
            HealthState::Susceptible | HealthState::Recovered => false,
        }
    }

    /// Moves a Susceptible individual to Incubating and draws the incubation
    /// period. Returns whether the individual was infected.
    pub fn expose<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        durations: &StageDurations,
        timestep: Timestep,
    ) -> bool {
        if self.health_state != HealthState::Susceptible {
            return false;
        }
        self.health_state = HealthState::Incubating;
        self.infection_timer = durations.sample_incubation(rng);
        self.infected_at = Some(timestep);
        true
    }

    /// Places a Susceptible individual directly in `state` at the start of an
    /// episode. Returns whether the individual was seeded.
    pub fn seed<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        durations: &StageDurations,
        state: SeedState,
    ) -> bool {
        if self.health_state != HealthState::Susceptible {
            return false;
        }
        match state {
            SeedState::Incubating => {
                self.health_state = HealthState::Incubating;
                self.infection_timer = durations.sample_incubation(rng);
            }
            SeedState::Infectious => {
                self.health_state = HealthState::Infectious;
                self.infection_timer = durations.sample_infectious(rng);
            }
        }
        self.infected_at = Some(0);
        true
    }

    /// Advances the disease clock by one timestep. When the current stage runs
    /// out, moves to the next stage and returns it.
    pub fn advance_timestep<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        durations: &StageDurations,
    ) -> Option<HealthState> {
        if !matches!(
            self.health_state,
            HealthState::Incubating | HealthState::Infectious
        ) {
            return None;
        }
        debug_assert!(
            self.infection_timer > 0,
            "person {} is {:?} with an expired timer",
            self.id,
            self.health_state
        );
        self.infection_timer = self.infection_timer.saturating_sub(1);
        if self.infection_timer > 0 {
            return None;
        }

        let previous = self.health_state;
        match self.health_state {
            HealthState::Incubating => {
                self.health_state = HealthState::Infectious;
                self.infection_timer = durations.sample_infectious(rng);
            }
            HealthState::Infectious => {
                self.health_state = HealthState::Recovered;
            }
            HealthState::Susceptible | HealthState::Recovered => unreachable!(),
        }
        debug_assert!(previous < self.health_state);
        Some(self.health_state)
    }

    /// Draws the result of an individual test. Testing never changes the
    /// health state; a Recovered individual is tested as uninfected.
    pub fn test<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        sensitivity: f64,
        false_positive_rate: f64,
        detect_incubating: bool,
    ) -> TestResult {
        let positive = if self.is_detectable(detect_incubating) {
            rng.random_bool(sensitivity)
        } else {
            rng.random_bool(false_positive_rate)
        };
        if positive {
            TestResult::Positive
        } else {
            TestResult::Negative
        }
    }

    pub(crate) fn set_test_state(&mut self, state: TestState) {
        self.test_state = state;
    }

    /// Returns whether the individual was not already isolated.
    pub fn isolate(&mut self) -> bool {
        let changed = self.isolation_state == IsolationState::Free;
        self.isolation_state = IsolationState::Isolated;
        changed
    }

    /// Returns whether the individual was isolated.
    pub fn release(&mut self) -> bool {
        let changed = self.isolation_state == IsolationState::Isolated;
        self.isolation_state = IsolationState::Free;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn durations() -> StageDurations {
        StageDurations::new(3.0, 5.0, 4.0).unwrap()
    }

    #[test]
    fn exposure_only_infects_the_susceptible() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut individual = Individual::new(PersonId::new(0));
        assert!(individual.expose(&mut rng, &durations(), 4));
        assert_eq!(individual.health_state(), HealthState::Incubating);
        assert_eq!(individual.infected_at(), Some(4));
        assert!(individual.infection_timer() >= 1);

        let before = individual;
        assert!(!individual.expose(&mut rng, &durations(), 5));
        assert_eq!(individual, before);
    }

    #[test]
    fn progression_runs_through_every_stage_in_order() {
        let mut rng = SmallRng::seed_from_u64(2);
        let durations = durations();
        let mut individual = Individual::new(PersonId::new(3));
        individual.expose(&mut rng, &durations, 0);

        let mut transitions = Vec::new();
        for _ in 0..1000 {
            if let Some(state) = individual.advance_timestep(&mut rng, &durations) {
                transitions.push(state);
            }
        }
        assert_eq!(
            transitions,
            vec![HealthState::Infectious, HealthState::Recovered]
        );
        assert_eq!(individual.advance_timestep(&mut rng, &durations), None);
    }

    #[test]
    fn susceptible_does_not_progress() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut individual = Individual::new(PersonId::new(0));
        assert_eq!(individual.advance_timestep(&mut rng, &durations()), None);
        assert_eq!(individual.health_state(), HealthState::Susceptible);
    }

    #[test]
    fn seeding_chooses_the_starting_stage() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut infectious = Individual::new(PersonId::new(0));
        assert!(infectious.seed(&mut rng, &durations(), SeedState::Infectious));
        assert_eq!(infectious.health_state(), HealthState::Infectious);

        let mut incubating = Individual::new(PersonId::new(1));
        assert!(incubating.seed(&mut rng, &durations(), SeedState::Incubating));
        assert_eq!(incubating.health_state(), HealthState::Incubating);
        assert!(!incubating.seed(&mut rng, &durations(), SeedState::Infectious));
    }

    #[test]
    fn isolation_is_idempotent() {
        let mut individual = Individual::new(PersonId::new(0));
        assert!(!individual.release());
        assert_eq!(individual.isolation_state(), IsolationState::Free);
        assert!(individual.isolate());
        assert!(!individual.isolate());
        assert!(individual.is_isolated());
        assert!(individual.release());
        assert!(!individual.is_isolated());
    }

    #[test]
    fn perfect_tests_follow_the_health_state() {
        let mut rng = SmallRng::seed_from_u64(9);
        let durations = durations();
        let susceptible = Individual::new(PersonId::new(0));
        let mut incubating = Individual::new(PersonId::new(1));
        incubating.expose(&mut rng, &durations, 0);
        let mut infectious = Individual::new(PersonId::new(2));
        infectious.seed(&mut rng, &durations, SeedState::Infectious);

        assert_eq!(
            susceptible.test(&mut rng, 1.0, 0.0, true),
            TestResult::Negative
        );
        assert_eq!(
            infectious.test(&mut rng, 1.0, 0.0, true),
            TestResult::Positive
        );
        assert_eq!(
            incubating.test(&mut rng, 1.0, 0.0, true),
            TestResult::Positive
        );
        assert_eq!(
            incubating.test(&mut rng, 1.0, 0.0, false),
            TestResult::Negative
        );
        assert_eq!(
            susceptible.test(&mut rng, 1.0, 1.0, true),
            TestResult::Positive
        );
    }

    #[test]
    fn recovered_tests_as_uninfected() {
        let mut rng = SmallRng::seed_from_u64(4);
        let durations = durations();
        let mut individual = Individual::new(PersonId::new(0));
        individual.seed(&mut rng, &durations, SeedState::Infectious);
        while individual.health_state() != HealthState::Recovered {
            individual.advance_timestep(&mut rng, &durations);
        }
        assert_eq!(
            individual.test(&mut rng, 1.0, 0.0, true),
            TestResult::Negative
        );
        assert_eq!(individual.health_state(), HealthState::Recovered);
    }
}
