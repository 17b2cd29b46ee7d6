//! The testing laboratory.
//!
//! Strategies decide who to test by returning a [`TestPlan`]. The lab runs the
//! plan against the true health of the individuals, drawing from the
//! `TestingRng` stream, and records each subject's `TestState`.
use log::{debug, warn};

use crate::context::Context;
use crate::hashing::HashMap;
use crate::parameters::ContextParametersExt;
use crate::population::{ContextPopulationExt, PersonId, TestResult, TestState};
use crate::random::ContextRandomExt;
use crate::define_rng;

define_rng!(TestingRng);

/// One use of the test capacity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestUnit {
    Individual(PersonId),
    /// Samples of several individuals tested together. Every member gets the pool's result.
    Pool(Vec<PersonId>),
}

impl TestUnit {
    #[must_use]
    pub fn members(&self) -> &[PersonId] {
        match self {
            TestUnit::Individual(id) => std::slice::from_ref(id),
            TestUnit::Pool(members) => members,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestPlan {
    units: Vec<TestUnit>,
}

impl TestPlan {
    #[must_use]
    pub fn new() -> TestPlan {
        TestPlan::default()
    }

    pub fn push(&mut self, unit: TestUnit) {
        self.units.push(unit);
    }

    /// Test capacity the plan consumes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[must_use]
    pub fn units(&self) -> &[TestUnit] {
        &self.units
    }

    /// Everyone tested by the plan, in plan order.
    #[must_use]
    pub fn subjects(&self) -> Vec<PersonId> {
        self.units
            .iter()
            .flat_map(|unit| unit.members().iter().copied())
            .collect()
    }

    pub(crate) fn truncate(&mut self, capacity: usize) {
        self.units.truncate(capacity);
    }
}

impl FromIterator<TestUnit> for TestPlan {
    fn from_iter<I: IntoIterator<Item = TestUnit>>(iter: I) -> Self {
        TestPlan {
            units: iter.into_iter().collect(),
        }
    }
}

/// Results of a `TestPlan`, kept in plan order.
#[derive(Clone, Debug, Default)]
pub struct TestResults {
    results: Vec<(PersonId, TestResult)>,
    index: HashMap<PersonId, TestResult>,
}

impl TestResults {
    fn record(&mut self, id: PersonId, result: TestResult) {
        self.results.push((id, result));
        self.index.insert(id, result);
    }

    #[must_use]
    pub fn get(&self, id: PersonId) -> Option<TestResult> {
        self.index.get(&id).copied()
    }

    /// Everyone who tested positive, in plan order.
    #[must_use]
    pub fn positives(&self) -> Vec<PersonId> {
        self.results
            .iter()
            .filter(|(_, result)| *result == TestResult::Positive)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PersonId, TestResult)> + '_ {
        self.results.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Probability that a pool of `pool_size` samples containing an infected
/// sample tests positive. Each additional sample dilutes the pool and costs a
/// fraction `dilution_penalty` of the remaining sensitivity.
#[must_use]
pub fn pool_sensitivity(test_positive: f64, pool_size: usize, dilution_penalty: f64) -> f64 {
    let extra_samples = i32::try_from(pool_size.saturating_sub(1)).unwrap_or(i32::MAX);
    (test_positive * (1.0 - dilution_penalty).powi(extra_samples)).clamp(0.0, 1.0)
}

pub trait ContextTestingExt {
    /// Runs every unit of `plan` and records the outcome in each subject's
    /// `TestState`. Ids outside the population are skipped.
    fn run_tests(&mut self, plan: &TestPlan) -> TestResults;
}

impl ContextTestingExt for Context {
    fn run_tests(&mut self, plan: &TestPlan) -> TestResults {
        let parameters = self.get_params();
        let test_positive = parameters.test_positive;
        let false_positive_rate = parameters.false_positive_rate;
        let detect_incubating = parameters.detect_incubating;
        let dilution_penalty = parameters.dilution_penalty;

        let mut results = TestResults::default();
        for unit in plan.units() {
            let members: Vec<PersonId> = unit
                .members()
                .iter()
                .copied()
                .filter(|id| match self.set_test_state(*id, TestState::Pending) {
                    Ok(()) => true,
                    Err(error) => {
                        warn!("skipping test of {id:?}: {error}");
                        false
                    }
                })
                .collect();
            if members.is_empty() {
                continue;
            }

            let result = match unit {
                TestUnit::Individual(id) => {
                    let Ok(individual) = self.get_individual(*id).copied() else {
                        continue;
                    };
                    self.sample(TestingRng, |rng| {
                        individual.test(rng, test_positive, false_positive_rate, detect_incubating)
                    })
                }
                TestUnit::Pool(_) => {
                    let infected = members.iter().any(|id| {
                        self.get_individual(*id)
                            .is_ok_and(|individual| individual.is_detectable(detect_incubating))
                    });
                    let p = if infected {
                        pool_sensitivity(test_positive, members.len(), dilution_penalty)
                    } else {
                        false_positive_rate
                    };
                    if self.sample_bool(TestingRng, p) {
                        TestResult::Positive
                    } else {
                        TestResult::Negative
                    }
                }
            };

            for id in members {
                match self.set_test_state(id, result.into()) {
                    Ok(()) => results.record(id, result),
                    Err(error) => warn!("dropping result of {id:?}: {error}"),
                }
            }
        }
        debug!(
            "ran {} tests on {} individuals, {} positive",
            plan.len(),
            results.len(),
            results.positives().len()
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{Parameters, SeedState};
    use crate::population::StageDurations;

    fn setup(parameters: Parameters) -> Context {
        let mut context = Context::new();
        context.init_random(5);
        let population = parameters.population;
        context.set_parameters(parameters).unwrap();
        context
            .add_population(population, StageDurations::new(3.0, 5.0, 4.0).unwrap())
            .unwrap();
        context
    }

    fn perfect_test(population: usize) -> Parameters {
        Parameters {
            population,
            test_positive: 1.0,
            false_positive_rate: 0.0,
            dilution_penalty: 0.0,
            ..Parameters::default()
        }
    }

    #[test]
    fn plan_subjects_flatten_pools() {
        let plan: TestPlan = [
            TestUnit::Individual(PersonId::new(4)),
            TestUnit::Pool(vec![PersonId::new(1), PersonId::new(2)]),
        ]
        .into_iter()
        .collect();
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan.subjects(),
            vec![PersonId::new(4), PersonId::new(1), PersonId::new(2)]
        );
    }

    #[test]
    fn pool_sensitivity_decreases_with_pool_size() {
        let mut previous = pool_sensitivity(0.7, 1, 0.05);
        assert!((previous - 0.7).abs() < 1e-12);
        for size in 2..50 {
            let current = pool_sensitivity(0.7, size, 0.05);
            assert!(current <= previous);
            previous = current;
        }
        assert!((pool_sensitivity(0.7, 10, 0.0) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn perfect_individual_tests() {
        let mut context = setup(perfect_test(4));
        context.expose_person(PersonId::new(1)).unwrap();
        let plan: TestPlan = (0..4)
            .map(|i| TestUnit::Individual(PersonId::new(i)))
            .collect();
        let results = context.run_tests(&plan);
        assert_eq!(results.positives(), vec![PersonId::new(1)]);
        assert_eq!(results.get(PersonId::new(0)), Some(TestResult::Negative));
        assert_eq!(
            context.get_individual(PersonId::new(1)).unwrap().test_state(),
            TestState::Positive
        );
        assert_eq!(
            context.get_individual(PersonId::new(3)).unwrap().test_state(),
            TestState::Negative
        );
    }

    #[test]
    fn pools_share_a_result() {
        let mut context = setup(perfect_test(6));
        context.expose_person(PersonId::new(4)).unwrap();
        let plan: TestPlan = [
            TestUnit::Pool(vec![PersonId::new(0), PersonId::new(1), PersonId::new(2)]),
            TestUnit::Pool(vec![PersonId::new(3), PersonId::new(4), PersonId::new(5)]),
        ]
        .into_iter()
        .collect();
        let results = context.run_tests(&plan);
        assert_eq!(
            results.positives(),
            vec![PersonId::new(3), PersonId::new(4), PersonId::new(5)]
        );
        assert_eq!(results.len(), 6);
    }

    #[test]
    fn incubating_detection_can_be_disabled() {
        let mut context = setup(Parameters {
            detect_incubating: false,
            ..perfect_test(2)
        });
        context.expose_person(PersonId::new(0)).unwrap();
        let plan: TestPlan = [TestUnit::Individual(PersonId::new(0))].into_iter().collect();
        assert!(context.run_tests(&plan).positives().is_empty());
    }

    #[test]
    fn untestable_ids_are_skipped() {
        let mut context = setup(perfect_test(2));
        context.seed_infections(2, SeedState::Infectious);
        let plan: TestPlan = [
            TestUnit::Individual(PersonId::new(7)),
            TestUnit::Pool(vec![PersonId::new(1), PersonId::new(9)]),
        ]
        .into_iter()
        .collect();
        let results = context.run_tests(&plan);
        assert_eq!(results.positives(), vec![PersonId::new(1)]);
        assert_eq!(results.get(PersonId::new(7)), None);
        assert_eq!(results.get(PersonId::new(9)), None);
        assert_eq!(results.len(), 1);
        assert_eq!(
            context.get_individual(PersonId::new(1)).unwrap().test_state(),
            TestState::Positive
        );
    }
}
