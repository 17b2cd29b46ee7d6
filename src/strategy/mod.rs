//! Testing and isolation strategies.
//!
//! A [`Strategy`] decides, once per timestep, who to test and who to isolate
//! or release given the results. Strategies only read the episode state; the
//! intervention step in [`ContextStrategyExt::run_intervention`] runs their
//! tests through the lab and applies their isolation updates.
//!
//! | code | strategy |
//! |------|----------|
//! | A | test a random sample and isolate positives |
//! | B | as A, and isolate every contact of a positive |
//! | C | as A, and isolate each contact of a positive with `trace_probability` |
//! | D | do nothing |
//! | E | isolate everyone |
//! | F | lockdown, then pooled tests isolating positive pools with conservative tracing |
//! | G | lockdown, then pooled tests isolating positive pools without tracing |
//! | H | lockdown, then pooled tests with individual retests and noisy tracing |
mod baseline;
mod direct;
mod phased;
mod pooled;
mod tracing;

use log::{debug, warn};

pub use baseline::{Lockdown, Unmitigated};
pub use direct::TestAndIsolate;
pub use phased::PhaseSchedule;
pub use pooled::{PoolFollowUp, PooledTesting};
pub use tracing::ContactTracing;

use crate::context::Context;
use crate::parameters::{ContextParametersExt, Parameters, StrategyCode};
use crate::population::{ContextPopulationExt, PersonId};
use crate::testing::{ContextTestingExt, TestPlan, TestResults};
use crate::define_data_plugin;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IsolationUpdate {
    Isolate(PersonId),
    Release(PersonId),
}

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Called at the start of every intervention step, before tests are selected.
    fn start_step(&mut self, _context: &Context) -> Vec<IsolationUpdate> {
        Vec::new()
    }

    /// Chooses the tests to run this timestep. Each unit of the returned plan
    /// consumes one unit of `capacity`.
    fn select_tests(&mut self, context: &Context, capacity: usize) -> TestPlan;

    fn apply_results(&mut self, context: &Context, results: &TestResults)
        -> Vec<IsolationUpdate>;

    /// Called when the strategy is replaced by the next phase of a schedule.
    fn end_phase(&mut self, _context: &Context) -> Vec<IsolationUpdate> {
        Vec::new()
    }
}

/// Builds the strategy named by `parameters.strategy`.
#[must_use]
pub fn build_strategy(parameters: &Parameters) -> Box<dyn Strategy> {
    let pooled = |follow_up| -> Box<dyn Strategy> {
        Box::new(PhaseSchedule::new(
            Box::new(Lockdown::new()),
            parameters.lockdown_duration,
            Box::new(PooledTesting::new(parameters.pool_size, follow_up)),
        ))
    };
    match parameters.strategy {
        StrategyCode::A => Box::new(TestAndIsolate::new(ContactTracing::Off)),
        StrategyCode::B => Box::new(TestAndIsolate::new(ContactTracing::Full)),
        StrategyCode::C => Box::new(TestAndIsolate::new(ContactTracing::with_probability(
            parameters.trace_probability,
        ))),
        StrategyCode::D => Box::new(Unmitigated),
        StrategyCode::E => Box::new(Lockdown::new()),
        StrategyCode::F => pooled(PoolFollowUp::Isolate {
            trace_probability: parameters.conservative_trace_probability,
        }),
        StrategyCode::G => pooled(PoolFollowUp::Isolate {
            trace_probability: 0.0,
        }),
        StrategyCode::H => pooled(PoolFollowUp::IndividualRetest {
            trace_probability: parameters.trace_probability,
        }),
    }
}

/// What one intervention step did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InterventionSummary {
    pub tests_used: usize,
    pub positives: usize,
    pub isolated: usize,
    pub released: usize,
}

define_data_plugin!(StrategyPlugin, Option<Box<dyn Strategy>>, None);

pub trait ContextStrategyExt {
    fn set_strategy(&mut self, strategy: Box<dyn Strategy>);

    /// Name of the installed strategy, if any.
    fn get_strategy_name(&self) -> Option<&'static str>;

    /// Applies `updates` in order. Updates for unknown ids are logged and skipped.
    fn apply_isolation_updates(&mut self, updates: &[IsolationUpdate]) -> InterventionSummary;

    /// Runs one testing cycle of the installed strategy.
    fn run_intervention(&mut self) -> InterventionSummary;
}

impl ContextStrategyExt for Context {
    fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        debug!("using strategy: {}", strategy.name());
        *self.get_data_mut(StrategyPlugin) = Some(strategy);
    }

    fn get_strategy_name(&self) -> Option<&'static str> {
        self.get_data(StrategyPlugin)
            .and_then(Option::as_ref)
            .map(|strategy| strategy.name())
    }

    fn apply_isolation_updates(&mut self, updates: &[IsolationUpdate]) -> InterventionSummary {
        let mut summary = InterventionSummary::default();
        for update in updates {
            let result = match *update {
                IsolationUpdate::Isolate(id) => self.isolate_person(id).map(|changed| {
                    summary.isolated += usize::from(changed);
                }),
                IsolationUpdate::Release(id) => self.release_person(id).map(|changed| {
                    summary.released += usize::from(changed);
                }),
            };
            if let Err(error) = result {
                warn!("ignoring {update:?}: {error}");
            }
        }
        summary
    }

    fn run_intervention(&mut self) -> InterventionSummary {
        self.reset_test_states();
        let Some(mut strategy) = self.get_data_mut(StrategyPlugin).take() else {
            return InterventionSummary::default();
        };

        let updates = strategy.start_step(self);
        let mut summary = self.apply_isolation_updates(&updates);

        let capacity = self.get_params().test_capacity;
        let mut plan = strategy.select_tests(self, capacity);
        if plan.len() > capacity {
            warn!(
                "{} selected {} tests with a capacity of {capacity}; dropping the excess",
                strategy.name(),
                plan.len()
            );
            plan.truncate(capacity);
        }
        let results = self.run_tests(&plan);

        let updates = strategy.apply_results(self, &results);
        let applied = self.apply_isolation_updates(&updates);
        summary.tests_used = plan.len();
        summary.positives = results.positives().len();
        summary.isolated += applied.isolated;
        summary.released += applied.released;

        *self.get_data_mut(StrategyPlugin) = Some(strategy);
        debug!(
            "timestep {}: {} tests, {} positive, {} isolated, {} released",
            self.get_current_step(),
            summary.tests_used,
            summary.positives,
            summary.isolated,
            summary.released
        );
        summary
    }
}
