use super::{IsolationUpdate, Strategy};
use crate::context::Context;
use crate::population::{ContextPopulationExt, PersonId};
use crate::testing::{TestPlan, TestResults};

/// No tests and no isolation.
pub struct Unmitigated;

impl Strategy for Unmitigated {
    fn name(&self) -> &'static str {
        "unmitigated spread"
    }

    fn select_tests(&mut self, _context: &Context, _capacity: usize) -> TestPlan {
        TestPlan::new()
    }

    fn apply_results(&mut self, _context: &Context, _results: &TestResults) -> Vec<IsolationUpdate> {
        Vec::new()
    }
}

/// Isolates the whole population every timestep without testing anyone.
/// When the phase ends, everyone the lockdown isolated is released.
#[derive(Default)]
pub struct Lockdown {
    isolated: Vec<PersonId>,
}

impl Lockdown {
    #[must_use]
    pub fn new() -> Lockdown {
        Lockdown::default()
    }
}

impl Strategy for Lockdown {
    fn name(&self) -> &'static str {
        "complete lockdown"
    }

    fn select_tests(&mut self, _context: &Context, _capacity: usize) -> TestPlan {
        TestPlan::new()
    }

    fn apply_results(&mut self, context: &Context, _results: &TestResults) -> Vec<IsolationUpdate> {
        let free = context.get_free_individuals();
        self.isolated.extend_from_slice(&free);
        free.into_iter().map(IsolationUpdate::Isolate).collect()
    }

    fn end_phase(&mut self, _context: &Context) -> Vec<IsolationUpdate> {
        std::mem::take(&mut self.isolated)
            .into_iter()
            .map(IsolationUpdate::Release)
            .collect()
    }
}
