use log::info;

use super::{IsolationUpdate, Strategy};
use crate::context::Context;
use crate::plan::Timestep;
use crate::testing::{TestPlan, TestResults};

/// Runs one strategy for a fixed number of timesteps, then hands over to a
/// second one for the rest of the episode.
///
/// At the handover the first strategy's `end_phase` updates are applied and
/// the strategy is dropped together with anything it still had in flight.
pub struct PhaseSchedule {
    current: Box<dyn Strategy>,
    next: Option<Box<dyn Strategy>>,
    switch_at: Timestep,
}

impl PhaseSchedule {
    /// `first` runs during timesteps `1..=duration`; `then` runs from timestep `duration + 1`.
    #[must_use]
    pub fn new(first: Box<dyn Strategy>, duration: usize, then: Box<dyn Strategy>) -> PhaseSchedule {
        PhaseSchedule {
            current: first,
            next: Some(then),
            switch_at: duration + 1,
        }
    }
}

impl Strategy for PhaseSchedule {
    fn name(&self) -> &'static str {
        self.current.name()
    }

    fn start_step(&mut self, context: &Context) -> Vec<IsolationUpdate> {
        let timestep = context.get_current_step();
        if timestep < self.switch_at {
            return self.current.start_step(context);
        }
        let Some(next) = self.next.take() else {
            return self.current.start_step(context);
        };

        let mut updates = self.current.end_phase(context);
        info!(
            "timestep {timestep}: switching from {} to {}",
            self.current.name(),
            next.name()
        );
        self.current = next;
        updates.extend(self.current.start_step(context));
        updates
    }

    fn select_tests(&mut self, context: &Context, capacity: usize) -> TestPlan {
        self.current.select_tests(context, capacity)
    }

    fn apply_results(&mut self, context: &Context, results: &TestResults) -> Vec<IsolationUpdate> {
        self.current.apply_results(context, results)
    }

    fn end_phase(&mut self, context: &Context) -> Vec<IsolationUpdate> {
        self.current.end_phase(context)
    }
}
