use log::trace;

use super::{ContactTracing, IsolationUpdate, Strategy};
use crate::context::Context;
use crate::define_rng;
use crate::hashing::HashSet;
use crate::population::{ContextPopulationExt, PersonId, TestResult};
use crate::random::{shuffled, ContextRandomExt};
use crate::testing::{TestPlan, TestResults, TestUnit};

define_rng!(PoolingRng);

/// What happens to the members of a pool that tests positive.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PoolFollowUp {
    /// Isolate every member and trace each member's contacts.
    Isolate { trace_probability: f64 },
    /// Test every member individually at the next timestep, then isolate and
    /// trace those who are positive.
    IndividualRetest { trace_probability: f64 },
}

impl PoolFollowUp {
    fn tracing(self) -> ContactTracing {
        match self {
            PoolFollowUp::Isolate { trace_probability }
            | PoolFollowUp::IndividualRetest { trace_probability } => {
                ContactTracing::with_probability(trace_probability)
            }
        }
    }
}

/// Splits the free population into random pools and tests as many pools as
/// the capacity allows. The last pool may be smaller than `pool_size`.
pub struct PooledTesting {
    pool_size: usize,
    follow_up: PoolFollowUp,
    retest_queue: Vec<PersonId>,
    in_flight: TestPlan,
}

impl PooledTesting {
    #[must_use]
    pub fn new(pool_size: usize, follow_up: PoolFollowUp) -> PooledTesting {
        PooledTesting {
            pool_size: pool_size.max(1),
            follow_up,
            retest_queue: Vec::new(),
            in_flight: TestPlan::new(),
        }
    }

    /// Individuals waiting for an individual follow-up test.
    #[must_use]
    pub fn queued_retests(&self) -> &[PersonId] {
        &self.retest_queue
    }

    fn queue_retests(&mut self, members: impl IntoIterator<Item = PersonId>) {
        let mut queued: HashSet<PersonId> = self.retest_queue.iter().copied().collect();
        for id in members {
            if queued.insert(id) {
                self.retest_queue.push(id);
            }
        }
    }
}

impl Strategy for PooledTesting {
    fn name(&self) -> &'static str {
        match self.follow_up {
            PoolFollowUp::Isolate { .. } => "pooled testing with isolation",
            PoolFollowUp::IndividualRetest { .. } => "pooled testing with individual retests",
        }
    }

    fn select_tests(&mut self, context: &Context, capacity: usize) -> TestPlan {
        let mut plan = TestPlan::new();

        // Queued retests go first; whatever does not fit waits for the next timestep.
        let mut queued = std::mem::take(&mut self.retest_queue);
        queued.retain(|id| {
            context
                .get_individual(*id)
                .is_ok_and(|individual| !individual.is_isolated())
        });
        if queued.len() > capacity {
            self.retest_queue = queued.split_off(capacity);
        }
        let retested: HashSet<PersonId> = queued.iter().copied().collect();
        for id in queued {
            plan.push(TestUnit::Individual(id));
        }

        let remaining = capacity - plan.len();
        if remaining > 0 {
            let candidates: Vec<PersonId> = context
                .get_free_individuals()
                .into_iter()
                .filter(|id| !retested.contains(id))
                .collect();
            let candidates = context.sample(PoolingRng, |rng| shuffled(rng, candidates));
            for pool in candidates.chunks(self.pool_size).take(remaining) {
                plan.push(TestUnit::Pool(pool.to_vec()));
            }
        }

        self.in_flight = plan.clone();
        plan
    }

    fn apply_results(&mut self, context: &Context, results: &TestResults) -> Vec<IsolationUpdate> {
        let plan = std::mem::take(&mut self.in_flight);
        let is_positive = |id: &PersonId| results.get(*id) == Some(TestResult::Positive);

        let mut confirmed = Vec::new();
        let mut retests = Vec::new();
        for unit in plan.units() {
            match unit {
                TestUnit::Individual(id) => {
                    if is_positive(id) {
                        confirmed.push(*id);
                    }
                }
                TestUnit::Pool(members) => {
                    if !members.iter().any(is_positive) {
                        continue;
                    }
                    match self.follow_up {
                        PoolFollowUp::Isolate { .. } => confirmed.extend_from_slice(members),
                        PoolFollowUp::IndividualRetest { .. } => {
                            trace!("queueing {} members of a positive pool", members.len());
                            retests.extend_from_slice(members);
                        }
                    }
                }
            }
        }

        self.queue_retests(retests);

        let traced = self.follow_up.tracing().trace(context, &confirmed);
        confirmed
            .into_iter()
            .chain(traced)
            .map(IsolationUpdate::Isolate)
            .collect()
    }

    fn end_phase(&mut self, _context: &Context) -> Vec<IsolationUpdate> {
        self.retest_queue.clear();
        self.in_flight = TestPlan::new();
        Vec::new()
    }
}
