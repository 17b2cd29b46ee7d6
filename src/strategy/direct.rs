use super::{ContactTracing, IsolationUpdate, Strategy};
use crate::context::Context;
use crate::define_rng;
use crate::population::ContextPopulationExt;
use crate::random::{sample_multiple_from_known_length, ContextRandomExt};
use crate::testing::{TestPlan, TestResults, TestUnit};

define_rng!(SelectionRng);

/// Tests a uniform random sample of the free population, isolates everyone
/// who tests positive and traces their contacts.
pub struct TestAndIsolate {
    tracing: ContactTracing,
}

impl TestAndIsolate {
    #[must_use]
    pub fn new(tracing: ContactTracing) -> TestAndIsolate {
        TestAndIsolate { tracing }
    }
}

impl Strategy for TestAndIsolate {
    fn name(&self) -> &'static str {
        match self.tracing {
            ContactTracing::Off => "direct test and isolate",
            ContactTracing::Full => "full contact trace",
            ContactTracing::Noisy { .. } => "noisy contact trace",
        }
    }

    fn select_tests(&mut self, context: &Context, capacity: usize) -> TestPlan {
        let eligible = context.get_free_individuals();
        context
            .sample(SelectionRng, |rng| {
                sample_multiple_from_known_length(rng, eligible, capacity)
            })
            .into_iter()
            .map(TestUnit::Individual)
            .collect()
    }

    fn apply_results(&mut self, context: &Context, results: &TestResults) -> Vec<IsolationUpdate> {
        let positives = results.positives();
        let traced = self.tracing.trace(context, &positives);
        positives
            .into_iter()
            .chain(traced)
            .map(IsolationUpdate::Isolate)
            .collect()
    }
}
