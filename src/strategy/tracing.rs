use crate::context::Context;
use crate::hashing::HashSet;
use crate::network::ContextNetworkExt;
use crate::population::{ContextPopulationExt, PersonId};
use crate::random::ContextRandomExt;
use crate::define_rng;

define_rng!(TracingRng);

/// How contacts of a confirmed case are found.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ContactTracing {
    Off,
    /// Every contact is found.
    Full,
    /// Each contact is found independently with `trace_probability`.
    Noisy { trace_probability: f64 },
}

impl ContactTracing {
    #[must_use]
    pub fn with_probability(trace_probability: f64) -> ContactTracing {
        if trace_probability <= 0.0 {
            ContactTracing::Off
        } else if trace_probability >= 1.0 {
            ContactTracing::Full
        } else {
            ContactTracing::Noisy { trace_probability }
        }
    }

    /// Returns the free contacts of `cases` that were traced, each once, in
    /// the order they were found. The cases themselves are never returned.
    #[must_use]
    pub fn trace(&self, context: &Context, cases: &[PersonId]) -> Vec<PersonId> {
        if *self == ContactTracing::Off {
            return Vec::new();
        }
        let mut seen: HashSet<PersonId> = cases.iter().copied().collect();
        let mut traced = Vec::new();
        for case in cases {
            for &contact in context.get_neighbors(*case) {
                let free = context
                    .get_individual(contact)
                    .is_ok_and(|individual| !individual.is_isolated());
                if !free || seen.contains(&contact) {
                    continue;
                }
                let found = match self {
                    ContactTracing::Off => false,
                    ContactTracing::Full => true,
                    ContactTracing::Noisy { trace_probability } => {
                        context.sample_bool(TracingRng, *trace_probability)
                    }
                };
                if found {
                    seen.insert(contact);
                    traced.push(contact);
                }
            }
        }
        traced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Topology;
    use crate::population::StageDurations;

    fn star_context() -> Context {
        let mut context = Context::new();
        context.init_random(3);
        context
            .add_population(5, StageDurations::new(3.0, 5.0, 4.0).unwrap())
            .unwrap();
        context
            .generate_contact_graph(
                5,
                &Topology::Edges {
                    edges: vec![(0, 1), (0, 2), (0, 3), (0, 4), (1, 2)],
                },
            )
            .unwrap();
        context
    }

    #[test]
    fn probabilities_select_the_mode() {
        assert_eq!(ContactTracing::with_probability(0.0), ContactTracing::Off);
        assert_eq!(ContactTracing::with_probability(1.0), ContactTracing::Full);
        assert_eq!(
            ContactTracing::with_probability(0.25),
            ContactTracing::Noisy {
                trace_probability: 0.25
            }
        );
    }

    #[test]
    fn full_tracing_finds_every_free_contact_once() {
        let mut context = star_context();
        context.isolate_person(PersonId::new(4)).unwrap();
        let traced = ContactTracing::Full.trace(&context, &[PersonId::new(0), PersonId::new(1)]);
        assert_eq!(
            traced,
            vec![PersonId::new(2), PersonId::new(3)]
        );
    }

    #[test]
    fn tracing_off_finds_nobody() {
        let context = star_context();
        assert!(ContactTracing::Off.trace(&context, &[PersonId::new(0)]).is_empty());
    }

    #[test]
    fn noisy_tracing_finds_a_fraction() {
        let mut context = Context::new();
        context.init_random(17);
        let size = 2001;
        context
            .add_population(size, StageDurations::new(3.0, 5.0, 4.0).unwrap())
            .unwrap();
        context
            .generate_contact_graph(
                size,
                &Topology::Edges {
                    edges: (1..size).map(|leaf| (0, leaf)).collect(),
                },
            )
            .unwrap();
        let traced = ContactTracing::with_probability(0.25).trace(&context, &[PersonId::new(0)]);
        assert!((400..600).contains(&traced.len()), "traced {}", traced.len());
    }
}
