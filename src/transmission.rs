//! Spread of infection along the contact graph.
//!
//! Every active edge between an Infectious and a Susceptible individual
//! transmits independently with a per-timestep probability calibrated so that
//! an infectious individual with an average number of contacts causes about
//! `r_0` infections over the course of their infectious period.
use log::{debug, warn};

use crate::context::Context;
use crate::error::SimulationError;
use crate::network::ContextNetworkExt;
use crate::parameters::ContextParametersExt;
use crate::population::{ContextPopulationExt, HealthState, Individual, PersonId};
use crate::random::ContextRandomExt;
use crate::{define_data_plugin, define_rng};

define_rng!(TransmissionRng);

define_data_plugin!(TransmissionPlugin, Option<f64>, None);

/// The per-edge, per-timestep transmission probability
/// `r_0 / (average_degree * infectious_period)`. A graph without edges never
/// transmits.
///
/// # Errors
///
/// Returns a `ConfigurationError` if the calibrated probability exceeds 1.
pub fn transmission_probability(
    r_0: f64,
    average_degree: f64,
    infectious_period: f64,
) -> Result<f64, SimulationError> {
    if average_degree <= 0.0 {
        return Ok(0.0);
    }
    let p = r_0 / (average_degree * infectious_period);
    if !(0.0..=1.0).contains(&p) {
        return Err(SimulationError::ConfigurationError(format!(
            "r_0 = {r_0} with average degree {average_degree:.3} and infectious_period \
             {infectious_period} gives a transmission probability of {p:.3}, which is above 1"
        )));
    }
    Ok(p)
}

pub trait ContextTransmissionExt {
    /// Calibrates the transmission probability from the parameters and the
    /// contact graph. Must run after the graph is generated.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the calibrated probability exceeds 1.
    fn init_transmission(&mut self) -> Result<f64, SimulationError>;

    fn get_transmission_probability(&self) -> f64;

    /// Runs one round of transmission and returns who was newly infected.
    ///
    /// The infectious set is fixed before any draw, so someone infected in
    /// this round cannot pass the infection on until a later timestep.
    fn spread_infection(&mut self) -> Vec<PersonId>;
}

impl ContextTransmissionExt for Context {
    fn init_transmission(&mut self) -> Result<f64, SimulationError> {
        let parameters = self.get_params();
        let p = transmission_probability(
            parameters.r_0,
            self.get_contact_graph().average_degree(),
            parameters.infectious_period,
        )?;
        debug!("transmission probability per edge and timestep is {p:.5}");
        *self.get_data_mut(TransmissionPlugin) = Some(p);
        Ok(p)
    }

    fn get_transmission_probability(&self) -> f64 {
        self.get_data(TransmissionPlugin)
            .copied()
            .flatten()
            .unwrap_or(0.0)
    }

    fn spread_infection(&mut self) -> Vec<PersonId> {
        let p = self.get_transmission_probability();
        if p <= 0.0 {
            return Vec::new();
        }

        let spreaders: Vec<PersonId> = self
            .get_individuals()
            .iter()
            .filter(|individual| {
                individual.health_state() == HealthState::Infectious && !individual.is_isolated()
            })
            .map(Individual::id)
            .collect();

        let mut exposed = Vec::new();
        for spreader in spreaders {
            for &contact in self.get_neighbors(spreader) {
                let susceptible = self.get_individual(contact).is_ok_and(|individual| {
                    individual.health_state() == HealthState::Susceptible
                });
                if susceptible
                    && self.is_edge_active(spreader, contact)
                    && self.sample_bool(TransmissionRng, p)
                {
                    exposed.push(contact);
                }
            }
        }

        let mut infected = Vec::with_capacity(exposed.len());
        for id in exposed {
            match self.expose_person(id) {
                Ok(true) => infected.push(id),
                Ok(false) => {}
                Err(error) => warn!("ignoring exposure of {id:?}: {error}"),
            }
        }
        infected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{Parameters, Topology};
    use crate::population::StageDurations;
    use assert_approx_eq::assert_approx_eq;

    fn setup(edges: Vec<(usize, usize)>, population: usize, r_0: f64) -> Context {
        let mut context = Context::new();
        let parameters = Parameters {
            population,
            r_0,
            topology: Topology::Edges { edges },
            ..Parameters::default()
        };
        context.init_random(42);
        context
            .generate_contact_graph(population, &parameters.topology)
            .unwrap();
        context.set_parameters(parameters).unwrap();
        context
            .add_population(population, StageDurations::new(3.0, 5.0, 4.0).unwrap())
            .unwrap();
        context
    }

    fn make_infectious(context: &mut Context, id: PersonId) {
        context.expose_person(id).unwrap();
        while context.get_individual(id).unwrap().health_state() != HealthState::Infectious {
            context.advance_person(id).unwrap();
        }
    }

    #[test]
    fn calibration() {
        assert_approx_eq!(transmission_probability(5.7, 20.0, 5.0).unwrap(), 0.057);
        assert_approx_eq!(transmission_probability(5.7, 0.0, 5.0).unwrap(), 0.0);
        assert!(matches!(
            transmission_probability(50.0, 2.0, 5.0),
            Err(SimulationError::ConfigurationError(_))
        ));
    }

    #[test]
    fn init_rejects_probabilities_above_one() {
        let mut context = setup(vec![(0, 1)], 2, 20.0);
        assert!(context.init_transmission().is_err());
    }

    #[test]
    fn certain_transmission_reaches_every_free_neighbor() {
        // Average degree 1.5 and infectious period 5 make r_0 = 7.5 a probability of 1.
        let mut context = setup(vec![(0, 1), (0, 2), (0, 3)], 4, 7.5);
        assert_approx_eq!(context.init_transmission().unwrap(), 1.0);
        make_infectious(&mut context, PersonId::new(0));
        context.isolate_person(PersonId::new(3)).unwrap();

        let infected = context.spread_infection();
        assert_eq!(infected, vec![PersonId::new(1), PersonId::new(2)]);
        assert_eq!(
            context.get_individual(PersonId::new(3)).unwrap().health_state(),
            HealthState::Susceptible
        );
    }

    #[test]
    fn newly_infected_do_not_spread_in_the_same_round() {
        // A chain 0 - 1 - 2 - 3 with certain transmission only infects 1.
        let mut context = setup(vec![(0, 1), (1, 2), (2, 3)], 4, 7.5);
        assert_approx_eq!(context.init_transmission().unwrap(), 1.0);
        make_infectious(&mut context, PersonId::new(0));
        assert_eq!(context.spread_infection(), vec![PersonId::new(1)]);
        assert_eq!(
            context.get_individual(PersonId::new(2)).unwrap().health_state(),
            HealthState::Susceptible
        );
    }

    #[test]
    fn isolated_spreaders_do_not_transmit() {
        let mut context = setup(vec![(0, 1), (0, 2), (0, 3)], 4, 7.5);
        context.init_transmission().unwrap();
        make_infectious(&mut context, PersonId::new(0));
        context.isolate_person(PersonId::new(0)).unwrap();
        assert!(context.spread_infection().is_empty());
        assert_eq!(context.count_population().susceptible, 3);
    }

    #[test]
    fn empty_graph_never_transmits() {
        let mut context = setup(Vec::new(), 3, 5.7);
        assert_approx_eq!(context.init_transmission().unwrap(), 0.0);
        make_infectious(&mut context, PersonId::new(0));
        assert!(context.spread_infection().is_empty());
    }
}
