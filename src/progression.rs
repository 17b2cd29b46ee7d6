use log::{trace, warn};

use crate::context::Context;
use crate::population::{ContextPopulationExt, HealthState, Individual, PersonId};

pub trait ContextProgressionExt {
    /// Advances the disease clock of every infected individual by one timestep.
    ///
    /// Individuals infected during the current timestep start their clock at
    /// the next one. Returns the transitions that happened.
    fn progress_infections(&mut self) -> Vec<(PersonId, HealthState)>;
}

impl ContextProgressionExt for Context {
    fn progress_infections(&mut self) -> Vec<(PersonId, HealthState)> {
        let timestep = self.get_current_step();
        let infected: Vec<PersonId> = self
            .get_individuals()
            .iter()
            .filter(|individual| {
                matches!(
                    individual.health_state(),
                    HealthState::Incubating | HealthState::Infectious
                ) && (timestep == 0 || individual.infected_at() != Some(timestep))
            })
            .map(Individual::id)
            .collect();

        let mut transitions = Vec::new();
        for id in infected {
            match self.advance_person(id) {
                Ok(Some(state)) => {
                    trace!("{id:?} is now {state:?}");
                    transitions.push((id, state));
                }
                Ok(None) => {}
                Err(error) => warn!("skipping progression of {id:?}: {error}"),
            }
        }
        transitions
    }
}
