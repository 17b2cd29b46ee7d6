use rand::Rng;
use rand_distr::{Distribution, Gamma};

use crate::error::SimulationError;

/// Distributions of the time spent Incubating and Infectious.
///
/// Both stages are Gamma distributed with a shared shape. A drawn duration is
/// rounded to whole timesteps and is never shorter than one timestep.
#[derive(Clone, Debug)]
pub struct StageDurations {
    incubation: Gamma<f64>,
    infectious: Gamma<f64>,
}

impl StageDurations {
    /// # Errors
    ///
    /// Returns a `ConfigurationError` unless every argument is positive and finite.
    pub fn new(
        incubation_period: f64,
        infectious_period: f64,
        shape: f64,
    ) -> Result<StageDurations, SimulationError> {
        Ok(StageDurations {
            incubation: gamma_with_mean("incubation_period", incubation_period, shape)?,
            infectious: gamma_with_mean("infectious_period", infectious_period, shape)?,
        })
    }

    pub fn sample_incubation<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        whole_timesteps(self.incubation.sample(rng))
    }

    pub fn sample_infectious<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        whole_timesteps(self.infectious.sample(rng))
    }
}

fn gamma_with_mean(name: &str, mean: f64, shape: f64) -> Result<Gamma<f64>, SimulationError> {
    if !(mean.is_finite() && mean > 0.0 && shape.is_finite() && shape > 0.0) {
        return Err(SimulationError::ConfigurationError(format!(
            "{name} must be positive with a positive duration_shape, got mean {mean} and shape {shape}"
        )));
    }
    Gamma::new(shape, mean / shape).map_err(|error| {
        SimulationError::ConfigurationError(format!("invalid {name} distribution: {error}"))
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_timesteps(duration: f64) -> u32 {
    (duration.round() as u32).max(1)
}
