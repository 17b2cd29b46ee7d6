//! Outbreak simulation on social-contact graphs.
//!
//! `contagion` simulates the spread of an infectious disease through a
//! population represented as an undirected contact graph and measures how
//! testing, contact tracing and isolation strategies change the course of an
//! outbreak.
//!
//! Each episode is owned by a [`Context`](context::Context) that holds all of
//! the episode's state in data plugins and runs the model as a sequence of
//! plans. Every timestep runs the same phases in order:
//! * transmission along active edges of the contact graph;
//! * disease progression of every infected individual;
//! * the intervention strategy, which selects tests, receives their results
//!   and isolates or releases individuals;
//! * observation of the resulting counts and the stopping rules.
//!
//! Independent episodes, each with its own seed, are run concurrently by
//! [`run_simulations`](simulation::run_simulations) and summarized into
//! outcome distributions.
pub mod context;
pub mod error;
pub mod hashing;
pub mod log;
pub mod network;
pub mod parameters;
pub mod plan;
pub mod population;
pub mod progression;
pub mod random;
pub mod report;
pub mod runner;
pub mod simulation;
pub mod strategy;
pub mod testing;
pub mod transmission;

pub use context::{Context, ExecutionPhase};
pub use error::SimulationError;
pub use parameters::{ContextParametersExt, Parameters, SeedState, StrategyCode, Topology};
pub use population::{HealthState, IsolationState, PersonId, TestState};
pub use simulation::{run_episode, run_simulations, EpisodeOutcome, SimulationSummary};

// Re-exported for use in macros.
pub use paste;
pub use rand;
