//! Random streams owned by an episode's `Context`.
//!
//! Every module that draws random numbers names its own stream with
//! [`define_rng!`]. A stream is created on first use and seeded from the
//! episode seed offset by a hash of the stream name. Extra draws in one module
//! never shift the draws of another, and an episode replayed with the same
//! seed repeats every draw.
mod context_ext;
mod macros;
mod sampling_algorithms;

use std::any::{Any, TypeId};
use std::cell::RefCell;

pub use context_ext::ContextRandomExt;
pub use macros::define_rng;
pub use sampling_algorithms::{sample_multiple_from_known_length, shuffled};

use crate::define_data_plugin;
use crate::hashing::HashMap;
use crate::rand::SeedableRng;

/// Key type of a named random stream. Implemented by [`define_rng!`].
pub trait RandomStream: Copy + Clone {
    type Generator: SeedableRng;
    fn stream_name() -> &'static str;
}

#[derive(Default)]
struct RandomStreams {
    /// Unset until `init_random` is called.
    episode_seed: Option<u64>,
    // Streams are created on demand while the context is only borrowed immutably.
    generators: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

define_data_plugin!(RandomPlugin, RandomStreams, RandomStreams::default());
