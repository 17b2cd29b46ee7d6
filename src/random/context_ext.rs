use std::any::TypeId;
use std::cell::RefMut;

use log::trace;

use crate::context::Context;
use crate::hashing::hash_str;
use crate::rand::distr::uniform::{SampleRange, SampleUniform};
use crate::rand::distr::Distribution;
use crate::rand::{Rng, SeedableRng};
use crate::random::{RandomPlugin, RandomStream};

/// Borrows the generator of stream `S`, creating it on first use.
///
/// # Panics
///
/// Panics if `init_random` was not called, or if the stream is borrowed by an
/// enclosing `sample` call.
fn stream<S: RandomStream + 'static>(context: &Context) -> RefMut<S::Generator> {
    let streams = context.get_data(RandomPlugin);
    let episode_seed = streams
        .and_then(|streams| streams.episode_seed)
        .expect("init_random must be called before sampling");
    let generators = streams
        .map(|streams| &streams.generators)
        .and_then(|generators| generators.try_borrow_mut().ok())
        .unwrap_or_else(|| panic!("stream {} is already borrowed", S::stream_name()));

    RefMut::map(generators, |generators| {
        generators
            .entry(TypeId::of::<S>())
            .or_insert_with(|| {
                let seed = episode_seed.wrapping_add(hash_str(S::stream_name()));
                trace!("creating stream {} with seed {seed}", S::stream_name());
                Box::new(S::Generator::seed_from_u64(seed))
            })
            .downcast_mut::<S::Generator>()
            .expect("stream keys are unique per generator type")
    })
}

/// Random draws on an episode's `Context`, one independent stream per [`RandomStream`].
pub trait ContextRandomExt {
    /// Sets the episode seed. Streams already created are dropped and
    /// re-seeded on their next use.
    fn init_random(&mut self, episode_seed: u64);

    /// Runs `sampler` with the generator of `stream`.
    fn sample<S: RandomStream + 'static, T>(
        &self,
        stream: S,
        sampler: impl FnOnce(&mut S::Generator) -> T,
    ) -> T;

    /// Draws one value from `distribution`.
    fn sample_distr<S: RandomStream + 'static, T>(
        &self,
        stream: S,
        distribution: impl Distribution<T>,
    ) -> T
    where
        S::Generator: Rng;

    /// Draws a value uniformly from `range`.
    fn sample_range<S: RandomStream + 'static, R, T>(&self, stream: S, range: R) -> T
    where
        S::Generator: Rng,
        R: SampleRange<T>,
        T: SampleUniform;

    /// Returns `true` with probability `p`, which must lie in `[0, 1]`.
    fn sample_bool<S: RandomStream + 'static>(&self, stream: S, p: f64) -> bool
    where
        S::Generator: Rng;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, episode_seed: u64) {
        trace!("episode seed {episode_seed}");
        let streams = self.get_data_mut(RandomPlugin);
        streams.episode_seed = Some(episode_seed);
        streams.generators.get_mut().clear();
    }

    fn sample<S: RandomStream + 'static, T>(
        &self,
        _stream: S,
        sampler: impl FnOnce(&mut S::Generator) -> T,
    ) -> T {
        sampler(&mut stream::<S>(self))
    }

    fn sample_distr<S: RandomStream + 'static, T>(
        &self,
        _stream: S,
        distribution: impl Distribution<T>,
    ) -> T
    where
        S::Generator: Rng,
    {
        distribution.sample(&mut *stream::<S>(self))
    }

    fn sample_range<S: RandomStream + 'static, R, T>(&self, stream: S, range: R) -> T
    where
        S::Generator: Rng,
        R: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(stream, |rng| rng.random_range(range))
    }

    fn sample_bool<S: RandomStream + 'static>(&self, stream: S, p: f64) -> bool
    where
        S::Generator: Rng,
    {
        self.sample(stream, |rng| rng.random_bool(p))
    }
}
