//! Deterministic hashing helpers.
//!
//! The standard library `HashMap` seeds its hasher randomly per process, so
//! iteration order differs between runs. Everything that can influence the
//! order of random draws uses the Fx containers re-exported here instead.
//!
//! `hash_str` derives the seed offset of each named random stream.

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use xxhash_rust::xxh3::xxh3_64;

/// A stable 64-bit hash of a `&str`, identical on every platform and run.
#[must_use]
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}
