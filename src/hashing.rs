//! Hashing helpers shared across the crate. The hasher is `rustc-hash`'s `FxHasher`,
//! which is deterministic across runs; seeding and tie-breaking rely on that.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// Hashes a string to a `u64`. Used to derive a per-stream seed offset from an RNG name.
pub fn hash_str(data: &str) -> u64 {
    let mut hasher = FxHasher::default();
    data.hash(&mut hasher);
    hasher.finish()
}
