/*!
A headless tile-based city simulation.

Worlds are tile maps loaded from Tiled JSON files: one outside world plus an interior for every
building. Humans and vehicles move around them, driven by the player or by behaviour trees, and
everything advances in fixed frames scheduled as plans on a [`context::Context`].
*/

pub mod behaviour;
pub mod block;
pub mod building;
pub mod camera;
pub mod clock;
pub mod config;
pub mod context;
pub mod controller;
pub mod entity;
pub mod error;
pub mod game;
pub mod geometry;
pub mod hashing;
pub mod input;
pub mod logging;
pub mod navigation;
pub mod random;
pub mod report;
pub mod roadmap;
pub mod state;
pub mod world;

// Re-exported for `define_rng!`.
pub use rand;

pub use hashing::{HashMap, HashSet};

// Replace with `typeid::of as type_of` if necessary.
#[inline(always)]
pub fn type_of<T: 'static>() -> std::any::TypeId {
    std::any::TypeId::of::<T>()
}
