use crate::context::{Context, DataPlugin};
use crate::hashing::hash_str;
use crate::{type_of, HashMap};
use log::trace;
use rand::{
    distr::uniform::{SampleRange, SampleUniform},
    Rng, SeedableRng,
};
use std::any::{Any, TypeId};

/// A named random number stream. Each stream is seeded from the base seed plus a hash
/// of its name, so adding a stream never perturbs the draws of another.
pub trait RngId: Any {
    type RngType: SeedableRng + 'static;
    fn name() -> &'static str;
}

struct RngPlugin {
    base_seed: u64,
    rng_map: HashMap<TypeId, Box<dyn Any>>,
}

impl RngPlugin {
    fn clear(&mut self) {
        self.rng_map.clear();
    }

    fn get_rng<R: RngId>(&mut self) -> &mut R::RngType {
        let base_seed = self.base_seed;
        self.rng_map
            .entry(type_of::<R>())
            .or_insert_with(|| {
                let seed = base_seed.wrapping_add(hash_str(R::name()));
                Box::new(R::RngType::seed_from_u64(seed))
            })
            .downcast_mut::<R::RngType>()
            .unwrap() // Will never panic as the stream was created with the matching type
    }
}

impl DataPlugin for RngPlugin {
    fn init() -> Self {
        RngPlugin {
            base_seed: 0,
            rng_map: HashMap::default(),
        }
    }
}

/// Gets a mutable reference to the random number generator associated with the given
/// `RngId`.
// This is a private free function so that it's not leaked to the public API.
fn get_rng<R: RngId>(context: &mut Context) -> &mut R::RngType {
    context.get_data_container_mut::<RngPlugin>().get_rng::<R>()
}

pub trait ContextRandomExt {
    fn init_random(&mut self, base_seed: u64);

    /// Gets a random sample from the random number generator associated with the given
    /// `RngId` by applying the specified sampler function. If the Rng has not been used
    /// before, one will be created with the base seed you defined in `init_random`.
    fn sample<R: RngId, T>(&mut self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Gets a random sample within the range provided by `range`
    /// using the generator associated with the given `RngId`.
    fn sample_range<R: RngId, S, T>(&mut self, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform;

    /// Gets a random boolean value which is true with probability `p`
    /// using the generator associated with the given `RngId`.
    fn sample_bool<R: RngId>(&mut self, p: f64) -> bool
    where
        R::RngType: Rng;
}

impl ContextRandomExt for Context {
    /// Initializes the `RngPlugin` data container to store rngs as well as a base
    /// seed. Note that rngs are created lazily when `get_rng` is called.
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with seed {base_seed}");
        let rng_container = self.get_data_container_mut::<RngPlugin>();
        rng_container.base_seed = base_seed;

        // Clear any existing Rngs to ensure they get re-seeded when `get_rng` is called
        rng_container.clear();
    }

    fn sample<R: RngId, T>(&mut self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let rng = get_rng::<R>(self);
        sampler(rng)
    }

    fn sample_range<R: RngId, S, T>(&mut self, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample::<R, T>(|rng| rng.random_range(range))
    }

    fn sample_bool<R: RngId>(&mut self, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        self.sample::<R, bool>(|rng| rng.random_bool(p))
    }
}

#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        $crate::define_rng!($random_id, $crate::rand::rngs::StdRng);
    };
    ($random_id:ident, $rng_type:ty) => {
        pub struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $rng_type;

            fn name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}
#[allow(unused_imports)]
pub use define_rng;

#[cfg(test)]
mod test {
    use crate::context::Context;
    use crate::random::ContextRandomExt;
    use rand::RngCore;

    define_rng!(TrafficRng);
    define_rng!(WeatherRng);

    #[test]
    fn streams_are_independent() {
        let mut context = Context::new();
        context.init_random(42);
        let traffic = context.sample::<TrafficRng, _>(RngCore::next_u64);
        assert_ne!(traffic, context.sample::<WeatherRng, _>(RngCore::next_u64));

        // drawing from another stream does not disturb this one
        context.init_random(42);
        context.sample::<WeatherRng, _>(RngCore::next_u64);
        assert_eq!(traffic, context.sample::<TrafficRng, _>(RngCore::next_u64));
    }

    #[test]
    fn reseeding_replays_the_stream() {
        let mut context = Context::new();
        context.init_random(7);
        let first: Vec<u64> = (0..3).map(|_| context.sample::<TrafficRng, _>(RngCore::next_u64)).collect();

        context.init_random(7);
        let again: Vec<u64> = (0..3).map(|_| context.sample::<TrafficRng, _>(RngCore::next_u64)).collect();
        assert_eq!(first, again);

        context.init_random(8);
        assert_ne!(first[0], context.sample::<TrafficRng, _>(RngCore::next_u64));
    }

    #[test]
    fn ranges_and_coins() {
        let mut context = Context::new();
        context.init_random(42);
        for _ in 0..100 {
            let frames = context.sample_range::<TrafficRng, _, u32>(20..100);
            assert!((20..100).contains(&frames));
            let speed = context.sample_range::<TrafficRng, _, f64>(80.0..100.0);
            assert!((80.0..100.0).contains(&speed));
        }
        assert!(!context.sample_bool::<TrafficRng>(0.0));
        assert!(context.sample_bool::<TrafficRng>(1.0));
    }
}
