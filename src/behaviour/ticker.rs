use rand::Rng;

/// Fires after a random number of seconds drawn from a range, then rearms.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeTicker {
    min: f64,
    max: f64,
    time: f64,
    limit: f64,
}

impl TimeTicker {
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        TimeTicker {
            min,
            max,
            time: 0.0,
            limit: min,
        }
    }

    /// Fixed interval.
    #[must_use]
    pub fn every(seconds: f64) -> Self {
        TimeTicker::new(seconds, seconds)
    }

    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.time = 0.0;
        self.limit = if self.max > self.min {
            rng.random_range(self.min..self.max)
        } else {
            self.min
        };
    }

    /// Adds `delta` seconds. Returns true, and rearms, once the limit is reached.
    pub fn tick<R: Rng + ?Sized>(&mut self, delta: f64, rng: &mut R) -> bool {
        self.time += delta;
        let complete = self.time >= self.limit;
        if complete {
            self.reset(rng);
        }
        complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fixed_ticker_fires_on_schedule() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ticker = TimeTicker::every(0.5);
        let fired: Vec<bool> = (0..6).map(|_| ticker.tick(0.25, &mut rng)).collect();
        assert_eq!(fired, vec![false, true, false, true, false, true]);
    }

    #[test]
    fn random_limits_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut ticker = TimeTicker::new(0.1, 0.8);
        for _ in 0..50 {
            ticker.reset(&mut rng);
            assert!((0.1..0.8).contains(&ticker.limit));
        }
    }
}
