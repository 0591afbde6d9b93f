/// Sampling interval of the speed curves, in seconds.
pub const TIME_STEP: f64 = 0.25;

/// Upper bound on curve samples, for curves that never reach full speed.
const MAX_SAMPLES: usize = 1024;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DriveState {
    #[default]
    Stopped,
    Braking,
    Drifting,
    Accelerating,
    Crashed,
}

/// A speed fraction sampled every `TIME_STEP` seconds, starting at zero and ending at one.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    values: Vec<f64>,
    index: usize,
}

impl Curve {
    pub fn generate(f: impl Fn(f64) -> f64, step: f64) -> Self {
        let mut values = vec![0.0];
        let mut x = 0.0;
        loop {
            let y = f(x);
            if y >= 1.0 || y.is_nan() || values.len() >= MAX_SAMPLES {
                values.push(1.0);
                break;
            }
            values.push(y);
            x += step;
        }
        Curve { values, index: 0 }
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.values[self.index]
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index.min(self.values.len() - 1);
    }

    /// Jumps to the first sample at or above `value`, or the start if there is none.
    pub fn catch_up_to(&mut self, value: f64) {
        self.index = self.values.iter().position(|v| *v >= value).unwrap_or(0);
    }

    pub fn slow(&mut self, fraction: f64) {
        self.catch_up_to(self.value() * fraction);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CurveKind {
    Accelerate,
    Brake,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Engine {
    pub max_speed: f64,
    accelerate: Curve,
    brake: Curve,
    current: CurveKind,
    time_applied: f64,
    last_speed: f64,
}

impl Engine {
    /// Lower rates give faster changes. A negative `accelerate_rate` reaches full speed at the
    /// first step.
    #[must_use]
    pub fn new(max_speed: f64, accelerate_rate: f64, brake_rate: f64) -> Self {
        let accelerate = if accelerate_rate < 0.0 {
            Curve::generate(|_| 1.0, TIME_STEP)
        } else {
            Curve::generate(|x| 1.0 + (x / accelerate_rate + 0.05).ln() * 0.3, TIME_STEP)
        };
        let brake = Curve::generate(|x| x / brake_rate, TIME_STEP);
        Engine {
            max_speed,
            accelerate,
            brake,
            current: CurveKind::Accelerate,
            time_applied: 0.0,
            last_speed: 0.0,
        }
    }

    fn curve(&self, kind: CurveKind) -> &Curve {
        match kind {
            CurveKind::Accelerate => &self.accelerate,
            CurveKind::Brake => &self.brake,
        }
    }

    fn curve_mut(&mut self, kind: CurveKind) -> &mut Curve {
        match kind {
            CurveKind::Accelerate => &mut self.accelerate,
            CurveKind::Brake => &mut self.brake,
        }
    }

    #[must_use]
    pub fn current_curve(&self) -> &Curve {
        self.curve(self.current)
    }

    #[must_use]
    pub fn last_speed(&self) -> f64 {
        self.last_speed
    }

    /// Advances time by `delta` and returns the speed for `state`. The curve position only
    /// moves once per `TIME_STEP`.
    pub fn speed(&mut self, state: DriveState, delta: f64) -> f64 {
        self.time_applied += delta;
        if self.time_applied >= TIME_STEP {
            self.time_applied = 0.0;

            let (step, kind) = match state {
                DriveState::Accelerating => (Some(1), CurveKind::Accelerate),
                DriveState::Braking => (Some(-4), CurveKind::Brake),
                DriveState::Drifting => (Some(-2), CurveKind::Brake),
                DriveState::Stopped | DriveState::Crashed => (None, CurveKind::Accelerate),
            };
            if kind != self.current {
                let value = self.current_curve().value();
                self.curve_mut(kind).catch_up_to(value);
                self.current = kind;
            }

            let curve = self.curve_mut(kind);
            let index = match step {
                None => 0,
                Some(step) => {
                    let last = i64::try_from(curve.len()).unwrap_or(i64::MAX) - 1;
                    let index = i64::try_from(curve.index()).unwrap_or(0) + step;
                    usize::try_from(index.clamp(0, last)).unwrap_or(0)
                }
            };
            curve.set_index(index);
        }

        self.last_speed = self.current_curve().value() * self.max_speed;
        self.last_speed
    }

    /// Drops the speed to a fraction of its current value.
    pub fn slow(&mut self, fraction: f64) {
        let kind = self.current;
        self.curve_mut(kind).slow(fraction);
    }

    /// Nudges the acceleration curve forward by one sample.
    pub fn boost(&mut self) {
        let index = self.accelerate.index() + 1;
        self.accelerate.set_index(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceleration_curve_rises_to_one() {
        let engine = Engine::new(400.0, 7.0, 5.0);
        let values = &engine.accelerate.values;
        assert_eq!(values[0], 0.0);
        assert!((values[1] - (1.0 + 0.05f64.ln() * 0.3)).abs() < 1e-9);
        assert_eq!(*values.last().unwrap(), 1.0);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));

        let brake = &engine.brake.values;
        assert_eq!(brake.len(), 22);
        assert!((brake[2] - 0.05).abs() < 1e-9);
    }

    #[test]
    fn instant_acceleration_has_two_samples() {
        let engine = Engine::new(300.0, -1.0, 2.5);
        assert_eq!(engine.accelerate.values, vec![0.0, 1.0]);
    }

    #[test]
    fn speed_moves_one_step_per_interval() {
        let mut engine = Engine::new(100.0, -1.0, 2.5);
        assert_eq!(engine.speed(DriveState::Accelerating, 0.1), 0.0);
        assert_eq!(engine.speed(DriveState::Accelerating, 0.2), 100.0);
        // braking catches up on the brake curve, then steps down four samples
        let speed = engine.speed(DriveState::Braking, 0.25);
        assert!((speed - 60.0).abs() < 1e-9, "{speed}");
        assert_eq!(engine.speed(DriveState::Stopped, 0.25), 0.0);
    }

    #[test]
    fn catch_up_finds_first_sample_at_or_above() {
        let mut curve = Curve::generate(|x| x / 1.0, 0.25);
        assert_eq!(curve.values, vec![0.0, 0.0, 0.25, 0.5, 0.75, 1.0]);
        curve.catch_up_to(0.6);
        assert_eq!(curve.index(), 4);
        curve.slow(0.5);
        assert_eq!(curve.index(), 3);
        curve.catch_up_to(2.0);
        assert_eq!(curve.index(), 0);
    }
}
