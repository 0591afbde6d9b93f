//! Frame timing shared by everything that ticks.

use crate::context::{Context, DataPlugin};

pub const DEFAULT_TICK_RATE: f64 = 60.0;

pub struct Clock {
    delta: f64,
    last_delta: f64,
    frame: u64,
}

impl DataPlugin for Clock {
    fn init() -> Self {
        Clock {
            delta: 1.0 / DEFAULT_TICK_RATE,
            last_delta: 1.0 / DEFAULT_TICK_RATE,
            frame: 0,
        }
    }
}

pub trait ContextClockExt {
    /// Seconds covered by the current frame.
    fn delta(&self) -> f64;

    /// Seconds covered by the previous frame.
    fn last_delta(&self) -> f64;

    fn frame(&self) -> u64;

    /// Starts a new frame covering `delta` seconds.
    fn advance_frame(&mut self, delta: f64);
}

impl ContextClockExt for Context {
    fn delta(&self) -> f64 {
        self.get_data_container::<Clock>()
            .map_or(1.0 / DEFAULT_TICK_RATE, |clock| clock.delta)
    }

    fn last_delta(&self) -> f64 {
        self.get_data_container::<Clock>()
            .map_or(1.0 / DEFAULT_TICK_RATE, |clock| clock.last_delta)
    }

    fn frame(&self) -> u64 {
        self.get_data_container::<Clock>().map_or(0, |clock| clock.frame)
    }

    fn advance_frame(&mut self, delta: f64) {
        let clock = self.get_data_container_mut::<Clock>();
        clock.last_delta = clock.delta;
        clock.delta = delta;
        clock.frame += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_remember_the_previous_delta() {
        let mut context = Context::new();
        assert_eq!(context.frame(), 0);
        context.advance_frame(0.5);
        context.advance_frame(0.25);
        assert_eq!(context.frame(), 2);
        assert!((context.delta() - 0.25).abs() < f64::EPSILON);
        assert!((context.last_delta() - 0.5).abs() < f64::EPSILON);
    }
}
