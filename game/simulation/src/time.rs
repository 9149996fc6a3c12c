use common::*;

/// Number of fixed simulation steps per second (§4.1 "Time Driver").
pub const TICKS_PER_SECOND: u32 = 60;

pub const FIXED_DT: f32 = 1.0 / TICKS_PER_SECOND as f32;

/// Monotonically increasing tick counter, exposed as a specs resource so any system can read the
/// current tick without threading it through every function signature.
#[derive(Copy, Clone, Default, Eq, PartialEq, PartialOrd, Ord, Debug)]
pub struct Tick(u64);

impl Tick {
    pub fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn advance(&mut self) {
        self.0 += 1;
    }
}

/// Emitted when the accumulator discarded time rather than spiralling into ever-more simulation
/// steps (§4.1 "spiral-of-death guard").
#[derive(Debug, Copy, Clone)]
pub struct SlowdownEvent {
    pub discarded_secs: f32,
}

/// Fixed-timestep accumulator driving the simulation loop.
///
/// `advance(real_dt)` may produce zero or more `dt`-sized simulation steps, followed by an
/// interpolation factor in `[0, 1]` for the renderer. See §4.1.
pub struct TimeDriver {
    accumulator: f32,
    dt: f32,
    max_steps_per_call: u32,
    paused: bool,
    single_step: bool,
    tick: Tick,
}

/// What `TimeDriver::advance` produced for a single host call.
pub struct FrameOutcome {
    /// Number of `simulate(dt)` calls the caller should now perform.
    pub steps: u32,
    /// Interpolation factor for the render pass, in `[0, 1]`.
    pub alpha: f32,
    pub slowdown: Option<SlowdownEvent>,
}

impl TimeDriver {
    pub fn new(dt: f32, max_steps_per_call: u32) -> Self {
        Self {
            accumulator: 0.0,
            dt,
            max_steps_per_call,
            paused: false,
            single_step: false,
            tick: Tick::default(),
        }
    }

    pub fn with_config() -> Self {
        let cfg = config::get();
        Self::new(FIXED_DT, cfg.simulation.spiral_of_death_max_steps)
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Advance exactly one `dt`, regardless of pause state, then re-pause.
    pub fn step(&mut self) {
        self.single_step = true;
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Feed in real elapsed time and drain zero-or-more simulate steps from the accumulator.
    pub fn advance(&mut self, real_dt: f32) -> FrameOutcome {
        if self.single_step {
            self.single_step = false;
            self.tick.advance();
            return FrameOutcome {
                steps: 1,
                alpha: 1.0,
                slowdown: None,
            };
        }

        if self.paused {
            return FrameOutcome {
                steps: 0,
                alpha: 1.0,
                slowdown: None,
            };
        }

        self.accumulator += real_dt;

        let mut steps = 0u32;
        while self.accumulator >= self.dt && steps < self.max_steps_per_call {
            self.accumulator -= self.dt;
            self.tick.advance();
            steps += 1;
        }

        // spiral-of-death guard: if we still owe more than a full step's worth of time, drop it
        // rather than trying to catch up forever
        let slowdown = if self.accumulator >= self.dt {
            let discarded = self.accumulator;
            self.accumulator = 0.0;
            my_warn!(
                "time driver discarded {discarded} seconds of accumulated simulation time",
                discarded = discarded
            );
            Some(SlowdownEvent {
                discarded_secs: discarded,
            })
        } else {
            None
        };

        let alpha = (self.accumulator / self.dt).clamp(0.0, 1.0);
        FrameOutcome {
            steps,
            alpha,
            slowdown,
        }
    }
}

impl Default for TimeDriver {
    fn default() -> Self {
        Self::new(FIXED_DT, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_framerate_produces_one_step() {
        let mut driver = TimeDriver::new(1.0 / 60.0, 5);
        let outcome = driver.advance(1.0 / 60.0);
        assert_eq!(outcome.steps, 1);
    }

    #[test]
    fn pause_halts_accumulation() {
        let mut driver = TimeDriver::new(1.0 / 60.0, 5);
        driver.pause();
        let outcome = driver.advance(1.0);
        assert_eq!(outcome.steps, 0);
    }

    #[test]
    fn single_step_advances_exactly_one_tick_even_paused() {
        let mut driver = TimeDriver::new(1.0 / 60.0, 5);
        driver.pause();
        driver.step();
        let outcome = driver.advance(0.0);
        assert_eq!(outcome.steps, 1);
        assert_eq!(driver.current_tick().value(), 1);
    }

    #[test]
    fn spiral_of_death_guard_caps_steps_and_emits_slowdown() {
        let mut driver = TimeDriver::new(1.0 / 60.0, 5);
        // a huge hitch: many seconds of accumulated time in one call
        let outcome = driver.advance(10.0);
        assert_eq!(outcome.steps, 5);
        assert!(outcome.slowdown.is_some());
    }

    #[test]
    fn tick_counter_advances_monotonically() {
        let mut driver = TimeDriver::new(1.0 / 60.0, 5);
        for _ in 0..3 {
            driver.advance(1.0 / 60.0);
        }
        assert_eq!(driver.current_tick().value(), 3);
    }
}
