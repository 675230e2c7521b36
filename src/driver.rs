//! Fixed-timestep driver: turns elapsed wall-clock time into whole ticks.

use crate::world::World;
use log::debug;
use std::time::Duration;

/// Accumulates frame time and runs as many fixed ticks as fit, up to a ceiling
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    dt: f64,
    accumulator: f64,
    max_steps_per_frame: u32,
    dropped: f64,
}

impl FixedTimestep {
    pub fn new(dt: f32, max_steps_per_frame: u32) -> Self {
        Self {
            dt: dt as f64,
            accumulator: 0.0,
            max_steps_per_frame: max_steps_per_frame.max(1),
            dropped: 0.0,
        }
    }

    /// Driver matching a world's configured timestep
    pub fn for_world(world: &World) -> Self {
        Self::new(world.config.world.dt, world.config.world.max_steps_per_frame)
    }

    /// Number of ticks owed for `elapsed` more seconds of wall time.
    ///
    /// When the ceiling is hit the remaining backlog is discarded so a stall
    /// never snowballs into ever longer frames.
    pub fn pending(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed.as_secs_f64();

        let mut steps = 0;
        while self.accumulator >= self.dt && steps < self.max_steps_per_frame {
            self.accumulator -= self.dt;
            steps += 1;
        }
        if steps == self.max_steps_per_frame && self.accumulator >= self.dt {
            debug!(
                "Frame ceiling hit, dropping {:.3}s of backlog",
                self.accumulator
            );
            self.dropped += self.accumulator;
            self.accumulator = 0.0;
        }
        steps
    }

    /// Advance `world` for one frame. Returns the ticks run.
    pub fn advance(&mut self, world: &mut World, elapsed: Duration) -> u32 {
        let steps = self.pending(elapsed);
        for _ in 0..steps {
            world.step();
        }
        steps
    }

    /// Leftover time in seconds, always below one tick
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Total seconds of backlog discarded at the ceiling
    pub fn dropped(&self) -> f64 {
        self.dropped
    }
}
