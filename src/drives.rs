//! Decision policy: picks each agent's current goal with hysteresis.
//!
//! Pure function of the agent's own `(mode, since)` pair, its energy and
//! cooldown, and a snapshot of what it senses.

use crate::agent::{Agent, DriveState, Mode};
use serde::{Deserialize, Serialize};

/// Thresholds and hysteresis for mate seeking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Energy fraction needed to start seeking a mate
    pub mate_enter: f32,
    /// Energy fraction below which a sticky mate search is abandoned
    pub mate_exit: f32,
    /// Populations at or below this size use the lowered thresholds
    pub small_population: usize,
    pub small_mate_enter: f32,
    pub small_mate_exit: f32,
    /// Seconds a fresh mate search persists regardless of other signals
    pub sticky_window: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            mate_enter: 0.6,
            mate_exit: 0.45,
            small_population: 12,
            small_mate_enter: 0.4,
            small_mate_exit: 0.3,
            sticky_window: 6.0,
        }
    }
}

/// Entry and exit energy fractions for mate seeking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub enter: f32,
    pub exit: f32,
}

impl DriveConfig {
    /// Thresholds for the current population; exit never exceeds enter.
    pub fn thresholds(&self, population: usize) -> Thresholds {
        let (enter, exit) = if population <= self.small_population {
            (self.small_mate_enter, self.small_mate_exit)
        } else {
            (self.mate_enter, self.mate_exit)
        };
        let enter = sanitize_fraction(enter);
        Thresholds {
            enter,
            exit: sanitize_fraction(exit).min(enter),
        }
    }
}

fn sanitize_fraction(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// What the agent perceives this tick
#[derive(Debug, Clone, Copy, Default)]
pub struct DriveInputs {
    pub food_sensed: bool,
    pub mate_sensed: bool,
    /// Total live population
    pub population: usize,
    /// Current simulation time in seconds
    pub now: f64,
}

/// Select the next drive state from raw quantities.
pub fn decide_mode(
    current: DriveState,
    energy_fraction: f32,
    cooldown: f32,
    inputs: &DriveInputs,
    config: &DriveConfig,
) -> DriveState {
    let thresholds = config.thresholds(inputs.population);

    if current.mode == Mode::SeekMate
        && energy_fraction > thresholds.exit
        && inputs.now - current.since < config.sticky_window
    {
        return current;
    }

    let next = if inputs.mate_sensed && cooldown <= 0.0 && energy_fraction >= thresholds.enter {
        Mode::SeekMate
    } else if inputs.food_sensed {
        Mode::SeekFood
    } else {
        Mode::Wander
    };

    if next == current.mode {
        current
    } else {
        DriveState::new(next, inputs.now)
    }
}

/// Select the next drive state for an agent.
#[inline]
pub fn decide(agent: &Agent, inputs: &DriveInputs, config: &DriveConfig) -> DriveState {
    decide_mode(
        agent.drive,
        agent.energy_fraction(),
        agent.cooldown(),
        inputs,
        config,
    )
}
