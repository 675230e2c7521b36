//! Agent ("cell") structure and per-agent state.

use crate::config::AgentConfig;
use crate::genome::{Genome, Phenotype};
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Unique agent identifier, monotonically increasing
pub type AgentId = u64;

/// Lineage group (clan) identifier
pub type LineageGroup = u32;

/// Biological sex for mating
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Random sex (50/50)
    pub fn random(rng: &mut impl Rng) -> Self {
        if rng.gen() {
            Sex::Male
        } else {
            Sex::Female
        }
    }

    /// Display character
    pub fn char(&self) -> char {
        match self {
            Sex::Male => '♂',
            Sex::Female => '♀',
        }
    }
}

/// Cause of death
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeathCause {
    Starvation,
    OldAge,
}

impl DeathCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeathCause::Starvation => "starvation",
            DeathCause::OldAge => "old-age",
        }
    }
}

/// Behavioral goal selected by the decision policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Wander,
    SeekFood,
    SeekMate,
}

/// Current mode and the simulation time it was entered
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveState {
    pub mode: Mode,
    pub since: f64,
}

impl DriveState {
    pub fn new(mode: Mode, since: f64) -> Self {
        Self { mode, since }
    }
}

/// An agent in the simulation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    // Identity
    pub id: AgentId,
    pub name: String,
    pub sex: Sex,
    pub lineage_group: LineageGroup,
    pub parents: [Option<AgentId>; 2],

    // Genetics
    genome: Genome,
    phenotype: Phenotype,

    // Physical state
    pub position: Vec2,
    pub velocity: Vec2,
    energy: f32,
    /// Seconds alive
    pub age: f32,
    /// Seconds until the agent may mate again
    cooldown: f32,

    // Behavior
    pub drive: DriveState,
    /// Ornstein-Uhlenbeck wander state
    pub wander: Vec2,
}

impl Agent {
    /// Create a new agent with energy at the configured starting fraction
    pub fn new(
        id: AgentId,
        name: String,
        sex: Sex,
        lineage_group: LineageGroup,
        genome: Genome,
        position: Vec2,
        config: &AgentConfig,
    ) -> Self {
        let phenotype = Phenotype::derive(&genome, config);
        let mut agent = Self {
            id,
            name,
            sex,
            lineage_group,
            parents: [None, None],
            genome,
            phenotype,
            position,
            velocity: Vec2::ZERO,
            energy: 0.0,
            age: 0.0,
            cooldown: 0.0,
            drive: DriveState::default(),
            wander: Vec2::ZERO,
        };
        agent.set_energy(phenotype.capacity * config.initial_energy_fraction.clamp(0.0, 1.0));
        agent
    }

    #[inline]
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    #[inline]
    pub fn phenotype(&self) -> &Phenotype {
        &self.phenotype
    }

    #[inline]
    pub fn energy(&self) -> f32 {
        self.energy
    }

    #[inline]
    pub fn capacity(&self) -> f32 {
        self.phenotype.capacity
    }

    /// Energy as a fraction of capacity
    #[inline]
    pub fn energy_fraction(&self) -> f32 {
        self.energy / self.phenotype.capacity
    }

    /// Set energy, clamped to `[0, capacity]`
    #[inline]
    pub fn set_energy(&mut self, energy: f32) {
        self.energy = if energy.is_finite() {
            energy.clamp(0.0, self.phenotype.capacity)
        } else {
            0.0
        };
    }

    /// Add (or with a negative amount, remove) energy, clamped
    #[inline]
    pub fn add_energy(&mut self, amount: f32) {
        self.set_energy(self.energy + amount);
    }

    #[inline]
    pub fn cooldown(&self) -> f32 {
        self.cooldown
    }

    /// Start the post-mating recovery period
    pub fn start_cooldown(&mut self, seconds: f32) {
        self.cooldown = seconds.max(0.0);
    }

    /// Advance the cooldown clock, flooring at zero
    #[inline]
    pub fn tick_cooldown(&mut self, dt: f32) {
        self.cooldown = (self.cooldown - dt).max(0.0);
    }

    /// Cause of death if the agent should be removed now
    pub fn death_cause(&self, max_age: f32) -> Option<DeathCause> {
        if self.energy <= 0.0 {
            Some(DeathCause::Starvation)
        } else if self.age >= max_age {
            Some(DeathCause::OldAge)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_alive(&self, max_age: f32) -> bool {
        self.death_cause(max_age).is_none()
    }

    /// Whether this agent could be sensed as a mate
    #[inline]
    pub fn is_fertile(&self) -> bool {
        self.cooldown <= 0.0
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    #[inline]
    pub fn distance_to(&self, other: &Agent) -> f32 {
        self.position.distance(other.position)
    }
}

const ONSETS: [&str; 16] = [
    "b", "c", "d", "f", "g", "k", "l", "m", "n", "p", "r", "s", "t", "v", "z", "th",
];
const VOWELS: [&str; 8] = ["a", "e", "i", "o", "u", "ae", "io", "y"];
const CODAS: [&str; 8] = ["", "", "n", "r", "s", "x", "l", "m"];

/// Generate a short pronounceable name
pub fn generate_name(rng: &mut impl Rng) -> String {
    let syllables = rng.gen_range(2..=3);
    let mut name = String::new();
    for _ in 0..syllables {
        name.push_str(ONSETS[rng.gen_range(0..ONSETS.len())]);
        name.push_str(VOWELS[rng.gen_range(0..VOWELS.len())]);
    }
    name.push_str(CODAS[rng.gen_range(0..CODAS.len())]);

    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}
