//! Fixed-schema genome: five integer traits in `[1, 9]`.
//!
//! Recombination averages both parents and adds noise, optional mutation and an
//! inbreeding push toward the extremes. Every write goes through
//! [`clamp_trait`], so a trait outside `[1, 9]` cannot be constructed.

use crate::config::AgentConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Lowest legal trait value
pub const TRAIT_MIN: u8 = 1;
/// Highest legal trait value
pub const TRAIT_MAX: u8 = 9;
/// Neutral default and midpoint
pub const TRAIT_NEUTRAL: u8 = 5;

/// Inbreeding factor at which the extreme-seeking perturbation kicks in
pub const INBREEDING_ONSET: f32 = 0.25;

/// Named genome traits, in schema order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeneTrait {
    Temperature,
    Size,
    Efficiency,
    Defense,
    Metabolism,
}

impl GeneTrait {
    pub const ALL: [GeneTrait; 5] = [
        GeneTrait::Temperature,
        GeneTrait::Size,
        GeneTrait::Efficiency,
        GeneTrait::Defense,
        GeneTrait::Metabolism,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GeneTrait::Temperature => "temperature",
            GeneTrait::Size => "size",
            GeneTrait::Efficiency => "efficiency",
            GeneTrait::Defense => "defense",
            GeneTrait::Metabolism => "metabolism",
        }
    }
}

/// Partially specified genome; missing traits default to neutral.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeSeed {
    pub temperature: Option<f32>,
    pub size: Option<f32>,
    pub efficiency: Option<f32>,
    pub defense: Option<f32>,
    pub metabolism: Option<f32>,
}

impl GenomeSeed {
    fn get(&self, t: GeneTrait) -> Option<f32> {
        match t {
            GeneTrait::Temperature => self.temperature,
            GeneTrait::Size => self.size,
            GeneTrait::Efficiency => self.efficiency,
            GeneTrait::Defense => self.defense,
            GeneTrait::Metabolism => self.metabolism,
        }
    }
}

/// Five-trait genome, owned by exactly one agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "GenomeSeed")]
pub struct Genome {
    temperature: u8,
    size: u8,
    efficiency: u8,
    defense: u8,
    metabolism: u8,
}

/// Round and clamp a raw trait value into `[1, 9]`. Non-finite input maps to neutral.
#[inline]
pub fn clamp_trait(value: f32) -> u8 {
    if !value.is_finite() {
        return TRAIT_NEUTRAL;
    }
    value.round().clamp(TRAIT_MIN as f32, TRAIT_MAX as f32) as u8
}

impl Default for Genome {
    fn default() -> Self {
        Self::from_seed(&GenomeSeed::default())
    }
}

impl From<GenomeSeed> for Genome {
    fn from(seed: GenomeSeed) -> Self {
        Self::from_seed(&seed)
    }
}

impl Genome {
    /// Build a genome from a partial specification.
    pub fn from_seed(seed: &GenomeSeed) -> Self {
        let mut genome = Genome {
            temperature: TRAIT_NEUTRAL,
            size: TRAIT_NEUTRAL,
            efficiency: TRAIT_NEUTRAL,
            defense: TRAIT_NEUTRAL,
            metabolism: TRAIT_NEUTRAL,
        };
        for t in GeneTrait::ALL {
            genome.set(t, seed.get(t).unwrap_or(TRAIT_NEUTRAL as f32));
        }
        genome
    }

    /// Uniformly random genome over the full trait range
    pub fn random(rng: &mut impl Rng) -> Self {
        let mut genome = Genome::default();
        for t in GeneTrait::ALL {
            genome.set(t, rng.gen_range(TRAIT_MIN..=TRAIT_MAX) as f32);
        }
        genome
    }

    #[inline]
    pub fn get(&self, t: GeneTrait) -> u8 {
        match t {
            GeneTrait::Temperature => self.temperature,
            GeneTrait::Size => self.size,
            GeneTrait::Efficiency => self.efficiency,
            GeneTrait::Defense => self.defense,
            GeneTrait::Metabolism => self.metabolism,
        }
    }

    fn set(&mut self, t: GeneTrait, value: f32) {
        let v = clamp_trait(value);
        match t {
            GeneTrait::Temperature => self.temperature = v,
            GeneTrait::Size => self.size = v,
            GeneTrait::Efficiency => self.efficiency = v,
            GeneTrait::Defense => self.defense = v,
            GeneTrait::Metabolism => self.metabolism = v,
        }
    }

    pub fn temperature(&self) -> u8 {
        self.temperature
    }
    pub fn size(&self) -> u8 {
        self.size
    }
    pub fn efficiency(&self) -> u8 {
        self.efficiency
    }
    pub fn defense(&self) -> u8 {
        self.defense
    }
    pub fn metabolism(&self) -> u8 {
        self.metabolism
    }

    /// Trait values in schema order
    pub fn values(&self) -> [u8; 5] {
        GeneTrait::ALL.map(|t| self.get(t))
    }

    /// Combine two parent genomes into a child genome.
    ///
    /// Per trait: parent mean, plus uniform noise in `[-1, 1]`; with probability
    /// `mutation_rate` an extra signed kick of magnitude `[1, 2.2]`; and when
    /// `inbreeding >= 0.25` a push away from the midpoint scaled by
    /// `2 * inbreeding`.
    pub fn recombine(
        a: &Genome,
        b: &Genome,
        mutation_rate: f32,
        inbreeding: f32,
        rng: &mut impl Rng,
    ) -> Genome {
        let mutation_rate = if mutation_rate.is_finite() {
            mutation_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let inbreeding = if inbreeding.is_finite() {
            inbreeding.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut child = Genome::default();
        for t in GeneTrait::ALL {
            let mean = (a.get(t) as f32 + b.get(t) as f32) / 2.0;
            let mut value = mean + rng.gen_range(-1.0f32..=1.0);

            if rng.gen::<f32>() < mutation_rate {
                let magnitude = rng.gen_range(1.0f32..=2.2);
                value += if rng.gen::<bool>() { magnitude } else { -magnitude };
            }

            if inbreeding >= INBREEDING_ONSET {
                let away = if value >= TRAIT_NEUTRAL as f32 { 1.0 } else { -1.0 };
                value += away * 2.0 * inbreeding * rng.gen_range(0.5f32..=1.5);
            }

            child.set(t, value);
        }
        child
    }

    /// Heuristic survival score in `[0, 100]`.
    ///
    /// Efficiency weighs most, then defense, then temperature affinity (speed),
    /// then size. Metabolism scores best at the midpoint.
    pub fn survival_score(&self) -> f32 {
        let linear = 4.0 * self.efficiency as f32
            + 3.0 * self.defense as f32
            + 2.0 * self.temperature as f32
            + 1.0 * self.size as f32;
        let metabolism_dist = (self.metabolism as f32 - TRAIT_NEUTRAL as f32).abs();
        let metabolism_term = 2.0 * (4.0 - metabolism_dist);

        // linear in [10, 90], metabolism_term in [0, 8]
        let raw = linear + metabolism_term;
        ((raw - 10.0) / 88.0 * 100.0).clamp(0.0, 100.0)
    }
}

/// Multiplier applied to a base quantity; 1.0 at the neutral trait value.
#[inline]
fn trait_scale(value: u8) -> f32 {
    0.6 + 0.08 * value as f32
}

/// Physical limits derived once from a genome.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Phenotype {
    pub capacity: f32,
    pub max_speed: f32,
    pub max_force: f32,
    pub sense_radius: f32,
    pub pickup_radius: f32,
    pub interaction_radius: f32,
    /// Energy per second spent on upkeep
    pub metabolic_rate: f32,
    /// Multiplier on incoming hazard damage
    pub damage_factor: f32,
}

impl Phenotype {
    pub fn derive(genome: &Genome, config: &AgentConfig) -> Self {
        let reduction = config.defense_damage_reduction.max(0.0);
        Self {
            capacity: (config.base_capacity + config.capacity_per_size * genome.size as f32)
                .max(1.0),
            max_speed: config.base_speed * trait_scale(genome.temperature),
            max_force: config.base_force * trait_scale(genome.temperature),
            sense_radius: config.base_sense_radius * trait_scale(genome.efficiency),
            pickup_radius: config.base_pickup_radius * trait_scale(genome.size),
            interaction_radius: config.base_interaction_radius * trait_scale(genome.size),
            metabolic_rate: config.metabolism_cost.max(0.0) * genome.metabolism as f32,
            damage_factor: (1.0 - reduction * (genome.defense as f32 - 1.0)).clamp(0.1, 1.0),
        }
    }
}

/// Optional predictive fitness model.
pub trait FitnessModel: Send + Sync {
    fn name(&self) -> &str;

    /// Predicted score in `[0, 100]`, or `None` when the model has no answer.
    fn predict(&self, genome: &Genome) -> Option<f32>;
}

/// Fitness scoring capability. The heuristic variant is always available.
#[derive(Default)]
pub enum Scorer {
    #[default]
    Heuristic,
    External(Box<dyn FitnessModel>),
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scorer::Heuristic => write!(f, "Scorer::Heuristic"),
            Scorer::External(model) => write!(f, "Scorer::External({})", model.name()),
        }
    }
}

impl Scorer {
    /// Score a genome, falling back to the heuristic when the model is silent.
    pub fn score(&self, genome: &Genome) -> f32 {
        match self {
            Scorer::Heuristic => genome.survival_score(),
            Scorer::External(model) => match model.predict(genome) {
                Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
                _ => genome.survival_score(),
            },
        }
    }
}
