//! Configuration system for the cellarium simulation.
//!
//! Supports YAML configuration files with sensible defaults. Every section is
//! optional in the file; missing sections fall back to their `Default`.

use crate::drives::DriveConfig;
use crate::error::{Result, SimError};
use crate::food::FoodConfig;
use crate::hazards::{self, HazardTable};
use crate::reproduction::ReproductionConfig;
use crate::steering::SteeringConfig;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub agents: AgentConfig,
    #[serde(default)]
    pub steering: SteeringConfig,
    #[serde(default)]
    pub drives: DriveConfig,
    #[serde(default)]
    pub reproduction: ReproductionConfig,
    #[serde(default)]
    pub food: FoodConfig,
    #[serde(default = "hazards::default_table")]
    pub hazards: HazardTable,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Arena and scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Arena width in length units
    pub width: f32,
    /// Arena height in length units
    pub height: f32,
    /// Number of agents seeded at world creation
    pub initial_population: usize,
    /// Fixed timestep in seconds
    pub dt: f32,
    /// Maximum ticks the driver runs per frame when catching up
    pub max_steps_per_frame: u32,
    /// Side length of a spatial grid bucket
    pub grid_cell_size: f32,
    /// Global speed multiplier (initial tunable value)
    pub speed_scale: f32,
}

/// Per-agent physiology; genome traits scale these base values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Age in seconds at which an agent dies of old age
    pub max_age: f32,
    /// Energy capacity before the size contribution
    pub base_capacity: f32,
    /// Extra capacity per point of the size trait
    pub capacity_per_size: f32,
    /// Fraction of capacity a seeded agent starts with
    pub initial_energy_fraction: f32,
    /// Energy per second per point of the metabolism trait
    pub metabolism_cost: f32,
    /// Energy per second per unit of speed
    pub move_cost: f32,
    /// Max speed at neutral temperature affinity
    pub base_speed: f32,
    /// Max steering force at neutral temperature affinity
    pub base_force: f32,
    /// Sense radius at neutral efficiency
    pub base_sense_radius: f32,
    /// Food pickup radius at neutral size
    pub base_pickup_radius: f32,
    /// Mating interaction radius at neutral size
    pub base_interaction_radius: f32,
    /// Fraction of hazard damage removed per point of defense above 1
    pub defense_damage_reduction: f32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Ticks between stats history snapshots
    pub stats_interval: u64,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Parameters an external controller may change between ticks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunables {
    pub mutation_rate: f32,
    pub food_spawn_rate: f32,
    pub speed_scale: f32,
}

impl Tunables {
    pub const MAX_SPAWN_RATE: f32 = 100.0;
    pub const MAX_SPEED_SCALE: f32 = 10.0;

    pub fn from_config(config: &Config) -> Self {
        Self {
            mutation_rate: config.reproduction.mutation_rate,
            food_spawn_rate: config.food.spawn_rate,
            speed_scale: config.world.speed_scale,
        }
    }

    /// Clamp every value into its valid range. Each offending field is
    /// reported the first time it is seen in `warned`.
    pub fn sanitized(&self, warned: &mut HashSet<&'static str>) -> Self {
        Self {
            mutation_rate: clamp_logged(warned, "mutation_rate", self.mutation_rate, 0.0, 1.0),
            food_spawn_rate: clamp_logged(
                warned,
                "food_spawn_rate",
                self.food_spawn_rate,
                0.0,
                Self::MAX_SPAWN_RATE,
            ),
            speed_scale: clamp_logged(
                warned,
                "speed_scale",
                self.speed_scale,
                0.0,
                Self::MAX_SPEED_SCALE,
            ),
        }
    }
}

fn clamp_logged(
    warned: &mut HashSet<&'static str>,
    name: &'static str,
    value: f32,
    min: f32,
    max: f32,
) -> f32 {
    let clamped = if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    };
    if clamped != value && warned.insert(name) {
        warn!("tunable {} = {} out of range, using {}", name, value, clamped);
    }
    clamped
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            agents: AgentConfig::default(),
            steering: SteeringConfig::default(),
            drives: DriveConfig::default(),
            reproduction: ReproductionConfig::default(),
            food: FoodConfig::default(),
            hazards: hazards::default_table(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            initial_population: 40,
            dt: 1.0 / 60.0,
            max_steps_per_frame: 5,
            grid_cell_size: 40.0,
            speed_scale: 1.0,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_age: 240.0,
            base_capacity: 100.0,
            capacity_per_size: 10.0,
            initial_energy_fraction: 0.7,
            metabolism_cost: 0.25,
            move_cost: 0.02,
            base_speed: 60.0,
            base_force: 120.0,
            base_sense_radius: 90.0,
            base_pickup_radius: 8.0,
            base_interaction_radius: 10.0,
            defense_damage_reduction: 0.06,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval: 60,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the values that cannot be recovered by clamping.
    ///
    /// Everything else (rates, weights, hazard parameters) is clamped where it
    /// is consumed so a running simulation never stops on a bad value.
    pub fn validate(&self) -> Result<()> {
        let w = &self.world;
        if !(w.width.is_finite() && w.height.is_finite() && w.width > 0.0 && w.height > 0.0) {
            return Err(SimError::InvalidWorldSize {
                width: w.width,
                height: w.height,
            });
        }
        if !(w.grid_cell_size.is_finite() && w.grid_cell_size > 0.0) {
            return Err(SimError::InvalidConfig(
                "world.grid_cell_size must be > 0".to_string(),
            ));
        }
        if !(w.dt.is_finite() && w.dt > 0.0) {
            return Err(SimError::InvalidConfig("world.dt must be > 0".to_string()));
        }
        if w.max_steps_per_frame == 0 {
            return Err(SimError::InvalidConfig(
                "world.max_steps_per_frame must be >= 1".to_string(),
            ));
        }
        if !(self.agents.max_age.is_finite() && self.agents.max_age > 0.0) {
            return Err(SimError::InvalidConfig("agents.max_age must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.world.width, loaded.world.width);
        assert_eq!(config.hazards.len(), loaded.hazards.len());
        assert_eq!(
            config.drives.small_population,
            loaded.drives.small_population
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "world:\n  width: 400.0\n";
        let loaded: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(loaded.world.width, 400.0);
        assert_eq!(loaded.world.height, WorldConfig::default().height);
        assert_eq!(loaded.agents.max_age, AgentConfig::default().max_age);
        assert!(loaded.hazards.contains_key("acid"));
        assert!(loaded.hazards.contains_key("nano"));
    }

    #[test]
    fn test_invalid_world_size_rejected() {
        let mut config = Config::default();
        config.world.width = 0.0;
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidWorldSize { .. })
        ));

        config.world.width = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tunables_clamped_and_warned_once() {
        let mut warned = HashSet::new();
        let tunables = Tunables {
            mutation_rate: 3.0,
            food_spawn_rate: f32::NAN,
            speed_scale: 1.5,
        };
        let clean = tunables.sanitized(&mut warned);
        assert_eq!(clean.mutation_rate, 1.0);
        assert_eq!(clean.food_spawn_rate, 0.0);
        assert_eq!(clean.speed_scale, 1.5);
        assert_eq!(warned.len(), 2);

        tunables.sanitized(&mut warned);
        assert_eq!(warned.len(), 2);
    }

    #[test]
    fn test_invalid_dt_rejected() {
        let mut config = Config::default();
        config.world.dt = 0.0;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }
}
