//! # Cellarium
//!
//! Continuous-space cell population simulator. Agents steer around a 2D arena
//! looking for drifting food and mates, pass a five-trait genome on to their
//! children, and leave behind a complete family tree.
//!
//! ## Features
//!
//! - **Steering**: weighted seek/arrive, wall avoidance, flocking and
//!   Ornstein-Uhlenbeck wander
//! - **Parallel**: the sensing phase runs on all cores via Rayon
//! - **Genealogy**: append-only lineage graph with a versioned JSON export
//! - **Configurable**: YAML configuration files
//! - **Reproducible**: seeded random number generation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cellarium::{Config, World};
//!
//! let mut world = World::new(Config::default()).unwrap();
//! world.run(600);
//!
//! println!("Population: {}", world.population());
//! println!("Family tree: {} nodes", world.genealogy().len());
//! ```
//!
//! ## Listening to events
//!
//! ```rust,no_run
//! use cellarium::events::{EventKind, HandlerError, SimEvent};
//! use cellarium::{Config, World};
//!
//! let mut world = World::new_with_seed(Config::default(), 7).unwrap();
//! world.subscribe(EventKind::AgentDied, |e: &SimEvent| -> Result<(), HandlerError> {
//!     println!("{:?}", e);
//!     Ok(())
//! });
//! world.run(1000);
//! ```

pub mod agent;
pub mod config;
pub mod driver;
pub mod drives;
pub mod error;
pub mod events;
pub mod food;
pub mod genealogy;
pub mod genome;
pub mod grid;
pub mod hazards;
pub mod registry;
pub mod reproduction;
pub mod stats;
pub mod steering;
pub mod world;

// Re-export main types
pub use agent::{Agent, AgentId};
pub use config::{Config, Tunables};
pub use driver::FixedTimestep;
pub use error::{Result, SimError};
pub use genealogy::Genealogy;
pub use genome::Genome;
pub use world::World;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark
pub fn benchmark(ticks: u64, population: usize) -> Result<BenchmarkResult> {
    use std::time::Instant;

    let mut config = Config::default();
    config.world.initial_population = population;

    let mut world = World::new_with_seed(config, 0)?;

    let start = Instant::now();
    world.run(ticks);
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        ticks,
        initial_population: population,
        final_population: world.population(),
        elapsed_secs: elapsed.as_secs_f64(),
        ticks_per_second: ticks as f64 / elapsed.as_secs_f64().max(1e-9),
        max_generation: world.genealogy().stats().max_generation,
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub ticks: u64,
    pub initial_population: usize,
    pub final_population: usize,
    pub elapsed_secs: f64,
    pub ticks_per_second: f64,
    pub max_generation: u32,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Population: {} -> {}", self.initial_population, self.final_population)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} ticks/s", self.ticks_per_second)?;
        writeln!(f, "Max generation: {}", self.max_generation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_quick_simulation() {
        let mut world = World::new_with_seed(Config::default(), 1).unwrap();
        world.run(100);
        assert_eq!(world.tick(), 100);
    }

    #[test]
    fn test_benchmark() {
        let result = benchmark(100, 50).unwrap();
        assert_eq!(result.ticks, 100);
        assert!(result.ticks_per_second > 0.0);
    }
}
