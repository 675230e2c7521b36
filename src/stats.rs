//! Statistics tracking for the simulation.

use crate::agent::{Agent, Mode, Sex};
use crate::error::Result;
use crate::food::FoodField;
use crate::genealogy::GenealogyStats;
use crate::genome::{GeneTrait, Scorer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Statistics snapshot for a simulation tick
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Ticks since world creation
    pub tick: u64,
    /// Simulation time in seconds
    pub time: f64,
    /// Live agents
    pub population: usize,
    pub males: usize,
    pub females: usize,
    /// Births this tick
    pub births: usize,
    /// Deaths this tick
    pub deaths: usize,
    /// Food items eaten this tick
    pub food_eaten: usize,
    pub food_items: usize,
    pub hotspots: usize,
    pub dormant_hotspots: usize,
    /// Mean energy as a fraction of capacity
    pub energy_mean: f32,
    /// Mean age in seconds
    pub age_mean: f32,
    /// Mean fitness score in [0, 100]
    pub fitness_mean: f32,
    /// Mean trait values in genome schema order
    pub trait_means: [f32; 5],
    pub wandering: usize,
    pub seeking_food: usize,
    pub seeking_mate: usize,
    /// Distinct lineage groups among the living
    pub lineage_groups: usize,
    /// Every agent ever recorded
    pub genealogy_nodes: usize,
    pub max_generation: u32,
}

impl Stats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh the population and food aggregates
    pub fn update(&mut self, agents: &[Agent], food: &FoodField, scorer: &Scorer) {
        self.population = agents.len();
        self.food_items = food.item_count();
        self.hotspots = food.hotspot_count();
        self.dormant_hotspots = food.dormant_count();

        self.males = agents.iter().filter(|a| a.sex == Sex::Male).count();
        self.females = self.population - self.males;

        self.wandering = 0;
        self.seeking_food = 0;
        self.seeking_mate = 0;
        for agent in agents {
            match agent.drive.mode {
                Mode::Wander => self.wandering += 1,
                Mode::SeekFood => self.seeking_food += 1,
                Mode::SeekMate => self.seeking_mate += 1,
            }
        }

        if agents.is_empty() {
            self.energy_mean = 0.0;
            self.age_mean = 0.0;
            self.fitness_mean = 0.0;
            self.trait_means = [0.0; 5];
            self.lineage_groups = 0;
            return;
        }

        let n = agents.len() as f32;
        self.energy_mean = agents.iter().map(|a| a.energy_fraction()).sum::<f32>() / n;
        self.age_mean = agents.iter().map(|a| a.age).sum::<f32>() / n;
        self.fitness_mean = agents.iter().map(|a| scorer.score(a.genome())).sum::<f32>() / n;

        for (i, t) in GeneTrait::ALL.into_iter().enumerate() {
            self.trait_means[i] = agents.iter().map(|a| a.genome().get(t) as f32).sum::<f32>() / n;
        }

        let groups: HashSet<_> = agents.iter().map(|a| a.lineage_group).collect();
        self.lineage_groups = groups.len();
    }

    /// Copy the genealogy aggregates
    pub fn update_genealogy(&mut self, genealogy: &GenealogyStats) {
        self.genealogy_nodes = genealogy.node_count;
        self.max_generation = genealogy.max_generation;
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "T:{:8.1}s | Pop:{:4} ({}M/{}F) | Gen:{:3} | Energy:{:.2} | Fit:{:.1} | \
             Food:{:4} | Groups:{}",
            self.time,
            self.population,
            self.males,
            self.females,
            self.max_generation,
            self.energy_mean,
            self.fitness_mean,
            self.food_items,
            self.lineage_groups,
        )
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded stats snapshots
    pub snapshots: Vec<Stats>,
    /// Recording interval in ticks
    pub interval: u64,
}

impl StatsHistory {
    /// Create new history with recording interval
    pub fn new(interval: u64) -> Self {
        Self {
            snapshots: Vec::new(),
            interval: interval.max(1),
        }
    }

    /// Whether a snapshot is due at this tick
    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.interval.max(1) == 0
    }

    pub fn record(&mut self, stats: Stats) {
        self.snapshots.push(stats);
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&Stats> {
        self.snapshots.last()
    }

    /// Population over time
    pub fn population_series(&self) -> Vec<(f64, usize)> {
        self.snapshots
            .iter()
            .map(|s| (s.time, s.population))
            .collect()
    }

    /// Mean fitness over time
    pub fn fitness_series(&self) -> Vec<(f64, f32)> {
        self.snapshots
            .iter()
            .map(|s| (s.time, s.fitness_mean))
            .collect()
    }

    /// Mean value of one trait over time
    pub fn trait_series(&self, t: GeneTrait) -> Vec<(f64, f32)> {
        let i = GeneTrait::ALL.iter().position(|&x| x == t).unwrap_or(0);
        self.snapshots
            .iter()
            .map(|s| (s.time, s.trait_means[i]))
            .collect()
    }

    /// Max generation over time
    pub fn generation_series(&self) -> Vec<(f64, u32)> {
        self.snapshots
            .iter()
            .map(|s| (s.time, s.max_generation))
            .collect()
    }

    /// Save history to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load history from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::genome::Genome;
    use glam::Vec2;

    fn agent(id: u64, sex: Sex, group: u32) -> Agent {
        Agent::new(
            id,
            format!("a{id}"),
            sex,
            group,
            Genome::default(),
            Vec2::new(10.0, 10.0),
            &AgentConfig::default(),
        )
    }

    #[test]
    fn test_stats_update() {
        let agents = vec![
            agent(1, Sex::Male, 1),
            agent(2, Sex::Female, 1),
            agent(3, Sex::Female, 2),
        ];

        let mut stats = Stats::new();
        stats.update(&agents, &FoodField::new(), &Scorer::Heuristic);

        assert_eq!(stats.population, 3);
        assert_eq!(stats.males, 1);
        assert_eq!(stats.females, 2);
        assert_eq!(stats.lineage_groups, 2);
        assert_eq!(stats.wandering, 3);
        assert_eq!(stats.trait_means, [5.0; 5]);
        assert!((stats.fitness_mean - Genome::default().survival_score()).abs() < 1e-4);
    }

    #[test]
    fn test_empty_population() {
        let mut stats = Stats::new();
        stats.fitness_mean = 50.0;
        stats.update(&[], &FoodField::new(), &Scorer::Heuristic);
        assert_eq!(stats.population, 0);
        assert_eq!(stats.fitness_mean, 0.0);
    }

    #[test]
    fn test_stats_history() {
        let mut history = StatsHistory::new(10);

        for i in 0..5 {
            let mut stats = Stats::new();
            stats.time = i as f64 * 10.0;
            stats.population = (i + 1) * 100;
            history.record(stats);
        }

        let series = history.population_series();
        assert_eq!(series.len(), 5);
        assert_eq!(series[0], (0.0, 100));
        assert_eq!(series[4], (40.0, 500));
        assert!(history.is_due(20));
        assert!(!history.is_due(21));
    }

    #[test]
    fn test_history_zero_interval() {
        let history = StatsHistory::new(0);
        assert!(history.is_due(7));
    }
}
