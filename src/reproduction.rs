//! Pairwise mating between nearby opposite-sex agents.

use crate::agent::{generate_name, Agent, LineageGroup, Sex};
use crate::config::AgentConfig;
use crate::events::BirthEvent;
use crate::genome::Genome;
use crate::grid::SpatialGrid;
use crate::registry::AgentRegistry;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Mating costs, recovery and genetic parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproductionConfig {
    /// Energy each parent pays per child
    pub energy_cost: f32,
    /// Seconds both parents must wait before mating again
    pub cooldown: f32,
    /// Probability a child founds a new lineage group
    pub cross_breed_chance: f32,
    /// Per-trait mutation probability (initial tunable value)
    pub mutation_rate: f32,
    /// Child's starting energy as a fraction of its capacity
    pub child_energy_fraction: f32,
    pub inbreeding_parent_child: f32,
    pub inbreeding_full_sibling: f32,
    pub inbreeding_half_sibling: f32,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            energy_cost: 30.0,
            cooldown: 12.0,
            cross_breed_chance: 0.1,
            mutation_rate: 0.05,
            child_energy_fraction: 0.5,
            inbreeding_parent_child: 0.25,
            inbreeding_full_sibling: 0.25,
            inbreeding_half_sibling: 0.125,
        }
    }
}

/// Inbreeding coefficient of a pair, from the parent ids each one carries.
pub fn inbreeding_factor(a: &Agent, b: &Agent, config: &ReproductionConfig) -> f32 {
    if a.parents.contains(&Some(b.id)) || b.parents.contains(&Some(a.id)) {
        return config.inbreeding_parent_child;
    }

    let shared = a
        .parents
        .iter()
        .flatten()
        .filter(|p| b.parents.contains(&Some(**p)))
        .count();
    match shared {
        0 => 0.0,
        1 => config.inbreeding_half_sibling,
        _ => config.inbreeding_full_sibling,
    }
}

fn compatible(a: &Agent, b: &Agent, energy_cost: f32) -> bool {
    a.sex != b.sex
        && a.is_fertile()
        && b.is_fertile()
        && a.energy() >= energy_cost
        && b.energy() >= energy_cost
        && a.distance_to(b) <= a.phenotype().interaction_radius + b.phenotype().interaction_radius
}

/// Build the child of two parents. Energy and cooldown of the parents are not touched.
fn conceive(
    mother: &Agent,
    father: &Agent,
    config: &ReproductionConfig,
    agent_config: &AgentConfig,
    mutation_rate: f32,
    id: u64,
    rng: &mut impl Rng,
) -> Agent {
    let inbreeding = inbreeding_factor(mother, father, config);
    let genome = Genome::recombine(
        mother.genome(),
        father.genome(),
        mutation_rate,
        inbreeding,
        rng,
    );

    let lineage_group: LineageGroup = if rng.gen::<f32>() < config.cross_breed_chance {
        mother.lineage_group.max(father.lineage_group).saturating_add(1)
    } else if rng.gen::<bool>() {
        mother.lineage_group
    } else {
        father.lineage_group
    };

    let position = (mother.position + father.position) / 2.0;
    let mut child = Agent::new(
        id,
        generate_name(rng),
        Sex::random(rng),
        lineage_group,
        genome,
        position,
        agent_config,
    );
    child.parents = [Some(mother.id), Some(father.id)];
    child.set_energy(child.capacity() * config.child_energy_fraction.clamp(0.0, 1.0));
    child
}

/// Run one mating pass.
///
/// `grid` must index the registry by slice position. Each agent mates at most
/// once per pass since mating starts its cooldown. Children join the registry
/// after the pass.
pub fn step(
    registry: &mut AgentRegistry,
    grid: &SpatialGrid<usize>,
    config: &ReproductionConfig,
    agent_config: &AgentConfig,
    mutation_rate: f32,
    now: f64,
    rng: &mut impl Rng,
) -> Vec<BirthEvent> {
    let energy_cost = config.energy_cost.max(0.0);
    let reach = registry.max_interaction_radius();
    let mut newborns = Vec::new();

    for i in 0..registry.len() {
        let a = &registry.agents()[i];
        if !a.is_fertile() || a.energy() < energy_cost {
            continue;
        }
        let radius = a.phenotype().interaction_radius + reach;
        let candidates = grid.query_circle(a.position.x, a.position.y, radius);

        let Some(j) = candidates.into_iter().find(|&j| {
            j > i
                && registry
                    .agents()
                    .get(j)
                    .is_some_and(|b| compatible(&registry.agents()[i], b, energy_cost))
        }) else {
            continue;
        };

        let id = registry.allocate_id();
        let agents = registry.agents();
        let (first, second) = (&agents[i], &agents[j]);
        let (mother, father) = if first.sex == Sex::Female {
            (first, second)
        } else {
            (second, first)
        };
        let child = conceive(mother, father, config, agent_config, mutation_rate, id, rng);
        debug!(
            "{} born to {} and {} (group {})",
            child.name, mother.name, father.name, child.lineage_group
        );

        for k in [i, j] {
            let parent = &mut registry.agents_mut()[k];
            parent.add_energy(-energy_cost);
            parent.start_cooldown(config.cooldown);
        }
        newborns.push(child);
    }

    let births = newborns.iter().map(|c| BirthEvent::of(c, now)).collect();
    registry.extend(newborns);
    births
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::{GeneTrait, GenomeSeed};
    use glam::Vec2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn genome(v: f32) -> Genome {
        Genome::from_seed(&GenomeSeed {
            temperature: Some(v),
            size: Some(v),
            efficiency: Some(v),
            defense: Some(v),
            metabolism: Some(v),
        })
    }

    fn pair(distance: f32) -> AgentRegistry {
        let config = AgentConfig::default();
        let mut registry = AgentRegistry::new();
        let a = registry.allocate_id();
        registry.insert(Agent::new(
            a,
            "Ana".into(),
            Sex::Female,
            1,
            genome(3.0),
            Vec2::new(100.0, 100.0),
            &config,
        ));
        let b = registry.allocate_id();
        registry.insert(Agent::new(
            b,
            "Bo".into(),
            Sex::Male,
            4,
            genome(7.0),
            Vec2::new(100.0 + distance, 100.0),
            &config,
        ));
        registry
    }

    fn indexed(registry: &AgentRegistry) -> SpatialGrid<usize> {
        let mut grid = SpatialGrid::new(800.0, 600.0, 40.0);
        registry.index_into(&mut grid);
        grid
    }

    #[test]
    fn test_mating_produces_one_child() {
        let config = ReproductionConfig::default();
        let agent_config = AgentConfig::default();

        for seed in 0..50 {
            let mut registry = pair(5.0);
            let before: Vec<f32> = registry.agents().iter().map(|a| a.energy()).collect();
            let grid = indexed(&registry);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let births = step(&mut registry, &grid, &config, &agent_config, 0.0, 1.0, &mut rng);
            assert_eq!(births.len(), 1);
            assert_eq!(registry.len(), 3);
            assert_eq!(births[0].parent_ids, vec![0, 1]);

            for (k, parent) in registry.agents()[..2].iter().enumerate() {
                assert_eq!(parent.cooldown(), config.cooldown);
                assert!((parent.energy() - (before[k] - config.energy_cost)).abs() < 1e-4);
            }

            let child = registry.get(births[0].child_id).unwrap();
            for t in GeneTrait::ALL {
                let v = child.genome().get(t);
                assert!((3..=7).contains(&v), "{:?} = {} out of parent range", t, v);
            }
            assert_eq!(child.position, Vec2::new(102.5, 100.0));
            assert!([1, 4, 5].contains(&child.lineage_group));
        }
    }

    #[test]
    fn test_no_mating_out_of_range_or_same_sex() {
        let config = ReproductionConfig::default();
        let agent_config = AgentConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut far = pair(200.0);
        let grid = indexed(&far);
        assert!(step(&mut far, &grid, &config, &agent_config, 0.0, 0.0, &mut rng).is_empty());

        let mut same = pair(5.0);
        same.agents_mut()[1].sex = Sex::Female;
        let grid = indexed(&same);
        assert!(step(&mut same, &grid, &config, &agent_config, 0.0, 0.0, &mut rng).is_empty());
    }

    #[test]
    fn test_cooldown_and_energy_gate() {
        let config = ReproductionConfig::default();
        let agent_config = AgentConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let mut tired = pair(5.0);
        tired.agents_mut()[0].start_cooldown(1.0);
        let grid = indexed(&tired);
        assert!(step(&mut tired, &grid, &config, &agent_config, 0.0, 0.0, &mut rng).is_empty());

        let mut hungry = pair(5.0);
        hungry.agents_mut()[1].set_energy(config.energy_cost - 1.0);
        let grid = indexed(&hungry);
        assert!(step(&mut hungry, &grid, &config, &agent_config, 0.0, 0.0, &mut rng).is_empty());
    }

    #[test]
    fn test_cross_breed_always_branches() {
        let config = ReproductionConfig {
            cross_breed_chance: 1.0,
            ..Default::default()
        };
        let mut registry = pair(5.0);
        let grid = indexed(&registry);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let agent_config = AgentConfig::default();
        let births = step(&mut registry, &grid, &config, &agent_config, 0.0, 0.0, &mut rng);
        assert_eq!(births[0].lineage_group_id, 5);
    }

    #[test]
    fn test_inbreeding_factor_from_parent_ids() {
        let config = ReproductionConfig::default();
        let agent_config = AgentConfig::default();
        let make = |id, parents: [Option<u64>; 2]| {
            let mut a = Agent::new(
                id,
                "x".into(),
                Sex::Male,
                0,
                Genome::default(),
                Vec2::ZERO,
                &agent_config,
            );
            a.parents = parents;
            a
        };

        let mother = make(1, [None, None]);
        let son = make(3, [Some(1), Some(2)]);
        let daughter = make(4, [Some(1), Some(2)]);
        let half = make(5, [Some(1), Some(9)]);
        let stranger = make(6, [Some(7), Some(8)]);

        assert_eq!(inbreeding_factor(&mother, &son, &config), config.inbreeding_parent_child);
        assert_eq!(inbreeding_factor(&son, &daughter, &config), config.inbreeding_full_sibling);
        assert_eq!(inbreeding_factor(&son, &half, &config), config.inbreeding_half_sibling);
        assert_eq!(inbreeding_factor(&son, &stranger, &config), 0.0);
    }
}
