//! Agent registry and the per-tick stepper.
//!
//! The step runs in two phases, the same split the world uses everywhere:
//! 1. Plan (parallel, read-only): sense food and neighbors, pick a drive
//!    mode, blend the deterministic steering terms.
//! 2. Apply (sequential): wander noise, integration, energy, hazards, aging.
//!
//! Dead agents are removed only after the whole pass.

use crate::agent::{Agent, AgentId, DriveState, Mode};
use crate::config::Config;
use crate::drives::{self, DriveInputs};
use crate::events::DeathEvent;
use crate::food::FoodId;
use crate::grid::SpatialGrid;
use crate::hazards::{combined_effect, ActiveHazard};
use crate::steering::{arrive, arrive_speed, confine, limit, ou_step, wall_avoidance, Neighborhood};
use glam::Vec2;
use rand::Rng;
use rayon::prelude::*;

/// Read-only view of the world handed to the stepper
pub struct StepContext<'a> {
    pub config: &'a Config,
    pub bounds: Vec2,
    pub dt: f32,
    /// Simulation time at the end of this tick
    pub now: f64,
    /// Sanitized global speed multiplier
    pub speed_scale: f32,
    /// Agents indexed by their position in the registry
    pub agent_grid: &'a SpatialGrid<usize>,
    pub food_grid: &'a SpatialGrid<FoodId>,
    pub hazards: &'a [ActiveHazard],
}

/// Output of the plan phase for one agent
#[derive(Debug, Clone, Copy)]
struct Plan {
    drive: DriveState,
    steering: Vec2,
    goal: Option<Vec2>,
}

/// Owns the live agents, ordered by id
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    next_id: AgentId,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every agent and restart id allocation
    pub fn clear(&mut self) {
        self.agents.clear();
        self.next_id = 0;
    }

    /// Reserve the next agent id
    pub fn allocate_id(&mut self) -> AgentId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add an agent, keeping the collection sorted by id
    pub fn insert(&mut self, agent: Agent) {
        self.next_id = self.next_id.max(agent.id + 1);
        match self.agents.last() {
            Some(last) if last.id > agent.id => {
                let at = self.agents.partition_point(|a| a.id < agent.id);
                self.agents.insert(at, agent);
            }
            _ => self.agents.push(agent),
        }
    }

    pub fn extend(&mut self, agents: impl IntoIterator<Item = Agent>) {
        for agent in agents {
            self.insert(agent);
        }
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents
            .binary_search_by_key(&id, |a| a.id)
            .ok()
            .map(|i| &self.agents[i])
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        match self.agents.binary_search_by_key(&id, |a| a.id) {
            Ok(i) => Some(&mut self.agents[i]),
            Err(_) => None,
        }
    }

    #[inline]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    #[inline]
    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Rebuild an index of agent slice positions
    pub fn index_into(&self, grid: &mut SpatialGrid<usize>) {
        grid.clear();
        for (i, agent) in self.agents.iter().enumerate() {
            grid.insert(agent.position.x, agent.position.y, i);
        }
    }

    /// Give energy to the agent at a slice position
    pub fn credit(&mut self, index: usize, energy: f32) {
        if let Some(agent) = self.agents.get_mut(index) {
            agent.add_energy(energy);
        }
    }

    pub fn max_pickup_radius(&self) -> f32 {
        self.agents
            .iter()
            .map(|a| a.phenotype().pickup_radius)
            .fold(0.0, f32::max)
    }

    pub fn max_interaction_radius(&self) -> f32 {
        self.agents
            .iter()
            .map(|a| a.phenotype().interaction_radius)
            .fold(0.0, f32::max)
    }

    /// Sense and decide for one agent
    fn plan(&self, index: usize, ctx: &StepContext) -> Plan {
        let agent = &self.agents[index];
        let ph = agent.phenotype();
        let steer = &ctx.config.steering;
        let pos = agent.position;
        let vel = agent.velocity;
        let max_speed = ph.max_speed * ctx.speed_scale;
        let max_force = ph.max_force * ctx.speed_scale;
        let radius = ph.sense_radius;

        let mut food: Option<(Vec2, f32)> = None;
        ctx.food_grid.visit_circle(pos.x, pos.y, radius, |p, _| {
            let d = pos.distance(p);
            if d <= radius && food.map_or(true, |(_, best)| d < best) {
                food = Some((p, d));
            }
        });

        let mut neighbors = Neighborhood::default();
        let mut mate: Option<(Vec2, f32)> = None;
        ctx.agent_grid.visit_circle(pos.x, pos.y, radius, |p, j| {
            if j == index {
                return;
            }
            let Some(other) = self.agents.get(j) else {
                return;
            };
            let d = pos.distance(p);
            if d > radius {
                return;
            }
            neighbors.add(pos, p, other.velocity, steer.separation_radius);
            if other.sex != agent.sex
                && other.is_fertile()
                && mate.map_or(true, |(_, best)| d < best)
            {
                mate = Some((p, d));
            }
        });

        let inputs = DriveInputs {
            food_sensed: food.is_some(),
            mate_sensed: mate.is_some(),
            population: self.agents.len(),
            now: ctx.now,
        };
        let drive = drives::decide(agent, &inputs, &ctx.config.drives);

        let (goal, weight) = match drive.mode {
            Mode::SeekFood => (food.map(|f| f.0), steer.food_weight),
            Mode::SeekMate => (mate.map(|m| m.0), steer.mate_weight),
            Mode::Wander => (None, 0.0),
        };

        let mut steering = Vec2::ZERO;
        if let Some(target) = goal {
            steering += arrive(
                pos,
                vel,
                target,
                max_speed,
                max_force,
                steer.slow_radius,
                steer.stop_radius,
            ) * weight;
        }
        steering +=
            wall_avoidance(pos, ctx.bounds, steer.wall_margin, max_force) * steer.wall_weight;
        steering += neighbors.separation(vel, max_speed, max_force) * steer.separation_weight;
        steering += neighbors.alignment(vel, max_speed, max_force) * steer.alignment_weight;
        steering += neighbors.cohesion(pos, vel, max_speed, max_force) * steer.cohesion_weight;

        Plan {
            drive,
            steering,
            goal,
        }
    }

    /// Advance every agent by `ctx.dt`. Returns one record per removed agent.
    pub fn step(&mut self, ctx: &StepContext, rng: &mut impl Rng) -> Vec<DeathEvent> {
        let plans: Vec<Plan> = (0..self.agents.len())
            .into_par_iter()
            .map(|i| self.plan(i, ctx))
            .collect();

        let steer = &ctx.config.steering;
        let max_age = ctx.config.agents.max_age;
        let move_cost = ctx.config.agents.move_cost.max(0.0);
        let dt = ctx.dt;
        let mut deaths = Vec::new();

        for (agent, plan) in self.agents.iter_mut().zip(plans) {
            let ph = *agent.phenotype();
            let max_speed = ph.max_speed * ctx.speed_scale;
            let max_force = ph.max_force * ctx.speed_scale;

            agent.drive = plan.drive;
            agent.wander = ou_step(agent.wander, steer.ou_theta, steer.ou_sigma, dt, rng);
            let wander = limit(agent.wander, 1.0) * max_force * steer.wander_weight;
            let accel = limit(plan.steering + wander, max_force);

            agent.velocity = limit(agent.velocity + accel * dt, max_speed);
            if let Some(target) = plan.goal {
                let cap = arrive_speed(
                    agent.position.distance(target),
                    max_speed,
                    steer.slow_radius,
                    steer.stop_radius,
                );
                agent.velocity = limit(agent.velocity, cap);
            }

            let (position, velocity) =
                confine(agent.position + agent.velocity * dt, agent.velocity, ctx.bounds);
            agent.position = position;
            agent.velocity = velocity;

            let cost = ph.metabolic_rate * dt + move_cost * agent.speed() * dt;
            agent.add_energy(-cost);

            if !ctx.hazards.is_empty() {
                let effect = combined_effect(ctx.hazards, agent.position, ctx.bounds, dt, ctx.now);
                agent.add_energy(-effect.damage * ph.damage_factor);
                agent.velocity += effect.impulse;
            }

            agent.age += dt;
            agent.tick_cooldown(dt);

            if let Some(cause) = agent.death_cause(max_age) {
                deaths.push(DeathEvent {
                    id: agent.id,
                    name: agent.name.clone(),
                    sex: agent.sex,
                    lineage_group_id: agent.lineage_group,
                    genome: *agent.genome(),
                    age: agent.age,
                    cause,
                    at: ctx.now,
                });
            }
        }

        if !deaths.is_empty() {
            self.agents.retain(|a| a.is_alive(max_age));
        }
        deaths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{DeathCause, Sex};
    use crate::genome::{Genome, GenomeSeed};
    use crate::hazards::HazardKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn spawn(registry: &mut AgentRegistry, config: &Config, sex: Sex, pos: Vec2) -> AgentId {
        let id = registry.allocate_id();
        let agent = Agent::new(
            id,
            format!("agent-{id}"),
            sex,
            0,
            Genome::default(),
            pos,
            &config.agents,
        );
        registry.insert(agent);
        id
    }

    fn tick(
        registry: &mut AgentRegistry,
        config: &Config,
        hazards: &[ActiveHazard],
        seed: u64,
    ) -> Vec<DeathEvent> {
        let bounds = Vec2::new(config.world.width, config.world.height);
        let mut agent_grid = SpatialGrid::new(bounds.x, bounds.y, config.world.grid_cell_size);
        registry.index_into(&mut agent_grid);
        let food_grid = SpatialGrid::new(bounds.x, bounds.y, config.world.grid_cell_size);
        let ctx = StepContext {
            config,
            bounds,
            dt: config.world.dt,
            now: config.world.dt as f64,
            speed_scale: 1.0,
            agent_grid: &agent_grid,
            food_grid: &food_grid,
            hazards,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        registry.step(&ctx, &mut rng)
    }

    #[test]
    fn test_ids_and_lookup() {
        let config = Config::default();
        let mut registry = AgentRegistry::new();
        let a = spawn(&mut registry, &config, Sex::Male, Vec2::new(10.0, 10.0));
        let b = spawn(&mut registry, &config, Sex::Female, Vec2::new(20.0, 10.0));
        assert!(b > a);
        assert_eq!(registry.get(b).unwrap().sex, Sex::Female);
        assert!(registry.get(99).is_none());
        assert_eq!(registry.allocate_id(), b + 1);
    }

    #[test]
    fn test_energy_drops_by_metabolic_and_movement_cost() {
        let config = Config::default();
        let mut registry = AgentRegistry::new();
        let id = spawn(&mut registry, &config, Sex::Male, Vec2::new(400.0, 300.0));
        registry.get_mut(id).unwrap().velocity = Vec2::new(20.0, 0.0);
        let before = registry.get(id).unwrap().energy();

        let deaths = tick(&mut registry, &config, &[], 1);
        assert!(deaths.is_empty());

        let agent = registry.get(id).unwrap();
        let dt = config.world.dt;
        let expected = before
            - agent.phenotype().metabolic_rate * dt
            - config.agents.move_cost * agent.speed() * dt;
        assert!(
            (agent.energy() - expected).abs() < 1e-4,
            "energy {} expected {}",
            agent.energy(),
            expected
        );
    }

    #[test]
    fn test_starvation_removes_once() {
        let config = Config::default();
        let mut registry = AgentRegistry::new();
        let id = spawn(&mut registry, &config, Sex::Male, Vec2::new(400.0, 300.0));
        spawn(&mut registry, &config, Sex::Female, Vec2::new(100.0, 100.0));
        registry.get_mut(id).unwrap().set_energy(1e-6);

        let deaths = tick(&mut registry, &config, &[], 2);
        assert_eq!(deaths.len(), 1);
        assert_eq!(deaths[0].id, id);
        assert_eq!(deaths[0].cause, DeathCause::Starvation);
        assert!(registry.get(id).is_none());
        assert_eq!(registry.len(), 1);

        assert!(tick(&mut registry, &config, &[], 3).is_empty());
    }

    #[test]
    fn test_old_age_death() {
        let config = Config::default();
        let mut registry = AgentRegistry::new();
        let id = spawn(&mut registry, &config, Sex::Female, Vec2::new(400.0, 300.0));
        registry.get_mut(id).unwrap().age = config.agents.max_age - config.world.dt / 2.0;

        let deaths = tick(&mut registry, &config, &[], 4);
        assert_eq!(deaths.len(), 1);
        assert_eq!(deaths[0].cause, DeathCause::OldAge);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_acid_damage_scaled_by_defense() {
        let config = Config::default();
        let acid = [ActiveHazard {
            kind: HazardKind::Acid,
            range: 30.0,
            damage_per_second: 12.0,
            impulse: 0.0,
            period: 0.0,
        }];

        let run = |hazards: &[ActiveHazard], defense: f32| {
            let mut registry = AgentRegistry::new();
            let genome = Genome::from_seed(&GenomeSeed {
                defense: Some(defense),
                ..Default::default()
            });
            let agent = Agent::new(
                0,
                "x".into(),
                Sex::Male,
                0,
                genome,
                Vec2::new(5.0, 300.0),
                &config.agents,
            );
            let factor = agent.phenotype().damage_factor;
            registry.insert(agent);
            tick(&mut registry, &config, hazards, 9);
            (registry.get(0).unwrap().energy(), factor)
        };

        let (clean, _) = run(&[], 1.0);
        let (burned, factor) = run(&acid, 1.0);
        assert!((clean - burned - 12.0 * config.world.dt * factor).abs() < 1e-4);

        let (armored_clean, _) = run(&[], 9.0);
        let (armored, _) = run(&acid, 9.0);
        assert!(armored_clean - armored < clean - burned);
    }

    #[test]
    fn test_cooldown_ticks_down() {
        let config = Config::default();
        let mut registry = AgentRegistry::new();
        let id = spawn(&mut registry, &config, Sex::Male, Vec2::new(400.0, 300.0));
        registry.get_mut(id).unwrap().start_cooldown(1.0);
        tick(&mut registry, &config, &[], 5);
        let cd = registry.get(id).unwrap().cooldown();
        assert!((cd - (1.0 - config.world.dt)).abs() < 1e-5);
    }

    #[test]
    fn test_agents_stay_in_bounds() {
        let config = Config::default();
        let mut registry = AgentRegistry::new();
        for i in 0..20 {
            let sex = if i % 2 == 0 { Sex::Male } else { Sex::Female };
            spawn(&mut registry, &config, sex, Vec2::new(i as f32 * 40.0, 599.0));
        }
        for seed in 0..120 {
            tick(&mut registry, &config, &[], seed);
        }
        for agent in registry.agents() {
            assert!((0.0..=config.world.width).contains(&agent.position.x));
            assert!((0.0..=config.world.height).contains(&agent.position.y));
        }
    }
}
