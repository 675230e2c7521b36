//! World simulation engine - owns every component and runs the tick.

use crate::agent::{generate_name, Agent, AgentId, LineageGroup, Sex};
use crate::config::{Config, Tunables};
use crate::error::Result;
use crate::events::{
    BirthEvent, EventBus, EventHandler, EventKind, FoodConsumedEvent, SimEvent, SubscriptionId,
};
use crate::food::{FoodField, FoodId};
use crate::genealogy::Genealogy;
use crate::genome::{Genome, Scorer};
use crate::grid::SpatialGrid;
use crate::hazards::{HazardField, HazardTable};
use crate::registry::{AgentRegistry, StepContext};
use crate::reproduction;
use crate::stats::{Stats, StatsHistory};
use glam::Vec2;
use log::{debug, info, warn};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

/// The simulation world
pub struct World {
    // Configuration
    pub config: Config,
    /// Read at the start of every tick
    pub tunables: Tunables,

    // Components
    registry: AgentRegistry,
    food: FoodField,
    genealogy: Genealogy,
    bus: EventBus,
    scorer: Scorer,
    hazard_field: HazardField,

    // Spatial indices, rebuilt every tick
    agent_grid: SpatialGrid<usize>,
    food_grid: SpatialGrid<FoodId>,

    // State
    bounds: Vec2,
    time: f64,
    tick: u64,

    // Statistics
    pub stats: Stats,
    pub stats_history: StatsHistory,

    tunable_warnings: HashSet<&'static str>,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,
    seed: u64,
}

impl World {
    /// Create a new world with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(config, seed)
    }

    /// Create a new world with a specific seed for reproducibility
    pub fn new_with_seed(config: Config, seed: u64) -> Result<Self> {
        config.validate()?;

        let bounds = Vec2::new(config.world.width, config.world.height);
        let cell = config.world.grid_cell_size;

        let mut world = Self {
            tunables: Tunables::from_config(&config),
            registry: AgentRegistry::new(),
            food: FoodField::new(),
            genealogy: Genealogy::new(),
            bus: EventBus::new(),
            scorer: Scorer::default(),
            hazard_field: HazardField::new(),
            agent_grid: SpatialGrid::new(bounds.x, bounds.y, cell),
            food_grid: SpatialGrid::new(bounds.x, bounds.y, cell),
            bounds,
            time: 0.0,
            tick: 0,
            stats: Stats::new(),
            stats_history: StatsHistory::new(config.logging.stats_interval),
            tunable_warnings: HashSet::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            config,
        };
        world.populate();

        info!(
            "World {}x{} seeded with {} agents and {} hotspots (seed {})",
            bounds.x,
            bounds.y,
            world.registry.len(),
            world.food.hotspot_count(),
            seed
        );
        Ok(world)
    }

    /// Place the initial food and founders
    fn populate(&mut self) {
        self.food.seed(&self.config.food, self.bounds, &mut self.rng);
        self.seed_population(self.config.world.initial_population);
        self.refresh_stats(0, 0, 0);
        self.stats_history.record(self.stats.clone());
    }

    /// Add `count` founders at random positions, each starting its own lineage group.
    pub fn seed_population(&mut self, count: usize) -> Vec<AgentId> {
        let mut next_group: LineageGroup = self
            .registry
            .agents()
            .iter()
            .map(|a| a.lineage_group + 1)
            .max()
            .unwrap_or(0);

        let mut ids = Vec::with_capacity(count);
        let mut events = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.registry.allocate_id();
            let position = Vec2::new(
                self.rng.gen_range(0.0..=self.bounds.x),
                self.rng.gen_range(0.0..=self.bounds.y),
            );
            let agent = Agent::new(
                id,
                generate_name(&mut self.rng),
                Sex::random(&mut self.rng),
                next_group,
                Genome::random(&mut self.rng),
                position,
                &self.config.agents,
            );
            next_group = next_group.saturating_add(1);

            events.push(SimEvent::AgentBorn(BirthEvent::of(&agent, self.time)));
            self.registry.insert(agent);
            ids.push(id);
        }
        self.dispatch(&events);
        ids
    }

    /// Main simulation step
    pub fn step(&mut self) {
        let tunables = self.tunables.sanitized(&mut self.tunable_warnings);
        let dt = self.config.world.dt;
        let now = self.time + dt as f64;
        let mut events = Vec::new();

        // Phase 1: Food drift, spawning and consumption
        self.food.step(
            dt,
            tunables.food_spawn_rate,
            self.bounds,
            &self.config.food,
            &mut self.rng,
        );
        self.registry.index_into(&mut self.agent_grid);
        let eaten = self.food.consume(
            self.registry.agents(),
            &self.agent_grid,
            self.registry.max_pickup_radius(),
            self.config.food.consumption_rule,
        );
        for meal in &eaten {
            self.registry.credit(meal.agent_index, meal.energy);
            events.push(SimEvent::FoodConsumed(FoodConsumedEvent {
                agent_id: meal.agent_id,
                food_id: meal.food_id,
                energy: meal.energy,
            }));
        }
        self.food.index_into(&mut self.food_grid);

        // Phase 2: Sense, steer, move, pay energy, age
        let hazards = self.hazard_field.resolve(&self.config.hazards);
        let ctx = StepContext {
            config: &self.config,
            bounds: self.bounds,
            dt,
            now,
            speed_scale: tunables.speed_scale,
            agent_grid: &self.agent_grid,
            food_grid: &self.food_grid,
            hazards: &hazards,
        };
        let deaths = self.registry.step(&ctx, &mut self.rng);
        let death_count = deaths.len();
        events.extend(deaths.into_iter().map(SimEvent::AgentDied));

        // Phase 3: Reproduction on settled positions
        self.registry.index_into(&mut self.agent_grid);
        let births = reproduction::step(
            &mut self.registry,
            &self.agent_grid,
            &self.config.reproduction,
            &self.config.agents,
            tunables.mutation_rate,
            now,
            &mut self.rng,
        );
        let birth_count = births.len();
        events.extend(births.into_iter().map(SimEvent::AgentBorn));

        self.time = now;
        self.tick += 1;

        // Phase 4: Notify
        self.dispatch(&events);

        // Phase 5: Statistics
        self.refresh_stats(birth_count, death_count, eaten.len());
        if self.stats_history.is_due(self.tick) {
            self.stats_history.record(self.stats.clone());
            debug!("{}", self.stats.summary());
        }
        if death_count > 0 && self.registry.is_empty() {
            info!("Population extinct at t={:.1}s (tick {})", self.time, self.tick);
        }
    }

    fn dispatch(&mut self, events: &[SimEvent]) {
        for event in events {
            self.genealogy.apply(event);
            self.bus.publish(event);
        }
    }

    fn refresh_stats(&mut self, births: usize, deaths: usize, food_eaten: usize) {
        self.stats.tick = self.tick;
        self.stats.time = self.time;
        self.stats.births = births;
        self.stats.deaths = deaths;
        self.stats.food_eaten = food_eaten;
        self.stats
            .update(self.registry.agents(), &self.food, &self.scorer);
        self.stats.update_genealogy(&self.genealogy.stats());
    }

    /// Run simulation for specified number of ticks
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Run simulation with callback for progress updates
    pub fn run_with_callback<F>(&mut self, ticks: u64, mut callback: F)
    where
        F: FnMut(&World, u64),
    {
        for i in 0..ticks {
            self.step();
            callback(self, i);
        }
    }

    /// Discard all agents, food and history and seed again from the config.
    ///
    /// Subscribers, tunables and the scorer are kept.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.food.clear();
        self.genealogy.clear();
        self.stats = Stats::new();
        self.stats_history = StatsHistory::new(self.config.logging.stats_interval);
        self.time = 0.0;
        self.tick = 0;
        self.populate();
        info!("World reset with {} agents", self.registry.len());
    }

    /// Change the arena size between ticks. Agents outside the new bounds are
    /// pushed back in on the next tick.
    pub fn resize(&mut self, width: f32, height: f32) {
        let fix = |v: f32, current: f32| {
            if !v.is_finite() {
                current
            } else {
                v.max(1.0)
            }
        };
        let size = Vec2::new(fix(width, self.bounds.x), fix(height, self.bounds.y));
        if size.x != width || size.y != height {
            warn!(
                "Invalid world size {}x{}, using {}x{}",
                width, height, size.x, size.y
            );
        }

        self.bounds = size;
        self.config.world.width = size.x;
        self.config.world.height = size.y;
        self.agent_grid.resize(size.x, size.y);
        self.food_grid.resize(size.x, size.y);
        info!("World resized to {}x{}", size.x, size.y);
    }

    /// Replace the hazard table; takes effect on the next tick
    pub fn set_hazards(&mut self, hazards: HazardTable) {
        self.config.hazards = hazards;
    }

    /// Register a handler for one event kind
    pub fn subscribe<H>(&mut self, kind: EventKind, handler: H) -> SubscriptionId
    where
        H: EventHandler + Send + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn set_scorer(&mut self, scorer: Scorer) {
        self.scorer = scorer;
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Fitness of one live agent
    pub fn fitness(&self, id: AgentId) -> Option<f32> {
        self.registry.get(id).map(|a| self.scorer.score(a.genome()))
    }

    pub fn agents(&self) -> &[Agent] {
        self.registry.agents()
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.registry.get(id)
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Mutable registry access for external controllers and tests
    pub fn registry_mut(&mut self) -> &mut AgentRegistry {
        &mut self.registry
    }

    pub fn food(&self) -> &FoodField {
        &self.food
    }

    pub fn food_mut(&mut self) -> &mut FoodField {
        &mut self.food
    }

    pub fn genealogy(&self) -> &Genealogy {
        &self.genealogy
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Get current population count
    pub fn population(&self) -> usize {
        self.registry.len()
    }

    /// Check if population is extinct
    pub fn is_extinct(&self) -> bool {
        self.registry.is_empty()
    }

    /// Simulation time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Ticks since creation or the last reset
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("bounds", &self.bounds)
            .field("tick", &self.tick)
            .field("population", &self.registry.len())
            .field("food_items", &self.food.item_count())
            .field("seed", &self.seed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use crate::events::HandlerError;
    use std::sync::{Arc, Mutex};

    type HandlerResult = std::result::Result<(), HandlerError>;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.world.initial_population = 30;
        config.world.width = 400.0;
        config.world.height = 300.0;
        config
    }

    #[test]
    fn test_world_creation() {
        let world = World::new_with_seed(test_config(), 42).unwrap();
        assert_eq!(world.population(), 30);
        assert_eq!(world.genealogy().len(), 30);
        assert_eq!(world.food().hotspot_count(), 4);
        assert_eq!(world.tick(), 0);
        assert_eq!(world.stats_history.len(), 1);
    }

    #[test]
    fn test_invalid_size_rejected() {
        let mut config = test_config();
        config.world.height = -1.0;
        assert!(matches!(
            World::new_with_seed(config, 1),
            Err(SimError::InvalidWorldSize { .. })
        ));
    }

    #[test]
    fn test_world_step() {
        let mut world = World::new_with_seed(test_config(), 42).unwrap();
        world.step();
        assert_eq!(world.tick(), 1);
        assert!((world.time() - world.config.world.dt as f64).abs() < 1e-9);
    }

    #[test]
    fn test_reproducibility() {
        let mut a = World::new_with_seed(test_config(), 12345).unwrap();
        let mut b = World::new_with_seed(test_config(), 12345).unwrap();
        a.run(200);
        b.run(200);

        assert_eq!(a.population(), b.population());
        for (x, y) in a.agents().iter().zip(b.agents()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.position, y.position);
            assert_eq!(x.energy(), y.energy());
        }
    }

    #[test]
    fn test_events_reach_subscribers_and_genealogy() {
        let mut world = World::new_with_seed(test_config(), 7).unwrap();
        let births = Arc::new(Mutex::new(0usize));
        let deaths = Arc::new(Mutex::new(0usize));

        let b = Arc::clone(&births);
        world.subscribe(EventKind::AgentBorn, move |_: &SimEvent| -> HandlerResult {
            *b.lock().unwrap() += 1;
            Ok(())
        });
        let d = Arc::clone(&deaths);
        world.subscribe(EventKind::AgentDied, move |_: &SimEvent| -> HandlerResult {
            *d.lock().unwrap() += 1;
            Ok(())
        });

        world.run(600);

        let births = *births.lock().unwrap();
        let deaths = *deaths.lock().unwrap();
        assert_eq!(world.population(), 30 + births - deaths);
        assert_eq!(world.genealogy().len(), 30 + births);
        assert_eq!(world.genealogy().stats().alive_count, world.population());
    }

    #[test]
    fn test_zero_speed_scale_freezes_agents() {
        let mut world = World::new_with_seed(test_config(), 3).unwrap();
        world.tunables.speed_scale = 0.0;
        let before: Vec<Vec2> = world.agents().iter().map(|a| a.position).collect();
        world.step();
        for (agent, pos) in world.agents().iter().zip(before) {
            assert_eq!(agent.position, pos);
        }
    }

    #[test]
    fn test_out_of_range_tunables_do_not_stop_the_tick() {
        let mut world = World::new_with_seed(test_config(), 3).unwrap();
        world.tunables.mutation_rate = f32::NAN;
        world.tunables.food_spawn_rate = -4.0;
        world.run(10);
        assert_eq!(world.tick(), 10);
    }

    #[test]
    fn test_reset() {
        let mut world = World::new_with_seed(test_config(), 9).unwrap();
        world.run(50);
        world.reset();
        assert_eq!(world.tick(), 0);
        assert_eq!(world.time(), 0.0);
        assert_eq!(world.population(), 30);
        assert_eq!(world.genealogy().len(), 30);
        assert_eq!(world.agents()[0].id, 0);
    }

    #[test]
    fn test_resize_pushes_agents_in() {
        let mut world = World::new_with_seed(test_config(), 11).unwrap();
        world.resize(100.0, 80.0);
        world.step();
        for agent in world.agents() {
            assert!(agent.position.x <= 100.0 && agent.position.y <= 80.0);
        }

        world.resize(f32::NAN, -5.0);
        assert_eq!(world.bounds(), Vec2::new(100.0, 1.0));
    }

    #[test]
    fn test_seed_population_new_groups() {
        let mut world = World::new_with_seed(test_config(), 5).unwrap();
        let max_group = world.agents().iter().map(|a| a.lineage_group).max().unwrap();
        let ids = world.seed_population(2);
        assert_eq!(ids.len(), 2);
        assert_eq!(world.agent(ids[0]).unwrap().lineage_group, max_group + 1);
        assert_eq!(world.agent(ids[1]).unwrap().lineage_group, max_group + 2);
    }
}
