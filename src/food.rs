//! Food field: drifting hotspots that own clusters of food items.
//!
//! Each item belongs to exactly one hotspot. Hotspots are never destroyed;
//! once their items are eaten they stay dormant. Item membership is kept in
//! two places (the global item map and the owning hotspot's set) and every
//! mutation updates both inside one call.

use crate::agent::{Agent, AgentId};
use crate::grid::SpatialGrid;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type FoodId = u64;
pub type HotspotId = u32;

/// How an item picks its eater when several agents are in range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsumptionRule {
    /// First agent found in the spatial scan. Biased toward scan order.
    #[default]
    FirstMatch,
    /// Closest agent in range
    Nearest,
}

/// Configuration for food hotspots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodConfig {
    /// Expected hotspot spawns per second (initial tunable value)
    pub spawn_rate: f32,
    pub hotspot_radius: f32,
    pub items_per_hotspot: usize,
    pub item_energy: f32,
    /// Max hotspot drift per second along each axis
    pub drift_speed: f32,
    /// Hotspots placed when the world is seeded
    pub initial_hotspots: usize,
    /// Spawning pauses while this many items exist
    pub max_items: usize,
    pub consumption_rule: ConsumptionRule,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            spawn_rate: 0.4,
            hotspot_radius: 40.0,
            items_per_hotspot: 10,
            item_energy: 20.0,
            drift_speed: 6.0,
            initial_hotspots: 4,
            max_items: 600,
            consumption_rule: ConsumptionRule::FirstMatch,
        }
    }
}

/// A single food item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: FoodId,
    pub position: Vec2,
    pub energy: f32,
    pub hotspot: HotspotId,
}

/// A drifting cluster of food
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: HotspotId,
    pub center: Vec2,
    pub radius: f32,
    items: BTreeSet<FoodId>,
}

impl Hotspot {
    pub fn items(&self) -> &BTreeSet<FoodId> {
        &self.items
    }

    /// A hotspot with no items left
    pub fn is_dormant(&self) -> bool {
        self.items.is_empty()
    }
}

/// One item eaten this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consumption {
    /// Index of the eater in the agent slice passed to [`FoodField::consume`]
    pub agent_index: usize,
    pub agent_id: AgentId,
    pub food_id: FoodId,
    pub energy: f32,
}

/// All hotspots and the items they own
#[derive(Debug, Clone, Default)]
pub struct FoodField {
    /// Indexed by hotspot id
    hotspots: Vec<Hotspot>,
    items: BTreeMap<FoodId, FoodItem>,
    next_food_id: FoodId,
}

/// Reflect a coordinate back into `[0, max]`
fn reflect(v: f32, max: f32) -> f32 {
    let r = if v < 0.0 {
        -v
    } else if v > max {
        2.0 * max - v
    } else {
        v
    };
    r.clamp(0.0, max.max(0.0))
}

impl FoodField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every hotspot and item
    pub fn clear(&mut self) {
        self.hotspots.clear();
        self.items.clear();
        self.next_food_id = 0;
    }

    /// Place the initial hotspots
    pub fn seed(&mut self, config: &FoodConfig, bounds: Vec2, rng: &mut impl Rng) {
        for _ in 0..config.initial_hotspots {
            let center = Vec2::new(rng.gen_range(0.0..=bounds.x), rng.gen_range(0.0..=bounds.y));
            self.spawn_hotspot(center, config, bounds, rng);
        }
    }

    /// One tick of drift and spawning. Returns the id of a new hotspot, if any.
    pub fn step(
        &mut self,
        dt: f32,
        spawn_rate: f32,
        bounds: Vec2,
        config: &FoodConfig,
        rng: &mut impl Rng,
    ) -> Option<HotspotId> {
        self.drift(dt, config.drift_speed, bounds, rng);
        self.maybe_spawn(dt, spawn_rate, bounds, config, rng)
    }

    /// Random-walk every hotspot and carry its items along rigidly
    pub fn drift(&mut self, dt: f32, drift_speed: f32, bounds: Vec2, rng: &mut impl Rng) {
        let step = drift_speed.max(0.0) * dt;
        if step <= 0.0 {
            return;
        }
        for hotspot in &mut self.hotspots {
            let proposed = hotspot.center
                + Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0)) * step;
            let moved = Vec2::new(reflect(proposed.x, bounds.x), reflect(proposed.y, bounds.y));
            let delta = moved - hotspot.center;
            hotspot.center = moved;

            for id in &hotspot.items {
                if let Some(item) = self.items.get_mut(id) {
                    item.position += delta;
                }
            }
        }
    }

    /// Spawn a hotspot with probability `spawn_rate * dt`
    pub fn maybe_spawn(
        &mut self,
        dt: f32,
        spawn_rate: f32,
        bounds: Vec2,
        config: &FoodConfig,
        rng: &mut impl Rng,
    ) -> Option<HotspotId> {
        if self.items.len() >= config.max_items {
            return None;
        }
        let p = (spawn_rate * dt).clamp(0.0, 1.0);
        if rng.gen::<f32>() >= p {
            return None;
        }
        let center = Vec2::new(rng.gen_range(0.0..=bounds.x), rng.gen_range(0.0..=bounds.y));
        Some(self.spawn_hotspot(center, config, bounds, rng))
    }

    /// Create a hotspot at `center` seeded with items scattered uniformly inside its radius
    pub fn spawn_hotspot(
        &mut self,
        center: Vec2,
        config: &FoodConfig,
        bounds: Vec2,
        rng: &mut impl Rng,
    ) -> HotspotId {
        let id = self.hotspots.len() as HotspotId;
        let radius = config.hotspot_radius.max(0.0);
        let mut hotspot = Hotspot {
            id,
            center,
            radius,
            items: BTreeSet::new(),
        };

        for _ in 0..config.items_per_hotspot {
            let r = radius * rng.gen::<f32>().sqrt();
            let theta = rng.gen_range(0.0..std::f32::consts::TAU);
            let offset = Vec2::new(theta.cos(), theta.sin()) * r;
            let position = (center + offset).clamp(Vec2::ZERO, bounds.max(Vec2::ZERO));

            let food_id = self.next_food_id;
            self.next_food_id += 1;
            self.items.insert(
                food_id,
                FoodItem {
                    id: food_id,
                    position,
                    energy: config.item_energy.max(0.0),
                    hotspot: id,
                },
            );
            hotspot.items.insert(food_id);
        }

        self.hotspots.push(hotspot);
        id
    }

    /// Detach an item from its hotspot and the global collection
    pub fn remove_item(&mut self, id: FoodId) -> Option<FoodItem> {
        let item = self.items.remove(&id)?;
        if let Some(hotspot) = self.hotspots.get_mut(item.hotspot as usize) {
            hotspot.items.remove(&id);
        }
        Some(item)
    }

    /// Move an item to another hotspot. Returns false if either side is unknown.
    pub fn reparent(&mut self, id: FoodId, target: HotspotId) -> bool {
        if target as usize >= self.hotspots.len() {
            return false;
        }
        let Some(item) = self.items.get_mut(&id) else {
            return false;
        };
        let source = item.hotspot;
        if source == target {
            return true;
        }
        item.hotspot = target;
        self.hotspots[source as usize].items.remove(&id);
        self.hotspots[target as usize].items.insert(id);
        true
    }

    /// Let agents in pickup range eat items.
    ///
    /// `grid` indexes `agents` by slice position; `max_pickup_radius` must be
    /// at least every agent's pickup radius. Eaten items are removed before
    /// this returns; crediting energy is up to the caller.
    pub fn consume(
        &mut self,
        agents: &[Agent],
        grid: &SpatialGrid<usize>,
        max_pickup_radius: f32,
        rule: ConsumptionRule,
    ) -> Vec<Consumption> {
        let mut eaten = Vec::new();

        for item in self.items.values() {
            let mut chosen: Option<(usize, f32)> = None;
            grid.visit_circle(item.position.x, item.position.y, max_pickup_radius, |_, idx| {
                if rule == ConsumptionRule::FirstMatch && chosen.is_some() {
                    return;
                }
                let Some(agent) = agents.get(idx) else {
                    return;
                };
                let d = agent.position.distance(item.position);
                if d > agent.phenotype().pickup_radius {
                    return;
                }
                match chosen {
                    Some((_, best)) if best <= d => {}
                    _ => chosen = Some((idx, d)),
                }
            });

            if let Some((idx, _)) = chosen {
                eaten.push(Consumption {
                    agent_index: idx,
                    agent_id: agents[idx].id,
                    food_id: item.id,
                    energy: item.energy,
                });
            }
        }

        for c in &eaten {
            self.remove_item(c.food_id);
        }
        eaten
    }

    pub fn items(&self) -> impl Iterator<Item = &FoodItem> {
        self.items.values()
    }

    pub fn item(&self, id: FoodId) -> Option<&FoodItem> {
        self.items.get(&id)
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn hotspot_count(&self) -> usize {
        self.hotspots.len()
    }

    pub fn dormant_count(&self) -> usize {
        self.hotspots.iter().filter(|h| h.is_dormant()).count()
    }

    pub fn total_energy(&self) -> f32 {
        self.items.values().map(|i| i.energy).sum()
    }

    /// Rebuild a food index from current item positions
    pub fn index_into(&self, grid: &mut SpatialGrid<FoodId>) {
        grid.clear();
        for item in self.items.values() {
            grid.insert(item.position.x, item.position.y, item.id);
        }
    }
}
