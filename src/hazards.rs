//! Environmental hazards: edge-proximity and periodic damage rules.
//!
//! The hazard table is external configuration. It is read once per tick and
//! never written by the simulation; malformed entries are clamped (or skipped)
//! and reported once.

use glam::Vec2;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Hazard name -> parameters
pub type HazardTable = BTreeMap<String, HazardSpec>;

/// Parameters of one hazard rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardSpec {
    pub enabled: bool,
    /// Distance from the nearest edge inside which the hazard applies.
    /// For periodic hazards a non-positive range means the whole arena.
    pub range: f32,
    /// Continuous energy damage per second
    pub damage_per_second: f32,
    /// Knock-back speed for edge hazards, burst damage for periodic ones
    pub impulse: f32,
    /// Seconds between pulses (periodic hazards only)
    pub period: f32,
}

impl Default for HazardSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            range: 0.0,
            damage_per_second: 0.0,
            impulse: 0.0,
            period: 0.0,
        }
    }
}

/// Default table with every known hazard present but disabled
pub fn default_table() -> HazardTable {
    let mut table = HazardTable::new();
    table.insert(
        "acid".to_string(),
        HazardSpec {
            range: 25.0,
            damage_per_second: 4.0,
            ..Default::default()
        },
    );
    table.insert(
        "barbed".to_string(),
        HazardSpec {
            range: 12.0,
            damage_per_second: 6.0,
            impulse: 40.0,
            ..Default::default()
        },
    );
    table.insert(
        "fence".to_string(),
        HazardSpec {
            range: 8.0,
            impulse: 60.0,
            ..Default::default()
        },
    );
    table.insert(
        "nano".to_string(),
        HazardSpec {
            range: 0.0,
            impulse: 10.0,
            period: 20.0,
            ..Default::default()
        },
    );
    table
}

/// Known hazard behaviors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardKind {
    /// Damage over time near the edges
    Acid,
    /// Damage over time plus knock-back near the edges
    Barbed,
    /// Knock-back near the edges
    Fence,
    /// Periodic burst damage
    Nano,
}

impl HazardKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "acid" => Some(HazardKind::Acid),
            "barbed" => Some(HazardKind::Barbed),
            "fence" => Some(HazardKind::Fence),
            "nano" => Some(HazardKind::Nano),
            _ => None,
        }
    }
}

/// A validated, enabled hazard ready to be evaluated this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveHazard {
    pub kind: HazardKind,
    pub range: f32,
    pub damage_per_second: f32,
    pub impulse: f32,
    pub period: f32,
}

/// Result of evaluating hazards at one position
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HazardEffect {
    /// Energy damage before the defense factor
    pub damage: f32,
    /// Velocity change
    pub impulse: Vec2,
}

impl HazardEffect {
    fn merge(&mut self, other: HazardEffect) {
        self.damage += other.damage;
        self.impulse += other.impulse;
    }
}

/// Distance to the nearest edge and the inward normal of that edge
fn nearest_edge(pos: Vec2, bounds: Vec2) -> (f32, Vec2) {
    let candidates = [
        (pos.x, Vec2::X),
        (bounds.x - pos.x, -Vec2::X),
        (pos.y, Vec2::Y),
        (bounds.y - pos.y, -Vec2::Y),
    ];
    candidates
        .into_iter()
        .fold((f32::INFINITY, Vec2::ZERO), |best, c| if c.0 < best.0 { c } else { best })
}

impl ActiveHazard {
    /// Effect on a body at `pos` over the tick ending at `now`
    pub fn effect(&self, pos: Vec2, bounds: Vec2, dt: f32, now: f64) -> HazardEffect {
        let (edge_dist, inward) = nearest_edge(pos, bounds);
        let near_edge = edge_dist < self.range;

        match self.kind {
            HazardKind::Acid if near_edge => HazardEffect {
                damage: self.damage_per_second * dt,
                impulse: Vec2::ZERO,
            },
            HazardKind::Barbed if near_edge => HazardEffect {
                damage: self.damage_per_second * dt,
                impulse: inward * self.impulse,
            },
            HazardKind::Fence if near_edge => HazardEffect {
                damage: self.damage_per_second * dt,
                impulse: inward * self.impulse,
            },
            HazardKind::Nano => {
                let in_zone = self.range <= 0.0 || near_edge;
                if in_zone && pulse_fired(self.period, dt, now) {
                    HazardEffect {
                        damage: self.impulse + self.damage_per_second * dt,
                        impulse: Vec2::ZERO,
                    }
                } else {
                    HazardEffect::default()
                }
            }
            _ => HazardEffect::default(),
        }
    }
}

/// True when a multiple of `period` falls inside `(now - dt, now]`
fn pulse_fired(period: f32, dt: f32, now: f64) -> bool {
    if !(period > 0.0) {
        return false;
    }
    let period = period as f64;
    let before = ((now - dt as f64) / period).floor();
    let after = (now / period).floor();
    after > before
}

/// Resolves the external hazard table each tick, warning once per problem.
#[derive(Debug, Default)]
pub struct HazardField {
    warned: HashSet<String>,
}

impl HazardField {
    pub fn new() -> Self {
        Self::default()
    }

    fn warn_once(&mut self, key: String, message: impl FnOnce() -> String) {
        if self.warned.insert(key) {
            warn!("{}", message());
        }
    }

    fn sanitize(&mut self, name: &str, field: &str, value: f32) -> f32 {
        if value.is_finite() && value >= 0.0 {
            return value;
        }
        self.warn_once(format!("{name}.{field}"), || {
            format!("hazard '{name}': {field} = {value} is invalid, clamped to 0")
        });
        0.0
    }

    /// Enabled hazards with sanitized parameters. Unknown names are skipped.
    pub fn resolve(&mut self, table: &HazardTable) -> Vec<ActiveHazard> {
        let mut active = Vec::new();
        for (name, spec) in table {
            if !spec.enabled {
                continue;
            }
            let Some(kind) = HazardKind::from_name(name) else {
                self.warn_once(format!("{name}.kind"), || {
                    format!("unknown hazard '{name}' ignored")
                });
                continue;
            };
            let hazard = ActiveHazard {
                kind,
                range: self.sanitize(name, "range", spec.range),
                damage_per_second: self.sanitize(name, "damage_per_second", spec.damage_per_second),
                impulse: self.sanitize(name, "impulse", spec.impulse),
                period: self.sanitize(name, "period", spec.period),
            };
            if kind == HazardKind::Nano && hazard.period <= 0.0 {
                self.warn_once(format!("{name}.period"), || {
                    format!("hazard '{name}' needs a positive period, skipped")
                });
                continue;
            }
            active.push(hazard);
        }
        active
    }

    /// Number of distinct problems reported so far
    pub fn warning_count(&self) -> usize {
        self.warned.len()
    }
}

/// Combined effect of all active hazards at one position
pub fn combined_effect(
    hazards: &[ActiveHazard],
    pos: Vec2,
    bounds: Vec2,
    dt: f32,
    now: f64,
) -> HazardEffect {
    let mut total = HazardEffect::default();
    for hazard in hazards {
        total.merge(hazard.effect(pos, bounds, dt, now));
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(mut spec: HazardSpec) -> HazardSpec {
        spec.enabled = true;
        spec
    }

    #[test]
    fn test_default_table_disabled() {
        let mut field = HazardField::new();
        assert!(field.resolve(&default_table()).is_empty());
    }

    #[test]
    fn test_acid_only_near_edges() {
        let bounds = Vec2::new(200.0, 200.0);
        let acid = ActiveHazard {
            kind: HazardKind::Acid,
            range: 20.0,
            damage_per_second: 6.0,
            impulse: 0.0,
            period: 0.0,
        };
        let near = acid.effect(Vec2::new(5.0, 100.0), bounds, 0.5, 1.0);
        assert!((near.damage - 3.0).abs() < 1e-6);
        let far = acid.effect(Vec2::new(100.0, 100.0), bounds, 0.5, 1.0);
        assert_eq!(far.damage, 0.0);
    }

    #[test]
    fn test_fence_pushes_inward() {
        let bounds = Vec2::new(200.0, 200.0);
        let fence = ActiveHazard {
            kind: HazardKind::Fence,
            range: 10.0,
            damage_per_second: 0.0,
            impulse: 30.0,
            period: 0.0,
        };
        let e = fence.effect(Vec2::new(100.0, 195.0), bounds, 0.1, 0.0);
        assert_eq!(e.impulse, Vec2::new(0.0, -30.0));
        assert_eq!(e.damage, 0.0);
    }

    #[test]
    fn test_nano_fires_once_per_period() {
        let bounds = Vec2::new(200.0, 200.0);
        let nano = ActiveHazard {
            kind: HazardKind::Nano,
            range: 0.0,
            damage_per_second: 0.0,
            impulse: 10.0,
            period: 1.0,
        };
        let dt = 0.25f32;
        let mut fired = 0;
        for step in 1..=16 {
            let now = step as f64 * dt as f64;
            if nano.effect(Vec2::new(100.0, 100.0), bounds, dt, now).damage > 0.0 {
                fired += 1;
            }
        }
        assert_eq!(fired, 4);
    }

    #[test]
    fn test_resolve_clamps_and_skips() {
        let mut table = HazardTable::new();
        table.insert(
            "acid".to_string(),
            enabled(HazardSpec {
                range: -5.0,
                damage_per_second: f32::NAN,
                ..Default::default()
            }),
        );
        table.insert("lava".to_string(), enabled(HazardSpec::default()));
        table.insert("nano".to_string(), enabled(HazardSpec::default()));

        let mut field = HazardField::new();
        let active = field.resolve(&table);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].range, 0.0);
        assert_eq!(active[0].damage_per_second, 0.0);

        let warnings = field.warning_count();
        assert!(warnings >= 4);
        field.resolve(&table);
        assert_eq!(field.warning_count(), warnings, "warnings are reported once");
    }

    #[test]
    fn test_combined_effect_sums() {
        let bounds = Vec2::new(100.0, 100.0);
        let hazards = [
            ActiveHazard {
                kind: HazardKind::Acid,
                range: 10.0,
                damage_per_second: 2.0,
                impulse: 0.0,
                period: 0.0,
            },
            ActiveHazard {
                kind: HazardKind::Barbed,
                range: 10.0,
                damage_per_second: 3.0,
                impulse: 5.0,
                period: 0.0,
            },
        ];
        let e = combined_effect(&hazards, Vec2::new(2.0, 50.0), bounds, 1.0, 1.0);
        assert!((e.damage - 5.0).abs() < 1e-6);
        assert_eq!(e.impulse, Vec2::new(5.0, 0.0));
    }
}
