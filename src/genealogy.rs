//! Append-only family tree built from birth and death notifications.
//!
//! Nodes are never removed. A death (or a birth naming an unknown parent) may
//! arrive before the node's own birth record; a placeholder node is created
//! and filled in when the missing data shows up.

use crate::agent::{AgentId, LineageGroup, Sex};
use crate::error::{Result, SimError};
use crate::events::{BirthEvent, DeathEvent, SimEvent};
use crate::genome::Genome;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

/// Export format version
pub const EXPORT_VERSION: u32 = 1;
const EXPORT_KIND: &str = "genealogy";

/// One agent ever seen by the genealogy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageNode {
    pub id: AgentId,
    pub name: String,
    pub sex: Option<Sex>,
    pub lineage_group_id: Option<LineageGroup>,
    pub genome: Option<Genome>,
    pub born_at: Option<f64>,
    pub died_at: Option<f64>,
    pub age_at_death: Option<f32>,
    pub parents: BTreeSet<AgentId>,
    pub children: BTreeSet<AgentId>,
    pub generation: u32,
}

impl LineageNode {
    fn placeholder(id: AgentId) -> Self {
        Self {
            id,
            name: String::new(),
            sex: None,
            lineage_group_id: None,
            genome: None,
            born_at: None,
            died_at: None,
            age_at_death: None,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
            generation: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.died_at.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Aggregate counts over the whole graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenealogyStats {
    pub node_count: usize,
    pub root_count: usize,
    pub leaf_count: usize,
    pub max_generation: u32,
    pub alive_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub parent: AgentId,
    pub child: AgentId,
}

/// Nodes and parent->child edges around a focus node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subtree {
    pub nodes: BTreeSet<AgentId>,
    pub edges: BTreeSet<Edge>,
}

/// Versioned structural export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenealogyExport {
    pub version: u32,
    pub kind: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub nodes: Vec<LineageNode>,
}

#[derive(Debug, Clone, Default)]
pub struct Genealogy {
    nodes: BTreeMap<AgentId, LineageNode>,
}

impl Genealogy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Update the graph from a notification. Food events are ignored.
    pub fn apply(&mut self, event: &SimEvent) {
        match event {
            SimEvent::AgentBorn(birth) => self.record_birth(birth),
            SimEvent::AgentDied(death) => self.record_death(death),
            SimEvent::FoodConsumed(_) => {}
        }
    }

    pub fn record_birth(&mut self, birth: &BirthEvent) {
        let id = birth.child_id;
        let parents: BTreeSet<AgentId> = birth
            .parent_ids
            .iter()
            .copied()
            .filter(|&p| p != id)
            .take(2)
            .collect();

        for &p in &parents {
            self.nodes
                .entry(p)
                .or_insert_with(|| LineageNode::placeholder(p))
                .children
                .insert(id);
        }

        let node = self
            .nodes
            .entry(id)
            .or_insert_with(|| LineageNode::placeholder(id));
        node.name = birth.name.clone();
        node.sex = Some(birth.sex);
        node.lineage_group_id = Some(birth.lineage_group_id);
        node.genome = Some(birth.genome);
        node.born_at = Some(birth.at);
        node.parents = parents;

        self.propagate_generation(id);
    }

    pub fn record_death(&mut self, death: &DeathEvent) {
        let node = self
            .nodes
            .entry(death.id)
            .or_insert_with(|| LineageNode::placeholder(death.id));
        node.died_at = Some(death.at);
        node.age_at_death = Some(death.age);

        if node.name.is_empty() {
            node.name = death.name.clone();
        }
        node.sex.get_or_insert(death.sex);
        node.lineage_group_id.get_or_insert(death.lineage_group_id);
        node.genome.get_or_insert(death.genome);
    }

    fn generation_from_parents(&self, id: AgentId) -> u32 {
        self.nodes
            .get(&id)
            .map(|node| {
                node.parents
                    .iter()
                    .filter_map(|p| self.nodes.get(p))
                    .map(|p| p.generation + 1)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Recompute `id`'s generation and push changes down to its descendants
    fn propagate_generation(&mut self, id: AgentId) {
        let mut queue = VecDeque::from([id]);
        let mut visits = 0usize;
        let limit = self.nodes.len().saturating_mul(4).max(16);

        while let Some(current) = queue.pop_front() {
            visits += 1;
            if visits > limit {
                warn!(
                    "generation propagation from {} stopped after {} visits (cyclic parents?)",
                    id, limit
                );
                break;
            }
            let generation = self.generation_from_parents(current);
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            if node.generation == generation && current != id {
                continue;
            }
            node.generation = generation;
            queue.extend(node.children.iter().copied());
        }
    }

    pub fn get_node(&self, id: AgentId) -> Option<&LineageNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LineageNode> {
        self.nodes.values()
    }

    /// Parent nodes of `id`; empty for roots and unknown ids
    pub fn parents(&self, id: AgentId) -> Vec<&LineageNode> {
        self.related(id, |n| &n.parents)
    }

    pub fn children(&self, id: AgentId) -> Vec<&LineageNode> {
        self.related(id, |n| &n.children)
    }

    fn related<F>(&self, id: AgentId, pick: F) -> Vec<&LineageNode>
    where
        F: Fn(&LineageNode) -> &BTreeSet<AgentId>,
    {
        self.nodes
            .get(&id)
            .map(|n| pick(n).iter().filter_map(|r| self.nodes.get(r)).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> GenealogyStats {
        let mut stats = GenealogyStats {
            node_count: self.nodes.len(),
            ..Default::default()
        };
        for node in self.nodes.values() {
            if node.is_root() {
                stats.root_count += 1;
            }
            if node.is_leaf() {
                stats.leaf_count += 1;
            }
            if node.is_alive() {
                stats.alive_count += 1;
            }
            stats.max_generation = stats.max_generation.max(node.generation);
        }
        stats
    }

    /// Ids reachable from `id` within `depth` hops along `pick`, excluding `id`
    fn walk<F>(&self, id: AgentId, depth: Option<usize>, pick: F) -> BTreeSet<AgentId>
    where
        F: Fn(&LineageNode) -> &BTreeSet<AgentId>,
    {
        let mut seen = BTreeSet::new();
        let mut frontier = vec![id];
        let mut level = 0;
        while !frontier.is_empty() && depth.map_or(true, |d| level < d) {
            let mut next = Vec::new();
            for current in frontier {
                let Some(node) = self.nodes.get(&current) else {
                    continue;
                };
                for &r in pick(node) {
                    if r != id && seen.insert(r) {
                        next.push(r);
                    }
                }
            }
            frontier = next;
            level += 1;
        }
        seen
    }

    /// Every known ancestor of `id`
    pub fn ancestors(&self, id: AgentId) -> BTreeSet<AgentId> {
        self.walk(id, None, |n| &n.parents)
    }

    /// Every known descendant of `id`
    pub fn descendants(&self, id: AgentId) -> BTreeSet<AgentId> {
        self.walk(id, None, |n| &n.children)
    }

    /// Nodes within `up` generations above and `down` generations below `focus`,
    /// with the parent->child edges between them. Empty for an unknown focus.
    pub fn subtree(&self, focus: AgentId, up: usize, down: usize) -> Subtree {
        if !self.nodes.contains_key(&focus) {
            return Subtree::default();
        }

        let mut nodes = BTreeSet::from([focus]);
        nodes.extend(self.walk(focus, Some(up), |n| &n.parents));
        nodes.extend(self.walk(focus, Some(down), |n| &n.children));

        let mut edges = BTreeSet::new();
        for &child in &nodes {
            if let Some(node) = self.nodes.get(&child) {
                for &parent in &node.parents {
                    if nodes.contains(&parent) {
                        edges.insert(Edge { parent, child });
                    }
                }
            }
        }
        Subtree { nodes, edges }
    }

    /// Nodes whose id starts with the query or whose name contains it (case-insensitive)
    pub fn search(&self, query: &str) -> Vec<&LineageNode> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.nodes
            .values()
            .filter(|n| {
                n.id.to_string().starts_with(&query) || n.name.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn export(&self) -> GenealogyExport {
        GenealogyExport {
            version: EXPORT_VERSION,
            kind: EXPORT_KIND.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            nodes: self.nodes.values().cloned().collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    /// Write the export document to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Rebuild a graph from an export document. Child sets are re-derived
    /// from parent links so the result is always symmetric.
    pub fn from_export(export: GenealogyExport) -> Result<Self> {
        if export.kind != EXPORT_KIND {
            return Err(SimError::InvalidExport(format!(
                "expected kind '{}', got '{}'",
                EXPORT_KIND, export.kind
            )));
        }
        if export.version > EXPORT_VERSION {
            return Err(SimError::InvalidExport(format!(
                "unsupported version {}",
                export.version
            )));
        }

        let mut genealogy = Genealogy::new();
        for mut node in export.nodes {
            node.children.clear();
            genealogy.nodes.insert(node.id, node);
        }

        let links: Vec<(AgentId, AgentId)> = genealogy
            .nodes
            .values()
            .flat_map(|n| n.parents.iter().map(move |&p| (p, n.id)))
            .collect();
        for (parent, child) in links {
            genealogy
                .nodes
                .entry(parent)
                .or_insert_with(|| LineageNode::placeholder(parent))
                .children
                .insert(child);
        }
        Ok(genealogy)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_export(serde_json::from_str(json)?)
    }
}
