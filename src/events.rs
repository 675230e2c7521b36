//! Notification stream: births, deaths and food consumption.
//!
//! Handlers subscribe per event kind and are called synchronously in
//! subscription order. A handler that returns an error or panics is logged and
//! skipped; delivery to the remaining handlers continues.

use crate::agent::{Agent, AgentId, DeathCause, LineageGroup, Sex};
use crate::food::FoodId;
use crate::genome::Genome;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

/// A new agent was created by reproduction or seeding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthEvent {
    pub child_id: AgentId,
    pub name: String,
    pub genome: Genome,
    pub sex: Sex,
    pub lineage_group_id: LineageGroup,
    /// Zero, one or two parent ids
    pub parent_ids: Vec<AgentId>,
    /// Simulation time in seconds
    pub at: f64,
}

impl BirthEvent {
    /// Birth record for an agent as it exists now
    pub fn of(agent: &Agent, at: f64) -> Self {
        Self {
            child_id: agent.id,
            name: agent.name.clone(),
            genome: *agent.genome(),
            sex: agent.sex,
            lineage_group_id: agent.lineage_group,
            parent_ids: agent.parents.iter().flatten().copied().collect(),
            at,
        }
    }
}

/// An agent was removed from the registry.
///
/// Carries enough identity to backfill a genealogy node that never saw the birth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathEvent {
    pub id: AgentId,
    pub name: String,
    pub sex: Sex,
    pub lineage_group_id: LineageGroup,
    pub genome: Genome,
    /// Age in seconds
    pub age: f32,
    pub cause: DeathCause,
    pub at: f64,
}

/// An agent ate a food item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodConsumedEvent {
    pub agent_id: AgentId,
    pub food_id: FoodId,
    pub energy: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SimEvent {
    AgentBorn(BirthEvent),
    AgentDied(DeathEvent),
    FoodConsumed(FoodConsumedEvent),
}

impl SimEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::AgentBorn(_) => EventKind::AgentBorn,
            SimEvent::AgentDied(_) => EventKind::AgentDied,
            SimEvent::FoodConsumed(_) => EventKind::FoodConsumed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    AgentBorn,
    AgentDied,
    FoodConsumed,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::AgentBorn,
        EventKind::AgentDied,
        EventKind::FoodConsumed,
    ];
}

/// Failure reported by a subscriber
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Receives events of the kinds it subscribed to
pub trait EventHandler {
    fn handle(&mut self, event: &SimEvent) -> Result<(), HandlerError>;
}

impl<F> EventHandler for F
where
    F: FnMut(&SimEvent) -> Result<(), HandlerError>,
{
    fn handle(&mut self, event: &SimEvent) -> Result<(), HandlerError> {
        self(event)
    }
}

pub type SubscriptionId = u64;

struct Subscriber {
    id: SubscriptionId,
    handler: Box<dyn EventHandler + Send>,
}

/// Typed publish/subscribe registry
#[derive(Default)]
pub struct EventBus {
    handlers: BTreeMap<EventKind, Vec<Subscriber>>,
    next_id: SubscriptionId,
    failures: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .field("failures", &self.failures)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind
    pub fn subscribe<H>(&mut self, kind: EventKind, handler: H) -> SubscriptionId
    where
        H: EventHandler + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.entry(kind).or_default().push(Subscriber {
            id,
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a handler. Returns false if the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for subscribers in self.handlers.values_mut() {
            if let Some(pos) = subscribers.iter().position(|s| s.id == id) {
                subscribers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver an event to every subscriber of its kind.
    ///
    /// Returns how many handlers accepted it.
    pub fn publish(&mut self, event: &SimEvent) -> usize {
        let Some(subscribers) = self.handlers.get_mut(&event.kind()) else {
            return 0;
        };

        let mut delivered = 0;
        for sub in subscribers.iter_mut() {
            let outcome = catch_unwind(AssertUnwindSafe(|| sub.handler.handle(event)));
            match outcome {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    self.failures += 1;
                    warn!("event handler {} failed on {:?}: {}", sub.id, event.kind(), e);
                }
                Err(_) => {
                    self.failures += 1;
                    error!("event handler {} panicked on {:?}", sub.id, event.kind());
                }
            }
        }
        delivered
    }

    /// Total handler failures (errors and panics) so far
    pub fn failure_count(&self) -> u64 {
        self.failures
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn food_event(agent_id: AgentId) -> SimEvent {
        SimEvent::FoodConsumed(FoodConsumedEvent {
            agent_id,
            food_id: 0,
            energy: 5.0,
        })
    }

    #[test]
    fn test_publish_routes_by_kind() {
        let mut bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(EventKind::FoodConsumed, move |e: &SimEvent| -> Result<(), HandlerError> {
            sink.lock().unwrap().push(e.kind());
            Ok(())
        });

        assert_eq!(bus.publish(&food_event(1)), 1);
        let death = SimEvent::AgentDied(DeathEvent {
            id: 1,
            name: "Ko".to_string(),
            sex: Sex::Male,
            lineage_group_id: 0,
            genome: Genome::default(),
            age: 3.0,
            cause: DeathCause::OldAge,
            at: 3.0,
        });
        assert_eq!(bus.publish(&death), 0);
        assert_eq!(*seen.lock().unwrap(), vec![EventKind::FoodConsumed]);
    }

    #[test]
    fn test_failing_handlers_are_isolated() {
        let mut bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        bus.subscribe(EventKind::FoodConsumed, |_: &SimEvent| -> Result<(), HandlerError> {
            Err(HandlerError::new("nope"))
        });
        bus.subscribe(EventKind::FoodConsumed, |_: &SimEvent| -> Result<(), HandlerError> {
            panic!("handler blew up")
        });
        let c = Arc::clone(&count);
        bus.subscribe(EventKind::FoodConsumed, move |_: &SimEvent| -> Result<(), HandlerError> {
            *c.lock().unwrap() += 1;
            Ok(())
        });

        assert_eq!(bus.publish(&food_event(1)), 1);
        assert_eq!(bus.publish(&food_event(2)), 1);
        assert_eq!(*count.lock().unwrap(), 2);
        assert_eq!(bus.failure_count(), 4);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(EventKind::AgentBorn, |_: &SimEvent| -> Result<(), HandlerError> {
            Ok(())
        });
        assert_eq!(bus.handler_count(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.handler_count(), 0);
    }

    #[test]
    fn test_event_serialization_tags() {
        let json = serde_json::to_string(&food_event(9)).unwrap();
        assert!(json.contains("\"type\":\"food-consumed\""));
        assert!(json.contains("\"agentId\":9"));
    }
}
