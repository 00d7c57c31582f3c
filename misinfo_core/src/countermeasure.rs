//! Countermeasure activation state machine.
//!
//! Per `(controller, misinfo_id)` the state moves forward only:
//!
//! ```text
//! inactive ──activate──► pending ──advance(tick ≥ due)──► active   (fact_check)
//! inactive ──activate──────────────────────────────────► active   (key_node, early_warning)
//! ```
//!
//! The controller never decides *whether* to fire; the engine evaluates the
//! trigger against live aggregate counts and calls [`activate`]. The
//! controller only guarantees that each item fires at most once and that a
//! delayed activation is never released early.
//!
//! [`activate`]: CountermeasureController::activate

use crate::config::{CountermeasureConfig, CountermeasureKind};
use misinfo_env::{MisinfoId, Tick};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A request for the engine to broadcast a countermeasure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastRequest {
    pub kind: CountermeasureKind,
    pub misinfo_id: MisinfoId,
    pub tick: Tick,
}

/// One configured countermeasure and its per-item activation state.
#[derive(Debug, Clone)]
pub struct CountermeasureController {
    config: CountermeasureConfig,

    /// Items waiting for a delayed activation -> tick it is due
    pending: BTreeMap<MisinfoId, Tick>,

    /// Items that have fired -> tick they fired
    active: BTreeMap<MisinfoId, Tick>,
}

impl CountermeasureController {
    pub fn new(config: CountermeasureConfig) -> Self {
        Self {
            config,
            pending: BTreeMap::new(),
            active: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> CountermeasureKind {
        self.config.kind()
    }

    pub fn config(&self) -> &CountermeasureConfig {
        &self.config
    }

    /// True once the item is pending or active. Such items never re-trigger.
    pub fn has_fired(&self, misinfo_id: &MisinfoId) -> bool {
        self.pending.contains_key(misinfo_id) || self.active.contains_key(misinfo_id)
    }

    /// Starts a countermeasure for an item.
    ///
    /// Fact-checks become pending until `current_tick + delay`; other kinds
    /// become active now and return a broadcast request. Items that already
    /// fired are ignored.
    pub fn activate(&mut self, misinfo_id: &MisinfoId, current_tick: Tick) -> Option<BroadcastRequest> {
        if self.has_fired(misinfo_id) {
            return None;
        }

        match self.config {
            CountermeasureConfig::FactCheck { delay, .. } => {
                let due = current_tick.saturating_add(delay);
                info!(
                    "{} scheduled for {} at tick {} (triggered at {})",
                    self.kind(),
                    misinfo_id,
                    due,
                    current_tick
                );
                self.pending.insert(misinfo_id.clone(), due);
                None
            }
            _ => {
                info!("{} activated for {} at tick {}", self.kind(), misinfo_id, current_tick);
                self.active.insert(misinfo_id.clone(), current_tick);
                Some(BroadcastRequest {
                    kind: self.kind(),
                    misinfo_id: misinfo_id.clone(),
                    tick: current_tick,
                })
            }
        }
    }

    /// Releases every pending item whose due tick has arrived.
    pub fn advance(&mut self, current_tick: Tick) -> Vec<BroadcastRequest> {
        let due: Vec<MisinfoId> = self
            .pending
            .iter()
            .filter(|(_, &due_tick)| current_tick >= due_tick)
            .map(|(id, _)| id.clone())
            .collect();

        let mut requests = Vec::with_capacity(due.len());
        for misinfo_id in due {
            self.pending.remove(&misinfo_id);
            self.active.insert(misinfo_id.clone(), current_tick);
            debug!("{} released for {} at tick {}", self.kind(), misinfo_id, current_tick);
            requests.push(BroadcastRequest {
                kind: self.kind(),
                misinfo_id,
                tick: current_tick,
            });
        }
        requests
    }

    /// Tick at which a pending item is due.
    pub fn pending_tick(&self, misinfo_id: &MisinfoId) -> Option<Tick> {
        self.pending.get(misinfo_id).copied()
    }

    /// Tick at which an item became active.
    pub fn activation_tick(&self, misinfo_id: &MisinfoId) -> Option<Tick> {
        self.active.get(misinfo_id).copied()
    }

    pub fn pending(&self) -> &BTreeMap<MisinfoId, Tick> {
        &self.pending
    }

    pub fn active(&self) -> &BTreeMap<MisinfoId, Tick> {
        &self.active
    }

    /// True while any delayed activation is outstanding.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> MisinfoId {
        MisinfoId::from("m1")
    }

    #[test]
    fn test_fact_check_goes_through_pending() {
        let mut cm = CountermeasureController::new(CountermeasureConfig::fact_check(2, 5));

        assert!(cm.activate(&item(), 4).is_none());
        assert_eq!(cm.pending_tick(&item()), Some(9));
        assert!(cm.activation_tick(&item()).is_none());

        assert!(cm.advance(8).is_empty());
        assert_eq!(cm.pending_tick(&item()), Some(9));

        let released = cm.advance(9);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].tick, 9);
        assert_eq!(cm.activation_tick(&item()), Some(9));
        assert!(cm.pending_tick(&item()).is_none());
        assert!(!cm.has_pending());
    }

    #[test]
    fn test_immediate_kinds_skip_pending() {
        for config in [
            CountermeasureConfig::key_node(0.1, 100),
            CountermeasureConfig::early_warning(1, 0.5),
        ] {
            let mut cm = CountermeasureController::new(config);
            let request = cm.activate(&item(), 3).unwrap();
            assert_eq!(request.tick, 3);
            assert_eq!(cm.activation_tick(&item()), Some(3));
            assert!(cm.pending().is_empty());
        }
    }

    #[test]
    fn test_activation_happens_once() {
        let mut cm = CountermeasureController::new(CountermeasureConfig::early_warning(1, 0.5));
        assert!(cm.activate(&item(), 1).is_some());
        assert!(cm.activate(&item(), 2).is_none());
        assert_eq!(cm.activation_tick(&item()), Some(1));

        let mut fc = CountermeasureController::new(CountermeasureConfig::fact_check(1, 3));
        fc.activate(&item(), 0);
        fc.activate(&item(), 1);
        assert_eq!(fc.pending_tick(&item()), Some(3));
        fc.advance(3);
        assert!(fc.activate(&item(), 4).is_none());
        assert!(fc.advance(10).is_empty());
    }

    #[test]
    fn test_late_advance_still_releases() {
        let mut cm = CountermeasureController::new(CountermeasureConfig::fact_check(1, 2));
        cm.activate(&item(), 0);
        let released = cm.advance(7);
        assert_eq!(released.len(), 1);
        assert_eq!(cm.activation_tick(&item()), Some(7));
    }
}
