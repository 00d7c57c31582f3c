//! Per-tick metrics time series.
//!
//! One [`TickSnapshot`] is appended per engine step. Everything is integer
//! counts in ordered maps, so two runs with the same seed and inputs compare
//! equal snapshot-for-snapshot.

use crate::config::CountermeasureKind;
use misinfo_env::{MisinfoId, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A countermeasure broadcast that went out during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub kind: CountermeasureKind,
    pub misinfo_id: MisinfoId,
    pub tick: Tick,

    /// Users the countermeasure was delivered to
    pub targets: usize,

    /// Shares withdrawn as a direct result
    pub retractions: usize,
}

/// Aggregate state at the end of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub tick: Tick,

    /// Users currently sharing at least one item
    pub active_users: usize,

    /// Cumulative shares across all items
    pub total_shares: u64,

    /// Cumulative retractions across all items
    pub total_retractions: u64,

    /// Per item: users who received or shared it
    pub misinfo_spread: BTreeMap<MisinfoId, usize>,

    /// Per item: users who received a countermeasure for it
    pub countermeasure_coverage: BTreeMap<MisinfoId, usize>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub broadcasts: Vec<BroadcastRecord>,
}

/// Appendable series of snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSeries {
    snapshots: Vec<TickSnapshot>,
}

impl MetricsSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: TickSnapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn snapshots(&self) -> &[TickSnapshot] {
        &self.snapshots
    }

    pub fn last(&self) -> Option<&TickSnapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Cumulative shares at the end of the series.
    pub fn final_total_shares(&self) -> u64 {
        self.last().map_or(0, |s| s.total_shares)
    }

    pub fn peak_active_users(&self) -> usize {
        self.snapshots.iter().map(|s| s.active_users).max().unwrap_or(0)
    }

    /// Every broadcast in tick order.
    pub fn broadcasts(&self) -> impl Iterator<Item = &BroadcastRecord> {
        self.snapshots.iter().flat_map(|s| s.broadcasts.iter())
    }
}
