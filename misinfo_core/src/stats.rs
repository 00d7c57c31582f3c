//! Per-run aggregation table keyed by misinformation item.
//!
//! Owned by the engine and updated the moment a share, retraction or
//! countermeasure delivery happens, so triggers evaluated later in the same
//! tick see every change made earlier in it.

use misinfo_env::{MisinfoId, Tick};
use std::collections::{BTreeMap, BTreeSet};

/// Aggregate statistics for one item. Users are stored as graph indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MisinfoStats {
    /// Tick of the first event that referenced the item
    pub origin_tick: Tick,

    /// Cumulative shares, including the author's
    pub share_count: u64,

    /// Shares withdrawn after a countermeasure
    pub retraction_count: u64,

    sharers: BTreeSet<usize>,
    affected_users: BTreeSet<usize>,
    countermeasure_users: BTreeSet<usize>,
}

impl MisinfoStats {
    fn new(origin_tick: Tick) -> Self {
        Self {
            origin_tick,
            ..Default::default()
        }
    }

    /// Users currently sharing the item.
    pub fn sharers(&self) -> &BTreeSet<usize> {
        &self.sharers
    }

    /// Users who received or shared the item.
    pub fn affected_users(&self) -> &BTreeSet<usize> {
        &self.affected_users
    }

    /// Users who received a countermeasure for the item.
    pub fn countermeasure_users(&self) -> &BTreeSet<usize> {
        &self.countermeasure_users
    }

    /// Shares still standing.
    pub fn live_shares(&self) -> u64 {
        self.share_count.saturating_sub(self.retraction_count)
    }
}

/// All item statistics for one run.
#[derive(Debug, Clone, Default)]
pub struct StatsTable {
    items: BTreeMap<MisinfoId, MisinfoStats>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for an item, creating it at `tick` on first reference.
    pub fn touch(&mut self, misinfo_id: &MisinfoId, tick: Tick) -> &mut MisinfoStats {
        self.items
            .entry(misinfo_id.clone())
            .or_insert_with(|| MisinfoStats::new(tick))
    }

    pub fn record_exposure(&mut self, misinfo_id: &MisinfoId, user: usize, tick: Tick) {
        self.touch(misinfo_id, tick).affected_users.insert(user);
    }

    pub fn record_share(&mut self, misinfo_id: &MisinfoId, user: usize, tick: Tick) {
        let stats = self.touch(misinfo_id, tick);
        stats.share_count += 1;
        stats.sharers.insert(user);
        stats.affected_users.insert(user);
    }

    pub fn record_retraction(&mut self, misinfo_id: &MisinfoId, user: usize, tick: Tick) {
        let stats = self.touch(misinfo_id, tick);
        if stats.sharers.remove(&user) {
            stats.retraction_count += 1;
        }
    }

    pub fn record_countermeasure(&mut self, misinfo_id: &MisinfoId, user: usize, tick: Tick) {
        self.touch(misinfo_id, tick).countermeasure_users.insert(user);
    }

    pub fn get(&self, misinfo_id: &MisinfoId) -> Option<&MisinfoStats> {
        self.items.get(misinfo_id)
    }

    /// Items in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&MisinfoId, &MisinfoStats)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_shares(&self) -> u64 {
        self.items.values().map(|s| s.share_count).sum()
    }

    pub fn total_retractions(&self) -> u64 {
        self.items.values().map(|s| s.retraction_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_tick_fixed_on_first_reference() {
        let mut table = StatsTable::new();
        let id = MisinfoId::from("m1");
        table.record_exposure(&id, 0, 3);
        table.record_share(&id, 1, 7);
        assert_eq!(table.get(&id).unwrap().origin_tick, 3);
    }

    #[test]
    fn test_share_and_retraction_accounting() {
        let mut table = StatsTable::new();
        let id = MisinfoId::from("m1");
        table.record_share(&id, 0, 0);
        table.record_share(&id, 1, 0);
        table.record_retraction(&id, 1, 1);
        // Retracting a non-sharer changes nothing
        table.record_retraction(&id, 5, 1);

        let stats = table.get(&id).unwrap();
        assert_eq!(stats.share_count, 2);
        assert_eq!(stats.retraction_count, 1);
        assert_eq!(stats.live_shares(), 1);
        assert_eq!(stats.sharers().len(), 1);
        assert_eq!(stats.affected_users().len(), 2);
        assert_eq!(table.total_shares(), 2);
        assert_eq!(table.total_retractions(), 1);
    }

    #[test]
    fn test_empty_table() {
        let table = StatsTable::new();
        assert!(table.is_empty());
        assert_eq!(table.total_shares(), 0);
    }
}
