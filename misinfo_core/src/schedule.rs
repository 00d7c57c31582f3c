//! Tick-ordered event queue.
//!
//! Timeline records are quantized to ticks (`floor(seconds / time_unit)`)
//! and stored alongside the deliveries produced by shares during the run.
//! Events with the same tick keep their insertion order, so dispatch order
//! is record discovery order. Every event is removed as it is popped and is
//! never dispatched twice.

use misinfo_env::{MisinfoId, Tick, TweetRecord, UserId};
use std::collections::BTreeMap;
use tracing::warn;

/// An event waiting for its tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledEvent {
    /// A sharing record from the input timeline
    Record {
        misinfo_id: MisinfoId,
        user_id: UserId,
        is_source: bool,
    },

    /// A misinformation delivery to a follower of someone who shared
    Delivery {
        misinfo_id: MisinfoId,
        user_id: UserId,
    },
}

impl ScheduledEvent {
    pub fn misinfo_id(&self) -> &MisinfoId {
        match self {
            ScheduledEvent::Record { misinfo_id, .. } => misinfo_id,
            ScheduledEvent::Delivery { misinfo_id, .. } => misinfo_id,
        }
    }

    pub fn user_id(&self) -> &UserId {
        match self {
            ScheduledEvent::Record { user_id, .. } => user_id,
            ScheduledEvent::Delivery { user_id, .. } => user_id,
        }
    }
}

/// Converts seconds since start into a tick.
///
/// Negative offsets clamp to tick 0.
pub fn tick_for(seconds: f64, time_unit_secs: f64) -> Tick {
    (seconds / time_unit_secs).floor().max(0.0) as Tick
}

/// Pending events keyed by `(tick, insertion sequence)`.
#[derive(Debug, Clone, Default)]
pub struct EventSchedule {
    queue: BTreeMap<(Tick, u64), ScheduledEvent>,
    next_seq: u64,
    skipped_records: usize,
}

impl EventSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schedule from timeline records.
    ///
    /// Records are stable-sorted by `time_since_start`. Records missing an
    /// item id, a user id, or a usable timestamp are skipped.
    pub fn from_records(records: &[TweetRecord], time_unit_secs: f64) -> Self {
        let mut schedule = Self::new();

        let mut timed: Vec<(f64, &TweetRecord)> = Vec::with_capacity(records.len());
        for record in records {
            match record.time_since_start {
                Some(t) if t.is_finite() => timed.push((t, record)),
                _ => schedule.skipped_records += 1,
            }
        }
        timed.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (seconds, record) in timed {
            let (Some(misinfo_id), Some(user_id)) = (&record.misinfo_id, &record.user_id) else {
                schedule.skipped_records += 1;
                continue;
            };
            schedule.push(
                tick_for(seconds, time_unit_secs),
                ScheduledEvent::Record {
                    misinfo_id: misinfo_id.clone(),
                    user_id: user_id.clone(),
                    is_source: record.is_source,
                },
            );
        }

        if schedule.skipped_records > 0 {
            warn!(
                "Skipped {} timeline records without item, user or timestamp",
                schedule.skipped_records
            );
        }
        schedule
    }

    /// Queues an event for a tick, after anything already queued there.
    pub fn push(&mut self, tick: Tick, event: ScheduledEvent) {
        self.queue.insert((tick, self.next_seq), event);
        self.next_seq += 1;
    }

    /// Removes and returns the earliest event due at or before `current_tick`.
    pub fn pop_due(&mut self, current_tick: Tick) -> Option<(Tick, ScheduledEvent)> {
        let (&(tick, _), _) = self.queue.first_key_value()?;
        if tick > current_tick {
            return None;
        }
        self.queue.pop_first().map(|((tick, _), event)| (tick, event))
    }

    /// Drops queued events that fail a predicate. Returns how many were dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&ScheduledEvent) -> bool,
    {
        let before = self.queue.len();
        self.queue.retain(|_, event| keep(event));
        before - self.queue.len()
    }

    /// Tick of the earliest queued event.
    pub fn next_tick(&self) -> Option<Tick> {
        self.queue.keys().next().map(|&(tick, _)| tick)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Records dropped while building the schedule.
    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_quantization() {
        assert_eq!(tick_for(0.0, 60.0), 0);
        assert_eq!(tick_for(59.9, 60.0), 0);
        assert_eq!(tick_for(60.0, 60.0), 1);
        assert_eq!(tick_for(299.0, 60.0), 4);
        assert_eq!(tick_for(-10.0, 60.0), 0);
        assert_eq!(tick_for(5.0, 1.0), 5);
    }

    #[test]
    fn test_records_sorted_and_stable() {
        let records = vec![
            TweetRecord::reshare("m1", "c", 120.0),
            TweetRecord::source("m1", "a", 0.0),
            TweetRecord::reshare("m1", "b", 130.0),
            TweetRecord::reshare("m2", "d", 125.0),
        ];
        let mut schedule = EventSchedule::from_records(&records, 60.0);
        assert_eq!(schedule.len(), 4);

        let (tick, first) = schedule.pop_due(0).unwrap();
        assert_eq!(tick, 0);
        assert_eq!(first.user_id(), &UserId::from("a"));
        assert!(schedule.pop_due(1).is_none());

        let order: Vec<String> = std::iter::from_fn(|| schedule.pop_due(2))
            .map(|(_, e)| e.user_id().to_string())
            .collect();
        assert_eq!(order, vec!["c", "d", "b"]);
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_same_time_keeps_discovery_order() {
        let records = vec![
            TweetRecord::reshare("m1", "x", 10.0),
            TweetRecord::reshare("m1", "y", 10.0),
            TweetRecord::reshare("m1", "z", 10.0),
        ];
        let mut schedule = EventSchedule::from_records(&records, 60.0);
        let order: Vec<String> = std::iter::from_fn(|| schedule.pop_due(0))
            .map(|(_, e)| e.user_id().to_string())
            .collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_malformed_records_skipped() {
        let mut no_time = TweetRecord::source("m1", "a", 0.0);
        no_time.time_since_start = None;
        let mut no_user = TweetRecord::source("m1", "a", 0.0);
        no_user.user_id = None;
        let mut nan_time = TweetRecord::source("m1", "a", 0.0);
        nan_time.time_since_start = Some(f64::NAN);

        let schedule = EventSchedule::from_records(
            &[no_time, no_user, nan_time, TweetRecord::source("m1", "b", 0.0)],
            60.0,
        );
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.skipped_records(), 3);
    }

    #[test]
    fn test_pushed_events_follow_existing_ones() {
        let mut schedule = EventSchedule::from_records(&[TweetRecord::source("m1", "a", 60.0)], 60.0);
        schedule.push(
            1,
            ScheduledEvent::Delivery {
                misinfo_id: MisinfoId::from("m1"),
                user_id: UserId::from("b"),
            },
        );
        schedule.push(
            0,
            ScheduledEvent::Delivery {
                misinfo_id: MisinfoId::from("m1"),
                user_id: UserId::from("c"),
            },
        );

        assert_eq!(schedule.next_tick(), Some(0));
        let order: Vec<String> = std::iter::from_fn(|| schedule.pop_due(1))
            .map(|(_, e)| e.user_id().to_string())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}
