//! Diffusion Engine - the per-tick simulation loop.
//!
//! # Tick phases
//!
//! Every call to [`DiffusionEngine::step`] runs exactly these phases, in
//! this order:
//!
//! ```text
//! 1. DISPATCH   pop every scheduled event with tick ≤ now, deliver it
//! 2. ADVANCE    tick every agent, users first; countermeasures release
//!               due pending activations
//! 3. TRIGGER    evaluate each controller's condition on live aggregates,
//!               activate where it newly holds
//! 4. COLLECT    append a TickSnapshot to the metrics series
//! ```
//!
//! Aggregates update the moment a share happens, so phase 3 sees every
//! share made in phase 1 of the same tick. Shares fan out to the sharer's
//! followers on the following tick.
//!
//! # Randomness
//!
//! One `ChaCha8Rng`, seeded from [`EngineConfig::seed`], is threaded through
//! graph synthesis, user creation and every decision. Same seed + same
//! input + same tick count = identical metrics.

use crate::agent::Agent;
use crate::config::{CountermeasureConfig, CountermeasureKind, EngineConfig};
use crate::countermeasure::{BroadcastRequest, CountermeasureController};
use crate::error::EngineError;
use crate::graph::SocialGraph;
use crate::metrics::{BroadcastRecord, MetricsSeries, TickSnapshot};
use crate::schedule::{EventSchedule, ScheduledEvent};
use crate::stats::{MisinfoStats, StatsTable};
use crate::user::{UserReaction, UserState};

use misinfo_env::{DatasetInput, MisinfoId, Tick, UserId, UserRecord};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// The discrete-event diffusion engine.
pub struct DiffusionEngine {
    config: EngineConfig,

    /// The single random stream for the run
    rng: ChaCha8Rng,

    graph: SocialGraph,

    /// Indexed by graph node index
    users: Vec<UserState>,

    /// Sorted by kind so evaluation order is fixed
    controllers: Vec<CountermeasureController>,

    schedule: EventSchedule,
    stats: StatsTable,
    metrics: MetricsSeries,

    /// Tick processed by the next call to `step`
    current_tick: Tick,
}

impl DiffusionEngine {
    /// Builds an engine from pre-shaped input.
    ///
    /// User records without an id, duplicate users, and timeline records
    /// naming unknown users are skipped with a warning. Configuration
    /// problems are fatal.
    pub fn new(data: &DatasetInput, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let records = unique_user_records(&data.users);

        // Graph before users: synthesis and susceptibility share the stream
        let graph = match &data.network_edges {
            Some(edges) if !edges.is_empty() => {
                SocialGraph::from_edges(records.iter().map(|(id, _)| (*id).clone()), edges)
            }
            _ => {
                let influence: Vec<(UserId, u64)> = records
                    .iter()
                    .map(|(id, r)| ((*id).clone(), r.follower_count()))
                    .collect();
                SocialGraph::synthetic(&influence, &mut rng)
            }
        };

        let mut users = Vec::with_capacity(records.len());
        for (id, record) in &records {
            let user = UserState::from_record(record, &mut rng)
                .ok_or_else(|| EngineError::UnknownUser((*id).clone()))?;
            users.push(user);
        }

        let mut controllers: Vec<CountermeasureController> = config
            .countermeasures
            .iter()
            .cloned()
            .map(CountermeasureController::new)
            .collect();
        controllers.sort_by_key(|c| c.kind());

        let mut schedule = EventSchedule::from_records(&data.tweets_timeline, config.time_unit_secs);
        let dropped = schedule.retain(|event| graph.contains(event.user_id()));
        if dropped > 0 {
            warn!("Skipped {} timeline records whose user is not in the user list", dropped);
        }

        info!(
            "Engine ready: {} users, {} edges, {} scheduled events, {} countermeasures (seed={})",
            users.len(),
            graph.edge_count(),
            schedule.len(),
            controllers.len(),
            config.seed
        );

        Ok(Self {
            config,
            rng,
            graph,
            users,
            controllers,
            schedule,
            stats: StatsTable::new(),
            metrics: MetricsSeries::new(),
            current_tick: 0,
        })
    }

    /// Runs one tick and returns its snapshot.
    ///
    /// On error the tick counter does not advance; snapshots of earlier
    /// ticks remain available through [`metrics`](Self::metrics).
    pub fn step(&mut self) -> Result<TickSnapshot, EngineError> {
        let tick = self.current_tick;
        let mut broadcasts = Vec::new();

        // 1. Dispatch
        let mut dispatched = 0usize;
        while let Some((_, event)) = self.schedule.pop_due(tick) {
            self.dispatch(event, tick)?;
            dispatched += 1;
        }

        // 2. Advance
        let mut released: Vec<BroadcastRequest> = Vec::new();
        let agents = self
            .users
            .iter_mut()
            .map(|u| u as &mut dyn Agent)
            .chain(self.controllers.iter_mut().map(|c| c as &mut dyn Agent));
        for agent in agents {
            released.extend(agent.on_tick(tick));
        }
        for request in &released {
            broadcasts.push(self.broadcast(request)?);
        }

        // 3. Trigger
        for i in 0..self.controllers.len() {
            let triggered: Vec<MisinfoId> = {
                let controller = &self.controllers[i];
                self.stats
                    .iter()
                    .filter(|(id, _)| !controller.has_fired(id))
                    .filter(|(_, stats)| trigger_holds(controller.config(), stats, &self.users))
                    .map(|(id, _)| id.clone())
                    .collect()
            };

            for misinfo_id in triggered {
                if let Some(request) = self.controllers[i].activate(&misinfo_id, tick) {
                    broadcasts.push(self.broadcast(&request)?);
                }
            }
        }

        // 4. Collect
        let snapshot = self.snapshot(tick, broadcasts);
        debug!(
            "tick {} | dispatched={} | shares={} | active_users={} | broadcasts={}",
            tick,
            dispatched,
            snapshot.total_shares,
            snapshot.active_users,
            snapshot.broadcasts.len()
        );
        self.metrics.push(snapshot.clone());
        self.current_tick += 1;

        Ok(snapshot)
    }

    /// Runs `ticks` steps and returns the full series.
    pub fn run(&mut self, ticks: u64) -> Result<&MetricsSeries, EngineError> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(&self.metrics)
    }

    /// Steps until nothing is scheduled or pending, or `max_ticks` is reached.
    pub fn run_until_finished(&mut self, max_ticks: u64) -> Result<&MetricsSeries, EngineError> {
        for _ in 0..max_ticks {
            if self.is_finished() {
                break;
            }
            self.step()?;
        }
        Ok(&self.metrics)
    }

    /// True once the schedule is drained and no activation is pending.
    ///
    /// Further steps are allowed and change nothing but the tick counter.
    pub fn is_finished(&self) -> bool {
        self.schedule.is_empty() && self.controllers.iter().all(|c| !c.has_pending())
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    fn dispatch(&mut self, event: ScheduledEvent, tick: Tick) -> Result<(), EngineError> {
        let idx = self
            .graph
            .index_of(event.user_id())
            .ok_or_else(|| EngineError::UnknownUser(event.user_id().clone()))?;

        match event {
            ScheduledEvent::Record {
                misinfo_id,
                is_source: true,
                ..
            } => {
                self.stats.touch(&misinfo_id, tick);
                if self.users[idx].originate(&misinfo_id) {
                    self.stats.record_share(&misinfo_id, idx, tick);
                    debug!("{} authored {} at tick {}", self.users[idx].user_id, misinfo_id, tick);
                }

                if self.config.seed_followers_on_source {
                    let followers: Vec<usize> = self.graph.followers(idx).collect();
                    for follower in followers {
                        self.deliver(follower, &misinfo_id, tick);
                    }
                } else {
                    self.fan_out(idx, &misinfo_id, tick + 1);
                }
            }
            ScheduledEvent::Record { misinfo_id, .. } | ScheduledEvent::Delivery { misinfo_id, .. } => {
                self.deliver(idx, &misinfo_id, tick);
            }
        }
        Ok(())
    }

    /// Delivers an item to one user; a share fans out on the next tick.
    fn deliver(&mut self, idx: usize, misinfo_id: &MisinfoId, tick: Tick) {
        self.stats.record_exposure(misinfo_id, idx, tick);

        if let Some(UserReaction::Shared) = self.users[idx].receive(misinfo_id, false, &mut self.rng) {
            self.stats.record_share(misinfo_id, idx, tick);
            debug!("{} shared {} at tick {}", self.users[idx].user_id, misinfo_id, tick);
            self.fan_out(idx, misinfo_id, tick + 1);
        }
    }

    /// Schedules a delivery to every follower of `idx`.
    fn fan_out(&mut self, idx: usize, misinfo_id: &MisinfoId, at: Tick) {
        for follower in self.graph.followers(idx) {
            let user_id = self.users[follower].user_id.clone();
            self.schedule.push(
                at,
                ScheduledEvent::Delivery {
                    misinfo_id: misinfo_id.clone(),
                    user_id,
                },
            );
        }
    }

    // =========================================================================
    // COUNTERMEASURES
    // =========================================================================

    /// Delivers a countermeasure to its target set.
    fn broadcast(&mut self, request: &BroadcastRequest) -> Result<BroadcastRecord, EngineError> {
        let config = self
            .controllers
            .iter()
            .find(|c| c.kind() == request.kind)
            .map(|c| c.config().clone())
            .ok_or_else(|| EngineError::UnknownMisinfo(request.misinfo_id.clone()))?;

        let targets = self.select_targets(&config, &request.misinfo_id)?;
        let mut retractions = 0usize;

        for &idx in &targets {
            self.stats.record_countermeasure(&request.misinfo_id, idx, request.tick);
            if let Some(UserReaction::Retracted) =
                self.users[idx].receive(&request.misinfo_id, true, &mut self.rng)
            {
                self.stats.record_retraction(&request.misinfo_id, idx, request.tick);
                retractions += 1;
                debug!(
                    "{} retracted {} at tick {}",
                    self.users[idx].user_id, request.misinfo_id, request.tick
                );
            }
        }

        info!(
            "{} broadcast for {} at tick {}: {} targets, {} retractions",
            request.kind,
            request.misinfo_id,
            request.tick,
            targets.len(),
            retractions
        );

        Ok(BroadcastRecord {
            kind: request.kind,
            misinfo_id: request.misinfo_id.clone(),
            tick: request.tick,
            targets: targets.len(),
            retractions,
        })
    }

    /// Picks broadcast targets, in ascending node order.
    ///
    /// - key_node: every high-influence user plus their followers
    /// - fact_check: every user affected by the item so far
    /// - early_warning: `round(coverage_ratio * n)` users sampled uniformly
    ///   without replacement from all users
    fn select_targets(
        &mut self,
        config: &CountermeasureConfig,
        misinfo_id: &MisinfoId,
    ) -> Result<Vec<usize>, EngineError> {
        let targets = match config {
            CountermeasureConfig::KeyNode {
                target_threshold, ..
            } => {
                let mut set = BTreeSet::new();
                for (idx, user) in self.users.iter().enumerate() {
                    if user.follower_count > *target_threshold {
                        set.insert(idx);
                        set.extend(self.graph.followers(idx));
                    }
                }
                set.into_iter().collect()
            }
            CountermeasureConfig::FactCheck { .. } => self
                .stats
                .get(misinfo_id)
                .ok_or_else(|| EngineError::UnknownMisinfo(misinfo_id.clone()))?
                .affected_users()
                .iter()
                .copied()
                .collect(),
            CountermeasureConfig::EarlyWarning { coverage_ratio, .. } => {
                let n = self.users.len();
                let amount = ((coverage_ratio * n as f64).round() as usize).min(n);
                let mut sampled = index::sample(&mut self.rng, n, amount).into_vec();
                sampled.sort_unstable();
                sampled
            }
        };
        Ok(targets)
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    fn snapshot(&self, tick: Tick, broadcasts: Vec<BroadcastRecord>) -> TickSnapshot {
        TickSnapshot {
            tick,
            active_users: self.users.iter().filter(|u| u.is_active()).count(),
            total_shares: self.stats.total_shares(),
            total_retractions: self.stats.total_retractions(),
            misinfo_spread: self
                .stats
                .iter()
                .map(|(id, s)| (id.clone(), s.affected_users().len()))
                .collect(),
            countermeasure_coverage: self
                .stats
                .iter()
                .map(|(id, s)| (id.clone(), s.countermeasure_users().len()))
                .collect(),
            broadcasts,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &SocialGraph {
        &self.graph
    }

    /// Users in graph node order.
    pub fn users(&self) -> &[UserState] {
        &self.users
    }

    pub fn user(&self, id: &UserId) -> Option<&UserState> {
        self.graph.index_of(id).map(|idx| &self.users[idx])
    }

    pub fn controllers(&self) -> &[CountermeasureController] {
        &self.controllers
    }

    pub fn controller(&self, kind: CountermeasureKind) -> Option<&CountermeasureController> {
        self.controllers.iter().find(|c| c.kind() == kind)
    }

    pub fn stats(&self) -> &StatsTable {
        &self.stats
    }

    pub fn metrics(&self) -> &MetricsSeries {
        &self.metrics
    }

    /// Events still waiting in the schedule.
    pub fn scheduled_events(&self) -> usize {
        self.schedule.len()
    }
}

/// Evaluates a controller's trigger against one item's live aggregates.
fn trigger_holds(config: &CountermeasureConfig, stats: &MisinfoStats, users: &[UserState]) -> bool {
    match config {
        CountermeasureConfig::KeyNode {
            activation_threshold,
            target_threshold,
        } => {
            let sharers = stats.sharers();
            if sharers.is_empty() {
                return false;
            }
            let high_influence = sharers
                .iter()
                .filter(|&&idx| users[idx].follower_count > *target_threshold)
                .count();
            (high_influence as f64 / sharers.len() as f64) > *activation_threshold
        }
        CountermeasureConfig::FactCheck {
            activation_threshold,
            ..
        }
        | CountermeasureConfig::EarlyWarning {
            activation_threshold,
            ..
        } => stats.share_count >= *activation_threshold,
    }
}

/// First record per identity, in input order. Id-less records are dropped.
fn unique_user_records(records: &[UserRecord]) -> Vec<(&UserId, &UserRecord)> {
    let mut seen: HashSet<&UserId> = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    let mut missing_id = 0usize;
    let mut duplicates = 0usize;

    for record in records {
        match &record.user_id {
            None => missing_id += 1,
            Some(id) if !seen.insert(id) => duplicates += 1,
            Some(id) => unique.push((id, record)),
        }
    }

    if missing_id > 0 {
        warn!("Skipped {} user records without user_id", missing_id);
    }
    if duplicates > 0 {
        warn!("Skipped {} duplicate user records", duplicates);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use misinfo_env::TweetRecord;

    fn users(n: usize) -> Vec<UserRecord> {
        (0..n).map(|i| UserRecord::new(format!("u{}", i))).collect()
    }

    #[test]
    fn test_empty_timeline_runs_clean() {
        let data = DatasetInput::new(users(5), vec![]);
        let config = EngineConfig::default()
            .with_countermeasure(CountermeasureConfig::fact_check(1, 1))
            .with_countermeasure(CountermeasureConfig::early_warning(1, 0.5));
        let mut engine = DiffusionEngine::new(&data, config).unwrap();

        assert!(engine.is_finished());
        engine.run(25).unwrap();
        assert_eq!(engine.current_tick(), 25);
        assert_eq!(engine.metrics().len(), 25);
        assert_eq!(engine.metrics().final_total_shares(), 0);
        assert_eq!(engine.metrics().broadcasts().count(), 0);
    }

    #[test]
    fn test_skips_bad_user_records() {
        let mut records = users(3);
        records.push(UserRecord::default());
        records.push(UserRecord::new("u0").with_followers(999));

        let data = DatasetInput::new(records, vec![]);
        let engine = DiffusionEngine::new(&data, EngineConfig::default()).unwrap();
        assert_eq!(engine.users().len(), 3);
        // First record wins
        assert_eq!(engine.user(&UserId::from("u0")).unwrap().follower_count, 0);
    }

    #[test]
    fn test_unknown_author_record_skipped() {
        let data = DatasetInput::new(
            users(2),
            vec![
                TweetRecord::source("m1", "ghost", 0.0),
                TweetRecord::source("m1", "u0", 0.0),
            ],
        );
        let engine = DiffusionEngine::new(&data, EngineConfig::default()).unwrap();
        assert_eq!(engine.scheduled_events(), 1);
    }

    #[test]
    fn test_source_share_counts_immediately() {
        let data = DatasetInput::new(users(2), vec![TweetRecord::source("m1", "u0", 0.0)]);
        let mut engine = DiffusionEngine::new(&data, EngineConfig::default()).unwrap();

        let snapshot = engine.step().unwrap();
        assert_eq!(snapshot.total_shares, 1);
        assert_eq!(snapshot.active_users, 1);
        assert_eq!(snapshot.misinfo_spread[&MisinfoId::from("m1")], 1);
        assert!(engine.is_finished());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let data = DatasetInput::new(users(2), vec![]);
        let config = EngineConfig::default().with_time_unit(-1.0);
        assert!(matches!(
            DiffusionEngine::new(&data, config),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_controllers_sorted_by_kind() {
        let data = DatasetInput::new(users(2), vec![]);
        let config = EngineConfig::default()
            .with_countermeasure(CountermeasureConfig::early_warning(1, 0.1))
            .with_countermeasure(CountermeasureConfig::key_node(0.1, 10));
        let engine = DiffusionEngine::new(&data, config).unwrap();
        let kinds: Vec<_> = engine.controllers().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec![CountermeasureKind::KeyNode, CountermeasureKind::EarlyWarning]);
    }
}
