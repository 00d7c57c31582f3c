//! Synthetic population generator.
//!
//! Stands in for a preprocessed dataset when none is supplied: produces the
//! same pre-shaped [`DatasetInput`] the loader returns, with
//! - log-normally distributed follower counts (a few very large accounts)
//! - a small verified share
//! - one source record per item, followed by re-share records separated by
//!   exponential inter-arrival gaps
//!
//! No edge list is produced; the engine synthesizes the follower graph.

use crate::error::SimError;
use misinfo_env::{DatasetInput, TweetRecord, UserRecord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, LogNormal};
use serde::{Deserialize, Serialize};

/// Shape of a synthetic population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub users: usize,

    /// Misinformation items seeded into the timeline
    pub items: usize,

    /// Probability that a user is verified
    pub verified_ratio: f64,

    /// Mean of ln(followers)
    pub follower_log_mean: f64,

    /// Standard deviation of ln(followers)
    pub follower_log_std: f64,

    /// Re-share records per item, after the source record
    pub reshares_per_item: usize,

    /// Mean gap between consecutive re-shares (seconds)
    pub mean_reshare_gap_secs: f64,

    /// Offset between the source records of consecutive items (seconds)
    pub item_spacing_secs: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            users: 1000,
            items: 1,
            verified_ratio: 0.05,
            follower_log_mean: 5.0,
            follower_log_std: 2.0,
            reshares_per_item: 20,
            mean_reshare_gap_secs: 90.0,
            item_spacing_secs: 600.0,
        }
    }
}

impl PopulationConfig {
    pub fn with_users(mut self, users: usize) -> Self {
        self.users = users;
        self
    }

    pub fn with_items(mut self, items: usize) -> Self {
        self.items = items;
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.users == 0 {
            return Err(SimError::population("users", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.verified_ratio) {
            return Err(SimError::population(
                "verified_ratio",
                format!("must be within [0, 1], got {}", self.verified_ratio),
            ));
        }
        if !self.follower_log_mean.is_finite() {
            return Err(SimError::population("follower_log_mean", "must be finite"));
        }
        if !self.follower_log_std.is_finite() || self.follower_log_std < 0.0 {
            return Err(SimError::population(
                "follower_log_std",
                format!("must be non-negative, got {}", self.follower_log_std),
            ));
        }
        if !self.mean_reshare_gap_secs.is_finite() || self.mean_reshare_gap_secs <= 0.0 {
            return Err(SimError::population(
                "mean_reshare_gap_secs",
                format!("must be positive, got {}", self.mean_reshare_gap_secs),
            ));
        }
        if !self.item_spacing_secs.is_finite() || self.item_spacing_secs < 0.0 {
            return Err(SimError::population(
                "item_spacing_secs",
                format!("must be non-negative, got {}", self.item_spacing_secs),
            ));
        }
        Ok(())
    }
}

/// Deterministic population generator.
pub struct PopulationGenerator {
    rng: ChaCha8Rng,
    config: PopulationConfig,
}

impl PopulationGenerator {
    /// Creates a generator. Use a seed derived apart from the engine seed.
    pub fn new(population_seed: u64, config: PopulationConfig) -> Self {
        Self::from_rng(ChaCha8Rng::seed_from_u64(population_seed), config)
    }

    /// Creates a generator over an already seeded stream.
    pub fn from_rng(rng: ChaCha8Rng, config: PopulationConfig) -> Self {
        Self { rng, config }
    }

    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Generates users and timeline.
    pub fn generate(&mut self) -> Result<DatasetInput, SimError> {
        self.config.validate()?;

        let followers = LogNormal::new(self.config.follower_log_mean, self.config.follower_log_std)
            .map_err(|e| SimError::population("follower_log_std", e.to_string()))?;
        let gaps = Exp::new(1.0 / self.config.mean_reshare_gap_secs)
            .map_err(|e| SimError::population("mean_reshare_gap_secs", e.to_string()))?;

        let mut users = Vec::with_capacity(self.config.users);
        for i in 0..self.config.users {
            let count = followers.sample(&mut self.rng).round().min(i64::MAX as f64) as i64;
            let verified = self.rng.gen_bool(self.config.verified_ratio);

            let mut record = UserRecord::new(format!("user_{:05}", i))
                .with_verified(verified)
                .with_followers(count);
            record.screen_name = Some(format!("user{}", i));
            users.push(record);
        }

        let mut timeline = Vec::with_capacity(self.config.items * (self.config.reshares_per_item + 1));
        for item in 0..self.config.items {
            let misinfo_id = format!("misinfo_{}", item);
            let mut t = item as f64 * self.config.item_spacing_secs;

            let author = self.pick_user(&users);
            timeline.push(TweetRecord::source(&misinfo_id, &author, t));

            for _ in 0..self.config.reshares_per_item {
                t += gaps.sample(&mut self.rng);
                let author = self.pick_user(&users);
                timeline.push(TweetRecord::reshare(&misinfo_id, &author, t));
            }
        }
        timeline.sort_by(|a, b| {
            a.time_since_start
                .unwrap_or(0.0)
                .total_cmp(&b.time_since_start.unwrap_or(0.0))
        });

        Ok(DatasetInput::new(users, timeline))
    }

    fn pick_user(&mut self, users: &[UserRecord]) -> String {
        let idx = self.rng.gen_range(0..users.len());
        users[idx]
            .user_id
            .as_ref()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_same_seed_same_population() {
        let config = PopulationConfig::default().with_users(200).with_items(2);
        let a = PopulationGenerator::new(5, config.clone()).generate().unwrap();
        let b = PopulationGenerator::new(5, config).generate().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shape() {
        let config = PopulationConfig::default().with_users(300).with_items(3);
        let data = PopulationGenerator::new(1, config).generate().unwrap();

        assert_eq!(data.users.len(), 300);
        assert_eq!(data.tweets_timeline.len(), 3 * 21);
        assert_eq!(data.tweets_timeline.iter().filter(|r| r.is_source).count(), 3);
        assert!(data.network_edges.is_none());

        let ids: HashSet<_> = data.users.iter().filter_map(|u| u.user_id.clone()).collect();
        assert_eq!(ids.len(), 300);

        let times: Vec<f64> = data
            .tweets_timeline
            .iter()
            .filter_map(|r| r.time_since_start)
            .collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_no_verified_when_ratio_zero() {
        let config = PopulationConfig {
            verified_ratio: 0.0,
            ..PopulationConfig::default().with_users(100)
        };
        let data = PopulationGenerator::new(3, config).generate().unwrap();
        assert!(data.users.iter().all(|u| !u.is_verified()));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let empty = PopulationConfig::default().with_users(0);
        assert!(matches!(
            PopulationGenerator::new(0, empty).generate(),
            Err(SimError::Population { name: "users", .. })
        ));

        let bad_gap = PopulationConfig {
            mean_reshare_gap_secs: 0.0,
            ..PopulationConfig::default()
        };
        assert!(bad_gap.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_authors_are_known_users(seed in any::<u64>(), users in 1usize..60, items in 0usize..4) {
            let config = PopulationConfig::default().with_users(users).with_items(items);
            let data = PopulationGenerator::new(seed, config).generate().unwrap();

            let ids: HashSet<_> = data.users.iter().filter_map(|u| u.user_id.clone()).collect();
            for record in &data.tweets_timeline {
                prop_assert!(ids.contains(record.user_id.as_ref().unwrap()));
                prop_assert!(record.time_since_start.unwrap() >= 0.0);
            }
            for user in &data.users {
                prop_assert!(user.followers_count.unwrap() >= 0);
            }
        }
    }
}
