//! Per-user state and the share / retract decision rules.
//!
//! A user never acts on their own. Everything happens inside
//! [`UserState::receive`], which the engine calls when a misinformation item
//! or a countermeasure for it reaches the user.

use misinfo_env::{MisinfoId, UserId, UserRecord};
use rand::Rng;
use std::collections::BTreeSet;

/// Base probability of re-sharing a received item.
pub const BASE_RETWEET_PROBABILITY: f64 = 0.1;

/// Verified accounts share at this fraction of the base rate.
pub const VERIFIED_CAUTION: f64 = 0.8;

/// Susceptibility of every verified account.
pub const VERIFIED_SUSCEPTIBILITY: f64 = 0.7;

/// Unverified susceptibility is drawn from `[MIN, MIN + SPAN)`.
pub const UNVERIFIED_SUSCEPTIBILITY_MIN: f64 = 0.3;
pub const UNVERIFIED_SUSCEPTIBILITY_SPAN: f64 = 0.4;

/// A countermeasure retracts an existing share with probability
/// `susceptibility * RETRACTION_FACTOR`.
pub const RETRACTION_FACTOR: f64 = 0.3;

/// What a delivery caused, reported back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserReaction {
    /// The user shared the item; their followers should receive it
    Shared,

    /// The user withdrew an earlier share after a countermeasure
    Retracted,
}

/// `0.1 * (0.8 if verified) * follower_factor`, where the follower factor
/// shrinks logarithmically with audience size and never drops below 0.5.
pub fn retweet_probability(verified: bool, follower_count: u64) -> f64 {
    let mut base = BASE_RETWEET_PROBABILITY;
    if verified {
        base *= VERIFIED_CAUTION;
    }

    let follower_factor = if follower_count > 0 {
        1.0 - (((1.0 + follower_count as f64).ln()) / 30.0).min(0.5)
    } else {
        1.0
    };

    base * follower_factor.clamp(0.5, 1.0)
}

/// Draws a susceptibility. Only unverified users consume a random value.
pub fn susceptibility<R: Rng>(verified: bool, rng: &mut R) -> f64 {
    if verified {
        VERIFIED_SUSCEPTIBILITY
    } else {
        UNVERIFIED_SUSCEPTIBILITY_MIN + UNVERIFIED_SUSCEPTIBILITY_SPAN * rng.gen::<f64>()
    }
}

/// A simulated social media user.
#[derive(Debug, Clone)]
pub struct UserState {
    pub user_id: UserId,
    pub verified: bool,
    pub follower_count: u64,

    // Descriptive only, never read by the decision rules
    pub screen_name: String,
    pub name: String,
    pub location: String,
    pub description: String,

    retweet_probability: f64,
    susceptibility: f64,

    received_misinfo: BTreeSet<MisinfoId>,
    shared_misinfo: BTreeSet<MisinfoId>,
    received_countermeasures: BTreeSet<MisinfoId>,
}

impl UserState {
    /// Creates a user with explicit attributes.
    pub fn new<R: Rng>(user_id: UserId, verified: bool, follower_count: u64, rng: &mut R) -> Self {
        Self {
            user_id,
            verified,
            follower_count,
            screen_name: String::new(),
            name: String::new(),
            location: String::new(),
            description: String::new(),
            retweet_probability: retweet_probability(verified, follower_count),
            susceptibility: susceptibility(verified, rng),
            received_misinfo: BTreeSet::new(),
            shared_misinfo: BTreeSet::new(),
            received_countermeasures: BTreeSet::new(),
        }
    }

    /// Creates a user from an input record. Returns `None` without an id.
    pub fn from_record<R: Rng>(record: &UserRecord, rng: &mut R) -> Option<Self> {
        let user_id = record.user_id.clone()?;
        let mut user = Self::new(user_id, record.is_verified(), record.follower_count(), rng);
        user.screen_name = record.screen_name.clone().unwrap_or_default();
        user.name = record.name.clone().unwrap_or_default();
        user.location = record.location.clone().unwrap_or_default();
        user.description = record.description.clone().unwrap_or_default();
        Some(user)
    }

    pub fn retweet_probability(&self) -> f64 {
        self.retweet_probability
    }

    pub fn susceptibility(&self) -> f64 {
        self.susceptibility
    }

    pub fn received_misinfo(&self) -> &BTreeSet<MisinfoId> {
        &self.received_misinfo
    }

    pub fn shared_misinfo(&self) -> &BTreeSet<MisinfoId> {
        &self.shared_misinfo
    }

    pub fn received_countermeasures(&self) -> &BTreeSet<MisinfoId> {
        &self.received_countermeasures
    }

    pub fn has_shared(&self, misinfo_id: &MisinfoId) -> bool {
        self.shared_misinfo.contains(misinfo_id)
    }

    /// True if the user currently shares at least one item.
    pub fn is_active(&self) -> bool {
        !self.shared_misinfo.is_empty()
    }

    /// Handles one delivery.
    ///
    /// A countermeasure may retract an existing share. A misinformation item
    /// may be shared, at most once per item, with the probability damped by
    /// any countermeasure already seen for it.
    pub fn receive<R: Rng>(
        &mut self,
        misinfo_id: &MisinfoId,
        is_countermeasure: bool,
        rng: &mut R,
    ) -> Option<UserReaction> {
        if is_countermeasure {
            self.received_countermeasures.insert(misinfo_id.clone());

            if self.shared_misinfo.contains(misinfo_id)
                && rng.gen::<f64>() < self.susceptibility * RETRACTION_FACTOR
            {
                self.shared_misinfo.remove(misinfo_id);
                return Some(UserReaction::Retracted);
            }
            None
        } else {
            self.received_misinfo.insert(misinfo_id.clone());
            self.consider_sharing(misinfo_id, rng)
        }
    }

    fn consider_sharing<R: Rng>(&mut self, misinfo_id: &MisinfoId, rng: &mut R) -> Option<UserReaction> {
        if self.shared_misinfo.contains(misinfo_id) {
            return None;
        }

        let mut p = self.retweet_probability;
        if self.received_countermeasures.contains(misinfo_id) {
            p *= 1.0 - self.susceptibility;
        }

        if rng.gen::<f64>() < p {
            self.shared_misinfo.insert(misinfo_id.clone());
            Some(UserReaction::Shared)
        } else {
            None
        }
    }

    /// Records the user as the author of an item.
    ///
    /// Authoring is a share by definition, so no draw is made. Returns
    /// `false` if the user already shares the item.
    pub fn originate(&mut self, misinfo_id: &MisinfoId) -> bool {
        self.received_misinfo.insert(misinfo_id.clone());
        self.shared_misinfo.insert(misinfo_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_retweet_probability_formula() {
        assert_relative_eq!(retweet_probability(false, 0), 0.1);
        assert_relative_eq!(retweet_probability(true, 0), 0.08);

        let expected = 0.1 * (1.0 - (11.0f64).ln() / 30.0);
        assert_relative_eq!(retweet_probability(false, 10), expected, epsilon = 1e-12);

        // ln(1 + 2e6) / 30 is just under 0.5
        let expected = 0.1 * (1.0 - (2_000_001f64).ln() / 30.0);
        assert_relative_eq!(retweet_probability(false, 2_000_000), expected, epsilon = 1e-12);

        // ln(1 + 5e6) / 30 > 0.5, so the factor bottoms out
        assert_relative_eq!(retweet_probability(false, 5_000_000), 0.05);
    }

    #[test]
    fn test_large_audience_is_more_cautious() {
        assert!(retweet_probability(false, 2_000_000) < retweet_probability(false, 10));
    }

    #[test]
    fn test_susceptibility_ranges() {
        let mut rng = rng();
        assert_eq!(susceptibility(true, &mut rng), VERIFIED_SUSCEPTIBILITY);
        for _ in 0..1000 {
            let s = susceptibility(false, &mut rng);
            assert!((0.3..0.7).contains(&s));
        }
    }

    #[test]
    fn test_from_record_requires_id() {
        let mut rng = rng();
        let mut record = UserRecord::new("a").with_verified(true).with_followers(10);
        record.screen_name = Some("alice".into());

        let user = UserState::from_record(&record, &mut rng).unwrap();
        assert!(user.verified);
        assert_eq!(user.follower_count, 10);
        assert_eq!(user.screen_name, "alice");

        assert!(UserState::from_record(&UserRecord::default(), &mut rng).is_none());
    }

    #[test]
    fn test_share_is_idempotent() {
        let mut rng = rng();
        let mut user = UserState::new(UserId::from("a"), false, 0, &mut rng);
        user.retweet_probability = 1.0;
        let item = MisinfoId::from("m1");

        assert_eq!(user.receive(&item, false, &mut rng), Some(UserReaction::Shared));
        assert_eq!(user.receive(&item, false, &mut rng), None);
        assert_eq!(user.shared_misinfo().len(), 1);
        assert!(user.shared_misinfo().is_subset(user.received_misinfo()));
    }

    #[test]
    fn test_countermeasure_blocks_share_for_fully_susceptible_user() {
        let mut rng = rng();
        let mut user = UserState::new(UserId::from("a"), false, 0, &mut rng);
        user.retweet_probability = 1.0;
        user.susceptibility = 1.0;
        let item = MisinfoId::from("m1");

        assert_eq!(user.receive(&item, true, &mut rng), None);
        for _ in 0..50 {
            assert_eq!(user.receive(&item, false, &mut rng), None);
        }
        assert!(!user.has_shared(&item));
        assert!(user.received_misinfo().contains(&item));
    }

    #[test]
    fn test_retraction_only_removes_existing_share() {
        let mut rng = rng();
        let mut user = UserState::new(UserId::from("a"), true, 0, &mut rng);
        let item = MisinfoId::from("m1");

        // Not shared: a countermeasure never reports a retraction
        for _ in 0..50 {
            assert_eq!(user.receive(&item, true, &mut rng), None);
        }

        assert!(user.originate(&item));
        let mut retracted = false;
        for _ in 0..200 {
            match user.receive(&item, true, &mut rng) {
                Some(UserReaction::Retracted) => {
                    retracted = true;
                    break;
                }
                Some(UserReaction::Shared) => panic!("countermeasure caused a share"),
                None => {}
            }
        }
        // 0.7 * 0.3 per attempt
        assert!(retracted);
        assert!(!user.has_shared(&item));
        assert!(user.received_misinfo().contains(&item));
    }

    #[test]
    fn test_originate_marks_received_and_shared() {
        let mut rng = rng();
        let mut user = UserState::new(UserId::from("a"), false, 0, &mut rng);
        let item = MisinfoId::from("m1");

        assert!(user.originate(&item));
        assert!(!user.originate(&item));
        assert!(user.is_active());
        assert!(user.shared_misinfo().is_subset(user.received_misinfo()));
    }
}
