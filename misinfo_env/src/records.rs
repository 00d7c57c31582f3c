//! Pre-shaped input records handed over by the preprocessing stage.
//!
//! The simulator does not parse raw platform dumps. It consumes the
//! normalized structure produced upstream: a de-duplicated user list, a
//! timeline of sharing events with `time_since_start` already populated, and
//! an optional follower edge list.

use crate::error::InputError;
use crate::types::{MisinfoId, UserId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A user as described by the preprocessing stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Records without an id are skipped by the engine.
    #[serde(default)]
    pub user_id: Option<UserId>,

    #[serde(default)]
    pub screen_name: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub verified: Option<bool>,

    /// Signed so that corrupt negative counts survive parsing and get clamped.
    /// Integral floats such as `1500.0` are accepted.
    #[serde(default, deserialize_with = "deserialize_count")]
    pub followers_count: Option<i64>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl UserRecord {
    /// Creates a minimal record with an id.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// Sets the verified flag.
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    /// Sets the follower count.
    pub fn with_followers(mut self, followers_count: i64) -> Self {
        self.followers_count = Some(followers_count);
        self
    }

    pub fn is_verified(&self) -> bool {
        self.verified.unwrap_or(false)
    }

    /// Follower count clamped to be non-negative.
    pub fn follower_count(&self) -> u64 {
        self.followers_count.unwrap_or(0).max(0) as u64
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Count {
    Int(i64),
    Float(f64),
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Count::Int(n)) => Ok(Some(n)),
        Some(Count::Float(f)) if f.is_finite() && f.fract() == 0.0 => Ok(Some(f as i64)),
        Some(Count::Float(f)) => Err(serde::de::Error::custom(format!(
            "follower count {} is not a whole number",
            f
        ))),
    }
}

/// One timestamped sharing event on the timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TweetRecord {
    #[serde(default)]
    pub misinfo_id: Option<MisinfoId>,

    #[serde(default)]
    pub user_id: Option<UserId>,

    /// True for the originating share, false for re-shares.
    #[serde(default)]
    pub is_source: bool,

    /// Seconds since the earliest event in the dataset.
    #[serde(default)]
    pub time_since_start: Option<f64>,
}

impl TweetRecord {
    /// Creates the originating share of an item.
    pub fn source(misinfo_id: &str, user_id: &str, time_since_start: f64) -> Self {
        Self {
            misinfo_id: Some(MisinfoId::from(misinfo_id)),
            user_id: Some(UserId::from(user_id)),
            is_source: true,
            time_since_start: Some(time_since_start),
        }
    }

    /// Creates a re-share of an item.
    pub fn reshare(misinfo_id: &str, user_id: &str, time_since_start: f64) -> Self {
        Self {
            is_source: false,
            ..Self::source(misinfo_id, user_id, time_since_start)
        }
    }
}

/// The complete pre-shaped input for one simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetInput {
    pub users: Vec<UserRecord>,

    pub tweets_timeline: Vec<TweetRecord>,

    /// Reference timestamp used upstream to compute `time_since_start`.
    #[serde(default)]
    pub earliest_time: Option<String>,

    /// `(follower, followed)` pairs. Absent means "synthesize a graph".
    #[serde(default)]
    pub network_edges: Option<Vec<(UserId, UserId)>>,
}

#[derive(Deserialize)]
struct RawDataset {
    users: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    tweets_timeline: Vec<serde_json::Value>,
    #[serde(default)]
    earliest_time: Option<String>,
    #[serde(default)]
    network_edges: Option<Vec<(UserId, UserId)>>,
}

impl DatasetInput {
    /// Creates an input with the given users and timeline and no edge list.
    pub fn new(users: Vec<UserRecord>, tweets_timeline: Vec<TweetRecord>) -> Self {
        Self {
            users,
            tweets_timeline,
            earliest_time: None,
            network_edges: None,
        }
    }

    /// Attaches an explicit `(follower, followed)` edge list.
    pub fn with_edges(mut self, edges: Vec<(UserId, UserId)>) -> Self {
        self.network_edges = Some(edges);
        self
    }

    /// Parses a dataset from a JSON document.
    ///
    /// Only `users` is mandatory; an absent timeline is treated as empty.
    /// Individual user or timeline records that fail to parse are skipped.
    pub fn from_json_str(json: &str) -> Result<Self, InputError> {
        let raw: RawDataset = serde_json::from_str(json)?;
        let users: Vec<UserRecord> =
            parse_records("user", raw.users.ok_or_else(|| InputError::missing("users"))?);
        let tweets_timeline: Vec<TweetRecord> = parse_records("timeline", raw.tweets_timeline);

        let missing_time = tweets_timeline
            .iter()
            .filter(|t| t.time_since_start.is_none())
            .count();
        if missing_time > 0 {
            tracing::warn!(
                "{} timeline records have no time_since_start and will be skipped",
                missing_time
            );
        }

        Ok(Self {
            users,
            tweets_timeline,
            earliest_time: raw.earliest_time,
            network_edges: raw.network_edges,
        })
    }

    /// Reads and parses a dataset from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Writes the dataset as pretty JSON.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), InputError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Converts each entry on its own, dropping the ones that do not fit.
fn parse_records<T>(kind: &str, values: Vec<serde_json::Value>) -> Vec<T>
where
    T: serde::de::DeserializeOwned,
{
    let total = values.len();
    let records: Vec<T> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Malformed {} record: {}", kind, e);
                None
            }
        })
        .collect();

    let skipped = total - records.len();
    if skipped > 0 {
        tracing::warn!("Skipped {} malformed {} records", skipped, kind);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_dataset() {
        let json = r#"{
            "users": [
                {"user_id": 1, "verified": true, "followers_count": 10},
                {"user_id": "2", "screen_name": "bob"},
                {"screen_name": "anonymous"}
            ],
            "tweets_timeline": [
                {"misinfo_id": "m1", "user_id": 1, "is_source": true, "time_since_start": 0.0, "text": "ignored"}
            ]
        }"#;

        let data = DatasetInput::from_json_str(json).unwrap();
        assert_eq!(data.users.len(), 3);
        assert_eq!(data.users[0].user_id, Some(UserId::from("1")));
        assert!(data.users[0].is_verified());
        assert_eq!(data.users[1].follower_count(), 0);
        assert!(data.users[2].user_id.is_none());
        assert!(data.network_edges.is_none());
        assert!(data.tweets_timeline[0].is_source);
    }

    #[test]
    fn test_missing_users_is_an_error() {
        let err = DatasetInput::from_json_str(r#"{"tweets_timeline": []}"#).unwrap_err();
        assert!(matches!(err, InputError::MissingField(f) if f == "users"));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let json = r#"{
            "users": [
                {"user_id": "a", "followers_count": 1500.0},
                {"user_id": "b", "followers_count": "lots"},
                {"user_id": "c", "followers_count": 7},
                {"user_id": "d", "followers_count": 2.5}
            ],
            "tweets_timeline": [
                {"misinfo_id": "m1", "user_id": "a", "is_source": true, "time_since_start": 0.0},
                {"misinfo_id": "m1", "user_id": "c", "time_since_start": "n/a"},
                {"misinfo_id": "m1", "user_id": "c", "time_since_start": 120}
            ]
        }"#;

        let data = DatasetInput::from_json_str(json).unwrap();
        let ids: Vec<_> = data.users.iter().filter_map(|u| u.user_id.clone()).collect();
        assert_eq!(ids, vec![UserId::from("a"), UserId::from("c")]);
        assert_eq!(data.users[0].follower_count(), 1500);
        assert_eq!(data.users[1].follower_count(), 7);

        assert_eq!(data.tweets_timeline.len(), 2);
        assert_eq!(data.tweets_timeline[0], TweetRecord::source("m1", "a", 0.0));
        assert_eq!(data.tweets_timeline[1], TweetRecord::reshare("m1", "c", 120.0));
    }

    #[test]
    fn test_negative_followers_clamp_to_zero() {
        let user = UserRecord::new("x").with_followers(-5);
        assert_eq!(user.follower_count(), 0);
    }

    #[test]
    fn test_edges_parse_as_pairs() {
        let json = r#"{"users": [], "network_edges": [["a", "b"], [3, 4]]}"#;
        let data = DatasetInput::from_json_str(json).unwrap();
        let edges = data.network_edges.unwrap();
        assert_eq!(edges[1], (UserId::from("3"), UserId::from("4")));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");

        let data = DatasetInput::new(
            vec![UserRecord::new("a")],
            vec![TweetRecord::source("m1", "a", 0.0)],
        );
        data.write_to_file(&path).unwrap();

        let loaded = DatasetInput::from_json_file(&path).unwrap();
        assert_eq!(loaded, data);
    }
}
