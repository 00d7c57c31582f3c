//! Engine and countermeasure configuration.
//!
//! Two surfaces feed the same [`EngineConfig`]:
//! - a JSON document with a `countermeasures` list tagged by `type`
//! - the flat settings map ([`CountermeasureSettings`]) with
//!   `<kind>_enabled` / `<kind>_threshold` style keys
//!
//! Both are validated before an engine is built. An unknown countermeasure
//! type is always fatal.

use crate::error::ConfigError;
use misinfo_env::{Tick, DEFAULT_TIME_UNIT_SECS};
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// COUNTERMEASURE KINDS
// =============================================================================

/// The three supported platform interventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountermeasureKind {
    /// Targets high-influence accounts once they dominate the sharers
    KeyNode,

    /// Labels content after a fixed review delay
    FactCheck,

    /// Immediate warning to a random slice of the population
    EarlyWarning,
}

impl CountermeasureKind {
    /// Returns all kinds in their fixed evaluation order.
    pub fn all() -> Vec<CountermeasureKind> {
        vec![
            CountermeasureKind::KeyNode,
            CountermeasureKind::FactCheck,
            CountermeasureKind::EarlyWarning,
        ]
    }

    /// Returns the configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            CountermeasureKind::KeyNode => "key_node",
            CountermeasureKind::FactCheck => "fact_check",
            CountermeasureKind::EarlyWarning => "early_warning",
        }
    }
}

impl std::fmt::Display for CountermeasureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for CountermeasureKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "key_node" | "keynode" => Ok(CountermeasureKind::KeyNode),
            "fact_check" | "factcheck" => Ok(CountermeasureKind::FactCheck),
            "early_warning" | "earlywarning" => Ok(CountermeasureKind::EarlyWarning),
            _ => Err(ConfigError::UnknownCountermeasure(s.to_string())),
        }
    }
}

// =============================================================================
// COUNTERMEASURE CONFIG
// =============================================================================

/// Parameters for one configured countermeasure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CountermeasureConfig {
    KeyNode {
        /// Fraction of current sharers that must be high-influence (strictly exceeded)
        activation_threshold: f64,
        /// Follower count above which a user counts as high-influence
        target_threshold: u64,
    },
    FactCheck {
        /// Cumulative share count that starts the review
        activation_threshold: u64,
        /// Ticks between trigger and broadcast
        delay: Tick,
    },
    EarlyWarning {
        /// Cumulative share count that fires the warning
        activation_threshold: u64,
        /// Fraction of all users that receive the warning
        coverage_ratio: f64,
    },
}

impl CountermeasureConfig {
    /// Returns the reference defaults for a kind.
    pub fn default_for(kind: CountermeasureKind) -> Self {
        match kind {
            CountermeasureKind::KeyNode => CountermeasureConfig::KeyNode {
                activation_threshold: 0.1,
                target_threshold: 100_000,
            },
            CountermeasureKind::FactCheck => CountermeasureConfig::FactCheck {
                activation_threshold: 50,
                delay: 30,
            },
            CountermeasureKind::EarlyWarning => CountermeasureConfig::EarlyWarning {
                activation_threshold: 10,
                coverage_ratio: 0.3,
            },
        }
    }

    pub fn key_node(activation_threshold: f64, target_threshold: u64) -> Self {
        CountermeasureConfig::KeyNode {
            activation_threshold,
            target_threshold,
        }
    }

    pub fn fact_check(activation_threshold: u64, delay: Tick) -> Self {
        CountermeasureConfig::FactCheck {
            activation_threshold,
            delay,
        }
    }

    pub fn early_warning(activation_threshold: u64, coverage_ratio: f64) -> Self {
        CountermeasureConfig::EarlyWarning {
            activation_threshold,
            coverage_ratio,
        }
    }

    /// Returns the kind of this configuration.
    pub fn kind(&self) -> CountermeasureKind {
        match self {
            CountermeasureConfig::KeyNode { .. } => CountermeasureKind::KeyNode,
            CountermeasureConfig::FactCheck { .. } => CountermeasureKind::FactCheck,
            CountermeasureConfig::EarlyWarning { .. } => CountermeasureKind::EarlyWarning,
        }
    }

    /// Checks parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            CountermeasureConfig::KeyNode {
                activation_threshold,
                ..
            } => {
                if !activation_threshold.is_finite() || *activation_threshold < 0.0 {
                    return Err(ConfigError::invalid(
                        "key_node.activation_threshold",
                        format!("must be a non-negative fraction, got {}", activation_threshold),
                    ));
                }
            }
            CountermeasureConfig::FactCheck { .. } => {}
            CountermeasureConfig::EarlyWarning { coverage_ratio, .. } => {
                if !(0.0..=1.0).contains(coverage_ratio) {
                    return Err(ConfigError::invalid(
                        "early_warning.coverage_ratio",
                        format!("must be within [0, 1], got {}", coverage_ratio),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Converts a count threshold given as a float into a share count.
///
/// Share counts are integers, so "reaches 2.5" is the same as "reaches 3".
fn count_threshold(name: &str, value: f64) -> Result<u64, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(
            name,
            format!("must be a non-negative count, got {}", value),
        ));
    }
    Ok(value.ceil() as u64)
}

/// One entry of the `countermeasures` list in a JSON config document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCountermeasure {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub activation_threshold: Option<f64>,

    #[serde(default)]
    pub target_threshold: Option<u64>,

    #[serde(default)]
    pub delay: Option<Tick>,

    #[serde(default)]
    pub coverage_ratio: Option<f64>,
}

fn default_enabled() -> bool {
    true
}

impl RawCountermeasure {
    /// Resolves the entry against the kind's defaults.
    ///
    /// Returns `Ok(None)` for disabled entries. The type is checked first, so
    /// a disabled entry with an unknown type is still rejected.
    pub fn resolve(&self) -> Result<Option<CountermeasureConfig>, ConfigError> {
        let kind: CountermeasureKind = self.kind.parse()?;
        if !self.enabled {
            return Ok(None);
        }

        let config = match CountermeasureConfig::default_for(kind) {
            CountermeasureConfig::KeyNode {
                activation_threshold,
                target_threshold,
            } => CountermeasureConfig::KeyNode {
                activation_threshold: self.activation_threshold.unwrap_or(activation_threshold),
                target_threshold: self.target_threshold.unwrap_or(target_threshold),
            },
            CountermeasureConfig::FactCheck {
                activation_threshold,
                delay,
            } => CountermeasureConfig::FactCheck {
                activation_threshold: match self.activation_threshold {
                    Some(v) => count_threshold("fact_check.activation_threshold", v)?,
                    None => activation_threshold,
                },
                delay: self.delay.unwrap_or(delay),
            },
            CountermeasureConfig::EarlyWarning {
                activation_threshold,
                coverage_ratio,
            } => CountermeasureConfig::EarlyWarning {
                activation_threshold: match self.activation_threshold {
                    Some(v) => count_threshold("early_warning.activation_threshold", v)?,
                    None => activation_threshold,
                },
                coverage_ratio: self.coverage_ratio.unwrap_or(coverage_ratio),
            },
        };

        config.validate()?;
        Ok(Some(config))
    }
}

// =============================================================================
// FLAT SETTINGS MAP
// =============================================================================

/// The flat `<kind>_<param>` settings map.
///
/// Missing keys take the reference defaults; a kind is only configured when
/// its `_enabled` flag is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountermeasureSettings {
    pub key_node_enabled: bool,
    pub key_node_threshold: Option<f64>,
    pub key_node_followers: Option<u64>,

    pub fact_check_enabled: bool,
    pub fact_check_threshold: Option<f64>,
    pub fact_check_delay: Option<Tick>,

    pub early_warning_enabled: bool,
    pub early_warning_threshold: Option<f64>,
    pub early_warning_coverage: Option<f64>,
}

impl CountermeasureSettings {
    /// Expands the enabled kinds into validated configs, in kind order.
    pub fn to_configs(&self) -> Result<Vec<CountermeasureConfig>, ConfigError> {
        let entries = [
            RawCountermeasure {
                kind: CountermeasureKind::KeyNode.name().to_string(),
                enabled: self.key_node_enabled,
                activation_threshold: self.key_node_threshold,
                target_threshold: self.key_node_followers,
                delay: None,
                coverage_ratio: None,
            },
            RawCountermeasure {
                kind: CountermeasureKind::FactCheck.name().to_string(),
                enabled: self.fact_check_enabled,
                activation_threshold: self.fact_check_threshold,
                target_threshold: None,
                delay: self.fact_check_delay,
                coverage_ratio: None,
            },
            RawCountermeasure {
                kind: CountermeasureKind::EarlyWarning.name().to_string(),
                enabled: self.early_warning_enabled,
                activation_threshold: self.early_warning_threshold,
                target_threshold: None,
                delay: None,
                coverage_ratio: self.early_warning_coverage,
            },
        ];

        let mut configs = Vec::new();
        for entry in &entries {
            if let Some(config) = entry.resolve()? {
                configs.push(config);
            }
        }
        Ok(configs)
    }
}

// =============================================================================
// ENGINE CONFIG
// =============================================================================

/// Configuration for one diffusion run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Seed for the single random stream
    pub seed: u64,

    /// Seconds per tick
    pub time_unit_secs: f64,

    /// Deliver a source share to all of the author's followers immediately
    pub seed_followers_on_source: bool,

    /// Enabled countermeasures, at most one per kind
    pub countermeasures: Vec<CountermeasureConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            time_unit_secs: DEFAULT_TIME_UNIT_SECS,
            seed_followers_on_source: true,
            countermeasures: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    time_unit: Option<f64>,
    #[serde(default)]
    seed_followers_on_source: Option<bool>,
    #[serde(default)]
    countermeasures: Vec<RawCountermeasure>,
}

impl EngineConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_time_unit(mut self, secs: f64) -> Self {
        self.time_unit_secs = secs;
        self
    }

    /// Adds a countermeasure.
    pub fn with_countermeasure(mut self, config: CountermeasureConfig) -> Self {
        self.countermeasures.push(config);
        self
    }

    /// Adds every countermeasure enabled in a flat settings map.
    pub fn with_settings(mut self, settings: &CountermeasureSettings) -> Result<Self, ConfigError> {
        self.countermeasures.extend(settings.to_configs()?);
        Ok(self)
    }

    /// Parses a JSON config document on top of the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let doc: ConfigDocument = serde_json::from_str(json)?;
        let mut config = Self::default();

        if let Some(seed) = doc.seed {
            config.seed = seed;
        }
        if let Some(time_unit) = doc.time_unit {
            config.time_unit_secs = time_unit;
        }
        if let Some(seed_followers) = doc.seed_followers_on_source {
            config.seed_followers_on_source = seed_followers;
        }
        for raw in &doc.countermeasures {
            if let Some(cm) = raw.resolve()? {
                config.countermeasures.push(cm);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config document from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks the whole configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_unit_secs.is_finite() || self.time_unit_secs <= 0.0 {
            return Err(ConfigError::invalid(
                "time_unit",
                format!("must be positive, got {}", self.time_unit_secs),
            ));
        }

        let mut seen = Vec::new();
        for cm in &self.countermeasures {
            cm.validate()?;
            let kind = cm.kind();
            if seen.contains(&kind) {
                return Err(ConfigError::DuplicateCountermeasure(kind.name().to_string()));
            }
            seen.push(kind);
        }
        Ok(())
    }
}
