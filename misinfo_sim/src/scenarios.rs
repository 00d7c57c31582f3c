//! Countermeasure scenarios.

use misinfo_core::{CountermeasureConfig, CountermeasureKind};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// No intervention; the reference every other scenario is compared to
    Baseline,

    /// Target high-influence accounts and their audiences
    KeyNode,

    /// Delayed labelling of content that crossed a share threshold
    FactCheck,

    /// Immediate warning to a random slice of users
    EarlyWarning,

    /// All three countermeasures at once
    Combined,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::KeyNode,
            ScenarioId::FactCheck,
            ScenarioId::EarlyWarning,
            ScenarioId::Combined,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::KeyNode => "key_node",
            ScenarioId::FactCheck => "fact_check",
            ScenarioId::EarlyWarning => "early_warning",
            ScenarioId::Combined => "combined",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Unchecked diffusion, no countermeasures",
            ScenarioId::KeyNode => "Warn influencers and their followers once they dominate the sharers",
            ScenarioId::FactCheck => "Label the item for everyone it reached, after a review delay",
            ScenarioId::EarlyWarning => "Warn a random share of all users as soon as sharing starts",
            ScenarioId::Combined => "Key-node, fact-check and early-warning together",
        }
    }

    /// Countermeasure kinds enabled by this scenario, in evaluation order.
    pub fn kinds(&self) -> Vec<CountermeasureKind> {
        match self {
            ScenarioId::Baseline => vec![],
            ScenarioId::KeyNode => vec![CountermeasureKind::KeyNode],
            ScenarioId::FactCheck => vec![CountermeasureKind::FactCheck],
            ScenarioId::EarlyWarning => vec![CountermeasureKind::EarlyWarning],
            ScenarioId::Combined => CountermeasureKind::all(),
        }
    }

    /// Builds the countermeasure list for this scenario.
    ///
    /// Parameters come from `overrides` when it carries an entry of the same
    /// kind, otherwise from the kind's defaults.
    pub fn countermeasures(&self, overrides: &[CountermeasureConfig]) -> Vec<CountermeasureConfig> {
        self.kinds()
            .into_iter()
            .map(|kind| {
                overrides
                    .iter()
                    .find(|c| c.kind() == kind)
                    .cloned()
                    .unwrap_or_else(|| CountermeasureConfig::default_for(kind))
            })
            .collect()
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, ScenarioId::Baseline)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "none" => Ok(ScenarioId::Baseline),
            "key_node" | "keynode" => Ok(ScenarioId::KeyNode),
            "fact_check" | "factcheck" => Ok(ScenarioId::FactCheck),
            "early_warning" | "earlywarning" => Ok(ScenarioId::EarlyWarning),
            "combined" => Ok(ScenarioId::Combined),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
