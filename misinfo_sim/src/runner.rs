//! Scenario runner - executes a countermeasure scenario against its baseline.
//!
//! Both runs share the population and the engine seed; only the enabled
//! countermeasures differ. The comparison is reported as a suppression
//! ratio: `1 - shares / baseline_shares`.

use crate::context::SimContext;
use crate::error::SimError;
use crate::population::{PopulationConfig, PopulationGenerator};
use crate::scenarios::ScenarioId;

use misinfo_core::{CountermeasureKind, DiffusionEngine, EngineConfig, MetricsSeries};
use misinfo_env::{DatasetInput, MisinfoId, RunId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    pub run_id: RunId,

    /// Whether the run completed and every invariant check held
    pub passed: bool,

    /// Ticks executed by the scenario run
    pub total_ticks: u64,

    pub users: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics of the scenario run
    pub metrics: ScenarioMetrics,

    /// Metrics of the same population without countermeasures
    pub baseline: ScenarioMetrics,

    /// `1 - shares / baseline_shares`, 0 when the baseline never spread
    pub suppression: f64,
}

impl ScenarioResult {
    fn failed(scenario: ScenarioId, context: &SimContext, reason: String) -> Self {
        Self {
            scenario,
            seed: context.seed(),
            run_id: context.run_id(),
            passed: false,
            total_ticks: 0,
            users: 0,
            failure_reason: Some(reason),
            metrics: ScenarioMetrics::default(),
            baseline: ScenarioMetrics::default(),
            suppression: 0.0,
        }
    }
}

/// End-of-run aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub total_shares: u64,
    pub total_retractions: u64,
    pub peak_active_users: usize,

    /// Users reached per item, summed over items
    pub reached_users: usize,

    /// Users that received a countermeasure, summed over items
    pub countermeasure_coverage: usize,

    pub broadcasts: usize,
}

impl ScenarioMetrics {
    pub fn from_series(series: &MetricsSeries) -> Self {
        let last = series.last();
        Self {
            total_shares: series.final_total_shares(),
            total_retractions: last.map_or(0, |s| s.total_retractions),
            peak_active_users: series.peak_active_users(),
            reached_users: last.map_or(0, |s| s.misinfo_spread.values().sum()),
            countermeasure_coverage: last.map_or(0, |s| s.countermeasure_coverage.values().sum()),
            broadcasts: series.broadcasts().count(),
        }
    }
}

/// A scenario result together with the full metrics series.
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub result: ScenarioResult,
    pub series: MetricsSeries,
}

/// Runs countermeasure scenarios.
pub struct ScenarioRunner {
    context: SimContext,

    /// Shape of the synthetic population, ignored when a dataset is set
    population: PopulationConfig,

    /// Preprocessed dataset to run instead of a synthetic population
    dataset: Option<DatasetInput>,

    /// Time unit, flags and countermeasure parameters for every run
    base_config: EngineConfig,

    /// Upper bound on ticks per run
    max_ticks: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner over a synthetic population.
    pub fn new(seed: u64, num_users: usize) -> Self {
        Self {
            context: SimContext::new(seed),
            population: PopulationConfig::default().with_users(num_users),
            dataset: None,
            base_config: EngineConfig::default(),
            max_ticks: 500,
        }
    }

    /// Sets the tick budget.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }

    pub fn with_population(mut self, population: PopulationConfig) -> Self {
        self.population = population;
        self
    }

    /// Runs on a preprocessed dataset instead of a synthetic population.
    pub fn with_dataset(mut self, dataset: DatasetInput) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Uses a loaded configuration as the base for every run.
    ///
    /// The runner's seed always replaces the config's seed, and each scenario
    /// picks the countermeasure kinds it enables.
    pub fn with_base_config(mut self, config: EngineConfig) -> Self {
        self.base_config = config;
        self
    }

    pub fn with_time_unit(mut self, secs: f64) -> Self {
        self.base_config.time_unit_secs = secs;
        self
    }

    pub fn seed(&self) -> u64 {
        self.context.seed()
    }

    /// Runs a scenario and returns the result. Errors become a failed result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        match self.run_detailed(scenario) {
            Ok(run) => run.result,
            Err(e) => {
                warn!("Scenario {} (seed={}) aborted: {}", scenario.name(), self.seed(), e);
                ScenarioResult::failed(scenario, &self.context, e.to_string())
            }
        }
    }

    /// Runs a scenario and its baseline, keeping the scenario's series.
    pub fn run_detailed(&self, scenario: ScenarioId) -> Result<ScenarioRun, SimError> {
        info!(
            "Starting scenario: {} (seed={}, run={})",
            scenario.name(),
            self.seed(),
            self.context.run_id()
        );
        debug!("  {}", scenario.description());

        let data = self.dataset()?;
        let engine = self.simulate(&data, scenario)?;
        let series = engine.metrics().clone();
        let metrics = ScenarioMetrics::from_series(&series);
        let failure_reason = check_invariants(&engine).err();

        let baseline = if scenario.is_baseline() {
            metrics.clone()
        } else {
            let baseline_engine = self.simulate(&data, ScenarioId::Baseline)?;
            ScenarioMetrics::from_series(baseline_engine.metrics())
        };
        let suppression = suppression_ratio(metrics.total_shares, baseline.total_shares);

        info!(
            "  {} | ticks={} | shares={} (baseline {}) | retractions={} | broadcasts={} | suppression={:.1}%",
            scenario.name(),
            series.len(),
            metrics.total_shares,
            baseline.total_shares,
            metrics.total_retractions,
            metrics.broadcasts,
            suppression * 100.0
        );

        let result = ScenarioResult {
            scenario,
            seed: self.seed(),
            run_id: self.context.run_id(),
            passed: failure_reason.is_none(),
            total_ticks: series.len() as u64,
            users: engine.users().len(),
            failure_reason,
            metrics,
            baseline,
            suppression,
        };
        Ok(ScenarioRun { result, series })
    }

    fn dataset(&self) -> Result<Cow<'_, DatasetInput>, SimError> {
        match &self.dataset {
            Some(data) => Ok(Cow::Borrowed(data)),
            None => {
                let mut generator = PopulationGenerator::from_rng(
                    self.context.population_rng(),
                    self.population.clone(),
                );
                Ok(Cow::Owned(generator.generate()?))
            }
        }
    }

    /// Engine configuration for a scenario.
    pub fn engine_config(&self, scenario: ScenarioId) -> EngineConfig {
        EngineConfig {
            seed: self.context.engine_seed(),
            countermeasures: scenario.countermeasures(&self.base_config.countermeasures),
            ..self.base_config.clone()
        }
    }

    fn simulate(&self, data: &DatasetInput, scenario: ScenarioId) -> Result<DiffusionEngine, SimError> {
        let mut engine = DiffusionEngine::new(data, self.engine_config(scenario))?;
        engine.run_until_finished(self.max_ticks)?;
        Ok(engine)
    }
}

/// Fraction of baseline shares a countermeasure run avoided.
///
/// Negative when the run spread further than its baseline.
pub fn suppression_ratio(shares: u64, baseline_shares: u64) -> f64 {
    if baseline_shares == 0 {
        0.0
    } else {
        1.0 - shares as f64 / baseline_shares as f64
    }
}

/// Post-run assertions on a finished engine.
fn check_invariants(engine: &DiffusionEngine) -> Result<(), String> {
    for user in engine.users() {
        if !user.shared_misinfo().is_subset(user.received_misinfo()) {
            return Err(format!("user {} shares an item it never received", user.user_id));
        }
    }

    for (id, stats) in engine.stats().iter() {
        if stats.retraction_count > stats.share_count {
            return Err(format!(
                "{}: {} retractions exceed {} shares",
                id, stats.retraction_count, stats.share_count
            ));
        }
    }

    for pair in engine.metrics().snapshots().windows(2) {
        if pair[1].total_shares < pair[0].total_shares {
            return Err(format!("share total decreased at tick {}", pair[1].tick));
        }
    }

    let mut fired: BTreeSet<(CountermeasureKind, &MisinfoId)> = BTreeSet::new();
    for broadcast in engine.metrics().broadcasts() {
        if !fired.insert((broadcast.kind, &broadcast.misinfo_id)) {
            return Err(format!(
                "{} fired twice for {}",
                broadcast.kind, broadcast.misinfo_id
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use misinfo_core::CountermeasureConfig;
    use misinfo_env::{TweetRecord, UserRecord};

    #[test]
    fn test_baseline_scenario() {
        let runner = ScenarioRunner::new(42, 300).with_ticks(100);
        let result = runner.run(ScenarioId::Baseline);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.users, 300);
        assert!(result.metrics.total_shares >= 1);
        assert_eq!(result.metrics, result.baseline);
        assert_eq!(result.suppression, 0.0);
        assert_eq!(result.metrics.broadcasts, 0);
    }

    #[test]
    fn test_synthetic_population_uses_context_stream() {
        let runner = ScenarioRunner::new(11, 50);
        let expected = PopulationGenerator::from_rng(
            SimContext::new(11).population_rng(),
            PopulationConfig::default().with_users(50),
        )
        .generate()
        .unwrap();
        assert_eq!(*runner.dataset().unwrap(), expected);
    }

    #[test]
    fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(7, 200).with_ticks(80);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
            assert!(result.total_ticks <= 80);
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = ScenarioRunner::new(9, 250).with_ticks(60).run(ScenarioId::Combined);
        let b = ScenarioRunner::new(9, 250).with_ticks(60).run(ScenarioId::Combined);
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.baseline, b.baseline);
        assert_eq!(a.run_id, b.run_id);
    }

    #[test]
    fn test_dataset_and_overrides() {
        let users = vec![
            UserRecord::new("a").with_followers(10),
            UserRecord::new("b").with_followers(10),
        ];
        let timeline = vec![
            TweetRecord::source("m1", "a", 0.0),
            TweetRecord::source("m1", "b", 0.0),
        ];
        let config = EngineConfig::default().with_countermeasure(CountermeasureConfig::early_warning(2, 1.0));
        let runner = ScenarioRunner::new(1, 10_000)
            .with_dataset(DatasetInput::new(users, timeline))
            .with_base_config(config)
            .with_ticks(10);

        let run = runner.run_detailed(ScenarioId::EarlyWarning).unwrap();
        assert_eq!(run.result.users, 2);
        assert_eq!(run.result.metrics.broadcasts, 1);
        assert_eq!(run.result.metrics.countermeasure_coverage, 2);
        assert_eq!(run.series.len() as u64, run.result.total_ticks);
    }

    #[test]
    fn test_engine_error_becomes_failed_result() {
        let runner = ScenarioRunner::new(3, 50).with_time_unit(0.0);
        let result = runner.run(ScenarioId::FactCheck);
        assert!(!result.passed);
        assert!(result.failure_reason.is_some());
    }

    #[test]
    fn test_suppression_ratio() {
        assert_eq!(suppression_ratio(10, 0), 0.0);
        assert_eq!(suppression_ratio(0, 0), 0.0);
        assert!((suppression_ratio(25, 100) - 0.75).abs() < 1e-12);
        assert!(suppression_ratio(120, 100) < 0.0);
    }
}
