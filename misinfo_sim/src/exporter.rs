//! JSON exporter for scenario runs.
//!
//! Writes the per-tick snapshots of one run plus a summary, for plotting or
//! offline comparison.

use crate::error::SimError;
use crate::runner::{ScenarioMetrics, ScenarioResult};
use misinfo_core::{BroadcastRecord, MetricsSeries, TickSnapshot};
use misinfo_env::RunId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Final results attached to an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    pub metrics: ScenarioMetrics,
    pub baseline: ScenarioMetrics,
    pub suppression: f64,

    /// Every broadcast of the run, in tick order
    pub broadcasts: Vec<BroadcastRecord>,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    pub run_id: RunId,

    /// Ticks covered by `frames`
    pub ticks: u64,

    /// One snapshot per tick
    pub frames: Vec<TickSnapshot>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ExportSummary>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, run_id: RunId) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            run_id,
            ticks: 0,
            frames: Vec::new(),
            summary: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: TickSnapshot) {
        self.ticks = frame.tick + 1;
        self.frames.push(frame);
    }

    /// Adds every snapshot of a series.
    pub fn add_series(&mut self, series: &MetricsSeries) {
        for snapshot in series.snapshots() {
            self.add_frame(snapshot.clone());
        }
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, result: &ScenarioResult) {
        let broadcasts = self
            .frames
            .iter()
            .flat_map(|f| f.broadcasts.iter().cloned())
            .collect();

        self.summary = Some(ExportSummary {
            passed: result.passed,
            failure_reason: result.failure_reason.clone(),
            metrics: result.metrics.clone(),
            baseline: result.baseline.clone(),
            suppression: result.suppression,
            broadcasts,
        });
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Reads an export back.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScenarioRunner;
    use crate::scenarios::ScenarioId;

    #[test]
    fn test_export_from_run() {
        let runner = ScenarioRunner::new(11, 150).with_ticks(40);
        let run = runner.run_detailed(ScenarioId::EarlyWarning).unwrap();

        let mut export = SimExport::new(run.result.scenario.name(), run.result.seed, run.result.run_id);
        export.add_series(&run.series);
        export.finalize(&run.result);

        assert_eq!(export.ticks, run.result.total_ticks);
        assert_eq!(export.frames.len(), run.series.len());
        let summary = export.summary.as_ref().unwrap();
        assert_eq!(summary.broadcasts.len(), run.result.metrics.broadcasts);
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        let mut export = SimExport::new("baseline", 42, RunId::from_seed(42));
        export.add_frame(TickSnapshot {
            tick: 0,
            total_shares: 1,
            active_users: 1,
            ..Default::default()
        });
        export.write_to_file(&path).unwrap();

        let back = SimExport::read_from_file(&path).unwrap();
        assert_eq!(back.scenario, "baseline");
        assert_eq!(back.run_id, export.run_id);
        assert_eq!(back.frames, export.frames);
        assert!(back.summary.is_none());
    }
}
