//! Misinformation Diffusion Scenario Harness
//!
//! Runs the diffusion engine under each countermeasure scenario and compares
//! it with an unchecked baseline on the same population and seed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ScenarioRunner                        │
//! │                                                              │
//! │  SimContext (master seed)                                    │
//! │     ├── population seed ──► PopulationGenerator ──┐          │
//! │     └── engine seed ─────────────────────────────┐│          │
//! │                                                  ▼▼          │
//! │      scenario config ──► DiffusionEngine ──► MetricsSeries   │
//! │      baseline config ──► DiffusionEngine ──► MetricsSeries   │
//! │                                                  │           │
//! │                              ScenarioResult ◄────┘           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use misinfo_sim::{ScenarioRunner, ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 1000).with_ticks(500);
//! let result = runner.run(ScenarioId::FactCheck);
//! println!("suppression: {:.1}%", result.suppression * 100.0);
//! ```

mod context;
mod error;
mod exporter;
mod population;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{ExportSummary, SimExport};
pub use population::{PopulationConfig, PopulationGenerator};
pub use runner::{suppression_ratio, ScenarioMetrics, ScenarioResult, ScenarioRun, ScenarioRunner};
pub use scenarios::ScenarioId;
