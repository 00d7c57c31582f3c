//! Misinformation Diffusion Core
//!
//! A discrete-event model of one or more misinformation items spreading over
//! a follower graph, with platform countermeasures pushing back:
//! 1. **Users** decide to share or retract from per-user probabilities
//! 2. **Countermeasures** (key-node, fact-check, early-warning) activate on
//!    aggregate thresholds, optionally after a delay
//! 3. **The engine** dispatches scheduled events tick by tick and records a
//!    metrics time series
//!
//! ```ignore
//! use misinfo_core::{DiffusionEngine, EngineConfig, CountermeasureConfig};
//!
//! let config = EngineConfig::default()
//!     .with_seed(7)
//!     .with_countermeasure(CountermeasureConfig::fact_check(50, 30));
//! let mut engine = DiffusionEngine::new(&data, config)?;
//! let series = engine.run(500)?;
//! println!("final shares: {}", series.final_total_shares());
//! ```

pub mod agent;
pub mod config;
pub mod countermeasure;
pub mod engine;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod schedule;
pub mod stats;
pub mod user;

pub use agent::{Agent, AgentId};
pub use config::{CountermeasureConfig, CountermeasureKind, CountermeasureSettings, EngineConfig};
pub use countermeasure::{BroadcastRequest, CountermeasureController};
pub use engine::DiffusionEngine;
pub use error::{ConfigError, EngineError};
pub use graph::SocialGraph;
pub use metrics::{BroadcastRecord, MetricsSeries, TickSnapshot};
pub use schedule::{EventSchedule, ScheduledEvent};
pub use stats::{MisinfoStats, StatsTable};
pub use user::{UserReaction, UserState};
