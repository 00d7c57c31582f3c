//! Misinformation Simulator Input Boundary
//!
//! This crate holds everything the diffusion engine receives from the
//! outside world, and nothing it computes:
//!
//! - Identity types (`UserId`, `MisinfoId`, `Tick`, `RunId`)
//! - Pre-shaped records from the preprocessing stage (`UserRecord`,
//!   `TweetRecord`, `DatasetInput`)
//! - Errors raised while loading them
//!
//! Raw platform ingestion (file discovery, timestamp parsing, schema
//! reconciliation) happens upstream. By the time data reaches this crate,
//! every timeline record carries `time_since_start` in seconds.
//!
//! # Example
//!
//! ```ignore
//! use misinfo_env::DatasetInput;
//!
//! let data = DatasetInput::from_json_file("charliehebdo.json")?;
//! println!("{} users, {} events", data.users.len(), data.tweets_timeline.len());
//! ```

mod error;
mod records;
mod types;

pub use error::InputError;
pub use records::{DatasetInput, TweetRecord, UserRecord};
pub use types::{MisinfoId, RunId, Tick, UserId, DEFAULT_TIME_UNIT_SECS};
