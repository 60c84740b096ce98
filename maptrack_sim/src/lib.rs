//! MapTrack Replay Harness
//!
//! Drives a [`maptrack_core::MapTrack`] session the way a game would, minus
//! the game: a seeded sampler supplies positions, the runner records them,
//! refreshes the overlays on a viewer cadence and can reload an earlier save
//! mid-run.
//!
//! # Usage
//!
//! ```ignore
//! use maptrack_sim::{ReplayConfig, ReplayRunner};
//! use maptrack_core::MapTrackConfig;
//!
//! let config = ReplayConfig {
//!     seed: 42,
//!     days: 3.0,
//!     rewind_at: Some(0.5),
//!     ..Default::default()
//! };
//!
//! let runner = ReplayRunner::new(config, MapTrackConfig::default())?;
//! let result = runner.run(None)?;
//! ```

mod error;
pub mod exporter;
pub mod runner;
pub mod walker;

pub use error::SimError;
pub use exporter::{ReplayExport, ReplayFrame};
pub use runner::{ReplayConfig, ReplayResult, ReplayRunner};
pub use walker::{RandomWalk, Sample, Sampler, WalkConfig};
