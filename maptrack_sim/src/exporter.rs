//! JSON exporter for replay runs.
//!
//! Captures every refreshed frame plus the final track, so a run can be
//! plotted or diffed against another seed.

use maptrack_core::{FrameSummary, MapTrackConfig, TrackPoint};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SimError;
use crate::runner::ReplayResult;

/// A single refreshed frame.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayFrame {
    pub tick: u64,

    /// Sample time (days)
    pub time: f32,

    /// Live position stamped on the fog
    pub position: [f32; 3],

    #[serde(flatten)]
    pub summary: FrameSummary,
}

/// Complete replay export.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayExport {
    pub seed: u64,

    /// Settings the session ran with
    pub config: MapTrackConfig,

    pub frames: Vec<ReplayFrame>,

    /// Retained points at the end of the run
    pub track: Vec<TrackPoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ReplayResult>,
}

impl ReplayExport {
    pub fn new(seed: u64, config: MapTrackConfig) -> Self {
        Self {
            seed,
            config,
            frames: Vec::new(),
            track: Vec::new(),
            result: None,
        }
    }

    pub fn add_frame(&mut self, frame: ReplayFrame) {
        self.frames.push(frame);
    }

    /// Records the final track and outcome.
    pub fn finalize(&mut self, track: &[TrackPoint], result: ReplayResult) {
        self.track = track.to_vec();
        self.result = Some(result);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
