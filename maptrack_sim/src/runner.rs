//! Replay runner - drives a MapTrack session from a sampler.
//!
//! One run mimics a play session: samples arrive every tick, the viewer
//! refreshes every few ticks, and optionally the player reloads an earlier
//! save part way through. At the end the track is written to disk and read
//! back into a fresh session.

use maptrack_core::{MapTrack, MapTrackConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::SimError;
use crate::exporter::{ReplayExport, ReplayFrame};
use crate::walker::{RandomWalk, Sampler, WalkConfig};

/// Replay parameters.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Seed of the walker
    pub seed: u64,

    /// Game days to simulate
    pub days: f32,

    /// Ticks between two viewer refreshes
    pub refresh_every: u64,

    /// Ticks between two save games
    pub checkpoint_every: u64,

    /// Fraction of the run (0..1) at which the last save is reloaded
    pub rewind_at: Option<f32>,

    /// Where to write the track file at the end of the run
    pub track_path: Option<PathBuf>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            days: 1.0,
            refresh_every: 12,
            checkpoint_every: 360,
            rewind_at: None,
            track_path: None,
        }
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayResult {
    pub seed: u64,

    pub ticks: u64,

    /// Samples accepted by the session
    pub samples: u64,

    /// Points left after decimation and rewinds
    pub retained_points: usize,

    pub rewinds: u64,

    /// Visible path length at the last refresh
    pub length: f64,

    pub refreshes: u64,

    pub fog_rebuilds: u64,

    pub time_map_rebuilds: u64,

    /// Fog cells no longer at the default alpha
    pub discovered_cells: usize,

    /// Largest time spent in one cell (days)
    pub hottest_cell: f32,

    /// Track file reloaded bit for bit, when one was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_trip: Option<bool>,

    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Runs replays against one set of session settings.
pub struct ReplayRunner {
    config: ReplayConfig,
    track_config: MapTrackConfig,
}

impl ReplayRunner {
    pub fn new(config: ReplayConfig, track_config: MapTrackConfig) -> Result<Self, SimError> {
        if !(config.days > 0.0) {
            return Err(SimError::invalid(format!("days must be positive, got {}", config.days)));
        }
        if config.refresh_every == 0 || config.checkpoint_every == 0 {
            return Err(SimError::invalid("refresh and checkpoint intervals must be at least 1"));
        }
        if let Some(at) = config.rewind_at {
            if !(0.0..=1.0).contains(&at) {
                return Err(SimError::invalid(format!("rewind_at must be within 0..=1, got {at}")));
            }
        }
        track_config.validate()?;
        Ok(Self {
            config,
            track_config,
        })
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Walker matching the session's sample period.
    pub fn walker(&self) -> Result<RandomWalk, SimError> {
        let walk = WalkConfig {
            update_period: self.track_config.update_period,
            ..WalkConfig::default()
        };
        RandomWalk::new(self.config.seed, walk)
    }

    /// Runs with the default random walk.
    pub fn run(&self, export: Option<&mut ReplayExport>) -> Result<ReplayResult, SimError> {
        let mut walker = self.walker()?;
        let ticks = (self.config.days / walker.tick_days()).ceil() as u64;
        self.run_with(&mut walker, ticks, export)
    }

    /// Feeds `ticks` samples from `sampler` through a fresh session.
    pub fn run_with<S: Sampler>(
        &self,
        sampler: &mut S,
        ticks: u64,
        mut export: Option<&mut ReplayExport>,
    ) -> Result<ReplayResult, SimError> {
        info!("Starting replay (seed={}, ticks={})", self.config.seed, ticks);

        let mut session = MapTrack::new(self.track_config.clone())?;
        let rewind_tick = self
            .config
            .rewind_at
            .map(|at| (at * ticks as f32) as u64);

        let mut checkpoint = None;
        let mut failure = None;
        let mut result = ReplayResult {
            seed: self.config.seed,
            ticks,
            samples: 0,
            retained_points: 0,
            rewinds: 0,
            length: 0.0,
            refreshes: 0,
            fog_rebuilds: 0,
            time_map_rebuilds: 0,
            discovered_cells: 0,
            hottest_cell: 0.0,
            round_trip: None,
            passed: false,
            failure_reason: None,
        };

        for tick in 0..ticks {
            if Some(tick) == rewind_tick {
                if let Some(saved) = &checkpoint {
                    sampler.restore(saved);
                    result.rewinds += 1;
                    info!("Reloaded save at tick {} (t={:.4})", tick, sampler.checkpoint().time);
                } else {
                    warn!("Rewind requested at tick {} before any save", tick);
                }
            }
            if tick % self.config.checkpoint_every == 0 {
                checkpoint = Some(sampler.checkpoint());
            }

            let sample = sampler.sample();
            if session.record(sample.position, sample.time)? {
                result.samples += 1;
            }

            let points = session.store().points();
            if failure.is_none() && points.windows(2).any(|w| w[0].time > w[1].time) {
                failure = Some(format!("track out of order after tick {tick}"));
            }

            if tick % self.config.refresh_every == 0 || tick + 1 == ticks {
                let frame = session.refresh(Some(&sample.position), sample.time)?;
                result.refreshes += 1;
                result.fog_rebuilds += u64::from(frame.fog_rebuilt);
                result.time_map_rebuilds += u64::from(frame.time_map_rebuilt);
                result.length = frame.length;

                if tick % (self.config.refresh_every * 30) == 0 {
                    debug!(
                        "  t={:.3}d | points={} | visible={:?} | length={:.0}",
                        sample.time,
                        session.store().len(),
                        frame.range,
                        frame.length
                    );
                }
                if let Some(export) = export.as_deref_mut() {
                    export.add_frame(ReplayFrame {
                        tick,
                        time: sample.time,
                        position: sample.position.into(),
                        summary: frame,
                    });
                }
            }
        }

        result.retained_points = session.store().len();
        let untouched = maptrack_core::fog::alpha_to_byte(session.config().fog_of_war.default_alpha);
        result.discovered_cells = session.fog().cells().iter().filter(|c| **c != untouched).count();
        result.hottest_cell = session.time_map().value_range().1;

        if let Some(path) = &self.config.track_path {
            session.save(path)?;
            let mut reloaded = MapTrack::new(self.track_config.clone())?;
            reloaded.load(path)?;
            let same = reloaded.store().points() == session.store().points();
            if !same && failure.is_none() {
                failure = Some(format!("track file {} did not reload identically", path.display()));
            }
            result.round_trip = Some(same);
        }

        if failure.is_none() && result.retained_points as u64 > result.samples {
            failure = Some("more points retained than samples recorded".to_string());
        }

        result.passed = failure.is_none();
        result.failure_reason = failure;

        if let Some(export) = export {
            export.finalize(session.store().points(), result.clone());
        }
        Ok(result)
    }
}
