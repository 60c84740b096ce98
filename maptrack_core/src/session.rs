//! The MapTrack session - one recording plus everything derived from it.
//!
//! Owns the store, the range cursor and both grids. The host calls
//! [`MapTrack::record`] on every sample tick and [`MapTrack::refresh`] before
//! drawing; each refresh only redoes the work the cursor reports as needed.

use nalgebra::Vector3;
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

use crate::config::MapTrackConfig;
use crate::cursor::RangeCursor;
use crate::error::TrackResult;
use crate::fileio::{load_track_file, save_track_file, FileVersion};
use crate::fog::FogOfWar;
use crate::projection::LinearProjection;
use crate::timemap::TimeMap;
use crate::track::TrackStore;

/// What a [`MapTrack::refresh`] computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSummary {
    /// `(t_start, t_end)` of the visible window
    pub window: (f32, f32),

    /// Visible point indices
    pub range: Range<usize>,

    /// Path length over the visible points
    pub length: f64,

    pub fog_rebuilt: bool,

    pub time_map_rebuilt: bool,
}

pub struct MapTrack {
    config: MapTrackConfig,
    store: TrackStore,
    cursor: RangeCursor,
    fog: FogOfWar,
    time_map: TimeMap,

    /// Length of the last visible range
    length: f64,
}

impl MapTrack {
    pub fn new(config: MapTrackConfig) -> TrackResult<Self> {
        config.validate()?;
        Ok(Self {
            store: TrackStore::with_merge_distance(config.min_distance)?,
            cursor: RangeCursor::new(),
            fog: FogOfWar::new(config.fog_of_war)?,
            time_map: TimeMap::new(config.time_map.resolution)?,
            length: 0.0,
            config,
        })
    }

    /// Applies new settings. Grids whose parameters changed rebuild on the
    /// next refresh; nothing changes if the settings are invalid.
    pub fn set_config(&mut self, config: MapTrackConfig) -> TrackResult<()> {
        config.validate()?;
        self.store.set_merge_distance(config.min_distance)?;
        self.fog.set_config(config.fog_of_war)?;
        self.time_map.set_resolution(config.time_map.resolution)?;
        if config.projection != self.config.projection {
            self.cursor.invalidate();
            self.time_map.invalidate();
            // Same fog parameters, but every stamp moved
            self.fog = FogOfWar::new(config.fog_of_war)?;
        }
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &MapTrackConfig {
        &self.config
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn fog(&self) -> &FogOfWar {
        &self.fog
    }

    pub fn time_map(&self) -> &TimeMap {
        &self.time_map
    }

    pub fn projection(&self) -> &LinearProjection {
        &self.config.projection
    }

    /// Length of the visible track as of the last refresh.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Feeds one sample to the store.
    ///
    /// Returns `false` without touching the store while tracking is disabled.
    pub fn record(&mut self, position: Vector3<f32>, time: f32) -> TrackResult<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        self.store.add_point(position, time)?;
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn save(&self, path: impl AsRef<Path>) -> TrackResult<()> {
        save_track_file(path, &self.store)
    }

    /// Replaces the track with the one at `path`; on failure the current
    /// track is kept.
    pub fn load(&mut self, path: impl AsRef<Path>) -> TrackResult<FileVersion> {
        load_track_file(path, &mut self.store)
    }

    /// Brings the visible range and both grids up to date.
    ///
    /// # Arguments
    /// * `subject` - Live position to stamp on the fog, if known
    /// * `now` - Current game time (days)
    pub fn refresh(&mut self, subject: Option<&Vector3<f32>>, now: f32) -> TrackResult<FrameSummary> {
        let window = self.config.timeline.window(now)?;
        let query = self.cursor.query(&self.store, window.0, window.1)?;

        if query.changed {
            self.length = self.store.compute_length(query.range());
        }

        let projection = &self.config.projection;
        let fog_rebuilt = if self.config.fog_of_war.enabled {
            self.fog.update(&self.store, &query, projection, subject)?
        } else {
            false
        };

        let time_map_rebuilt = if self.config.time_map.enabled {
            self.time_map.update(&self.store, &query, projection)?
        } else {
            self.time_map.invalidate();
            false
        };

        Ok(FrameSummary {
            window,
            range: query.range(),
            length: self.length,
            fog_rebuilt,
            time_map_rebuilt,
        })
    }
}
