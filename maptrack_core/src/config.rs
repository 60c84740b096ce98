//! Settings consumed by the core.
//!
//! Stored as JSON next to the track files. Every field has a default, so a
//! partial (or older) settings file still loads.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{TrackError, TrackResult};
use crate::projection::LinearProjection;
use crate::timeline::TimelineWindow;

/// Largest grid side accepted from a settings file.
pub const MAX_RESOLUTION: usize = 4096;

/// Fog of war grid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub enabled: bool,

    /// Cells per side
    pub resolution: usize,

    /// Radius, in cells, uncovered around each track point
    pub discover: usize,

    /// Alpha of cells never visited (0..1)
    pub default_alpha: f32,

    /// Alpha of cells near a track point (0..1)
    pub tracked_alpha: f32,

    /// Alpha of cells near the live position (0..1)
    pub player_alpha: f32,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: 128,
            discover: 4,
            default_alpha: 1.0,
            tracked_alpha: 0.5,
            player_alpha: 0.0,
        }
    }
}

impl FogConfig {
    pub fn validate(&self) -> TrackResult<()> {
        check_resolution(self.resolution)?;
        for (name, alpha) in [
            ("default_alpha", self.default_alpha),
            ("tracked_alpha", self.tracked_alpha),
            ("player_alpha", self.player_alpha),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(TrackError::invalid(format!("{name} must be within 0..=1, got {alpha}")));
            }
        }
        Ok(())
    }
}

/// Time map grid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeMapConfig {
    pub enabled: bool,

    /// Cells per side
    pub resolution: usize,
}

impl Default for TimeMapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: 128,
        }
    }
}

/// Top level settings of a MapTrack session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapTrackConfig {
    /// Whether new samples are recorded at all
    pub enabled: bool,

    /// Seconds between two samples (consumed by the sampler)
    pub update_period: f32,

    /// Merge distance of the track store, in world units
    pub min_distance: f32,

    pub timeline: TimelineWindow,

    pub fog_of_war: FogConfig,

    pub time_map: TimeMapConfig,

    pub projection: LinearProjection,
}

impl Default for MapTrackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_period: 5.0,
            // 1:205 map scale by 5x zoom
            min_distance: 10.0,
            timeline: TimelineWindow::default(),
            fog_of_war: FogConfig::default(),
            time_map: TimeMapConfig::default(),
            projection: LinearProjection::default(),
        }
    }
}

impl MapTrackConfig {
    /// Reads a settings file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> TrackResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        info!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Writes the settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> TrackResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> TrackResult<()> {
        if !self.update_period.is_finite() || self.update_period <= 0.0 {
            return Err(TrackError::invalid(format!(
                "update_period must be positive, got {}",
                self.update_period
            )));
        }
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            return Err(TrackError::invalid(format!(
                "min_distance must be finite and >= 0, got {}",
                self.min_distance
            )));
        }
        let scale = self.projection.scale;
        if !scale.iter().all(|s| s.is_finite() && *s != 0.0)
            || !self.projection.offset.iter().all(|o| o.is_finite())
        {
            return Err(TrackError::invalid("projection scale must be finite and non-zero"));
        }
        self.timeline.validate()?;
        self.fog_of_war.validate()?;
        check_resolution(self.time_map.resolution)
    }
}

pub(crate) fn check_resolution(resolution: usize) -> TrackResult<()> {
    if resolution == 0 || resolution > MAX_RESOLUTION {
        return Err(TrackError::invalid(format!(
            "resolution must be within 1..={MAX_RESOLUTION}, got {resolution}"
        )));
    }
    Ok(())
}
