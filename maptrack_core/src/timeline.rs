//! Timeline - which part of the history is visible.
//!
//! Game time is counted in days. The viewer either shows everything since a
//! given day or the last few days, and a slider in `[0, 1]` scrubs the end of
//! the window between its start and "now".

use serde::{Deserialize, Serialize};

use crate::error::{TrackError, TrackResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineMode {
    /// Window starts at `since_day`
    SinceDay,
    /// Window starts `last_days` before now
    LastDays,
}

/// Settings of the visible time window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineWindow {
    pub mode: TimelineMode,
    pub since_day: u32,
    pub last_days: u32,
    pub time_point: f32,
}

impl Default for TimelineWindow {
    fn default() -> Self {
        Self {
            mode: TimelineMode::SinceDay,
            since_day: 0,
            last_days: 1,
            time_point: 1.0,
        }
    }
}

impl TimelineWindow {
    pub fn validate(&self) -> TrackResult<()> {
        if !(0.0..=1.0).contains(&self.time_point) {
            return Err(TrackError::invalid(format!(
                "time_point must be within 0..=1, got {}",
                self.time_point
            )));
        }
        Ok(())
    }

    /// `(t_start, t_end)` of the visible window at game time `now`.
    ///
    /// The start never lies after `now`, so the result is always a valid
    /// window for [`crate::RangeCursor::query`].
    pub fn window(&self, now: f32) -> TrackResult<(f32, f32)> {
        if !now.is_finite() {
            return Err(TrackError::invalid(format!("non-finite current time {now}")));
        }

        let start = match self.mode {
            TimelineMode::SinceDay => self.since_day as f32,
            TimelineMode::LastDays => (now - self.last_days as f32).max(0.0),
        };
        let start = start.min(now);
        let end = start + self.time_point.clamp(0.0, 1.0) * (now - start);
        Ok((start, end))
    }
}
