//! Range Cursor - memoized time-window lookups over a [`TrackStore`].
//!
//! The viewer asks for the same window every frame, and while it is pinned to
//! "now" the only change between frames is new points at the end. The cursor
//! remembers the last window and the store version it was computed against,
//! so consumers can skip work (nothing changed) or do only the new suffix
//! (appended only).

use std::ops::Range;

use crate::error::{TrackError, TrackResult};
use crate::track::{check_window, TrackStore};

/// Outcome of a [`RangeCursor::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeQuery {
    /// Anything about the visible points differs from the previous query
    pub changed: bool,

    /// Same start, and the only difference is at or after `old_end - 1`
    pub appended_only: bool,

    /// End index returned by the previous query
    pub old_end: usize,

    pub start: usize,

    pub end: usize,

    /// Store version the indices were computed against
    pub version: u64,
}

impl RangeQuery {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Fails once `store` has been mutated since this query was made.
    pub fn check_current(&self, store: &TrackStore) -> TrackResult<()> {
        if self.version != store.version() {
            return Err(TrackError::invalid(format!(
                "range query for store version {} used at version {}",
                self.version,
                store.version()
            )));
        }
        Ok(())
    }

    /// Indices a consumer has to (re)process after an append-only change.
    ///
    /// Includes the previously last visible point, which may have been
    /// overwritten in place by decimation.
    pub fn appended_range(&self) -> Range<usize> {
        self.old_end.saturating_sub(1).max(self.start)..self.end
    }
}

/// Memoized `(t_start, t_end) -> (start, end)` boundaries.
///
/// Holds indices rather than references, so it never pins the store.
#[derive(Debug, Clone, Default)]
pub struct RangeCursor {
    last_t_start: Option<f32>,
    last_t_end: Option<f32>,
    start: usize,
    end: usize,
    version: Option<u64>,
    generation: Option<u64>,
}

impl RangeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the memoized window; the next query reports a full change.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    /// Boundaries of the last computed window.
    pub fn current(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Visible index range for `[t_start, t_end]` plus change detection.
    ///
    /// # Errors
    /// `InvalidArgument` for non-finite bounds or `t_start > t_end`; the
    /// memoized state is left as it was.
    pub fn query(&mut self, store: &TrackStore, t_start: f32, t_end: f32) -> TrackResult<RangeQuery> {
        check_window(t_start, t_end)?;

        let mutated = self.version != Some(store.version());
        let rewritten = self.generation != Some(store.generation());
        let old_start = self.start;
        let old_end = self.end;

        let start_moved = rewritten || self.last_t_start != Some(t_start);
        if start_moved || mutated {
            self.start = store.lower_bound(t_start);
        }
        if mutated || self.last_t_end != Some(t_end) {
            self.end = store.upper_bound(t_end);
        }

        let changed = start_moved
            || mutated
            || self.last_t_end != Some(t_end)
            || self.start != old_start
            || self.end != old_end;

        let appended_only = changed
            && !start_moved
            && self.start == old_start
            && self.end >= old_end;

        self.last_t_start = Some(t_start);
        self.last_t_end = Some(t_end);
        self.version = Some(store.version());
        self.generation = Some(store.generation());

        Ok(RangeQuery {
            changed,
            appended_only,
            old_end,
            start: self.start,
            end: self.end,
            version: store.version(),
        })
    }
}
