//! Time Map - how long the subject spent in each map cell.
//!
//! Each segment between consecutive visible points spreads its duration over
//! the cells it crosses, in proportion to the share of its length inside each
//! cell. A segment that does not move at all puts its whole duration into the
//! cell it sits in. Values are in track time units (days).
//!
//! There is no incremental path: any change of the visible range or of the
//! resolution recomputes the whole grid.

use nalgebra::Vector2;
use tracing::debug;

use crate::config::check_resolution;
use crate::cursor::RangeQuery;
use crate::error::TrackResult;
use crate::geometry::{clip_segment, Rect};
use crate::projection::MapProjection;
use crate::track::{TrackPoint, TrackStore};

#[derive(Debug, Clone)]
pub struct TimeMap {
    resolution: usize,

    /// Accumulated time per cell, row major
    cells: Vec<f32>,

    value_lo: f32,

    value_hi: f32,

    built: bool,
}

impl TimeMap {
    pub fn new(resolution: usize) -> TrackResult<Self> {
        check_resolution(resolution)?;
        Ok(Self {
            resolution,
            cells: vec![0.0; resolution * resolution],
            value_lo: 0.0,
            value_hi: 0.0,
            built: false,
        })
    }

    pub fn set_resolution(&mut self, resolution: usize) -> TrackResult<()> {
        check_resolution(resolution)?;
        if resolution != self.resolution {
            self.resolution = resolution;
            self.cells.clear();
            self.cells.resize(resolution * resolution, 0.0);
            (self.value_lo, self.value_hi) = (0.0, 0.0);
            self.built = false;
        }
        Ok(())
    }

    /// Forces a rebuild on the next update.
    pub fn invalidate(&mut self) {
        self.built = false;
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub fn value_at(&self, cx: usize, cy: usize) -> Option<f32> {
        let res = self.resolution;
        (cx < res && cy < res).then(|| self.cells[cy * res + cx])
    }

    /// `(lo, hi)` over the visited cells, `(0, 0)` when nothing was visited.
    pub fn value_range(&self) -> (f32, f32) {
        (self.value_lo, self.value_hi)
    }

    /// Cell value scaled into `0..=1` against the visited range, for a color ramp.
    pub fn normalized_at(&self, cx: usize, cy: usize) -> Option<f32> {
        let value = self.value_at(cx, cy)?;
        let span = self.value_hi - self.value_lo;
        if value <= 0.0 {
            Some(0.0)
        } else if span <= f32::EPSILON {
            Some(1.0)
        } else {
            Some(((value - self.value_lo) / span).clamp(0.0, 1.0))
        }
    }

    /// Recomputes the grid if the range or resolution changed.
    ///
    /// Returns `true` when the grid was rebuilt.
    ///
    /// # Errors
    /// `InvalidArgument` if `store` changed after `query` was made.
    pub fn update<P: MapProjection + ?Sized>(
        &mut self,
        store: &TrackStore,
        query: &RangeQuery,
        projection: &P,
    ) -> TrackResult<bool> {
        query.check_current(store)?;
        if self.built && !query.changed {
            return Ok(false);
        }
        self.rebuild(&store.points()[query.range()], projection);
        Ok(true)
    }

    /// Full recompute over `points`, which must be sorted by time.
    pub fn rebuild<P: MapProjection + ?Sized>(&mut self, points: &[TrackPoint], projection: &P) {
        let res = self.resolution;
        self.cells.clear();
        self.cells.resize(res * res, 0.0);

        for pair in points.windows(2) {
            let a = projection.project_to_grid(&pair[0].position, res);
            let b = projection.project_to_grid(&pair[1].position, res);
            self.accumulate_segment(a, b, pair[1].time - pair[0].time);
        }

        let visited = self.cells.iter().copied().filter(|v| *v > 0.0);
        let (lo, hi) = visited.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        (self.value_lo, self.value_hi) = if lo <= hi { (lo, hi) } else { (0.0, 0.0) };

        self.built = true;
        debug!(
            "Time map rebuilt: {} points at {}x{}, values {:.4}..{:.4}",
            points.len(),
            res,
            res,
            self.value_lo,
            self.value_hi
        );
    }

    /// Spreads `dt` over the cells crossed by grid-space segment `a-b`.
    fn accumulate_segment(&mut self, a: Vector2<f32>, b: Vector2<f32>, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        let res = self.resolution;
        let limit = res as f32;

        let length = (b - a).norm();
        if length <= f32::EPSILON {
            let (cx, cy) = (a.x.floor(), a.y.floor());
            if cx >= 0.0 && cy >= 0.0 && cx < limit && cy < limit {
                self.cells[cy as usize * res + cx as usize] += dt;
            }
            return;
        }

        let lo = a.inf(&b);
        let hi = a.sup(&b);
        if hi.x < 0.0 || hi.y < 0.0 || lo.x >= limit || lo.y >= limit {
            return;
        }
        let last = limit - 1.0;
        let (x0, x1) = (lo.x.floor().clamp(0.0, last) as usize, hi.x.floor().clamp(0.0, last) as usize);
        let (y0, y1) = (lo.y.floor().clamp(0.0, last) as usize, hi.y.floor().clamp(0.0, last) as usize);

        for cy in y0..=y1 {
            for cx in x0..=x1 {
                if let Some((p, q)) = clip_segment(&a, &b, &Rect::cell(cx, cy)) {
                    self.cells[cy * res + cx] += dt * (p - q).norm() / length;
                }
            }
        }
    }
}
