//! Fog of War - which parts of the map the subject has uncovered.
//!
//! Every visible track point uncovers a disc of `discover` cells around it.
//! Stamps overwrite, they never blend, so a cell only ever holds one of the
//! three configured alphas. The live position is stamped on a separate copy
//! so it can move without leaving a trail.
//!
//! Update policy:
//! - config change or non-append range change: rebuild from scratch
//! - append-only range change: stamp just the new points
//! - otherwise: keep the grid
//!
//! Append-only stamping is additive. When decimation overwrites the last
//! visible point in place, the stamp of its earlier position stays until the
//! next full rebuild, so the incremental grid may uncover slightly more than
//! a rebuild of the same range would.

use nalgebra::Vector3;
use tracing::debug;

use crate::config::FogConfig;
use crate::cursor::RangeQuery;
use crate::error::TrackResult;
use crate::projection::MapProjection;
use crate::track::TrackStore;

/// Converts a `0..=1` alpha into a grid byte.
pub fn alpha_to_byte(alpha: f32) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Per-cell alpha bytes, `resolution x resolution`, row major.
#[derive(Debug, Clone)]
pub struct FogOfWar {
    config: FogConfig,

    /// Track stamps only
    tracked: Vec<u8>,

    /// `tracked` plus the live position stamp
    cells: Vec<u8>,

    subject_cell: Option<(usize, usize)>,

    /// False until the first rebuild, and again after a config change
    built: bool,
}

impl FogOfWar {
    pub fn new(config: FogConfig) -> TrackResult<Self> {
        config.validate()?;
        let size = config.resolution * config.resolution;
        let default = alpha_to_byte(config.default_alpha);
        Ok(Self {
            config,
            tracked: vec![default; size],
            cells: vec![default; size],
            subject_cell: None,
            built: false,
        })
    }

    /// Swaps the parameters; any difference forces a rebuild on next update.
    ///
    /// Until then the grid reads as unexplored at the new resolution.
    pub fn set_config(&mut self, config: FogConfig) -> TrackResult<()> {
        config.validate()?;
        if config != self.config {
            self.config = config;
            self.reset();
        }
        Ok(())
    }

    pub fn config(&self) -> &FogConfig {
        &self.config
    }

    pub fn resolution(&self) -> usize {
        self.config.resolution
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Alpha byte of cell `(cx, cy)`, `None` outside the grid.
    pub fn alpha_at(&self, cx: usize, cy: usize) -> Option<u8> {
        let res = self.config.resolution;
        (cx < res && cy < res).then(|| self.cells[cy * res + cx])
    }

    /// Brings the grid up to date with the visible range and live position.
    ///
    /// Returns `true` when the grid was rebuilt from scratch.
    ///
    /// # Errors
    /// `InvalidArgument` if `store` changed after `query` was made.
    pub fn update<P: MapProjection + ?Sized>(
        &mut self,
        store: &TrackStore,
        query: &RangeQuery,
        projection: &P,
        subject: Option<&Vector3<f32>>,
    ) -> TrackResult<bool> {
        query.check_current(store)?;
        let rebuild = !self.built || (query.changed && !query.appended_only);
        let mut tracked_changed = rebuild;

        if rebuild {
            self.rebuild(store, query, projection);
        } else if query.appended_only {
            let tracked = alpha_to_byte(self.config.tracked_alpha);
            for point in &store.points()[query.appended_range()] {
                if let Some((cx, cy)) = projection.cell_of(&point.position, self.config.resolution) {
                    stamp(&mut self.tracked, self.config.resolution, cx, cy, self.config.discover, tracked);
                }
            }
            tracked_changed = true;
        }

        let subject_cell = subject.and_then(|p| projection.cell_of(p, self.config.resolution));
        if tracked_changed || subject_cell != self.subject_cell {
            self.compose(subject_cell);
        }
        Ok(rebuild)
    }

    /// Refills both layers with the default alpha and marks the grid unbuilt.
    fn reset(&mut self) {
        let size = self.config.resolution * self.config.resolution;
        let default = alpha_to_byte(self.config.default_alpha);
        self.tracked.clear();
        self.tracked.resize(size, default);
        self.cells.clone_from(&self.tracked);
        self.subject_cell = None;
        self.built = false;
    }

    fn rebuild<P: MapProjection + ?Sized>(&mut self, store: &TrackStore, query: &RangeQuery, projection: &P) {
        let res = self.config.resolution;
        let tracked = alpha_to_byte(self.config.tracked_alpha);

        self.tracked.clear();
        self.tracked.resize(res * res, alpha_to_byte(self.config.default_alpha));
        for point in &store.points()[query.range()] {
            if let Some((cx, cy)) = projection.cell_of(&point.position, res) {
                stamp(&mut self.tracked, res, cx, cy, self.config.discover, tracked);
            }
        }
        self.built = true;
        debug!("Fog of war rebuilt: {} points at {}x{}", query.end - query.start, res, res);
    }

    fn compose(&mut self, subject_cell: Option<(usize, usize)>) {
        self.cells.clone_from(&self.tracked);
        if let Some((cx, cy)) = subject_cell {
            let alpha = alpha_to_byte(self.config.player_alpha);
            stamp(&mut self.cells, self.config.resolution, cx, cy, self.config.discover, alpha);
        }
        self.subject_cell = subject_cell;
    }
}

/// Sets every in-bounds cell strictly within `radius` of `(cx, cy)` to `value`.
fn stamp(grid: &mut [u8], resolution: usize, cx: usize, cy: usize, radius: usize, value: u8) {
    let r = radius as isize;
    let res = resolution as isize;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy >= r * r {
                continue;
            }
            let (x, y) = (cx as isize + dx, cy as isize + dy);
            if x >= 0 && y >= 0 && x < res && y < res {
                grid[(y * res + x) as usize] = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::RangeCursor;
    use crate::projection::LinearProjection;
    use nalgebra::Vector2;

    /// 1 world unit per cell on a 16x16 grid, world origin at cell (0, 0),
    /// world +Y pointing down the grid
    fn projection() -> LinearProjection {
        LinearProjection::new(Vector2::new(1.0 / 16.0, -1.0 / 16.0), Vector2::zeros())
    }

    fn config() -> FogConfig {
        FogConfig {
            resolution: 16,
            discover: 2,
            default_alpha: 1.0,
            tracked_alpha: 0.5,
            player_alpha: 0.0,
            ..FogConfig::default()
        }
    }

    fn at(x: f32, y: f32) -> Vector3<f32> {
        Vector3::new(x + 0.5, y + 0.5, 0.0)
    }

    #[test]
    fn test_stamp_is_a_disc() {
        let mut grid = vec![0u8; 25];
        stamp(&mut grid, 5, 2, 2, 2, 9);
        let stamped: Vec<(usize, usize)> = (0..25)
            .filter(|i| grid[*i] == 9)
            .map(|i| (i % 5, i / 5))
            .collect();
        // dx² + dy² < 4 excludes the corners and the (±2, 0) tips
        assert_eq!(stamped.len(), 9);
        assert!(!stamped.contains(&(0, 2)));
        assert!(stamped.contains(&(1, 1)));
    }

    #[test]
    fn test_stamp_clips_at_the_border() {
        let mut grid = vec![0u8; 16];
        stamp(&mut grid, 4, 0, 0, 2, 1);
        assert_eq!(grid.iter().filter(|v| **v == 1).count(), 4);
    }

    #[test]
    fn test_zero_radius_stamps_nothing() {
        let mut grid = vec![0u8; 16];
        stamp(&mut grid, 4, 1, 1, 0, 1);
        assert!(grid.iter().all(|v| *v == 0));
    }

    #[test]
    fn test_rebuild_and_append() {
        let mut store = TrackStore::new();
        store.add_point(at(2.0, 2.0), 1.0).unwrap();
        let mut cursor = RangeCursor::new();
        let mut fog = FogOfWar::new(config()).unwrap();
        let proj = projection();

        let q = cursor.query(&store, 0.0, 10.0).unwrap();
        assert!(fog.update(&store, &q, &proj, None).unwrap());
        assert_eq!(fog.alpha_at(2, 2), Some(128));
        assert_eq!(fog.alpha_at(10, 10), Some(255));

        store.add_point(at(10.0, 10.0), 2.0).unwrap();
        let q = cursor.query(&store, 0.0, 10.0).unwrap();
        assert!(!fog.update(&store, &q, &proj, None).unwrap());
        assert_eq!(fog.alpha_at(10, 10), Some(128));
        assert_eq!(fog.alpha_at(2, 2), Some(128));
    }

    #[test]
    fn test_subject_stamp_does_not_leave_a_trail() {
        let store = TrackStore::new();
        let mut cursor = RangeCursor::new();
        let mut fog = FogOfWar::new(config()).unwrap();
        let proj = projection();

        let q = cursor.query(&store, 0.0, 1.0).unwrap();
        fog.update(&store, &q, &proj, Some(&at(4.0, 4.0))).unwrap();
        assert_eq!(fog.alpha_at(4, 4), Some(0));

        let q = cursor.query(&store, 0.0, 1.0).unwrap();
        fog.update(&store, &q, &proj, Some(&at(12.0, 12.0))).unwrap();
        assert_eq!(fog.alpha_at(4, 4), Some(255));
        assert_eq!(fog.alpha_at(12, 12), Some(0));
    }

    #[test]
    fn test_shrinking_window_rebuilds() {
        let mut store = TrackStore::new();
        store.add_point(at(2.0, 2.0), 1.0).unwrap();
        store.add_point(at(12.0, 2.0), 2.0).unwrap();
        let mut cursor = RangeCursor::new();
        let mut fog = FogOfWar::new(config()).unwrap();
        let proj = projection();

        let q = cursor.query(&store, 0.0, 10.0).unwrap();
        fog.update(&store, &q, &proj, None).unwrap();
        assert_eq!(fog.alpha_at(12, 2), Some(128));

        let q = cursor.query(&store, 0.0, 1.5).unwrap();
        assert!(fog.update(&store, &q, &proj, None).unwrap());
        assert_eq!(fog.alpha_at(12, 2), Some(255));
        assert_eq!(fog.alpha_at(2, 2), Some(128));
    }

    #[test]
    fn test_config_change_forces_rebuild() {
        let mut store = TrackStore::new();
        store.add_point(at(2.0, 2.0), 1.0).unwrap();
        let mut cursor = RangeCursor::new();
        let mut fog = FogOfWar::new(config()).unwrap();
        let proj = projection();

        let q = cursor.query(&store, 0.0, 10.0).unwrap();
        fog.update(&store, &q, &proj, None).unwrap();

        fog.set_config(FogConfig { tracked_alpha: 0.0, ..config() }).unwrap();
        let q = cursor.query(&store, 0.0, 10.0).unwrap();
        assert!(!q.changed);
        assert!(fog.update(&store, &q, &proj, None).unwrap());
        assert_eq!(fog.alpha_at(2, 2), Some(0));
    }

    #[test]
    fn test_resolution_change_resizes_grid() {
        let store = TrackStore::new();
        let mut cursor = RangeCursor::new();
        let mut fog = FogOfWar::new(config()).unwrap();
        let proj = projection();

        fog.set_config(FogConfig { resolution: 32, ..config() }).unwrap();
        let q = cursor.query(&store, 0.0, 1.0).unwrap();
        fog.update(&store, &q, &proj, None).unwrap();
        assert_eq!(fog.cells().len(), 32 * 32);
        assert_eq!(fog.alpha_at(31, 31), Some(255));
        assert_eq!(fog.alpha_at(32, 0), None);
    }

    #[test]
    fn test_resolution_change_is_readable_before_update() {
        let mut fog = FogOfWar::new(config()).unwrap();
        fog.set_config(FogConfig { resolution: 32, ..config() }).unwrap();
        assert_eq!(fog.cells().len(), 32 * 32);
        assert_eq!(fog.alpha_at(31, 31), Some(255));

        fog.set_config(FogConfig { resolution: 8, ..config() }).unwrap();
        assert_eq!(fog.cells().len(), 64);
        assert_eq!(fog.alpha_at(7, 7), Some(255));
        assert_eq!(fog.alpha_at(8, 0), None);
    }

    #[test]
    fn test_stale_query_is_rejected() {
        let mut store = TrackStore::new();
        for i in 0..5 {
            store.add_point(at(i as f32 * 2.0, 2.0), 1.0 + i as f32).unwrap();
        }
        let mut cursor = RangeCursor::new();
        let mut fog = FogOfWar::new(config()).unwrap();
        let proj = projection();

        let q = cursor.query(&store, 0.0, 10.0).unwrap();
        store.add_point(at(14.0, 14.0), 0.5).unwrap();
        assert_eq!(store.len(), 1);
        assert!(fog.update(&store, &q, &proj, None).is_err());

        let q = cursor.query(&store, 0.0, 10.0).unwrap();
        assert!(fog.update(&store, &q, &proj, None).unwrap());
        assert_eq!(fog.alpha_at(14, 14), Some(128));
    }

    #[test]
    fn test_overwritten_point_keeps_its_stamp_until_rebuild() {
        let mut store = TrackStore::with_merge_distance(3.0).unwrap();
        store.add_point(at(2.0, 2.0), 1.0).unwrap();
        store.add_point(at(10.0, 2.0), 2.0).unwrap();
        let mut cursor = RangeCursor::new();
        let mut fog = FogOfWar::new(config()).unwrap();
        let proj = projection();

        let q = cursor.query(&store, 0.0, 10.0).unwrap();
        fog.update(&store, &q, &proj, None).unwrap();

        // Within the merge distance: the last point moves to (12, 2)
        store.add_point(at(12.0, 2.0), 3.0).unwrap();
        assert_eq!(store.len(), 2);
        let q = cursor.query(&store, 0.0, 10.0).unwrap();
        assert!(q.appended_only);
        assert!(!fog.update(&store, &q, &proj, None).unwrap());
        assert_eq!(fog.alpha_at(12, 2), Some(128));
        assert_eq!(fog.alpha_at(9, 2), Some(128));

        let mut fresh = FogOfWar::new(config()).unwrap();
        assert!(fresh.update(&store, &q, &proj, None).unwrap());
        assert_eq!(fresh.alpha_at(12, 2), Some(128));
        assert_eq!(fresh.alpha_at(9, 2), Some(255));
    }
}
