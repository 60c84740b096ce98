//! The "TRACK" Store - Append-only, time-ordered history of player positions
//!
//! Handles the three things a long-running recording needs:
//! - Decimation: idle or slow periods collapse into one evolving point
//! - Rewind: loading an earlier save truncates the now-invalid future
//! - Persistence: a compact little-endian blob, with a legacy record layout
//!
//! Points are kept sorted by time, so every time lookup is a binary search.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::ops::Range;
use tracing::debug;

use crate::error::{TrackError, TrackResult};

/// Upper bound on the capacity reserved from an untrusted point count.
const MAX_PREALLOCATED_POINTS: usize = 1 << 16;

// ============================================================================
// TRACK POINT
// ============================================================================

/// A single retained sample of the subject's position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// World-space position at `time`
    pub position: Vector3<f32>,

    /// Game time (days)
    pub time: f32,

    /// Euclidean distance from the previous retained point (0 for the first)
    pub segment_distance: f32,
}

impl TrackPoint {
    pub fn new(position: Vector3<f32>, time: f32, segment_distance: f32) -> Self {
        Self {
            position,
            time,
            segment_distance,
        }
    }
}

/// On-disk layout of one point record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// `x, y, z, t` - written before the distance field existed
    Legacy,

    /// `x, y, z, t, d`
    WithDistance,
}

impl RecordFormat {
    /// Size in bytes of one point record.
    pub const fn record_size(self) -> usize {
        match self {
            RecordFormat::Legacy => 16,
            RecordFormat::WithDistance => 20,
        }
    }
}

// ============================================================================
// BOUNDING BOX
// ============================================================================

/// Axis aligned bounds over the retained points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl BoundingBox {
    /// An inverted box that any point expands into a valid one.
    pub fn empty() -> Self {
        Self {
            min: Vector3::repeat(f32::MAX),
            max: Vector3::repeat(f32::MIN),
        }
    }

    /// Grow the box to include `p`.
    pub fn expand(&mut self, p: &Vector3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// False until at least one point was added.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn contains(&self, p: &Vector3<f32>) -> bool {
        self.is_valid()
            && (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// TRACK STORE
// ============================================================================

/// Owns the recorded points of one session.
///
/// Consumers get read-only slices or index ranges. Every mutation bumps
/// [`TrackStore::version`]; mutations that rewrite history (rewind, clear,
/// load) also bump [`TrackStore::generation`], so cached ranges can tell a
/// pure append from a rewrite.
#[derive(Debug, Clone, Default)]
pub struct TrackStore {
    points: Vec<TrackPoint>,

    /// Minimum XY distance for a new sample to become a new point
    merge_distance: f32,

    bounds: BoundingBox,

    version: u64,

    generation: u64,
}

impl TrackStore {
    /// Create an empty store with a zero merge distance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with the given decimation threshold.
    pub fn with_merge_distance(distance: f32) -> TrackResult<Self> {
        let mut store = Self::new();
        store.set_merge_distance(distance)?;
        Ok(store)
    }

    /// Sets the decimation threshold.
    ///
    /// # Errors
    /// `InvalidArgument` unless `distance` is finite and non-negative.
    pub fn set_merge_distance(&mut self, distance: f32) -> TrackResult<()> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(TrackError::invalid(format!(
                "merge distance must be finite and >= 0, got {distance}"
            )));
        }
        self.merge_distance = distance;
        Ok(())
    }

    pub fn merge_distance(&self) -> f32 {
        self.merge_distance
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Time of the newest point, or 0 when empty.
    pub fn last_time(&self) -> f32 {
        self.points.last().map_or(0.0, |p| p.time)
    }

    /// Incremented by every mutating operation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Incremented only when already retained points were removed or replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cached `(min, max)` over the retained points, zeros when empty.
    ///
    /// Overwritten positions are not shrunk out of the box, so the box may be
    /// larger than the current points until the next rewind or load.
    pub fn bounding_box(&self) -> (Vector3<f32>, Vector3<f32>) {
        if self.bounds.is_valid() {
            (self.bounds.min, self.bounds.max)
        } else {
            (Vector3::zeros(), Vector3::zeros())
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.bounds = BoundingBox::empty();
        self.touch_rewrite();
    }

    /// Adds a new sample, truncating history first if `time` lies in the past.
    ///
    /// A sample closer than the merge distance (in the XY plane) to the last
    /// point overwrites it instead of growing the track.
    ///
    /// # Errors
    /// `InvalidArgument` if any coordinate or the time is not finite. The
    /// store is left untouched in that case.
    pub fn add_point(&mut self, position: Vector3<f32>, time: f32) -> TrackResult<()> {
        if !time.is_finite() || !position.iter().all(|c| c.is_finite()) {
            return Err(TrackError::invalid(format!(
                "non-finite sample {position:?} at t={time}"
            )));
        }

        if !self.is_empty() && self.last_time() > time {
            self.rewind(time);
        }

        let count = self.points.len();
        match self.points.last() {
            Some(last)
                if (position.xy() - last.position.xy()).norm() <= self.merge_distance =>
            {
                let segment_distance = if count >= 2 {
                    (position - self.points[count - 2].position).norm()
                } else {
                    0.0
                };
                self.points[count - 1] = TrackPoint::new(position, time, segment_distance);
            }
            Some(last) => {
                let segment_distance = (position - last.position).norm();
                self.points.push(TrackPoint::new(position, time, segment_distance));
            }
            None => self.points.push(TrackPoint::new(position, time, 0.0)),
        }

        self.bounds.expand(&position);
        self.version += 1;
        Ok(())
    }

    /// Removes every point newer than `time`.
    fn rewind(&mut self, time: f32) {
        let keep = self.upper_bound(time);
        debug!(
            "Rewind to t={:.4}: dropping {} of {} points",
            time,
            self.points.len() - keep,
            self.points.len()
        );
        self.points.truncate(keep);
        self.recompute_bounds();
        self.touch_rewrite();
    }

    /// First index whose time is `>= t`.
    pub fn lower_bound(&self, t: f32) -> usize {
        self.points.partition_point(|p| p.time < t)
    }

    /// First index whose time is `> t`.
    pub fn upper_bound(&self, t: f32) -> usize {
        self.points.partition_point(|p| p.time <= t)
    }

    /// Half-open index range of the points with `t_start <= time <= t_end`.
    ///
    /// # Errors
    /// `InvalidArgument` for non-finite bounds or `t_start > t_end`.
    pub fn pull_range(&self, t_start: f32, t_end: f32) -> TrackResult<Range<usize>> {
        check_window(t_start, t_end)?;
        Ok(self.lower_bound(t_start)..self.upper_bound(t_end))
    }

    /// Path length over `range`.
    ///
    /// The first point's stored distance leads to a point outside the range,
    /// so it never contributes. Accumulates in `f64`.
    pub fn compute_length(&self, range: Range<usize>) -> f64 {
        let end = range.end.min(self.points.len());
        if range.start >= end {
            return 0.0;
        }
        self.points[range.start + 1..end]
            .iter()
            .map(|p| f64::from(p.segment_distance))
            .sum()
    }

    // ========== Persistence ==========

    /// Writes the current record format.
    pub fn save_binary<W: Write>(&self, writer: &mut W) -> TrackResult<()> {
        self.save_binary_as(writer, RecordFormat::WithDistance)
    }

    /// Writes `u32 count` followed by `count` little-endian records.
    pub fn save_binary_as<W: Write>(&self, writer: &mut W, format: RecordFormat) -> TrackResult<()> {
        let count = u32::try_from(self.points.len())
            .map_err(|_| TrackError::invalid("track too long for the binary format"))?;

        writer.write_u32::<LittleEndian>(count)?;
        for p in &self.points {
            writer.write_f32::<LittleEndian>(p.position.x)?;
            writer.write_f32::<LittleEndian>(p.position.y)?;
            writer.write_f32::<LittleEndian>(p.position.z)?;
            writer.write_f32::<LittleEndian>(p.time)?;
            if format == RecordFormat::WithDistance {
                writer.write_f32::<LittleEndian>(p.segment_distance)?;
            }
        }
        Ok(())
    }

    /// Replaces the store's points with the ones decoded from `reader`.
    ///
    /// Legacy records carry no distance, so distances are replayed between
    /// consecutive loaded points. On any error the store keeps its previous
    /// contents.
    pub fn load_binary<R: Read>(&mut self, reader: &mut R, format: RecordFormat) -> TrackResult<()> {
        let count = reader.read_u32::<LittleEndian>()? as usize;
        let mut points: Vec<TrackPoint> = Vec::with_capacity(count.min(MAX_PREALLOCATED_POINTS));

        for index in 0..count {
            let x = reader.read_f32::<LittleEndian>()?;
            let y = reader.read_f32::<LittleEndian>()?;
            let z = reader.read_f32::<LittleEndian>()?;
            let time = reader.read_f32::<LittleEndian>()?;
            let position = Vector3::new(x, y, z);

            let segment_distance = match format {
                RecordFormat::WithDistance => reader.read_f32::<LittleEndian>()?,
                RecordFormat::Legacy => points
                    .last()
                    .map_or(0.0, |prev| (position - prev.position).norm()),
            };

            if !time.is_finite()
                || !segment_distance.is_finite()
                || !position.iter().all(|c| c.is_finite())
            {
                return Err(TrackError::corrupt(index, "non-finite value"));
            }
            if points.last().is_some_and(|prev| prev.time > time) {
                return Err(TrackError::corrupt(index, "time goes backwards"));
            }

            points.push(TrackPoint::new(position, time, segment_distance));
        }

        self.points = points;
        self.recompute_bounds();
        self.touch_rewrite();
        Ok(())
    }

    // ========== Private Helper Methods ==========

    fn recompute_bounds(&mut self) {
        let mut bounds = BoundingBox::empty();
        for p in &self.points {
            bounds.expand(&p.position);
        }
        self.bounds = bounds;
    }

    fn touch_rewrite(&mut self) {
        self.version += 1;
        self.generation += 1;
    }
}

/// Shared precondition of every time-window query.
pub(crate) fn check_window(t_start: f32, t_end: f32) -> TrackResult<()> {
    if !t_start.is_finite() || !t_end.is_finite() {
        return Err(TrackError::invalid(format!(
            "non-finite time window [{t_start}, {t_end}]"
        )));
    }
    if t_start > t_end {
        return Err(TrackError::invalid(format!(
            "time window start {t_start} is after end {t_end}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn v(x: f32, y: f32, z: f32) -> Vector3<f32> {
        Vector3::new(x, y, z)
    }

    fn times(store: &TrackStore) -> Vec<f32> {
        store.points().iter().map(|p| p.time).collect()
    }

    /// Points 100 units apart at t = 1..=5
    fn five_points() -> TrackStore {
        let mut store = TrackStore::with_merge_distance(10.0).unwrap();
        for i in 1..=5 {
            store.add_point(v(i as f32 * 100.0, 0.0, 0.0), i as f32).unwrap();
        }
        store
    }

    #[test]
    fn test_merge_then_append() {
        let mut store = TrackStore::with_merge_distance(10.0).unwrap();

        store.add_point(v(0.0, 0.0, 0.0), 1.0).unwrap();
        store.add_point(v(5.0, 0.0, 0.0), 2.0).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.points()[0].position, v(5.0, 0.0, 0.0));
        assert_eq!(store.points()[0].time, 2.0);

        store.add_point(v(20.0, 0.0, 0.0), 3.0).unwrap();
        assert_eq!(store.len(), 2);
        let second = store.points()[1];
        assert_eq!(second.position, v(20.0, 0.0, 0.0));
        assert_eq!(second.time, 3.0);
        assert_relative_eq!(second.segment_distance, 15.0);
    }

    #[test]
    fn test_overwrite_recomputes_distance_from_previous_point() {
        let mut store = TrackStore::with_merge_distance(10.0).unwrap();
        store.add_point(v(0.0, 0.0, 0.0), 1.0).unwrap();
        store.add_point(v(20.0, 0.0, 0.0), 2.0).unwrap();
        store.add_point(v(24.0, 3.0, 0.0), 3.0).unwrap();

        assert_eq!(store.len(), 2);
        assert_relative_eq!(store.points()[1].segment_distance, 24.0_f32.hypot(3.0));
    }

    #[test]
    fn test_merge_ignores_height_but_distance_does_not() {
        let mut store = TrackStore::with_merge_distance(10.0).unwrap();
        store.add_point(v(0.0, 0.0, 0.0), 1.0).unwrap();
        store.add_point(v(20.0, 0.0, 0.0), 2.0).unwrap();
        // Climbing straight up stays within the merge distance
        store.add_point(v(20.0, 0.0, 50.0), 3.0).unwrap();

        assert_eq!(store.len(), 2);
        assert_relative_eq!(store.points()[1].segment_distance, 20.0_f32.hypot(50.0));
    }

    #[test]
    fn test_rewind_truncates_future() {
        let mut store = five_points();
        let generation = store.generation();

        store.add_point(v(1000.0, 0.0, 0.0), 2.5).unwrap();

        assert_eq!(times(&store), vec![1.0, 2.0, 2.5]);
        assert!(store.generation() > generation);
        let (lo, hi) = store.bounding_box();
        assert_eq!(lo, v(100.0, 0.0, 0.0));
        assert_eq!(hi, v(1000.0, 0.0, 0.0));
    }

    #[test]
    fn test_rewind_before_first_point_empties_history() {
        let mut store = five_points();
        store.add_point(v(7.0, 7.0, 7.0), 0.5).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.points()[0].segment_distance, 0.0);
        assert_eq!(store.bounding_box(), (v(7.0, 7.0, 7.0), v(7.0, 7.0, 7.0)));
    }

    #[test]
    fn test_rewind_keeps_points_at_equal_time() {
        let mut store = five_points();
        store.add_point(v(3000.0, 0.0, 0.0), 3.0).unwrap();
        assert_eq!(times(&store), vec![1.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_rejects_non_finite_samples() {
        let mut store = five_points();
        let version = store.version();

        assert!(store.add_point(v(f32::NAN, 0.0, 0.0), 6.0).is_err());
        assert!(store.add_point(v(0.0, 0.0, 0.0), f32::INFINITY).is_err());
        assert_eq!(store.len(), 5);
        assert_eq!(store.version(), version);
    }

    #[test]
    fn test_merge_distance_contract() {
        let mut store = TrackStore::new();
        assert!(store.set_merge_distance(-1.0).is_err());
        assert!(store.set_merge_distance(f32::NAN).is_err());
        assert!(store.set_merge_distance(0.0).is_ok());
        assert!(store.set_merge_distance(25.0).is_ok());
        assert_eq!(store.merge_distance(), 25.0);
    }

    #[test]
    fn test_empty_store_accessors() {
        let store = TrackStore::new();
        assert_eq!(store.bounding_box(), (Vector3::zeros(), Vector3::zeros()));
        assert_eq!(store.last_time(), 0.0);
        assert_eq!(store.compute_length(0..0), 0.0);
    }

    #[test]
    fn test_pull_range() {
        let store = five_points();
        assert_eq!(store.pull_range(2.0, 4.0).unwrap(), 1..4);
        assert_eq!(store.pull_range(2.5, 3.5).unwrap(), 2..3);
        assert_eq!(store.pull_range(6.0, 7.0).unwrap(), 5..5);
        assert_eq!(store.pull_range(0.0, 0.5).unwrap(), 0..0);
        assert!(store.pull_range(4.0, 2.0).is_err());
        assert!(store.pull_range(f32::NAN, 2.0).is_err());
    }

    #[test]
    fn test_compute_length_excludes_first_distance() {
        let store = five_points();
        assert_relative_eq!(store.compute_length(0..5), 400.0);
        assert_relative_eq!(store.compute_length(2..5), 200.0);
        assert_relative_eq!(store.compute_length(3..4), 0.0);
        assert_relative_eq!(store.compute_length(1..99), 300.0);
    }

    #[test]
    fn test_binary_round_trip() {
        let store = five_points();
        let mut blob = Vec::new();
        store.save_binary(&mut blob).unwrap();
        assert_eq!(blob.len(), 4 + 5 * 20);

        let mut loaded = TrackStore::new();
        loaded.load_binary(&mut blob.as_slice(), RecordFormat::WithDistance).unwrap();
        assert_eq!(loaded.points(), store.points());
        assert_eq!(loaded.bounding_box(), store.bounding_box());
    }

    #[test]
    fn test_legacy_load_replays_distances() {
        let mut store = TrackStore::new();
        store.add_point(v(0.0, 0.0, 0.0), 1.0).unwrap();
        store.add_point(v(3.0, 4.0, 0.0), 2.0).unwrap();
        store.add_point(v(3.0, 16.0, 0.0), 3.0).unwrap();

        let mut blob = Vec::new();
        store.save_binary_as(&mut blob, RecordFormat::Legacy).unwrap();
        assert_eq!(blob.len(), 4 + 3 * 16);

        let mut loaded = TrackStore::new();
        loaded.load_binary(&mut blob.as_slice(), RecordFormat::Legacy).unwrap();
        let distances: Vec<f32> = loaded.points().iter().map(|p| p.segment_distance).collect();
        assert_eq!(distances, vec![0.0, 5.0, 12.0]);
    }

    #[test]
    fn test_truncated_load_keeps_old_points() {
        let store = five_points();
        let mut blob = Vec::new();
        store.save_binary(&mut blob).unwrap();
        blob.truncate(blob.len() - 3);

        let mut target = TrackStore::new();
        target.add_point(v(1.0, 2.0, 3.0), 9.0).unwrap();
        let before = target.points().to_vec();

        let err = target.load_binary(&mut blob.as_slice(), RecordFormat::WithDistance);
        assert!(matches!(err, Err(TrackError::Io(_))));
        assert_eq!(target.points(), before.as_slice());
    }

    #[test]
    fn test_load_rejects_backwards_time() {
        let mut blob = Vec::new();
        blob.write_u32::<LittleEndian>(2).unwrap();
        for t in [5.0_f32, 4.0] {
            for value in [0.0_f32, 0.0, 0.0, t] {
                blob.write_f32::<LittleEndian>(value).unwrap();
            }
        }

        let mut store = TrackStore::new();
        let err = store.load_binary(&mut blob.as_slice(), RecordFormat::Legacy);
        assert!(matches!(err, Err(TrackError::CorruptRecord { index: 1, .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_bumps_generation() {
        let mut store = five_points();
        let generation = store.generation();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.generation(), generation + 1);
        assert_eq!(store.bounding_box(), (Vector3::zeros(), Vector3::zeros()));
    }
}
