//! MapTrack Core - Player track recording and map overlays
//!
//! Records where the subject went and turns that history into what a map
//! viewer draws:
//! 1. **Track Store**: time-ordered, decimated points with rewind handling
//!    and a versioned binary file format
//! 2. **Range Cursor**: memoized time-window lookups that tell appends apart
//!    from rewrites
//! 3. **Grid Accumulators**: a fog-of-war discovery grid and a time-density
//!    heatmap, both laid over the map through a [`MapProjection`]
//!
//! [`MapTrack`] ties them together into one session object.

pub mod config;
pub mod cursor;
pub mod error;
pub mod fileio;
pub mod fog;
pub mod geometry;
pub mod projection;
pub mod session;
pub mod timeline;
pub mod timemap;
pub mod track;

// Re-export key types for convenience
pub use config::{FogConfig, MapTrackConfig, TimeMapConfig};
pub use cursor::{RangeCursor, RangeQuery};
pub use error::{TrackError, TrackResult};
pub use fileio::{load_track_file, read_track, save_track_file, write_track, FileVersion};
pub use fog::FogOfWar;
pub use projection::{LinearProjection, MapProjection};
pub use session::{FrameSummary, MapTrack};
pub use timeline::{TimelineMode, TimelineWindow};
pub use timemap::TimeMap;
pub use track::{BoundingBox, RecordFormat, TrackPoint, TrackStore};
