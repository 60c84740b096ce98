//! Track files: a version header followed by the store's binary blob.
//!
//! ```text
//! i32 major, i32 minor, i32 patch     -- format version, little-endian
//! u32 point_count
//! point_count x record                -- 16 bytes before 1.5, 20 bytes since
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{TrackError, TrackResult};
use crate::track::{RecordFormat, TrackStore};

const HEADER_SIZE: usize = 12;
const COUNT_SIZE: usize = 4;

/// Version triple written at the head of every track file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileVersion {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl FileVersion {
    pub const fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self { major, minor, patch }
    }

    /// First version whose records carry the segment distance.
    pub const DISTANCE_FIELD: FileVersion = FileVersion::new(1, 5, 0);

    /// Version written by this crate.
    pub const CURRENT: FileVersion = FileVersion::DISTANCE_FIELD;

    pub fn record_format(&self) -> RecordFormat {
        if *self < Self::DISTANCE_FIELD {
            RecordFormat::Legacy
        } else {
            RecordFormat::WithDistance
        }
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Writes header and points in the format matching `version`.
pub fn write_track<W: Write>(writer: &mut W, store: &TrackStore, version: FileVersion) -> TrackResult<()> {
    writer.write_i32::<LittleEndian>(version.major)?;
    writer.write_i32::<LittleEndian>(version.minor)?;
    writer.write_i32::<LittleEndian>(version.patch)?;
    store.save_binary_as(writer, version.record_format())
}

/// Decodes a whole track file into `store`.
///
/// The byte count must match the header and point count exactly; on any
/// error `store` is left unchanged.
pub fn read_track(bytes: &[u8], store: &mut TrackStore) -> TrackResult<FileVersion> {
    let mut reader = bytes;
    if bytes.len() < HEADER_SIZE + COUNT_SIZE {
        return Err(TrackError::FormatMismatch {
            expected: (HEADER_SIZE + COUNT_SIZE) as u64,
            actual: bytes.len() as u64,
        });
    }

    let version = FileVersion::new(
        reader.read_i32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
    );
    let format = version.record_format();

    let count = u64::from((&reader[..COUNT_SIZE]).read_u32::<LittleEndian>()?);
    let expected = (HEADER_SIZE + COUNT_SIZE) as u64 + count * format.record_size() as u64;
    if expected != bytes.len() as u64 {
        return Err(TrackError::FormatMismatch {
            expected,
            actual: bytes.len() as u64,
        });
    }

    store.load_binary(&mut reader, format)?;
    Ok(version)
}

/// Saves `store` to `path` in the current format.
pub fn save_track_file(path: impl AsRef<Path>, store: &TrackStore) -> TrackResult<()> {
    let path = path.as_ref();
    let mut blob = Vec::with_capacity(
        HEADER_SIZE + COUNT_SIZE + store.len() * RecordFormat::WithDistance.record_size(),
    );
    write_track(&mut blob, store, FileVersion::CURRENT)?;
    std::fs::write(path, blob)?;
    info!("Saved {} track points to {}", store.len(), path.display());
    Ok(())
}

/// Replaces the contents of `store` with the track saved at `path`.
pub fn load_track_file(path: impl AsRef<Path>, store: &mut TrackStore) -> TrackResult<FileVersion> {
    let path = path.as_ref();
    let result = std::fs::read(path)
        .map_err(TrackError::from)
        .and_then(|bytes| read_track(&bytes, store));

    match &result {
        Ok(version) => info!(
            "Loaded {} track points from {} (format {})",
            store.len(),
            path.display(),
            version
        ),
        Err(e) => warn!("Unable to load track file {}: {}", path.display(), e),
    }
    result
}
