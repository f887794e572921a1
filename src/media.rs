//! Media file records shared by every pipeline stage

use crate::config::MediaKind;
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Where a capture timestamp came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DateSource {
    /// EXIF `DateTimeOriginal` (or a related date tag) of the file itself
    ExifPhoto,
    /// Inherited from the same-stem JPEG/HEIC of a RAW file
    PairedExif,
    /// Container creation time of a video
    VideoMeta,
    /// File system modification time
    ModTime,
}

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpsCoord {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsCoord {
    /// Build a coordinate, rejecting NaN and out-of-range values
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// BLAKE3 digest of a file's content
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A media file found during scanning, before metadata resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
    /// Position in discovery order
    pub index: usize,
    /// Modification time in local wall-clock time
    pub modified: NaiveDateTime,
}

/// A media file with its resolved capture information
#[derive(Debug, Clone, Serialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
    /// Position in discovery order
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub date_source: DateSource,
    /// Modification time recorded during the scan
    pub modified: NaiveDateTime,
    pub gps: Option<GpsCoord>,
    /// Only set when duplicate detection hashed this file
    pub hash: Option<ContentHash>,
    /// Index of the paired JPEG/HEIC for RAW files
    pub partner: Option<usize>,
}

impl MediaFile {
    pub fn from_scanned(
        scanned: ScannedFile,
        timestamp: NaiveDateTime,
        date_source: DateSource,
        gps: Option<GpsCoord>,
    ) -> Self {
        Self {
            path: scanned.path,
            kind: scanned.kind,
            size: scanned.size,
            index: scanned.index,
            timestamp,
            date_source,
            modified: scanned.modified,
            gps,
            hash: None,
            partner: None,
        }
    }

    /// RAW file without a JPEG/HEIC sibling
    pub fn is_orphan_raw(&self) -> bool {
        self.kind == MediaKind::Raw && self.partner.is_none()
    }
}
