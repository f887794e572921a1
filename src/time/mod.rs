//! Capture time resolution
//!
//! Every scanned file gets a timestamp and a [`DateSource`]:
//! - EXIF metadata for photos (and orphan RAW files)
//! - Container creation time via FFprobe for videos
//! - The paired JPEG/HEIC for RAW files that have one
//! - File system modification time as the last resort
//!
//! Resolution never fails. When metadata extraction is enabled and a single
//! file (other than a paired RAW) has to fall back to its modification time, the whole batch
//! is switched to modification times so that event boundaries are never
//! computed from a mix of camera clocks and file system clocks.

pub mod datetime;
pub mod exif;
pub mod video;

use crate::config::{Config, MediaKind};
use crate::error::{Error, Result};
use crate::group::is_event_folder_name;
use crate::media::{DateSource, GpsCoord, MediaFile, ScannedFile};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Capture information embedded in a file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedMetadata {
    pub timestamp: Option<NaiveDateTime>,
    pub gps: Option<GpsCoord>,
}

/// Source of embedded metadata
///
/// [`SystemMetadataReader`] reads EXIF and runs FFprobe; tests substitute
/// canned values.
pub trait MetadataReader: Sync {
    fn read_photo(&self, path: &Path) -> Result<EmbeddedMetadata>;
    fn read_video(&self, path: &Path) -> Result<EmbeddedMetadata>;
}

/// EXIF for photos and RAW files, FFprobe for videos
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMetadataReader;

impl MetadataReader for SystemMetadataReader {
    fn read_photo(&self, path: &Path) -> Result<EmbeddedMetadata> {
        let data = exif::read_exif(path)?;
        Ok(EmbeddedMetadata {
            timestamp: data.timestamp,
            gps: data.gps,
        })
    }

    fn read_video(&self, path: &Path) -> Result<EmbeddedMetadata> {
        let data = video::read_video_metadata(path)?;
        Ok(EmbeddedMetadata {
            timestamp: data.timestamp,
            gps: data.gps,
        })
    }
}

/// Timestamp, its source and the GPS position resolved for one file
type Resolved = (NaiveDateTime, DateSource, Option<GpsCoord>);

/// Result of resolving a whole batch
#[derive(Debug)]
pub struct ResolvedBatch {
    /// Files in discovery order
    pub files: Vec<MediaFile>,
    /// Metadata problems that were recovered by falling back
    pub warnings: Vec<Error>,
    /// True when the batch was downgraded to modification times
    pub strict_fallback: bool,
}

/// Resolves capture time, date source and GPS for a batch of files
pub struct Resolver<R = SystemMetadataReader> {
    reader: R,
    use_metadata: bool,
}

impl Resolver<SystemMetadataReader> {
    pub fn new(config: &Config) -> Self {
        Self::with_reader(config, SystemMetadataReader)
    }
}

impl<R: MetadataReader> Resolver<R> {
    pub fn with_reader(config: &Config, reader: R) -> Self {
        Self {
            reader,
            use_metadata: config.use_metadata,
        }
    }

    /// Resolve every file; the output keeps the input (discovery) order
    pub fn resolve_batch(&self, scanned: Vec<ScannedFile>) -> ResolvedBatch {
        let partners = find_raw_partners(&scanned);

        // Paired RAW files are filled in from their partner afterwards
        let outcomes: Vec<(Option<Resolved>, Vec<Error>)> =
            scanned
                .par_iter()
                .map(|file| {
                    if partners.contains_key(&file.index) {
                        (None, Vec::new())
                    } else {
                        let (resolved, warnings) = self.resolve_one(file);
                        (Some(resolved), warnings)
                    }
                })
                .collect();

        let mut warnings = Vec::new();
        let mut files: Vec<MediaFile> = Vec::with_capacity(scanned.len());
        for (file, (resolved, file_warnings)) in scanned.into_iter().zip(outcomes) {
            warnings.extend(file_warnings);
            let (timestamp, source, gps) =
                resolved.unwrap_or((file.modified, DateSource::ModTime, None));
            files.push(MediaFile::from_scanned(file, timestamp, source, gps));
        }

        // Paired RAW files are still unresolved here and do not count
        let offenders = files
            .iter()
            .filter(|f| !partners.contains_key(&f.index) && f.date_source == DateSource::ModTime)
            .count();
        let strict_fallback = self.use_metadata && offenders > 0;

        if strict_fallback {
            warn!(
                offenders,
                total = files.len(),
                "Some files lack usable capture metadata, using modification time for the whole batch"
            );
            for file in files.iter_mut() {
                file.timestamp = file.modified;
                file.date_source = DateSource::ModTime;
            }
        }

        for (raw_index, partner_index) in &partners {
            let partner = &files[*partner_index];
            let (timestamp, source, gps) = (
                partner.timestamp,
                match partner.date_source {
                    DateSource::ExifPhoto => DateSource::PairedExif,
                    other => other,
                },
                partner.gps,
            );
            let raw = &mut files[*raw_index];
            raw.timestamp = timestamp;
            raw.date_source = source;
            raw.gps = gps;
            raw.partner = Some(*partner_index);
            debug!(raw = ?raw.path, partner = *partner_index, "RAW paired with photo");
        }

        info!(
            files = files.len(),
            paired_raw = partners.len(),
            warnings = warnings.len(),
            strict_fallback,
            "Resolved capture times"
        );

        ResolvedBatch {
            files,
            warnings,
            strict_fallback,
        }
    }

    /// Resolve one file from its own metadata
    fn resolve_one(
        &self,
        file: &ScannedFile,
    ) -> (Resolved, Vec<Error>) {
        let fallback = (file.modified, DateSource::ModTime, None);
        if !self.use_metadata {
            return (fallback, Vec::new());
        }

        let (read, source) = match file.kind {
            MediaKind::Photo | MediaKind::Raw => {
                (self.reader.read_photo(&file.path), DateSource::ExifPhoto)
            }
            MediaKind::Video => (self.reader.read_video(&file.path), DateSource::VideoMeta),
        };

        let meta = match read {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = ?file.path, error = %e, "No embedded metadata, using modification time");
                return (fallback, vec![e]);
            }
        };

        match meta.timestamp {
            Some(ts) if datetime::within_capture_window(&ts) => ((ts, source, meta.gps), Vec::new()),
            Some(ts) => {
                let warning = Error::TimestampOutOfRange {
                    path: file.path.clone(),
                    timestamp: ts.to_string(),
                };
                debug!(path = ?file.path, %ts, "Embedded timestamp rejected");
                ((file.modified, DateSource::ModTime, meta.gps), vec![warning])
            }
            None => {
                let warning = match file.kind {
                    MediaKind::Video => Error::VideoMetadata {
                        path: file.path.clone(),
                        message: "No creation time found in video metadata".into(),
                    },
                    _ => Error::ExifRead {
                        path: file.path.clone(),
                        message: "No valid date tag found in EXIF data".into(),
                    },
                };
                ((file.modified, DateSource::ModTime, meta.gps), vec![warning])
            }
        }
    }
}

fn in_event_folder(dir: &Path) -> bool {
    dir.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(is_event_folder_name)
}

fn lower_stem(path: &Path) -> Option<OsString> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| OsString::from(s.to_lowercase()))
}

/// Map RAW discovery index to its partner photo's discovery index
///
/// The partner is a same-stem photo in the RAW's own directory, otherwise
/// the first same-stem photo that already sits in an event folder (a JPEG
/// organized by an earlier run). Photos in unrelated folders never match.
fn find_raw_partners(files: &[ScannedFile]) -> HashMap<usize, usize> {
    let mut by_dir: HashMap<(PathBuf, OsString), usize> = HashMap::new();
    let mut by_stem: HashMap<OsString, usize> = HashMap::new();

    for file in files.iter().filter(|f| f.kind == MediaKind::Photo) {
        let Some(stem) = lower_stem(&file.path) else {
            continue;
        };
        let dir = file.path.parent().map(Path::to_path_buf).unwrap_or_default();
        if in_event_folder(&dir) {
            by_stem.entry(stem.clone()).or_insert(file.index);
        }
        by_dir.entry((dir, stem)).or_insert(file.index);
    }

    files
        .iter()
        .filter(|f| f.kind == MediaKind::Raw)
        .filter_map(|raw| {
            let stem = lower_stem(&raw.path)?;
            let dir = raw.path.parent().map(Path::to_path_buf).unwrap_or_default();
            by_dir
                .get(&(dir, stem.clone()))
                .or_else(|| by_stem.get(&stem))
                .map(|&partner| (raw.index, partner))
        })
        .collect()
}
