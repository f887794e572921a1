//! Content duplicate detection
//!
//! Files are bucketed by exact size first; only buckets with two or more
//! files are hashed. Within a bucket the earliest-discovered file with a
//! given hash is the original and every later one is its duplicate.

use crate::error::Error;
use crate::hash::compute_file_hash;
use crate::media::{ContentHash, MediaFile};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A file whose content is identical to an earlier-discovered one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRecord {
    /// Discovery index of the duplicate
    pub duplicate: usize,
    /// Discovery index of the original
    pub original: usize,
    pub duplicate_path: PathBuf,
    pub original_path: PathBuf,
}

/// Result of a duplicate detection pass
#[derive(Debug, Default)]
pub struct DuplicateReport {
    /// Records ordered by the duplicate's discovery index
    pub records: Vec<DuplicateRecord>,
    /// Number of files that were actually hashed
    pub hashed: usize,
    /// Files that could not be hashed; they are treated as unique
    pub errors: Vec<Error>,
    original_of: HashMap<usize, usize>,
}

impl DuplicateReport {
    pub fn is_duplicate(&self, index: usize) -> bool {
        self.original_of.contains_key(&index)
    }

    /// Discovery index of the original a duplicate refers to
    pub fn original_of(&self, index: usize) -> Option<usize> {
        self.original_of.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Detect duplicates and attach content hashes to the hashed files
///
/// `files` must be in discovery order with `files[i].index == i`.
pub fn detect_duplicates(files: &mut [MediaFile]) -> DuplicateReport {
    let mut by_size: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for file in files.iter() {
        by_size.entry(file.size).or_default().push(file.index);
    }

    let candidates: Vec<usize> = by_size
        .values()
        .filter(|group| group.len() > 1)
        .flatten()
        .copied()
        .collect();

    debug!(
        files = files.len(),
        candidates = candidates.len(),
        "Size pre-filter selected files to hash"
    );

    // Collected in candidate order, independent of which worker finishes first
    let shared: &[MediaFile] = files;
    let hashes: Vec<(usize, Result<ContentHash, Error>)> = candidates
        .par_iter()
        .map(|&index| (index, compute_file_hash(&shared[index].path)))
        .collect();

    let mut report = DuplicateReport::default();
    for (index, hash) in hashes {
        match hash {
            Ok(hash) => {
                files[index].hash = Some(hash);
                report.hashed += 1;
            }
            Err(e) => {
                warn!(path = ?files[index].path, error = %e, "Failed to hash file");
                report.errors.push(e);
            }
        }
    }

    for group in by_size.values().filter(|group| group.len() > 1) {
        let mut first_seen: HashMap<ContentHash, usize> = HashMap::new();
        for &index in group {
            let Some(hash) = files[index].hash else {
                continue;
            };
            match first_seen.get(&hash) {
                Some(&original) => {
                    debug!(
                        duplicate = ?files[index].path,
                        original = ?files[original].path,
                        "Duplicate content"
                    );
                    report.original_of.insert(index, original);
                    report.records.push(DuplicateRecord {
                        duplicate: index,
                        original,
                        duplicate_path: files[index].path.clone(),
                        original_path: files[original].path.clone(),
                    });
                }
                None => {
                    first_seen.insert(hash, index);
                }
            }
        }
    }

    report.records.sort_by_key(|r| r.duplicate);

    info!(
        hashed = report.hashed,
        duplicates = report.records.len(),
        "Duplicate detection finished"
    );
    report
}
