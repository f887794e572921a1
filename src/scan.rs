//! Recursive media discovery
//!
//! Discovery order (file-name sorted walk) is the canonical order for every
//! later stage: duplicate originals, clustering and tie-breaking all use it.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::ScannedFile;
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome of a scan: files in discovery order plus unreadable entries
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<ScannedFile>,
    pub errors: Vec<Error>,
    /// Regular files whose extension is not in any media set
    pub ignored: usize,
}

/// Collect all media files under `config.input_dir`
pub fn scan(config: &Config) -> Result<ScanOutcome> {
    let root = &config.input_dir;
    let meta = std::fs::metadata(root).map_err(|e| Error::io_at(root, e))?;
    if !meta.is_dir() {
        return Err(Error::Validation(format!(
            "input path {} is not a directory",
            root.display()
        )));
    }

    let mut outcome = ScanOutcome::default();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(config, e.path()))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to read directory entry");
                outcome.errors.push(Error::from(e));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(kind) = config.kind_of(path) else {
            outcome.ignored += 1;
            continue;
        };

        match entry.metadata() {
            Ok(meta) => {
                let index = outcome.files.len();
                let modified = match meta.modified() {
                    Ok(time) => DateTime::<Local>::from(time).naive_local(),
                    Err(e) => {
                        warn!(?path, error = %e, "Modification time unavailable");
                        NaiveDateTime::default()
                    }
                };
                outcome.files.push(ScannedFile {
                    path: path.to_path_buf(),
                    kind,
                    size: meta.len(),
                    index,
                    modified,
                });
            }
            Err(e) => {
                warn!(?path, error = %e, "Failed to read file metadata");
                outcome.errors.push(Error::from(e));
            }
        }
    }

    debug!(
        files = outcome.files.len(),
        ignored = outcome.ignored,
        errors = outcome.errors.len(),
        "Scan finished"
    );

    Ok(outcome)
}

/// Check if a path should be excluded based on exclude_dirs configuration
fn is_excluded_dir(config: &Config, path: &Path) -> bool {
    for exclude in &config.exclude_dirs {
        if exclude.is_absolute() {
            if path.starts_with(exclude) {
                debug!(?path, ?exclude, "Excluding directory (absolute path match)");
                return true;
            }
        } else if let Some(exclude_name) = exclude.file_name()
            && path.file_name() == Some(exclude_name)
            && path != config.input_dir
        {
            debug!(?path, ?exclude, "Excluding directory (folder name match)");
            return true;
        }
    }

    false
}
