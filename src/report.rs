//! Structured results returned by the organizer and the merge engine

use crate::error::{Error, ErrorRecord};
use crate::organize::PlannedMove;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Why a run stopped before processing every file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortReason {
    /// A permission, IO or validation error in default mode
    CriticalError,
    /// The user chose quit at a merge conflict prompt
    UserQuit,
}

/// Counters shared by parallel workers
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub processed: AtomicUsize,
    pub skipped: AtomicUsize,
    pub duplicates: AtomicUsize,
    pub failed: AtomicUsize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed: {}, Skipped: {}, Duplicates: {}, Failed: {}",
            self.processed.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.duplicates.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        )
    }
}

/// Result of a validate, dryrun or run invocation
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Files found by the scan
    pub total: usize,
    pub photos: usize,
    pub videos: usize,
    pub raws: usize,
    /// Event folders in the plan
    pub events: usize,
    /// Files moved (or that would be moved in a dry run)
    pub processed: usize,
    /// Files deliberately left where they are
    pub skipped: usize,
    pub duplicates: usize,
    /// Whether the batch fell back to modification times
    pub strict_fallback: bool,
    /// Intended moves, filled for dry runs
    pub planned: Vec<PlannedMove>,
    pub errors: Vec<ErrorRecord>,
    pub warnings: Vec<ErrorRecord>,
    pub aborted: Option<AbortReason>,
}

impl RunReport {
    pub fn record_error(&mut self, error: &Error) {
        self.errors.push(ErrorRecord::from(error));
    }

    pub fn record_warning(&mut self, error: &Error) {
        self.warnings.push(ErrorRecord::from(error));
    }

    /// True when no critical error was recorded and the run was not aborted
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.aborted.is_none()
    }

    /// Fold the shared counters of an apply pass into the report
    pub fn absorb(&mut self, stats: &ProcessingStats) {
        self.processed += stats.processed.load(Ordering::Relaxed);
        self.skipped += stats.skipped.load(Ordering::Relaxed);
        self.duplicates += stats.duplicates.load(Ordering::Relaxed);
    }

    pub fn write_json(&self, path: &Path) -> crate::error::Result<()> {
        write_json(self, path)
    }
}

/// Final state of one merge conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictState {
    /// Unresolved; only reported by dry runs
    Pending,
    Renamed,
    Skipped,
    Overwritten,
    /// The rename or overwrite move failed; the source file stays in place
    Failed,
    Aborted,
}

/// A conflict and how it was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictOutcome {
    pub source: std::path::PathBuf,
    pub target: std::path::PathBuf,
    pub state: ConflictState,
    /// Where the file ended up, for renames
    pub final_path: Option<std::path::PathBuf>,
}

/// Result of a merge
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub moved: usize,
    pub renamed: usize,
    pub skipped: usize,
    pub overwritten: usize,
    pub conflicts: Vec<ConflictOutcome>,
    pub removed_sources: Vec<std::path::PathBuf>,
    pub kept_sources: Vec<std::path::PathBuf>,
    pub errors: Vec<ErrorRecord>,
    pub aborted: Option<AbortReason>,
}

impl MergeReport {
    pub fn record_error(&mut self, error: &Error) {
        self.errors.push(ErrorRecord::from(error));
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.aborted.is_none()
    }

    pub fn write_json(&self, path: &Path) -> crate::error::Result<()> {
        write_json(self, path)
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> crate::error::Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| Error::io_at(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::PathBuf;

    #[test]
    fn test_success_requires_no_errors_and_no_abort() {
        let mut report = RunReport::default();
        assert!(report.is_success());

        report.record_warning(&Error::ExifRead {
            path: PathBuf::from("a.jpg"),
            message: "none".into(),
        });
        assert!(report.is_success());

        report.aborted = Some(AbortReason::UserQuit);
        assert!(!report.is_success());
    }

    #[test]
    fn test_absorb_stats() {
        let stats = ProcessingStats::new();
        stats.processed.fetch_add(3, Ordering::Relaxed);
        stats.duplicates.fetch_add(1, Ordering::Relaxed);

        let mut report = RunReport::default();
        report.absorb(&stats);
        assert_eq!(report.processed, 3);
        assert_eq!(report.duplicates, 1);
        assert!(stats.summary().contains("Processed: 3"));
    }

    #[test]
    fn test_write_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("merge.json");

        let mut report = MergeReport::default();
        report.record_error(&Error::Validation("bad".into()));
        report.aborted = Some(AbortReason::CriticalError);
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["aborted"], "critical-error");
        assert_eq!(value["errors"][0]["kind"], "validation");
        assert_eq!(report.errors[0].kind, ErrorKind::Validation);
    }
}
