//! Merge already-organized event folders into one target
//!
//! Every source and an existing target must be a media folder: media files
//! plus at most `raw/` and `mov/`, which hold media files only. Validation
//! runs before any file is moved. Merge moves are sequential because a
//! conflict prompt may change how every later conflict is resolved.

pub mod conflict;

pub use conflict::{
    Action, Choice, ConflictPrompt, Decision, FileConflict, FixedPolicy, StandingPolicy,
    transition,
};

use crate::cluster::is_gps_folder_name;
use crate::config::{Config, MOV_DIR, RAW_DIR};
use crate::error::{Error, Result};
use crate::fsops::{Overwrite, count_files, first_free_path, move_file};
use crate::report::{AbortReason, ConflictOutcome, ConflictState, MergeReport};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, error, info, span, warn};

/// What to merge and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    /// Source folders, processed in this order
    pub sources: Vec<PathBuf>,
    pub target: PathBuf,
    /// Overwrite every conflict without prompting
    pub force: bool,
    pub dry_run: bool,
    /// Standing policy at the start of the merge
    pub policy: StandingPolicy,
}

impl MergeRequest {
    pub fn new<P: Into<PathBuf>>(sources: Vec<PathBuf>, target: P) -> Self {
        Self {
            sources,
            target: target.into(),
            force: false,
            dry_run: false,
            policy: StandingPolicy::Ask,
        }
    }
}

fn not_media(path: &Path, reason: String) -> Error {
    Error::NotMediaFolder {
        path: path.to_path_buf(),
        reason,
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| Error::io_at(dir, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::io_at(dir, e))?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// Media files directly inside `dir`; anything else is rejected
fn media_files_in(dir: &Path, config: &Config, allow_subdirs: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in sorted_entries(dir)? {
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::io_at(&path, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if file_type.is_dir() {
            if allow_subdirs && (name == RAW_DIR || name == MOV_DIR) {
                continue;
            }
            return Err(not_media(dir, format!("contains subfolder '{}'", name)));
        }
        if config.kind_of(&path).is_none() {
            return Err(not_media(dir, format!("contains non-media file '{}'", name)));
        }
        files.push(path);
    }
    Ok(files)
}

/// Check the media folder structure of `dir`
pub fn validate_media_folder(dir: &Path, config: &Config) -> Result<()> {
    if let Some(name) = dir.file_name().and_then(|n| n.to_str())
        && is_gps_folder_name(name)
    {
        return Err(not_media(dir, "named like a location cluster folder".into()));
    }
    if !dir.is_dir() {
        return Err(not_media(dir, "not a directory".into()));
    }

    media_files_in(dir, config, true)?;
    for sub in [MOV_DIR, RAW_DIR] {
        let sub_dir = dir.join(sub);
        if sub_dir.is_dir() {
            media_files_in(&sub_dir, config, false)?;
        }
    }
    Ok(())
}

fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Check every precondition of a merge request
pub fn validate_request(request: &MergeRequest, config: &Config) -> Result<()> {
    if request.sources.is_empty() {
        return Err(Error::Validation("no source folders given".into()));
    }

    let target = identity(&request.target);
    let mut seen = HashSet::new();
    for source in &request.sources {
        if !source.exists() {
            return Err(not_media(source, "does not exist".into()));
        }
        let id = identity(source);
        if !seen.insert(id.clone()) {
            return Err(Error::Validation(format!(
                "source {} is listed more than once",
                source.display()
            )));
        }
        if id == target {
            return Err(Error::Validation(format!(
                "target {} is also a source",
                request.target.display()
            )));
        }
        validate_media_folder(source, config)?;
    }

    if request.target.exists() {
        validate_media_folder(&request.target, config)?;
    }
    Ok(())
}

/// Files of one source with their path relative to it: top level first,
/// then `mov/`, then `raw/`
fn source_files(source: &Path, config: &Config) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut files: Vec<(PathBuf, PathBuf)> = media_files_in(source, config, true)?
        .into_iter()
        .filter_map(|p| p.file_name().map(|n| (p.clone(), PathBuf::from(n))))
        .collect();

    for sub in [MOV_DIR, RAW_DIR] {
        let sub_dir = source.join(sub);
        if sub_dir.is_dir() {
            for path in media_files_in(&sub_dir, config, false)? {
                if let Some(name) = path.file_name() {
                    let relative = Path::new(sub).join(name);
                    files.push((path, relative));
                }
            }
        }
    }
    Ok(files)
}

/// Outcome of one file move
enum Placement<T = ()> {
    Moved(T),
    /// Failed and recorded; the merge continues
    Failed,
    /// Failed and recorded; the merge must stop
    Stop,
}

impl Placement {
    fn map<U>(self, f: impl FnOnce() -> U) -> Placement<U> {
        match self {
            Placement::Moved(()) => Placement::Moved(f()),
            Placement::Failed => Placement::Failed,
            Placement::Stop => Placement::Stop,
        }
    }
}

/// Merges source folders into a target folder
pub struct MergeEngine<'a> {
    config: &'a Config,
}

impl<'a> MergeEngine<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Validate, then move every file, resolving conflicts through `prompt`
    ///
    /// Validation failures are returned as errors before anything moves.
    /// Move failures, user quits and prompt failures end up in the report.
    pub fn merge(
        &self,
        request: &MergeRequest,
        prompt: &mut dyn ConflictPrompt,
    ) -> Result<MergeReport> {
        let _span = span!(Level::INFO, "merge", target = ?request.target).entered();

        validate_request(request, self.config)?;

        let mut plan = Vec::with_capacity(request.sources.len());
        for source in &request.sources {
            plan.push((source, source_files(source, self.config)?));
        }

        let mut standing = if request.force {
            StandingPolicy::Always(Action::Overwrite)
        } else {
            request.policy
        };
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut report = MergeReport::default();

        for (source, files) in plan {
            info!(?source, files = files.len(), "Merging source folder");

            for (path, relative) in files {
                let target = request.target.join(&relative);
                let taken = |p: &Path| p.exists() || claimed.contains(p);

                if !taken(&target) {
                    match self.place(&path, &target, Overwrite::Forbid, request, &mut report) {
                        Placement::Moved(()) => {
                            claimed.insert(target);
                            report.moved += 1;
                        }
                        Placement::Failed => {}
                        Placement::Stop => return Ok(report),
                    }
                    continue;
                }

                let conflict = FileConflict {
                    source: path.clone(),
                    target: target.clone(),
                };
                let choice = match standing {
                    StandingPolicy::Ask if !request.dry_run => match prompt.choose(&conflict) {
                        Ok(choice) => Some(choice),
                        Err(e) => {
                            error!(error = %e, "Conflict prompt failed");
                            report.record_error(&e);
                            report.aborted = Some(AbortReason::CriticalError);
                            return Ok(report);
                        }
                    },
                    _ => None,
                };
                let (decision, next) = transition(standing, choice);
                standing = next;
                debug!(?path, ?decision, "Conflict resolved");

                let (state, final_path) = match decision {
                    Decision::Pending => (ConflictState::Pending, None),
                    Decision::Quit => {
                        info!("Merge stopped by user");
                        report.conflicts.push(ConflictOutcome {
                            source: path,
                            target,
                            state: ConflictState::Aborted,
                            final_path: None,
                        });
                        report.aborted = Some(AbortReason::UserQuit);
                        return Ok(report);
                    }
                    Decision::Apply(Action::Skip) => {
                        report.skipped += 1;
                        (ConflictState::Skipped, None)
                    }
                    Decision::Apply(Action::Rename) => {
                        let placement = match first_free_path(&target, taken) {
                            Ok(renamed) => self
                                .place(&path, &renamed, Overwrite::Forbid, request, &mut report)
                                .map(|| renamed),
                            Err(e) => self.fail(&path, &e, &mut report),
                        };
                        match placement {
                            Placement::Moved(renamed) => {
                                claimed.insert(renamed.clone());
                                report.renamed += 1;
                                (ConflictState::Renamed, Some(renamed))
                            }
                            Placement::Failed => (ConflictState::Failed, None),
                            Placement::Stop => return Ok(report),
                        }
                    }
                    Decision::Apply(Action::Overwrite) => {
                        match self.place(&path, &target, Overwrite::Allow, request, &mut report) {
                            Placement::Moved(()) => {
                                report.overwritten += 1;
                                (ConflictState::Overwritten, Some(target.clone()))
                            }
                            Placement::Failed => (ConflictState::Failed, None),
                            Placement::Stop => return Ok(report),
                        }
                    }
                };
                report.conflicts.push(ConflictOutcome {
                    source: path,
                    target,
                    state,
                    final_path,
                });
            }

            if !request.dry_run {
                self.cleanup_source(source, &mut report);
            }
        }

        info!(
            moved = report.moved,
            renamed = report.renamed,
            skipped = report.skipped,
            overwritten = report.overwritten,
            "Merge finished"
        );
        Ok(report)
    }

    /// Move one file; a dry run counts as moved
    fn place(
        &self,
        from: &Path,
        to: &Path,
        overwrite: Overwrite,
        request: &MergeRequest,
        report: &mut MergeReport,
    ) -> Placement {
        if request.dry_run {
            debug!(?from, ?to, "Would move");
            return Placement::Moved(());
        }
        match move_file(from, to, overwrite) {
            Ok(()) => Placement::Moved(()),
            Err(e) => self.fail(from, &e, report),
        }
    }

    /// Record a failure for `from` and apply the abort/continue policy
    fn fail<T>(&self, from: &Path, e: &Error, report: &mut MergeReport) -> Placement<T> {
        error!(?from, error = %e, "Move failed");
        report.record_error(e);
        if self.config.continue_on_error {
            Placement::Failed
        } else {
            report.aborted = Some(AbortReason::CriticalError);
            Placement::Stop
        }
    }

    /// Delete a source folder only when no file is left in it
    fn cleanup_source(&self, source: &Path, report: &mut MergeReport) {
        if count_files(source) > 0 {
            debug!(?source, "Source still holds files, keeping it");
            report.kept_sources.push(source.to_path_buf());
            return;
        }
        match fs::remove_dir_all(source) {
            Ok(()) => {
                info!(?source, "Removed emptied source folder");
                report.removed_sources.push(source.to_path_buf());
            }
            Err(e) => {
                warn!(?source, error = %e, "Failed to remove source folder");
                report.record_error(&Error::io_at(source, e));
                report.kept_sources.push(source.to_path_buf());
            }
        }
    }
}
