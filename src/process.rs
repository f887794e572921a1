//! Pipeline driver
//!
//! Handles the three execution modes over one code path:
//! - validate: structural checks and counts by kind
//! - plan (dry run): scan, resolve, group, detect duplicates, compute moves
//! - apply (run): plan, then move and clean up empty directories

use crate::config::{Config, ExecutionMode, MediaKind};
use crate::dedup::detect_duplicates;
use crate::error::{Error, Result};
use crate::fsops::remove_empty_dirs;
use crate::group::is_event_folder_name;
use crate::media::ScannedFile;
use crate::organize::{MoveReason, Plan, apply_plan, build_events, compute_plan};
use crate::report::{AbortReason, RunReport};
use crate::scan::scan;
use crate::time::{MetadataReader, Resolver, SystemMetadataReader};
use tracing::{Level, error, info, span, warn};

/// Main processor for organizing media files
pub struct Processor<R = SystemMetadataReader> {
    config: Config,
    resolver: Resolver<R>,
}

impl Processor<SystemMetadataReader> {
    /// Create a processor reading real EXIF and video metadata
    pub fn new(config: Config) -> Result<Self> {
        Self::with_reader(config, SystemMetadataReader)
    }
}

impl<R: MetadataReader> Processor<R> {
    pub fn with_reader(config: Config, reader: R) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Configure Rayon thread pool
        if config.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build_global()
                .ok(); // Ignore if already initialized
        }

        let resolver = Resolver::with_reader(&config, reader);
        Ok(Self { config, resolver })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Dispatch on the execution mode
    pub fn run(&self, mode: ExecutionMode) -> Result<RunReport> {
        match mode {
            ExecutionMode::Validate => self.validate(),
            ExecutionMode::Dryrun => self.plan().map(|(_, report)| report),
            ExecutionMode::Run => self.apply(),
        }
    }

    /// Structural checks only; no metadata is read and nothing is moved
    pub fn validate(&self) -> Result<RunReport> {
        let _span = span!(Level::INFO, "validate", input = ?self.config.input_dir).entered();

        self.check_output_location()?;
        let (scanned, report) = self.scan_stage()?;
        info!(
            files = scanned.len(),
            photos = report.photos,
            videos = report.videos,
            raws = report.raws,
            "Validation finished"
        );
        Ok(report)
    }

    /// Compute every destination without touching the file system
    pub fn plan(&self) -> Result<(Plan, RunReport)> {
        let _span = span!(Level::INFO, "plan", input = ?self.config.input_dir).entered();

        self.check_output_location()?;
        let (scanned, mut report) = self.scan_stage()?;
        if report.aborted.is_some() {
            return Ok((Plan::default(), report));
        }

        info!(count = scanned.len(), "Resolving capture times...");
        let batch = self.resolver.resolve_batch(scanned);
        for warning in &batch.warnings {
            report.record_warning(warning);
        }
        report.strict_fallback = batch.strict_fallback;
        let mut files = batch.files;

        info!("Grouping files into events...");
        let events = build_events(&files, &self.config);

        let duplicates = if self.config.duplicates.is_enabled() {
            info!("Computing file hashes for deduplication...");
            let duplicates = detect_duplicates(&mut files);
            for e in &duplicates.errors {
                report.record_error(e);
            }
            if !duplicates.errors.is_empty() && !self.config.continue_on_error {
                error!(errors = duplicates.errors.len(), "Hashing failed, stopping");
                report.aborted = Some(AbortReason::CriticalError);
                return Ok((Plan::default(), report));
            }
            duplicates
        } else {
            Default::default()
        };
        report.duplicates = duplicates.len();

        let plan = compute_plan(&files, &events, &duplicates, &self.config)?;
        report.events = plan.events;
        report.processed = plan
            .moves
            .iter()
            .filter(|m| m.reason != MoveReason::Duplicate)
            .count();
        report.skipped = plan.skipped(self.config.duplicates);
        report.planned = plan.moves.clone();

        Ok((plan, report))
    }

    /// Plan, move, then remove directories left empty under the input root
    pub fn apply(&self) -> Result<RunReport> {
        let _span = span!(Level::INFO, "apply", input = ?self.config.input_dir).entered();

        let (plan, mut report) = self.plan()?;
        report.planned.clear();
        if report.aborted.is_some() {
            return Ok(report);
        }

        info!(moves = plan.moves.len(), "Moving files...");
        let applied = apply_plan(&plan, &self.config);
        report.processed = applied.processed;
        report.skipped = applied.skipped;
        report.errors.extend(applied.errors);
        report.aborted = applied.aborted;

        if self.config.cleanup_empty_dirs && report.aborted.is_none() {
            match remove_empty_dirs(&self.config.input_dir, false) {
                Ok(removed) => info!(count = removed.len(), "Removed empty directories"),
                Err(e) => {
                    warn!(error = %e, "Empty directory cleanup failed");
                    report.record_error(&e);
                }
            }
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            duplicates = report.duplicates,
            errors = report.errors.len(),
            "Run finished"
        );
        Ok(report)
    }

    /// Scan and count by kind; scan errors are critical
    fn scan_stage(&self) -> Result<(Vec<ScannedFile>, RunReport)> {
        info!("Scanning input directory...");
        let outcome = scan(&self.config)?;

        let mut report = RunReport {
            total: outcome.files.len(),
            ..RunReport::default()
        };
        for file in &outcome.files {
            match file.kind {
                MediaKind::Photo => report.photos += 1,
                MediaKind::Video => report.videos += 1,
                MediaKind::Raw => report.raws += 1,
            }
        }
        info!(count = outcome.files.len(), ignored = outcome.ignored, "Found media files");

        for e in &outcome.errors {
            report.record_error(e);
        }
        if !outcome.errors.is_empty() && !self.config.continue_on_error {
            error!(errors = outcome.errors.len(), "Scan failed, stopping");
            report.aborted = Some(AbortReason::CriticalError);
        }

        Ok((outcome.files, report))
    }

    /// The output root must not sit inside an event folder
    fn check_output_location(&self) -> Result<()> {
        let Some(output) = &self.config.output_dir else {
            return Ok(());
        };
        let inside_event = output
            .ancestors()
            .filter_map(|p| p.file_name())
            .filter_map(|name| name.to_str())
            .any(is_event_folder_name);
        if inside_event {
            return Err(Error::Validation(format!(
                "output directory {} is inside an event folder",
                output.display()
            )));
        }
        Ok(())
    }
}
