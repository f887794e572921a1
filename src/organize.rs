//! Destination planning and plan application
//!
//! `compute_plan` is pure apart from checking which destination names already
//! exist on disk. `apply_plan` performs the moves, one destination directory
//! per rayon task.

use crate::cluster::cluster_by_location;
use crate::config::{
    Config, DUPLICATES_DIR, DuplicateMode, MediaKind, NO_LOCATION_DIR, ORPHAN_DIR, RAW_DIR,
};
use crate::dedup::DuplicateReport;
use crate::error::{Error, Result};
use crate::fsops::{Overwrite, first_free_path, move_file};
use crate::group::{EventGroup, group_by_time};
use crate::media::MediaFile;
use crate::report::{AbortReason, ProcessingStats, RunReport};
use chrono::TimeDelta;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, debug, error, info, span};

/// An event group and the location folder it lives in, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPlacement {
    /// GPS cluster folder or `NoLocation`
    pub location: Option<String>,
    pub group: EventGroup,
}

impl EventPlacement {
    /// Event directory relative to the output root
    pub fn relative_dir(&self) -> PathBuf {
        let mut dir = PathBuf::new();
        if let Some(location) = &self.location {
            dir.push(location);
        }
        dir.push(self.group.folder_name());
        dir
    }
}

/// Cluster (optionally) and group photos and videos into events
///
/// RAW files are not grouped; they follow their partner or become orphans.
pub fn build_events(files: &[MediaFile], config: &Config) -> Vec<EventPlacement> {
    let grouped: Vec<&MediaFile> = files.iter().filter(|f| f.kind != MediaKind::Raw).collect();
    let gap = config.event_gap();

    if !config.gps_clustering {
        return place(None, &grouped, gap);
    }

    let clustering = cluster_by_location(&grouped, config.cluster_radius_m);
    if clustering.clusters.is_empty() {
        debug!("No file carries GPS, grouping by time only");
        return place(None, &grouped, gap);
    }

    let mut events = Vec::new();
    for cluster in &clustering.clusters {
        let members: Vec<&MediaFile> = cluster.members.iter().map(|&i| &files[i]).collect();
        events.extend(place(Some(cluster.folder_name()), &members, gap));
    }
    if clustering.has_no_location_folder() {
        let members: Vec<&MediaFile> = clustering.no_location.iter().map(|&i| &files[i]).collect();
        events.extend(place(Some(NO_LOCATION_DIR.to_string()), &members, gap));
    }
    events
}

fn place(location: Option<String>, members: &[&MediaFile], gap: TimeDelta) -> Vec<EventPlacement> {
    group_by_time(members, gap)
        .into_iter()
        .map(|group| EventPlacement {
            location: location.clone(),
            group,
        })
        .collect()
}

/// Why a file is moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveReason {
    Event,
    PairedRaw,
    OrphanRaw,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: MoveReason,
}

/// Why a file stays where it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoOpReason {
    DuplicateLeftInPlace,
    AlreadyInPlace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unchanged {
    pub path: PathBuf,
    pub reason: NoOpReason,
}

/// Every file of a batch mapped to exactly one move or no-op
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Moves in discovery order
    pub moves: Vec<PlannedMove>,
    pub unchanged: Vec<Unchanged>,
    /// Number of event folders
    pub events: usize,
}

impl Plan {
    /// Files counted as skipped for the given duplicate handling
    pub fn skipped(&self, mode: DuplicateMode) -> usize {
        self.unchanged
            .iter()
            .filter(|u| match u.reason {
                NoOpReason::AlreadyInPlace => true,
                NoOpReason::DuplicateLeftInPlace => mode == DuplicateMode::Skip,
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.moves.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.unchanged.is_empty()
    }
}

/// Decide the destination of every file
///
/// `files` must be in discovery order with `files[i].index == i`.
pub fn compute_plan(
    files: &[MediaFile],
    events: &[EventPlacement],
    duplicates: &DuplicateReport,
    config: &Config,
) -> Result<Plan> {
    let out = config.output_root();

    let mut event_dir: HashMap<usize, PathBuf> = HashMap::new();
    for placement in events {
        let dir = out.join(placement.relative_dir());
        for &member in &placement.group.members {
            event_dir.insert(member, dir.clone());
        }
    }

    let mut plan = Plan {
        events: events.len(),
        ..Plan::default()
    };
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for file in files {
        let (dir, reason) = if duplicates.is_duplicate(file.index) {
            if config.duplicates != DuplicateMode::Move {
                debug!(path = ?file.path, "Duplicate left in place");
                plan.unchanged.push(Unchanged {
                    path: file.path.clone(),
                    reason: NoOpReason::DuplicateLeftInPlace,
                });
                continue;
            }
            (out.join(DUPLICATES_DIR), MoveReason::Duplicate)
        } else {
            match file.kind {
                MediaKind::Raw => match file.partner.and_then(|p| event_dir.get(&p)) {
                    Some(dir) => (dir.join(RAW_DIR), MoveReason::PairedRaw),
                    None => (out.join(ORPHAN_DIR), MoveReason::OrphanRaw),
                },
                kind => {
                    let dir = event_dir.get(&file.index).ok_or_else(|| {
                        Error::Validation(format!(
                            "{} is not part of any event",
                            file.path.display()
                        ))
                    })?;
                    match kind.subfolder() {
                        Some(sub) => (dir.join(sub), MoveReason::Event),
                        None => (dir.clone(), MoveReason::Event),
                    }
                }
            }
        };

        let Some(name) = file.path.file_name() else {
            return Err(Error::Validation(format!(
                "{} has no file name",
                file.path.display()
            )));
        };
        let target = dir.join(name);

        if target == file.path {
            claimed.insert(target);
            plan.unchanged.push(Unchanged {
                path: file.path.clone(),
                reason: NoOpReason::AlreadyInPlace,
            });
            continue;
        }

        let destination = first_free_path(&target, |p| claimed.contains(p) || p.exists())?;
        debug!(source = ?file.path, ?destination, ?reason, "Planned move");
        claimed.insert(destination.clone());
        plan.moves.push(PlannedMove {
            source: file.path.clone(),
            destination,
            reason,
        });
    }

    info!(
        moves = plan.moves.len(),
        unchanged = plan.unchanged.len(),
        events = plan.events,
        "Computed plan"
    );
    Ok(plan)
}

/// Perform the moves of a plan
///
/// Moves sharing a destination directory run in order; directories run in
/// parallel. Without `continue_on_error` the first failure stops every move
/// that has not started yet.
pub fn apply_plan(plan: &Plan, config: &Config) -> RunReport {
    let _span = span!(Level::INFO, "apply_plan", moves = plan.moves.len()).entered();

    let mut by_dir: BTreeMap<&Path, Vec<&PlannedMove>> = BTreeMap::new();
    for planned in &plan.moves {
        let dir = planned.destination.parent().unwrap_or(Path::new(""));
        by_dir.entry(dir).or_default().push(planned);
    }

    let stats = ProcessingStats::new();
    let abort = AtomicBool::new(false);

    let mut failures: Vec<Error> = by_dir
        .into_par_iter()
        .flat_map_iter(|(_, moves)| {
            let mut failures = Vec::new();
            for planned in moves {
                if abort.load(Ordering::Relaxed) {
                    break;
                }
                match move_file(&planned.source, &planned.destination, Overwrite::Forbid) {
                    Ok(()) => {
                        if planned.reason == MoveReason::Duplicate {
                            stats.duplicates.fetch_add(1, Ordering::Relaxed);
                        } else {
                            stats.processed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(e) => {
                        error!(source = ?planned.source, error = %e, "Move failed");
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        if !config.continue_on_error {
                            abort.store(true, Ordering::Relaxed);
                        }
                        failures.push(e);
                    }
                }
            }
            failures
        })
        .collect();
    failures.sort_by(|a, b| a.path().cmp(&b.path()));

    let mut report = RunReport::default();
    report.absorb(&stats);
    report.skipped += plan.skipped(config.duplicates);
    for failure in &failures {
        report.record_error(failure);
    }
    if abort.load(Ordering::Relaxed) {
        report.aborted = Some(AbortReason::CriticalError);
    }

    info!("{}", stats.summary());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::detect_duplicates;
    use crate::media::{DateSource, GpsCoord, ScannedFile};
    use chrono::NaiveDateTime;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        files: Vec<MediaFile>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("dump");
            fs::create_dir_all(&root).unwrap();
            Self {
                _dir: dir,
                root,
                files: Vec::new(),
            }
        }

        fn add(&mut self, name: &str, kind: MediaKind, time: &str, content: &[u8]) -> usize {
            let path = self.root.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
            let timestamp = NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M").unwrap();
            let index = self.files.len();
            self.files.push(MediaFile::from_scanned(
                ScannedFile {
                    path,
                    kind,
                    size: content.len() as u64,
                    index,
                    modified: timestamp,
                },
                timestamp,
                DateSource::ExifPhoto,
                None,
            ));
            index
        }

        fn config(&self) -> Config {
            Config::for_input(&self.root)
        }

        fn plan(&mut self, config: &Config) -> Plan {
            let duplicates = if config.duplicates.is_enabled() {
                detect_duplicates(&mut self.files)
            } else {
                DuplicateReport::default()
            };
            let events = build_events(&self.files, config);
            compute_plan(&self.files, &events, &duplicates, config).unwrap()
        }

        fn destination_of(plan: &Plan, path: &Path) -> PathBuf {
            plan.moves
                .iter()
                .find(|m| m.source == path)
                .map(|m| m.destination.clone())
                .unwrap()
        }
    }

    #[test]
    fn test_layout_of_photos_videos_and_raws() {
        let mut fx = Fixture::new();
        let photo = fx.add("IMG_1.jpg", MediaKind::Photo, "2024-03-15 09:45", b"p1");
        let video = fx.add("MOV_1.mp4", MediaKind::Video, "2024-03-15 10:05", b"v1");
        let raw = fx.add("IMG_1.nef", MediaKind::Raw, "2024-03-15 09:45", b"r1");
        let orphan = fx.add("DSC_9.nef", MediaKind::Raw, "2024-03-15 09:45", b"r2");
        fx.files[raw].partner = Some(photo);

        let config = fx.config();
        let plan = fx.plan(&config);
        let event = fx.root.join("2024 - 0315 - 0945");

        assert_eq!(plan.events, 1);
        assert_eq!(
            Fixture::destination_of(&plan, &fx.files[photo].path),
            event.join("IMG_1.jpg")
        );
        assert_eq!(
            Fixture::destination_of(&plan, &fx.files[video].path),
            event.join("mov").join("MOV_1.mp4")
        );
        assert_eq!(
            Fixture::destination_of(&plan, &fx.files[raw].path),
            event.join("raw").join("IMG_1.nef")
        );
        assert_eq!(
            Fixture::destination_of(&plan, &fx.files[orphan].path),
            fx.root.join("orphan").join("DSC_9.nef")
        );
    }

    #[test]
    fn test_every_file_has_exactly_one_destination() {
        let mut fx = Fixture::new();
        for i in 0..6 {
            fx.add(
                &format!("sub{}/IMG.jpg", i),
                MediaKind::Photo,
                &format!("2024-05-0{} 12:00", 1 + i % 3),
                format!("content{}", i).as_bytes(),
            );
        }
        let config = fx.config();
        let plan = fx.plan(&config);

        assert_eq!(plan.len(), fx.files.len());
        let destinations: HashSet<_> = plan.moves.iter().map(|m| &m.destination).collect();
        assert_eq!(destinations.len(), plan.moves.len());
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let mut fx = Fixture::new();
        let a = fx.add("a/IMG.jpg", MediaKind::Photo, "2024-01-01 10:00", b"first");
        let b = fx.add("b/IMG.jpg", MediaKind::Photo, "2024-01-01 10:01", b"second");
        let event = fx.root.join("2024 - 0101 - 1000");
        fs::create_dir_all(&event).unwrap();
        fs::write(event.join("IMG.jpg"), b"already there").unwrap();

        let config = fx.config();
        let plan = fx.plan(&config);
        assert_eq!(
            Fixture::destination_of(&plan, &fx.files[a].path),
            event.join("IMG_1.jpg")
        );
        assert_eq!(
            Fixture::destination_of(&plan, &fx.files[b].path),
            event.join("IMG_2.jpg")
        );
    }

    #[test]
    fn test_already_organized_file_is_a_noop() {
        let mut fx = Fixture::new();
        fx.add(
            "2024 - 0101 - 1000/IMG.jpg",
            MediaKind::Photo,
            "2024-01-01 10:00",
            b"x",
        );
        let config = fx.config();
        let plan = fx.plan(&config);

        assert!(plan.moves.is_empty());
        assert_eq!(plan.unchanged[0].reason, NoOpReason::AlreadyInPlace);
        assert_eq!(plan.skipped(config.duplicates), 1);
    }

    #[test]
    fn test_duplicate_modes() {
        let mut fx = Fixture::new();
        fx.add("a.jpg", MediaKind::Photo, "2024-01-01 10:00", b"same");
        let dup = fx.add("b.jpg", MediaKind::Photo, "2024-01-01 10:00", b"same");

        let mut config = fx.config();
        config.duplicates = DuplicateMode::Move;
        let plan = fx.plan(&config);
        let moved = Fixture::destination_of(&plan, &fx.files[dup].path);
        assert_eq!(moved, fx.root.join("duplicates").join("b.jpg"));
        assert_eq!(plan.moves.len(), 2);

        for mode in [DuplicateMode::DetectOnly, DuplicateMode::Skip] {
            config.duplicates = mode;
            let plan = fx.plan(&config);
            assert_eq!(plan.moves.len(), 1);
            assert_eq!(plan.unchanged[0].path, fx.files[dup].path);
            assert_eq!(plan.unchanged[0].reason, NoOpReason::DuplicateLeftInPlace);
        }
        assert_eq!(fx.plan(&config).skipped(DuplicateMode::Skip), 1);
        assert_eq!(fx.plan(&config).skipped(DuplicateMode::DetectOnly), 0);
    }

    #[test]
    fn test_gps_layout_with_no_location() {
        let mut fx = Fixture::new();
        let located = fx.add("a.jpg", MediaKind::Photo, "2024-06-01 08:00", b"a");
        let unlocated = fx.add("b.jpg", MediaKind::Photo, "2024-06-01 08:10", b"b");
        fx.files[located].gps = GpsCoord::new(48.8566, 2.3522);

        let mut config = fx.config();
        config.gps_clustering = true;
        let plan = fx.plan(&config);

        assert_eq!(
            Fixture::destination_of(&plan, &fx.files[located].path),
            fx.root
                .join("48.8566N-2.3522E")
                .join("2024 - 0601 - 0800")
                .join("a.jpg")
        );
        assert_eq!(
            Fixture::destination_of(&plan, &fx.files[unlocated].path),
            fx.root
                .join("NoLocation")
                .join("2024 - 0601 - 0810")
                .join("b.jpg")
        );
    }

    #[test]
    fn test_gps_enabled_without_coordinates_groups_at_root() {
        let mut fx = Fixture::new();
        let a = fx.add("a.jpg", MediaKind::Photo, "2024-06-01 08:00", b"a");
        let mut config = fx.config();
        config.gps_clustering = true;
        let plan = fx.plan(&config);

        assert_eq!(
            Fixture::destination_of(&plan, &fx.files[a].path),
            fx.root.join("2024 - 0601 - 0800").join("a.jpg")
        );
    }

    #[test]
    fn test_apply_moves_files() {
        let mut fx = Fixture::new();
        fx.add("x/IMG_1.jpg", MediaKind::Photo, "2024-03-15 09:45", b"1");
        fx.add("x/IMG_2.jpg", MediaKind::Photo, "2024-03-15 12:00", b"2");
        let mut config = fx.config();
        config.output_dir = Some(fx.root.join("sorted"));
        let plan = fx.plan(&config);

        let report = apply_plan(&plan, &config);
        assert!(report.is_success());
        assert_eq!(report.processed, 2);
        for planned in &plan.moves {
            assert!(planned.destination.exists());
            assert!(!planned.source.exists());
        }
    }

    #[test]
    fn test_apply_stops_on_first_error_unless_continue() {
        let mut fx = Fixture::new();
        let a = fx.add("IMG_1.jpg", MediaKind::Photo, "2024-03-15 09:45", b"1");
        fx.add("IMG_2.jpg", MediaKind::Photo, "2024-03-15 09:46", b"2");
        let config = fx.config();
        let plan = fx.plan(&config);
        fs::remove_file(&fx.files[a].path).unwrap();

        let report = apply_plan(&plan, &config);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.processed, 0);
        assert_eq!(report.aborted, Some(AbortReason::CriticalError));

        let mut fx = Fixture::new();
        let a = fx.add("IMG_1.jpg", MediaKind::Photo, "2024-03-15 09:45", b"1");
        fx.add("IMG_2.jpg", MediaKind::Photo, "2024-03-15 09:46", b"2");
        let mut config = fx.config();
        config.continue_on_error = true;
        let plan = fx.plan(&config);
        fs::remove_file(&fx.files[a].path).unwrap();

        let report = apply_plan(&plan, &config);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.processed, 1);
        assert!(report.aborted.is_none());
    }
}
