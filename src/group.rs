//! Gap-based temporal grouping into events

use crate::media::MediaFile;
use chrono::{NaiveDateTime, TimeDelta};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

static EVENT_FOLDER: OnceLock<Regex> = OnceLock::new();

/// A run of files with no internal gap larger than the configured delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventGroup {
    /// Discovery indices of the members, in chronological order
    pub members: Vec<usize>,
    /// Capture time of the earliest member
    pub anchor: NaiveDateTime,
}

impl EventGroup {
    /// Folder name `YYYY - MMDD - hhmm` derived from the anchor timestamp
    pub fn folder_name(&self) -> String {
        event_folder_name(&self.anchor)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

pub fn event_folder_name(anchor: &NaiveDateTime) -> String {
    anchor.format("%Y - %m%d - %H%M").to_string()
}

/// Whether a folder name looks like one produced by [`event_folder_name`]
pub fn is_event_folder_name(name: &str) -> bool {
    EVENT_FOLDER
        .get_or_init(|| Regex::new(r"^\d{4} - \d{4} - \d{4}$").unwrap())
        .is_match(name)
}

/// Partition files into events
///
/// Files are sorted by timestamp (stable, so ties keep the input order) and a
/// new group starts whenever the gap to the previous file is strictly larger
/// than `gap`.
pub fn group_by_time(files: &[&MediaFile], gap: TimeDelta) -> Vec<EventGroup> {
    let mut sorted: Vec<&MediaFile> = files.to_vec();
    sorted.sort_by_key(|f| f.timestamp);

    let mut groups: Vec<EventGroup> = Vec::new();
    let mut previous: Option<NaiveDateTime> = None;

    for file in sorted {
        match (previous, groups.last_mut()) {
            (Some(prev), Some(current)) if file.timestamp - prev <= gap => {
                current.members.push(file.index);
            }
            _ => groups.push(EventGroup {
                members: vec![file.index],
                anchor: file.timestamp,
            }),
        }
        previous = Some(file.timestamp);
    }

    debug!(files = files.len(), groups = groups.len(), "Grouped files by time");
    groups
}
