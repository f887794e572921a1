//! Configuration types for the event sorter

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How the organizer treats files detected as duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateMode {
    /// No hashing at all
    #[default]
    Off,
    /// Report duplicates but leave them where they are
    DetectOnly,
    /// Do not move duplicates, count them as skipped
    Skip,
    /// Move duplicates into the `duplicates/` folder
    Move,
}

impl DuplicateMode {
    pub fn is_enabled(self) -> bool {
        self != DuplicateMode::Off
    }
}

/// Execution mode requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Structural checks only, no metadata extraction and no moves
    Validate,
    /// Full metadata extraction and grouping, report intended moves
    #[default]
    Dryrun,
    /// Apply the moves
    Run,
}

/// Media classification by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Raw,
}

impl MediaKind {
    /// Sub-folder of an event folder this kind lands in, if any
    pub fn subfolder(&self) -> Option<&'static str> {
        match self {
            MediaKind::Photo => None,
            MediaKind::Video => Some(MOV_DIR),
            MediaKind::Raw => Some(RAW_DIR),
        }
    }
}

pub const RAW_DIR: &str = "raw";
pub const MOV_DIR: &str = "mov";
pub const ORPHAN_DIR: &str = "orphan";
pub const NO_LOCATION_DIR: &str = "NoLocation";
pub const DUPLICATES_DIR: &str = "duplicates";

/// Largest accepted event gap, one year
pub const MAX_EVENT_GAP_MINUTES: i64 = 365 * 24 * 60;

/// Configuration for the event sorter
///
/// Built once and shared read-only by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory to scan for media files
    pub input_dir: PathBuf,

    /// Output directory for event folders (defaults to the input directory)
    pub output_dir: Option<PathBuf>,

    /// Directories to exclude from scanning (can be absolute paths or folder names)
    pub exclude_dirs: Vec<PathBuf>,

    /// Maximum gap between two consecutive files of one event, in minutes
    pub event_gap_minutes: i64,

    /// Read EXIF and video metadata (otherwise modification time only)
    pub use_metadata: bool,

    /// Cluster files by GPS location before grouping by time
    pub gps_clustering: bool,

    /// Cluster radius in meters
    pub cluster_radius_m: f64,

    /// Duplicate handling
    pub duplicates: DuplicateMode,

    /// Keep going after critical errors and report all of them at the end
    pub continue_on_error: bool,

    /// Remove directories left empty under the input root after a run
    pub cleanup_empty_dirs: bool,

    /// Number of threads for parallel processing (0 = auto)
    pub threads: usize,

    /// Supported photo extensions
    pub image_extensions: Vec<String>,

    /// Supported video extensions
    pub video_extensions: Vec<String>,

    /// Supported RAW extensions
    pub raw_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: None,
            exclude_dirs: vec![],
            event_gap_minutes: 60,
            use_metadata: true,
            gps_clustering: false,
            cluster_radius_m: 2000.0,
            duplicates: DuplicateMode::default(),
            continue_on_error: false,
            cleanup_empty_dirs: true,
            threads: 0, // Auto-detect
            image_extensions: vec![
                "jpg".into(), "jpeg".into(), "png".into(), "heic".into(),
                "heif".into(), "webp".into(), "tiff".into(), "tif".into(),
            ],
            video_extensions: vec![
                "mp4".into(), "mov".into(), "avi".into(), "mkv".into(),
                "m4v".into(), "3gp".into(), "mts".into(),
            ],
            raw_extensions: vec![
                "raw".into(), "arw".into(), "cr2".into(), "cr3".into(),
                "nef".into(), "orf".into(), "rw2".into(), "dng".into(),
                "raf".into(), "srw".into(), "pef".into(),
            ],
        }
    }
}

impl Config {
    /// Config rooted at `input_dir` with defaults for everything else
    pub fn for_input<P: Into<PathBuf>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
            ..Self::default()
        }
    }

    /// Classify an extension, RAW first so that `dng` never counts as a photo
    pub fn media_kind(&self, ext: &str) -> Option<MediaKind> {
        let ext_lower = ext.to_lowercase();
        if self.raw_extensions.iter().any(|e| e == &ext_lower) {
            Some(MediaKind::Raw)
        } else if self.video_extensions.iter().any(|e| e == &ext_lower) {
            Some(MediaKind::Video)
        } else if self.image_extensions.iter().any(|e| e == &ext_lower) {
            Some(MediaKind::Photo)
        } else {
            None
        }
    }

    /// Classify a path by its extension
    pub fn kind_of(&self, path: &Path) -> Option<MediaKind> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.media_kind(ext))
    }

    /// Check if a file extension is supported
    pub fn is_supported(&self, ext: &str) -> bool {
        self.media_kind(ext).is_some()
    }

    /// Maximum gap inside one event
    ///
    /// Out-of-range values (rejected by [`Config::validate`]) are clamped.
    pub fn event_gap(&self) -> TimeDelta {
        TimeDelta::minutes(self.event_gap_minutes.clamp(1, MAX_EVENT_GAP_MINUTES))
    }

    /// Directory that receives the organized tree
    pub fn output_root(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.input_dir)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_gap_minutes <= 0 {
            return Err(ConfigError::Invalid(format!(
                "event_gap_minutes must be positive, got {}",
                self.event_gap_minutes
            )));
        }
        if self.event_gap_minutes > MAX_EVENT_GAP_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "event_gap_minutes must be at most {} (one year), got {}",
                MAX_EVENT_GAP_MINUTES, self.event_gap_minutes
            )));
        }
        if !self.cluster_radius_m.is_finite() || self.cluster_radius_m <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "cluster_radius_m must be a positive number, got {}",
                self.cluster_radius_m
            )));
        }

        let sets = [
            ("image_extensions", &self.image_extensions),
            ("video_extensions", &self.video_extensions),
            ("raw_extensions", &self.raw_extensions),
        ];
        for (i, (name_a, set_a)) in sets.iter().enumerate() {
            for (name_b, set_b) in sets.iter().skip(i + 1) {
                if let Some(shared) = set_a
                    .iter()
                    .find(|a| set_b.iter().any(|b| b.eq_ignore_ascii_case(a)))
                {
                    return Err(ConfigError::Invalid(format!(
                        "extension '{}' is listed in both {} and {}",
                        shared, name_a, name_b
                    )));
                }
            }
        }

        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        for set in [
            &mut config.image_extensions,
            &mut config.video_extensions,
            &mut config.raw_extensions,
        ] {
            for ext in set.iter_mut() {
                *ext = ext.trim_start_matches('.').to_lowercase();
            }
        }

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            source: e,
        })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Event Sorter Configuration File
# This file uses TOML format (https://toml.io)

# Folder holding the unsorted dump
input_dir = "D:/Camera Dump"

# Where event folders are created (defaults to input_dir when omitted)
# output_dir = "D:/Sorted"

# Directories to exclude from scanning
# Can be absolute paths or folder names (will match any folder with that name)
exclude_dirs = [
    ".thumbnails",
    "@eaDir",
]

# A gap longer than this (in minutes) between two shots starts a new event
event_gap_minutes = 60

# Read EXIF / video metadata. When false, modification times are used.
# If any single file lacks usable metadata, the whole batch falls back to
# modification times so events are never built from mixed clocks.
use_metadata = true

# Split events by location first (files without GPS go to NoLocation/)
gps_clustering = false
cluster_radius_m = 2000.0

# Duplicate handling: "off", "detect-only", "skip" or "move"
# - move: duplicates go to duplicates/, originals are organized normally
duplicates = "off"

# Keep going after move/permission errors and report all of them at the end
continue_on_error = false

# Remove folders left empty under input_dir after a run
cleanup_empty_dirs = true

# Number of threads for parallel processing (0 = auto-detect)
threads = 0

image_extensions = ["jpg", "jpeg", "png", "heic", "heif", "webp", "tiff", "tif"]
video_extensions = ["mp4", "mov", "avi", "mkv", "m4v", "3gp", "mts"]
raw_extensions = ["raw", "arw", "cr2", "cr3", "nef", "orf", "rw2", "dng", "raf", "srw", "pef"]
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError {
        source: toml::ser::Error,
    },
    /// A value is out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
            ConfigError::Invalid(message) => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_is_case_insensitive() {
        let config = Config::default();
        assert_eq!(config.media_kind("JPG"), Some(MediaKind::Photo));
        assert_eq!(config.media_kind("Mov"), Some(MediaKind::Video));
        assert_eq!(config.media_kind("NEF"), Some(MediaKind::Raw));
        assert_eq!(config.media_kind("txt"), None);
        assert_eq!(config.kind_of(Path::new("/a/IMG_1.HEIC")), Some(MediaKind::Photo));
        assert_eq!(config.kind_of(Path::new("/a/README")), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.event_gap_minutes = 0;
        assert!(config.validate().is_err());

        config.event_gap_minutes = i64::MAX;
        assert!(config.validate().is_err());
        assert_eq!(config.event_gap(), TimeDelta::minutes(MAX_EVENT_GAP_MINUTES));

        config.event_gap_minutes = MAX_EVENT_GAP_MINUTES;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.cluster_radius_m = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.video_extensions.push("JPG".into());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("jpg"));
    }

    #[test]
    fn test_output_root_defaults_to_input() {
        let mut config = Config::for_input("/dump");
        assert_eq!(config.output_root(), Path::new("/dump"));
        config.output_dir = Some(PathBuf::from("/sorted"));
        assert_eq!(config.output_root(), Path::new("/sorted"));
    }

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::sample_config()).unwrap();
        assert_eq!(config.event_gap_minutes, 60);
        assert_eq!(config.duplicates, DuplicateMode::Off);
        assert!(config.output_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip_normalizes_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("sorter.toml");

        let mut config = Config::for_input("/dump");
        config.duplicates = DuplicateMode::Move;
        config.image_extensions = vec![".JPG".into()];
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.duplicates, DuplicateMode::Move);
        assert_eq!(loaded.image_extensions, vec!["jpg".to_string()]);
    }
}
