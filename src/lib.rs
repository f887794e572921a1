//! Event Sorter - media grouping and organization engine
//!
//! This library splits a dump of photos, videos and RAW files into
//! per-event folders with support for:
//! - EXIF metadata extraction for images
//! - FFprobe-based metadata extraction for videos
//! - Batch-wide modification time fallback and RAW pairing
//! - Gap-based event grouping and greedy GPS clustering
//! - BLAKE3-based duplicate detection with a size pre-filter
//! - Parallel processing with Rayon
//! - Merging organized event folders with conflict resolution

pub mod cli;
pub mod cluster;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fsops;
pub mod group;
pub mod hash;
pub mod interactive;
pub mod media;
pub mod merge;
pub mod organize;
pub mod process;
pub mod report;
pub mod scan;
pub mod time;

pub use cli::Cli;
pub use config::{Config, ConfigError, DuplicateMode, ExecutionMode, MediaKind};
pub use error::{Error, ErrorKind, Result};
pub use merge::{MergeEngine, MergeRequest};
pub use process::Processor;
pub use report::{MergeReport, RunReport};
