//! CLI argument parsing with clap

use crate::config::{Config, DuplicateMode, ExecutionMode};
use crate::merge::{Action, MergeRequest, StandingPolicy};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Event Sorter - split camera dumps into per-event folders
///
/// Groups photos, videos and RAW files by capture time (and optionally
/// location), detects duplicates, and merges organized event folders.
#[derive(Parser, Debug)]
#[command(name = "event-sorter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// Settings from the file are used as defaults; CLI arguments override them.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output log file format as JSON
    #[arg(long, global = true)]
    pub json_log: bool,

    /// Log file path (defaults to Log/ next to the executable)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Organize a folder of media files into event folders
    Organize(OrganizeArgs),
    /// Merge organized event folders into one folder
    Merge(MergeArgs),
    /// Write a sample configuration file
    InitConfig {
        /// Where to write the file
        path: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
pub struct OrganizeArgs {
    /// Folder to organize (may come from the config file instead)
    pub input: Option<PathBuf>,

    /// Output directory for event folders (defaults to the input folder)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Execution mode:
    /// - validate: structural checks only
    /// - dryrun: show what would be moved (default)
    /// - run: move the files
    #[arg(short = 'M', long, value_enum, default_value_t = ExecutionMode::Dryrun)]
    pub mode: ExecutionMode,

    /// Maximum gap between two shots of one event, in minutes
    #[arg(short, long)]
    pub gap_minutes: Option<i64>,

    /// Cluster by GPS location before grouping by time
    #[arg(long)]
    pub gps: bool,

    /// Cluster radius in meters
    #[arg(long)]
    pub radius_m: Option<f64>,

    /// Duplicate handling
    #[arg(short, long, value_enum)]
    pub duplicates: Option<DuplicateMode>,

    /// Ignore embedded metadata and use modification times
    #[arg(long)]
    pub no_metadata: bool,

    /// Keep going after errors and report all of them at the end
    #[arg(long)]
    pub continue_on_error: bool,

    /// Number of threads for parallel processing (0 = auto)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// How merge conflicts are resolved when not forced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OnConflict {
    /// Prompt for every conflict
    #[default]
    Ask,
    Rename,
    Skip,
    Overwrite,
}

impl From<OnConflict> for StandingPolicy {
    fn from(value: OnConflict) -> Self {
        match value {
            OnConflict::Ask => StandingPolicy::Ask,
            OnConflict::Rename => StandingPolicy::Always(Action::Rename),
            OnConflict::Skip => StandingPolicy::Always(Action::Skip),
            OnConflict::Overwrite => StandingPolicy::Always(Action::Overwrite),
        }
    }
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Source folders, merged in this order
    #[arg(required = true, num_args = 1..)]
    pub sources: Vec<PathBuf>,

    /// Target folder
    #[arg(short = 'T', long)]
    pub target: PathBuf,

    /// Overwrite every conflict without asking
    #[arg(short, long)]
    pub force: bool,

    /// Show what would be moved without moving
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Conflict handling
    #[arg(long, value_enum, default_value_t = OnConflict::Ask)]
    pub on_conflict: OnConflict,

    /// Keep going after move errors
    #[arg(long)]
    pub continue_on_error: bool,

    /// Write the merge report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl MergeArgs {
    pub fn to_request(&self) -> MergeRequest {
        MergeRequest {
            sources: self.sources.clone(),
            target: self.target.clone(),
            force: self.force,
            dry_run: self.dry_run,
            policy: self.on_conflict.into(),
        }
    }
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }
}

impl OrganizeArgs {
    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref input) = self.input {
            config.input_dir = input.clone();
        }
        if let Some(ref output) = self.output {
            config.output_dir = Some(output.clone());
        }
        if let Some(gap) = self.gap_minutes {
            config.event_gap_minutes = gap;
        }
        if self.gps {
            config.gps_clustering = true;
        }
        if let Some(radius) = self.radius_m {
            config.cluster_radius_m = radius;
        }
        if let Some(duplicates) = self.duplicates {
            config.duplicates = duplicates;
        }
        if self.no_metadata {
            config.use_metadata = false;
        }
        if self.continue_on_error {
            config.continue_on_error = true;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_organize() {
        let cli = Cli::try_parse_from([
            "event-sorter",
            "-v",
            "organize",
            "/dump",
            "--mode",
            "run",
            "--gap-minutes",
            "90",
            "--gps",
            "--duplicates",
            "detect-only",
        ])
        .unwrap();
        assert!(cli.verbose);

        let Command::Organize(args) = cli.command else {
            panic!("expected organize");
        };
        assert_eq!(args.mode, ExecutionMode::Run);
        let config = args.to_config();
        assert_eq!(config.input_dir, PathBuf::from("/dump"));
        assert_eq!(config.event_gap_minutes, 90);
        assert!(config.gps_clustering);
        assert_eq!(config.duplicates, DuplicateMode::DetectOnly);
    }

    #[test]
    fn test_cli_overrides_file_config() {
        let args = OrganizeArgs {
            output: Some(PathBuf::from("/sorted")),
            no_metadata: true,
            ..OrganizeArgs::default()
        };
        let mut file = Config::for_input("/from-file");
        file.event_gap_minutes = 30;

        let config = args.merge_with_config(file);
        assert_eq!(config.input_dir, PathBuf::from("/from-file"));
        assert_eq!(config.output_dir, Some(PathBuf::from("/sorted")));
        assert_eq!(config.event_gap_minutes, 30);
        assert!(!config.use_metadata);
    }

    #[test]
    fn test_parse_merge() {
        let cli = Cli::try_parse_from([
            "event-sorter",
            "merge",
            "a",
            "b",
            "--target",
            "t",
            "--on-conflict",
            "skip",
        ])
        .unwrap();
        let Command::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        let request = args.to_request();
        assert_eq!(request.sources, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(request.policy, StandingPolicy::Always(Action::Skip));
        assert!(!request.force);

        assert!(Cli::try_parse_from(["event-sorter", "merge", "--target", "t"]).is_err());
    }
}
