//! Event Sorter - split camera dumps into per-event folders
//!
//! Groups media files by capture time and location, detects duplicates and
//! merges organized event folders.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use event_sorter::cli::{Command, MergeArgs, OrganizeArgs};
use event_sorter::interactive::{TerminalPrompt, can_prompt};
use event_sorter::merge::{Choice, ConflictPrompt, FixedPolicy, MergeEngine, StandingPolicy};
use event_sorter::report::{AbortReason, MergeReport, RunReport};
use event_sorter::{Cli, Config, ExecutionMode, Processor};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli_output {
    //! Styled console output

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(&format!("{}\n", "─".repeat(60))));
    }

    /// Centered title
    pub fn print_title(title: &str) {
        let padding = 60usize.saturating_sub(title.len()) / 2;
        let _ = stdout().execute(Print(" ".repeat(padding)));
        let _ = stdout().execute(Print(title.bold()));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_stat(key: &str, value: &str, color: Color) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(key).with(CliTheme::HINT)));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(style(value).with(color).bold()));
        let _ = stdout().execute(Print("\n"));
    }

    /// One source/destination line
    pub fn print_result(status_icon: &str, status_color: Color, source: &str, dest_or_msg: &str) {
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(status_icon).with(status_color).bold()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(source).italic()));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(style(dest_or_msg).with(CliTheme::HINT)));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_log_path(path: &str) {
        let _ = stdout().execute(Print(style("  Log file: ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", path)));
    }

    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::InitConfig { path } = &cli.command {
        return match init_config(path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::from(1)
            }
        };
    }

    let log_path = match get_log_path(&cli) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(1);
        }
    };
    let _guard = match setup_logging(&cli, &log_path) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to set up logging: {:#}", e);
            return ExitCode::from(1);
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "Event Sorter starting");
    info!(log_file = %log_path.display(), "Log file location");

    let outcome = match &cli.command {
        Command::Organize(args) => run_organize(&cli, args),
        Command::Merge(args) => run_merge(&cli, args),
        Command::InitConfig { .. } => Ok(ExitCode::SUCCESS),
    };

    cli_output::print_log_path(&log_path.display().to_string());

    match outcome {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Processing failed");
            cli_output::print_error(&format!("{:#}", e));
            ExitCode::from(1)
        }
    }
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::sample_config())?;
    println!("Sample configuration written to {}", path.display());
    Ok(())
}

/// Load the config file if one was given
fn load_file_config(cli: &Cli) -> Result<Option<Config>> {
    let Some(ref config_path) = cli.config else {
        return Ok(None);
    };
    let resolved_path = resolve_config_path(config_path);
    info!(config_file = %resolved_path.display(), "Loading configuration from file");
    Ok(Some(Config::load_from_file(&resolved_path)?))
}

fn run_organize(cli: &Cli, args: &OrganizeArgs) -> Result<ExitCode> {
    let config = match load_file_config(cli)? {
        Some(file_config) => args.merge_with_config(file_config),
        None => args.to_config(),
    };
    if args.input.is_none() && cli.config.is_none() {
        anyhow::bail!("no input folder given (pass one or use --config)");
    }
    if cli.verbose {
        info!(?config, "Configuration loaded");
    }

    let processor = Processor::new(config)?;
    let report = processor.run(args.mode)?;

    if let Some(ref path) = args.report {
        report.write_json(path)?;
        info!(report = %path.display(), "Report written");
    }
    print_run_summary(&report, args.mode, cli.verbose);
    Ok(exit_code(report.is_success(), report.aborted))
}

fn run_merge(cli: &Cli, args: &MergeArgs) -> Result<ExitCode> {
    let mut config = load_file_config(cli)?.unwrap_or_default();
    if args.continue_on_error {
        config.continue_on_error = true;
    }

    let request = args.to_request();
    let mut prompt: Box<dyn ConflictPrompt> =
        if request.policy == StandingPolicy::Ask && !request.force && !request.dry_run {
            if can_prompt() {
                Box::new(TerminalPrompt::new())
            } else {
                warn!("No terminal available for conflict prompts, skipping conflicts");
                Box::new(FixedPolicy(Choice::Skip))
            }
        } else {
            Box::new(FixedPolicy(Choice::Skip))
        };

    let report = MergeEngine::new(&config).merge(&request, prompt.as_mut())?;

    if let Some(ref path) = args.report {
        report.write_json(path)?;
        info!(report = %path.display(), "Report written");
    }
    print_merge_summary(&report, request.dry_run, cli.verbose);
    Ok(exit_code(report.is_success(), report.aborted))
}

/// 0 on success, 2 when the user quit, 1 otherwise
fn exit_code(success: bool, aborted: Option<AbortReason>) -> ExitCode {
    match aborted {
        Some(AbortReason::UserQuit) => ExitCode::from(2),
        _ if success => ExitCode::SUCCESS,
        _ => ExitCode::from(1),
    }
}

fn print_errors(errors: &[event_sorter::error::ErrorRecord]) {
    use cli_output::*;

    if errors.is_empty() {
        return;
    }
    print_separator();
    print_error(&format!("{} error(s)", errors.len()));
    for record in errors.iter().take(20) {
        let path = record
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        print_result("✗", CliTheme::ERROR, &path, &record.message);
    }
    if errors.len() > 20 {
        print_hint(&format!("and {} more, see the log file", errors.len() - 20));
    }
}

fn print_run_summary(report: &RunReport, mode: ExecutionMode, verbose: bool) {
    use cli_output::*;

    print_separator();
    print_title(match mode {
        ExecutionMode::Validate => "Validation complete",
        ExecutionMode::Dryrun => "Dry run complete",
        ExecutionMode::Run => "Processing complete",
    });
    print_separator();
    print_blank();

    print_stat("Files", &report.total.to_string(), CliTheme::ACCENT);
    print_stat(
        "Photos / Videos / RAW",
        &format!("{} / {} / {}", report.photos, report.videos, report.raws),
        CliTheme::ACCENT,
    );
    if mode != ExecutionMode::Validate {
        print_stat("Events", &report.events.to_string(), CliTheme::ACCENT);
        print_stat("Processed", &report.processed.to_string(), CliTheme::SUCCESS);
        print_stat("Skipped", &report.skipped.to_string(), CliTheme::WARNING);
        print_stat("Duplicates", &report.duplicates.to_string(), CliTheme::ACCENT);
        print_stat("Warnings", &report.warnings.len().to_string(), CliTheme::WARNING);
    }
    print_stat("Errors", &report.errors.len().to_string(), CliTheme::ERROR);
    print_blank();

    if report.strict_fallback {
        print_warning("Some files lack capture metadata; modification times were used for all files");
    }

    if verbose && !report.planned.is_empty() {
        print_separator();
        print_hint("Planned moves");
        print_blank();
        for planned in &report.planned {
            print_result(
                "~",
                CliTheme::ACCENT,
                &planned.source.display().to_string(),
                &format!("→ {}", planned.destination.display()),
            );
        }
    }

    print_errors(&report.errors);

    if report.aborted == Some(AbortReason::CriticalError) {
        print_error("Stopped after a critical error (use --continue-on-error to keep going)");
    }
    if mode == ExecutionMode::Dryrun {
        print_separator();
        print_warning("Dry run: no files were moved (use --mode run)");
    }
    print_separator();
}

fn print_merge_summary(report: &MergeReport, dry_run: bool, verbose: bool) {
    use cli_output::*;

    print_separator();
    print_title(if dry_run { "Merge dry run complete" } else { "Merge complete" });
    print_separator();
    print_blank();

    print_stat("Moved", &report.moved.to_string(), CliTheme::SUCCESS);
    print_stat("Renamed", &report.renamed.to_string(), CliTheme::ACCENT);
    print_stat("Overwritten", &report.overwritten.to_string(), CliTheme::WARNING);
    print_stat("Skipped", &report.skipped.to_string(), CliTheme::WARNING);
    print_stat(
        "Sources removed",
        &report.removed_sources.len().to_string(),
        CliTheme::SUCCESS,
    );
    print_blank();

    if verbose {
        for conflict in &report.conflicts {
            print_result(
                "!",
                CliTheme::WARNING,
                &conflict.source.display().to_string(),
                &format!("{:?}", conflict.state),
            );
        }
    }
    for kept in &report.kept_sources {
        print_hint(&format!("Kept {} (files remain)", kept.display()));
    }

    print_errors(&report.errors);

    match report.aborted {
        Some(AbortReason::UserQuit) => print_warning("Merge stopped by user; moved files stay moved"),
        Some(AbortReason::CriticalError) => print_error("Merge stopped after a critical error"),
        None => {}
    }
    print_separator();
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Determine the log file path from `--log-file`, the config name or a timestamp
fn get_log_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(ref path) = cli.log_file {
        return Ok(path.clone());
    }

    let log_dir = get_executable_dir()?.join("Log");
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let prefix = match &cli.command {
        Command::Merge(_) => "Merge",
        _ => "Organize",
    };

    Ok(match cli.config_name() {
        Some(config_name) => log_dir
            .join(&config_name)
            .join(format!("{}_{}_{}.log", config_name, prefix, timestamp)),
        None => log_dir.join(format!("{}_{}.log", prefix, timestamp)),
    })
}

/// Resolve config path - accepts the name without `.toml`
fn resolve_config_path(config_path: &Path) -> PathBuf {
    if config_path.exists() || config_path.extension().is_some() {
        return config_path.to_path_buf();
    }
    config_path.with_extension("toml")
}

/// Setup logging (file + console)
fn setup_logging(cli: &Cli, log_path: &Path) -> Result<WorkerGuard> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(guard)
}
