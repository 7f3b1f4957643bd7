//! doppel - find duplicate files and deal with them reversibly.
//!
//! Usage:
//!   doppel scan [PATH]                     Report duplicates
//!   doppel apply [PATH] --action <ACTION>  Scan, then move/trash/delete duplicates
//!   doppel batches                         List recorded action batches
//!   doppel restore <ID>                    Put back the files of one batch
//!   doppel history [--diff]                Show recorded scans
//!   doppel --help                          Show help

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, Context, Result};
use itertools::Itertools;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use doppel_engine::{
    ActionKind, BatchId, DoppelConfig, Engine, FilterConfig, RestoreOutcome, ScanReport,
};

#[derive(Parser)]
#[command(
    name = "doppel",
    version,
    about = "Find duplicate files and quarantine, trash or delete them",
    long_about = "doppel finds byte-identical files and visually identical images.\n\n\
                  Every move or delete is recorded in a recovery ledger, so \
                  `doppel restore <ID>` can put moved files back."
)]
struct Cli {
    /// Config file (defaults to <config dir>/doppel/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and report duplicates
    Scan {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Scan a directory and apply an action to every duplicate
    Apply {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// preview, move, soft-delete or permanent-delete
        #[arg(short, long, value_parser = parse_action)]
        action: ActionKind,

        /// Skip the confirmation for permanent-delete
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// List recorded action batches, newest first
    Batches,

    /// Move the files of one batch back where they came from
    Restore {
        /// Batch id, as shown by `doppel batches`
        id: String,
    },

    /// Show recorded scans, newest first
    History {
        /// Compare the newest scan with the previous scan of the same root
        #[arg(short, long)]
        diff: bool,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Extensions to scan, separated by ';' or ',' (e.g. "jpg;png")
    #[arg(short, long)]
    ext: Option<String>,

    /// Minimum file size (e.g., "1KB", "1MB")
    #[arg(long)]
    min_size: Option<String>,

    /// Maximum file size (e.g., "100MB", "2GB")
    #[arg(long)]
    max_size: Option<String>,
}

impl FilterArgs {
    /// Apply the flags on top of the configured filter.
    fn resolve(&self, base: &FilterConfig) -> Result<FilterConfig> {
        let mut filter = base.clone();
        if let Some(ext) = &self.ext {
            filter = filter.with_extension_list(ext);
        }
        if let Some(min) = &self.min_size {
            filter.min_size = parse_size(min).with_context(|| format!("Invalid --min-size {min}"))?;
        }
        if let Some(max) = &self.max_size {
            filter.max_size = parse_size(max).with_context(|| format!("Invalid --max-size {max}"))?;
        }
        if let Err(message) = filter.validate() {
            bail!(message);
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DoppelConfig::load_from(path)?,
        None => DoppelConfig::load()?,
    };
    debug!(roots = ?config.roots, scan_store = ?config.scan_store, "configuration loaded");
    let engine = Engine::new(config).context("Failed to start")?;

    match cli.command {
        Command::Scan { path, filter } => run_scan(&engine, &path, &filter, cli.format),
        Command::Apply {
            path,
            action,
            yes,
            filter,
        } => run_apply(&engine, &path, action, yes, &filter, cli.format),
        Command::Batches => run_batches(&engine, cli.format),
        Command::Restore { id } => run_restore(&engine, &BatchId::new(id), cli.format),
        Command::History { diff } => run_history(&engine, diff, cli.format),
    }
}

/// Log to stderr, filtered by `DOPPEL_LOG` (default: warn).
fn init_logging() {
    let filter = EnvFilter::try_from_env("DOPPEL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Scan and print the report.
fn run_scan(engine: &Engine, path: &Path, filter: &FilterArgs, format: OutputFormat) -> Result<()> {
    let filter = filter.resolve(&engine.config().filter)?;

    eprintln!("Scanning {}...", path.display());
    let summary = engine.start_scan(path, Some(filter)).context("Scan failed")?;

    match format {
        OutputFormat::Text => print_report(&summary.report, &summary.message()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*summary.report)?),
    }
    Ok(())
}

/// Scan, then apply one action to every duplicate found.
fn run_apply(
    engine: &Engine,
    path: &Path,
    action: ActionKind,
    yes: bool,
    filter: &FilterArgs,
    format: OutputFormat,
) -> Result<()> {
    let filter = filter.resolve(&engine.config().filter)?;

    eprintln!("Scanning {}...", path.display());
    let scanned = engine.start_scan(path, Some(filter)).context("Scan failed")?;
    eprintln!("{}", scanned.message());

    if action == ActionKind::PermanentDelete && scanned.report.has_duplicates() && !yes {
        let prompt = format!(
            "Permanently delete {} files? This cannot be undone. Type 'yes' to continue: ",
            scanned.report.duplicate_count()
        );
        if !confirm(&prompt)? {
            eprintln!("Aborted.");
            return Ok(());
        }
    }

    let applied = match engine.apply_action(action) {
        Ok(applied) => applied,
        Err(err) => {
            // Without a ledger entry this output is the only record of where files went.
            if let Some(batch) = err.unrecorded_batch() {
                println!("{}", serde_json::to_string_pretty(batch)?);
            }
            return Err(err).context("Action failed");
        }
    };

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" {}", applied.message());
            println!("{}", "─".repeat(70));
            for record in &applied.batch.records {
                match (&record.destination, &record.error) {
                    (_, Some(error)) => {
                        println!("   FAILED {}: {}", record.source.display(), error)
                    }
                    (Some(dest), None) => {
                        println!("   {} -> {}", record.source.display(), dest.display())
                    }
                    (None, None) => println!("   {}", record.source.display()),
                }
            }
            if let Some(id) = &applied.batch_id {
                if action.is_restorable() {
                    println!();
                    println!(" Undo with: doppel restore {}", id);
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "batch_id": applied.batch_id,
                "batch": applied.batch,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    if !applied.batch.is_success() {
        bail!("{} of {} files failed", applied.batch.failed(), applied.batch.records.len());
    }
    Ok(())
}

/// List the recovery ledger.
fn run_batches(engine: &Engine, format: OutputFormat) -> Result<()> {
    let summaries = engine.batch_summaries()?;

    match format {
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!(" No recorded batches.");
            }
            for (id, summary) in &summaries {
                match summary {
                    Ok(s) => println!(
                        " {:<28} {:<17} {:>5} files  {:>5} restorable  {}",
                        id.as_str(),
                        s.action.to_string(),
                        s.total,
                        s.restorable,
                        s.created_at.format("%Y-%m-%d %H:%M:%S")
                    ),
                    Err(e) => println!(" {:<28} unreadable: {}", id.as_str(), e),
                }
            }
        }
        OutputFormat::Json => {
            let entries: Vec<_> = summaries
                .iter()
                .map(|(id, summary)| match summary {
                    Ok(s) => serde_json::to_value(s).unwrap_or_default(),
                    Err(e) => serde_json::json!({ "id": id, "error": e.to_string() }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}

/// Restore one batch and report every entry.
fn run_restore(engine: &Engine, id: &BatchId, format: OutputFormat) -> Result<()> {
    let report = engine
        .restore(id)
        .with_context(|| format!("Cannot restore batch {}", id))?;

    match format {
        OutputFormat::Text => {
            println!(" {}", report.summary());
            for entry in &report.entries {
                let status = match &entry.outcome {
                    RestoreOutcome::Restored => "restored".to_string(),
                    RestoreOutcome::NonRestorable => "not restorable (deleted)".to_string(),
                    RestoreOutcome::NothingToRestore => "nothing to restore".to_string(),
                    RestoreOutcome::Failed { message } => format!("FAILED: {}", message),
                };
                println!("   {}: {}", entry.source.display(), status);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.failed() > 0 {
        bail!("{} entries could not be restored", report.failed());
    }
    Ok(())
}

/// Show scan history, optionally with a diff of the last two scans.
fn run_history(engine: &Engine, diff: bool, format: OutputFormat) -> Result<()> {
    if diff {
        let Some((previous, newest, changes)) = engine.diff_latest()? else {
            println!(" Need two scans of the same root to diff.");
            return Ok(());
        };
        match format {
            OutputFormat::Text => {
                println!(
                    " {} : scan {} -> scan {}",
                    newest.root.display(),
                    previous.id,
                    newest.id
                );
                for (label, paths) in [
                    ("added", &changes.added),
                    ("removed", &changes.removed),
                    ("changed", &changes.changed),
                ] {
                    println!(" {} ({}):", label, paths.len());
                    for path in paths {
                        println!("   {}", path.display());
                    }
                }
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "previous": previous,
                    "newest": newest,
                    "diff": changes,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        }
        return Ok(());
    }

    let sessions = engine.history()?;
    match format {
        OutputFormat::Text => {
            if sessions.is_empty() {
                println!(" No recorded scans.");
            }
            for session in &sessions {
                println!(
                    " #{:<5} {}  {:>7} files  {:>6} duplicates  {}",
                    session.id.0,
                    session.completed_at.format("%Y-%m-%d %H:%M:%S"),
                    session.files_recorded,
                    session.duplicates_found,
                    session.root.display()
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sessions)?),
    }
    Ok(())
}

/// Print a scan report as text.
fn print_report(report: &ScanReport, headline: &str) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" {} - {}", report.root.display(), headline);
    println!(
        " Reclaimable: {}",
        format_size(report.stats.reclaimable_bytes)
    );
    println!(" Scanned in {:.2}s", report.scan_duration.as_secs_f64());
    println!("{}", "─".repeat(70));
    println!();

    let groups = report
        .pairs
        .iter()
        .into_group_map_by(|pair| pair.original.as_path());
    for (original, pairs) in groups.into_iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        println!(" {}", original.display());
        for pair in pairs {
            println!("   = {}", pair.duplicate.display());
        }
    }

    if report.has_duplicates() {
        println!();
        println!(
            " By extension: {}",
            report
                .extension_stats()
                .iter()
                .map(|(ext, count)| format!("{}: {}", ext, count))
                .join(", ")
        );
    }

    if report.has_warnings() {
        println!();
        println!("{} file(s) skipped during scan", report.warnings.len());
    }
}

/// Ask on stdin; only an exact "yes" confirms.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}

fn parse_action(s: &str) -> std::result::Result<ActionKind, String> {
    s.parse().map_err(|_| {
        format!("unknown action '{s}' (expected preview, move, soft-delete or permanent-delete)")
    })
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');
    let unit = &s[digits.len()..];

    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        "T" | "TB" => 1024 * 1024 * 1024 * 1024,
        other => bail!("unknown size unit '{}'", other),
    };
    let num: f64 = digits.trim().parse()?;

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("512B").unwrap(), 512);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("1.5k").unwrap(), 1536);
        assert_eq!(parse_size("10MB").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size(" 2 gb ").unwrap(), 2 * 1024 * 1024 * 1024);
        assert!(parse_size("10XB").is_err());
        assert!(parse_size("MB").is_err());
    }

    #[test]
    fn test_parse_action() {
        assert_eq!(parse_action("move").unwrap(), ActionKind::Move);
        assert_eq!(parse_action("soft-delete").unwrap(), ActionKind::SoftDelete);
        assert_eq!(
            parse_action("permanent-delete").unwrap(),
            ActionKind::PermanentDelete
        );
        assert_eq!(parse_action("preview").unwrap(), ActionKind::Preview);
        assert!(parse_action("shred").is_err());
    }

    #[test]
    fn test_filter_args_override_config() {
        let args = FilterArgs {
            ext: Some("JPG;png".to_string()),
            min_size: Some("1KB".to_string()),
            max_size: None,
        };
        let base = FilterConfig {
            max_size: 4096,
            ..FilterConfig::default()
        };

        let filter = args.resolve(&base).unwrap();
        assert_eq!(filter.extensions, vec!["jpg", "png"]);
        assert_eq!(filter.min_size, 1024);
        assert_eq!(filter.max_size, 4096);
    }

    #[test]
    fn test_filter_args_reject_inverted_bounds() {
        let args = FilterArgs {
            ext: None,
            min_size: Some("2MB".to_string()),
            max_size: Some("1MB".to_string()),
        };
        assert!(args.resolve(&FilterConfig::default()).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "doppel", "apply", "/data", "--action", "soft-delete", "--ext", "jpg", "-f", "json",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Command::Apply { path, action, yes, .. } => {
                assert_eq!(path, PathBuf::from("/data"));
                assert_eq!(action, ActionKind::SoftDelete);
                assert!(!yes);
            }
            _ => panic!("expected apply"),
        }
    }
}
