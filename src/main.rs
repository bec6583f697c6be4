use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use env_logger::Builder;
use log::{info, Level, LevelFilter};

use patchkit::{apply, can_patch, parse, revert, ApplyOptions, CanPatch};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Applies unified-diff patch files against a target directory.",
    long_about = "Parses plain, Git, Subversion and Mercurial unified diffs, tolerating and \
autofixing common defects, then applies (or reverts) the hunks using exact, \
shifted and fuzzy matching."
)]
struct Args {
    /// Path to the unified-diff file to apply.
    patch_file: PathBuf,

    /// Directory to apply the patch against.
    #[arg(long, default_value = ".")]
    directory: PathBuf,

    /// Number of leading path components to strip from patch-declared paths.
    #[arg(short = 'p', long, default_value_t = 0)]
    strip: usize,

    /// Undo a previously applied patch instead of applying it.
    #[arg(long)]
    revert: bool,

    /// Suppress all output but errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Increase logging verbosity. Can be used multiple times (e.g., -v, -vv).
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        long_help = "Increase logging verbosity.\n-v for info, -vv for debug, -vvv for trace.\nBy default, only warnings and errors are shown."
    )]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        LevelFilter::Error
    } else {
        match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| match record.level() {
            Level::Error => writeln!(buf, "{} {}", "error:".red().bold(), record.args()),
            Level::Warn => writeln!(buf, "{} {}", "warning:".yellow().bold(), record.args()),
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug => writeln!(buf, "{} {}", "debug:".blue().bold(), record.args()),
            Level::Trace => writeln!(buf, "{} {}", "trace:".cyan().bold(), record.args()),
        })
        .init();

    if !args.directory.is_dir() {
        anyhow::bail!(
            "target directory '{}' not found or is not a directory",
            args.directory.display()
        );
    }

    let data = std::fs::read(&args.patch_file)
        .with_context(|| format!("failed to read patch file '{}'", args.patch_file.display()))?;

    let set = parse(&data).with_context(|| "failed to parse patch stream")?;

    info!(
        "parsed {} patch(es), dialect {:?}, {} warning(s)",
        set.len(),
        set.dialect,
        set.warnings
    );

    let opts = ApplyOptions {
        root: args.directory.clone(),
        strip: args.strip,
        dry_run: false,
    };

    for patch in &set {
        match can_patch(patch, &opts) {
            Ok(CanPatch::AlreadyApplied) => {
                info!("already applied: {}", String::from_utf8_lossy(&patch.target));
            }
            Ok(_) | Err(_) => {}
        }
    }

    let outcomes = if args.revert {
        revert(&set, &opts)?
    } else {
        apply(&set, &opts)?
    };

    let mut success_count = 0;
    let mut fail_count = 0;
    for outcome in &outcomes {
        match outcome {
            patchkit::FileOutcome::Applied { .. } => success_count += 1,
            patchkit::FileOutcome::Failed { path, error } => {
                fail_count += 1;
                log::error!("failed to patch {}: {error}", path.display());
            }
        }
    }

    println!(
        "{} succeeded, {} failed",
        success_count.to_string().green(),
        fail_count.to_string().red()
    );

    if fail_count > 0 {
        std::process::exit(1);
    }

    Ok(())
}
