//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::sweep::SweepError;

#[derive(Debug, Parser)]
#[command(
    name = "sweepy",
    version,
    about = "Find and remove stale node_modules directories"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan a directory tree for node_modules directories.
    Scan(ScanArgs),
    /// Delete node_modules directories and drop them from the index.
    Clean(CleanArgs),
}

#[derive(Debug, clap::Args)]
pub struct ScanArgs {
    /// Directory to scan (defaults to the current directory).
    pub path: Option<PathBuf>,

    /// Minimum staleness: whole days, or a number with a d/h/m/s suffix.
    #[arg(short, long, default_value = "0", value_parser = parse_staleness)]
    pub staleness: u64,

    /// Neither read nor write the index.
    #[arg(long)]
    pub no_cache: bool,

    /// Discard the stored index and rebuild it.
    #[arg(long)]
    pub reset_cache: bool,

    /// Walk the filesystem even when the index has results.
    #[arg(long)]
    pub full_rescan: bool,

    /// Show progress lines while scanning.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, clap::Args)]
pub struct CleanArgs {
    /// Directories to delete.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Normalize a staleness value to whole days.
///
/// A bare integer is days. `d`, `h`, `m` and `s` suffixes are converted and
/// floored, so `48h` is 2 and `1h` is 0.
pub fn parse_staleness(value: &str) -> Result<u64, SweepError> {
    let invalid = || SweepError::InvalidStaleness {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let (digits, seconds_per_unit) = match trimmed.char_indices().last() {
        Some((i, 'd')) => (&trimmed[..i], 86_400),
        Some((i, 'h')) => (&trimmed[..i], 3_600),
        Some((i, 'm')) => (&trimmed[..i], 60),
        Some((i, 's')) => (&trimmed[..i], 1),
        Some(_) => (trimmed, 86_400),
        None => return Err(invalid()),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let amount: u64 = digits.parse().map_err(|_| invalid())?;

    amount
        .checked_mul(seconds_per_unit)
        .map(|seconds| seconds / 86_400)
        .ok_or_else(invalid)
}
