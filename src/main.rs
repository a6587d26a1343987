use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sweepy::cli::{CleanArgs, Cli, Command, ScanArgs};
use sweepy::config::Settings;
use sweepy::logging::init_logging;
use sweepy::sweep::{Cleaner, Index, ScanConfig, ScanEngine, ScanResult, ScanStats};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = matches!(&cli.command, Command::Scan(args) if args.verbose);
    init_logging(verbose);

    let result = Settings::load().and_then(|settings| {
        let index = Index::init_global(settings.cache_file());
        match cli.command {
            Command::Scan(args) => run_scan(args, &settings, index),
            Command::Clean(args) => run_clean(args, index),
        }
    });

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run_scan(args: ScanArgs, settings: &Settings, index: Arc<Index>) -> Result<ExitCode> {
    let root = match args.path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let config = ScanConfig::new(&root)
        .with_staleness(args.staleness)
        .with_no_cache(args.no_cache)
        .with_reset_cache(args.reset_cache)
        .with_full_rescan(args.full_rescan)
        .with_verbose(args.verbose)
        .with_candidate_name(settings.candidate_name())
        .with_threads(settings.threads())
        .with_cache_ttl_hours(settings.cache_ttl_hours());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Scanning {}...", root.display()));

    // Drain the sink until the engine closes it
    let (sender, receiver) = crossbeam_channel::unbounded::<String>();
    let spinner_clone = spinner.clone();
    let printer = thread::spawn(move || {
        for line in receiver {
            spinner_clone.println(line.dimmed().to_string());
        }
    });

    let engine = ScanEngine::with_index(index);
    let outcome = engine.scan(&config, sender);
    let _ = printer.join();
    spinner.finish_and_clear();

    let (results, stats) =
        outcome.with_context(|| format!("Error scanning directory {}", root.display()))?;
    print_results(&results, &stats, &config);
    Ok(ExitCode::SUCCESS)
}

fn run_clean(args: CleanArgs, index: Arc<Index>) -> Result<ExitCode> {
    let cleaner = Cleaner::with_index(index);
    let mut failed = false;

    for (path, outcome) in cleaner.delete_all(&args.paths) {
        match outcome {
            Ok(()) => println!("{} {}", "Deleted".green(), path.display()),
            Err(e) if e.is_reconcile_failure() => {
                println!("{} {}", "Deleted".green(), path.display());
                eprintln!("{} {}", "Warning:".yellow().bold(), e);
            }
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                failed = true;
            }
        }
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_results(results: &[ScanResult], stats: &ScanStats, config: &ScanConfig) {
    println!(
        " Path: {} | Staleness: {} days | Cache: {}\n",
        config.root.display(),
        config.staleness_days,
        !config.no_cache
    );

    let path_width = results
        .iter()
        .map(|r| r.path.display().to_string().chars().count())
        .max()
        .unwrap_or(4)
        .max(4);

    let header = format!(
        "{:<width$}  {:>12}  {:>10}",
        "PATH",
        "SIZE",
        "STALENESS",
        width = path_width
    );
    println!("{}", header.bold());
    for result in results {
        let size = humansize::format_size(result.size_bytes, humansize::BINARY);
        println!(
            "{:<width$}  {:>12}  {}",
            result.path.display(),
            size,
            colored_staleness(result.staleness_days),
            width = path_width
        );
    }

    println!(
        "\nFound {} {} directories | Total Size: {} | Avg Staleness: {:.2} days | {:.2}s",
        stats.count,
        config.candidate_name,
        humansize::format_size(stats.total_size, humansize::BINARY),
        stats.avg_staleness,
        stats.duration.as_secs_f64()
    );
}

fn colored_staleness(days: u64) -> String {
    // Pad before coloring so escape codes don't count towards the width
    let label = format!("{:>10}", format!("{} days", days));
    match days {
        0..=29 => label.green().to_string(),
        30..=89 => label.yellow().to_string(),
        _ => label.red().to_string(),
    }
}
