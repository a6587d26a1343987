// Directory scanning module
// Walks a root for candidate directories, measures them on a worker pool and
// keeps the persisted index in step with what was found

use super::error::SweepError;
use super::index::Index;
use super::metrics;
use super::types::{ScanConfig, ScanResult, ScanStats};
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use rayon::{Scope, ThreadPoolBuilder};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Pushes human-readable progress lines onto the sink
///
/// Every line is also logged at debug level; the sink only sees lines in
/// verbose mode. Dropping the reporter closes the sink.
struct Reporter {
    sink: Sender<String>,
    verbose: bool,
}

impl Reporter {
    fn report(&self, line: String) {
        debug!(target: "sweepy::scan", "{}", line);
        if self.verbose {
            // Fails only once the receiver is gone
            let _ = self.sink.send(line);
        }
    }
}

/// State shared by the walk and every measurement task
#[derive(Clone, Copy)]
struct Shared<'a> {
    config: &'a ScanConfig,
    index: &'a Index,
    reporter: &'a Reporter,
    results: &'a Mutex<Vec<ScanResult>>,
    discovered: &'a Mutex<HashSet<PathBuf>>,
    /// Scan start, the reference point for staleness
    now: DateTime<Utc>,
    /// Cached entries may stand in for measurement
    cache_trusted: bool,
}

impl<'a> Shared<'a> {
    /// Depth-first walk of `dir`
    ///
    /// Permission errors skip the subtree; any other error aborts the walk.
    fn walk(self, dir: &Path, scope: &Scope<'a>) -> Result<(), SweepError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                self.reporter.report(format!("Permission denied: {}", dir.display()));
                return Ok(());
            }
            Err(e) => {
                return Err(SweepError::from_io_error(e, "scanning directory", Some(dir.to_path_buf())))
            }
        };

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    self.reporter.report(format!("Permission denied: {}", dir.display()));
                    continue;
                }
                Err(e) => {
                    return Err(SweepError::from_io_error(e, "reading entries of", Some(dir.to_path_buf())))
                }
            };

            let path = entry.path();

            // file_type does not follow symlinks, so linked directories are never entered
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    self.reporter.report(format!("Permission denied: {}", path.display()));
                    continue;
                }
                Err(e) => return Err(SweepError::from_io_error(e, "inspecting", Some(path))),
            };
            if !file_type.is_dir() {
                continue;
            }

            if self.is_candidate(&path) {
                self.visit_candidate(path, scope);
            } else {
                self.walk(&path, scope)?;
            }
        }

        Ok(())
    }

    fn is_candidate(&self, path: &Path) -> bool {
        path.file_name().and_then(|n| n.to_str()) == Some(self.config.candidate_name.as_str())
    }

    /// Candidates are leaves: reuse a trusted cache entry or hand the path to a worker
    fn visit_candidate(self, path: PathBuf, scope: &Scope<'a>) {
        lock(self.discovered).insert(path.clone());

        if self.cache_trusted {
            if let Some(cached) = self.index.get(&path) {
                self.reporter.report(format!("Found {} in cache", path.display()));
                let aged = cached.aged(self.now);
                if aged.passes(self.config.staleness_days) {
                    lock(self.results).push(aged);
                }
                return;
            }
        }

        self.reporter.report(format!("Scanning {}", path.display()));
        scope.spawn(move |_| self.measure(path));
    }

    /// Measure one candidate; any failure drops it from the results
    fn measure(self, path: PathBuf) {
        let Some(parent) = path.parent() else {
            self.reporter.report(format!("Skipping {}: no parent directory", path.display()));
            return;
        };

        // Staleness comes from the whole project, so a fresh install does not hide an idle project
        let last_modified = match metrics::last_modified(parent) {
            Ok(last_modified) => last_modified,
            Err(e) => return self.drop_candidate(&path, &e),
        };

        let staleness_days = metrics::staleness_days(last_modified, self.now);
        let threshold = self.config.staleness_days;
        if threshold > 0 && staleness_days < threshold {
            self.reporter.report(format!(
                "Skipping {}: {} days stale, below {} days",
                path.display(),
                staleness_days,
                threshold
            ));
            return;
        }

        let size_bytes = match metrics::directory_size(&path) {
            Ok(size) => size,
            Err(e) => return self.drop_candidate(&path, &e),
        };

        let result = ScanResult {
            path: path.clone(),
            size_bytes,
            last_modified,
            staleness_days,
        };

        // The index file is JSON, which cannot hold a non-UTF-8 path
        let indexable = !self.config.no_cache && path.to_str().is_some();
        {
            let mut results = lock(self.results);
            if indexable {
                self.index.set(path.clone(), result.clone());
            }
            results.push(result);
        }
        if !self.config.no_cache && !indexable {
            self.reporter
                .report(format!("Not indexing {}: path is not valid UTF-8", path.display()));
        }

        self.reporter.report(format!(
            "Scanned {} ({} bytes, {} days stale)",
            path.display(),
            size_bytes,
            staleness_days
        ));
    }

    fn drop_candidate(&self, path: &Path, error: &SweepError) {
        warn!(path = %path.display(), "candidate dropped: {}", error.headline());
        self.reporter
            .report(format!("Error when scanning {}: {}", path.display(), error.headline()));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stalest first; path breaks ties so output is stable
pub fn sort_results(results: &mut [ScanResult]) {
    results.sort_by(|a, b| {
        b.staleness_days
            .cmp(&a.staleness_days)
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Engine for discovering and measuring candidate directories
pub struct ScanEngine {
    index: Arc<Index>,
}

impl ScanEngine {
    /// Create a ScanEngine over the process-wide index
    pub fn new() -> Self {
        Self::with_index(Index::global())
    }

    /// Create a ScanEngine over a specific index
    pub fn with_index(index: Arc<Index>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// Scan `config.root` for candidate directories
    ///
    /// Progress lines go to `progress` in verbose mode. The sender is dropped
    /// once every measurement task has finished, which closes the channel, so
    /// consumers should drain it until it disconnects.
    ///
    /// # Returns
    /// Results sorted stalest first, and statistics over them. Only a failure
    /// of the walk itself (such as a missing root) is returned as an error.
    pub fn scan(
        &self,
        config: &ScanConfig,
        progress: Sender<String>,
    ) -> Result<(Vec<ScanResult>, ScanStats), SweepError> {
        let start_time = Instant::now();
        let now = Utc::now();
        let reporter = Reporter {
            sink: progress,
            verbose: config.verbose,
        };

        // Canonicalize root directory so index keys are absolute and stable
        let root = config.root.canonicalize().map_err(|e| {
            SweepError::from_io_error(e, "scanning directory", Some(config.root.clone()))
        })?;

        let cache_trusted = self.prepare_index(config, &reporter);

        if cache_trusted && !config.full_rescan {
            let mut cached = self.cached_results(&root, config, now, &reporter);
            if !cached.is_empty() {
                sort_results(&mut cached);
                let stats = ScanStats::from_results(&cached, start_time.elapsed());
                info!(count = stats.count, "answered from index without walking {}", root.display());
                return Ok((cached, stats));
            }
        }

        let results = Mutex::new(Vec::new());
        let discovered = Mutex::new(HashSet::new());

        // The walk occupies one pool thread for its whole duration
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1) + 1)
            .thread_name(|i| format!("sweepy-measure-{}", i))
            .build()
            .map_err(|e| SweepError::IoError {
                path: None,
                operation: "starting measurement workers".to_string(),
                source: io::Error::other(e.to_string()),
            })?;

        let shared = Shared {
            config,
            index: &self.index,
            reporter: &reporter,
            results: &results,
            discovered: &discovered,
            now,
            cache_trusted,
        };

        // The scope returns only after every spawned measurement has finished
        let walk_result = pool.scope(|scope| {
            if shared.is_candidate(&root) {
                shared.visit_candidate(root.clone(), scope);
                Ok(())
            } else {
                shared.walk(&root, scope)
            }
        });

        if let Err(e) = walk_result {
            warn!("scan of {} aborted: {}", root.display(), e.headline());
            return Err(e);
        }

        let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        sort_results(&mut results);
        let stats = ScanStats::from_results(&results, start_time.elapsed());

        if !config.no_cache {
            let discovered = discovered.into_inner().unwrap_or_else(PoisonError::into_inner);
            self.prune_missing(&root, &discovered);

            if let Err(e) = self.index.save() {
                warn!("failed to save index: {}", e.headline());
                reporter.report(format!("Failed to save index: {}", e.headline()));
            }
        }

        info!(
            count = stats.count,
            total_size = stats.total_size,
            "scanned {} in {:.2}s",
            root.display(),
            stats.duration.as_secs_f64()
        );

        drop(reporter);
        Ok((results, stats))
    }

    /// Load or reset the index according to the config
    ///
    /// Returns whether its entries can be trusted for this scan.
    fn prepare_index(&self, config: &ScanConfig, reporter: &Reporter) -> bool {
        if !config.trusts_cache() {
            if !config.no_cache {
                self.index.start_fresh_window(config.cache_ttl_hours);
            }
            return false;
        }

        match self.index.load() {
            Ok(true) if self.index.is_expired() => {
                reporter.report("Index expired, rebuilding".to_string());
                self.index.start_fresh_window(config.cache_ttl_hours);
                false
            }
            Ok(true) => true,
            Ok(false) => {
                self.index.start_fresh_window(config.cache_ttl_hours);
                false
            }
            Err(e) => {
                warn!("failed to load index: {}", e.headline());
                reporter.report(format!("Failed to load index: {}", e.headline()));
                self.index.start_fresh_window(config.cache_ttl_hours);
                false
            }
        }
    }

    /// Cached entries under `root`, re-aged and filtered by the threshold
    fn cached_results(
        &self,
        root: &Path,
        config: &ScanConfig,
        now: DateTime<Utc>,
        reporter: &Reporter,
    ) -> Vec<ScanResult> {
        self.index
            .entries_under(root)
            .into_iter()
            .map(|cached| {
                reporter.report(format!("Found {} in cache", cached.path.display()));
                cached.aged(now)
            })
            .filter(|result| result.passes(config.staleness_days))
            .collect()
    }

    /// Forget indexed candidates under `root` that the walk no longer found
    fn prune_missing(&self, root: &Path, discovered: &HashSet<PathBuf>) {
        for entry in self.index.entries_under(root) {
            if !discovered.contains(&entry.path) {
                debug!(path = %entry.path.display(), "removing vanished candidate from index");
                self.index.delete(&entry.path);
            }
        }
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}


// Integration tests live in tests/sweep/engine_tests.rs
