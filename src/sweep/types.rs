use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default name of the directories the engine looks for
pub const DEFAULT_CANDIDATE_NAME: &str = "node_modules";

/// Default length of a fresh index validity window
pub const DEFAULT_TTL_HOURS: u64 = 24;

/// One discovered candidate directory
///
/// Field names on disk follow the index file written by earlier releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(rename = "Path")]
    pub path: PathBuf,
    #[serde(rename = "Size")]
    pub size_bytes: u64,
    /// Latest modification anywhere under the candidate's parent directory
    #[serde(rename = "LastModified")]
    pub last_modified: DateTime<Utc>,
    #[serde(rename = "Staleness")]
    pub staleness_days: u64,
}

impl ScanResult {
    /// Recompute staleness against `now`, keeping everything else
    pub fn aged(&self, now: DateTime<Utc>) -> Self {
        Self {
            staleness_days: super::metrics::staleness_days(self.last_modified, now),
            ..self.clone()
        }
    }

    /// Whether this result passes a staleness threshold (0 disables filtering)
    pub fn passes(&self, threshold_days: u64) -> bool {
        threshold_days == 0 || self.staleness_days >= threshold_days
    }
}

/// Scan options, fixed for the lifetime of one scan
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    /// Minimum staleness in days; 0 keeps everything
    pub staleness_days: u64,
    /// Neither read nor write the index
    pub no_cache: bool,
    /// Ignore the stored index and rebuild it from a full walk
    pub reset_cache: bool,
    /// Push progress lines onto the sink
    pub verbose: bool,
    /// Walk the filesystem even when the index alone could answer
    pub full_rescan: bool,
    pub candidate_name: String,
    /// Measurement worker threads; the walk runs on one more
    pub threads: usize,
    /// Length of a fresh validity window, in hours
    pub cache_ttl_hours: u64,
}

impl ScanConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staleness_days: 0,
            no_cache: false,
            reset_cache: false,
            verbose: false,
            full_rescan: false,
            candidate_name: DEFAULT_CANDIDATE_NAME.to_string(),
            threads: num_cpus::get(),
            cache_ttl_hours: DEFAULT_TTL_HOURS,
        }
    }

    pub fn with_staleness(mut self, days: u64) -> Self {
        self.staleness_days = days;
        self
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn with_reset_cache(mut self, reset_cache: bool) -> Self {
        self.reset_cache = reset_cache;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_full_rescan(mut self, full_rescan: bool) -> Self {
        self.full_rescan = full_rescan;
        self
    }

    pub fn with_candidate_name(mut self, name: impl Into<String>) -> Self {
        self.candidate_name = name.into();
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_cache_ttl_hours(mut self, hours: u64) -> Self {
        self.cache_ttl_hours = hours;
        self
    }

    /// The index is consulted only when caching is on and not being reset
    pub fn trusts_cache(&self) -> bool {
        !self.no_cache && !self.reset_cache
    }
}

/// Aggregate statistics over the returned results
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub count: usize,
    pub total_size: u64,
    pub avg_staleness: f64,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

impl ScanStats {
    pub fn from_results(results: &[ScanResult], duration: Duration) -> Self {
        let total_size = results.iter().map(|r| r.size_bytes).sum();
        let total_staleness: u64 = results.iter().map(|r| r.staleness_days).sum();
        let avg_staleness = if results.is_empty() {
            0.0
        } else {
            total_staleness as f64 / results.len() as f64
        };

        Self {
            count: results.len(),
            total_size,
            avg_staleness,
            duration,
        }
    }
}

// Helper function to serialize Duration as seconds
fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}
