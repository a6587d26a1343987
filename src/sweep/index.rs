// Persisted scan index
// TTL-bounded map from candidate path to its last scan result, stored as JSON

use super::error::SweepError;
use super::path_utils;
use super::types::ScanResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// File name of the index, kept from earlier releases so old files still load
pub const INDEX_FILE_NAME: &str = "sweepy.cache.json";

static GLOBAL_INDEX: OnceLock<Arc<Index>> = OnceLock::new();

/// On-disk shape: `{"validity": <unix seconds>, "data": {path: result}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexData {
    validity: i64,
    #[serde(default)]
    data: BTreeMap<PathBuf, ScanResult>,
}

impl IndexData {
    /// Windows past the representable range end at `DateTime::MAX_UTC`
    fn with_ttl_hours(hours: u64) -> Self {
        let valid_until = i64::try_from(hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            validity: valid_until.timestamp(),
            data: BTreeMap::new(),
        }
    }
}

/// Shared scan index
///
/// All accessors lock internally, so measurement tasks can call `set`
/// concurrently. `load` and `save` are not ordered against concurrent `set`
/// calls; callers must finish writing before saving.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    state: RwLock<IndexData>,
}

impl Index {
    /// Create an empty index backed by `path`, valid for the default 24 hours
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(IndexData::with_ttl_hours(super::types::DEFAULT_TTL_HOURS)),
        }
    }

    /// The process-wide index at the default location
    pub fn global() -> Arc<Index> {
        GLOBAL_INDEX
            .get_or_init(|| Arc::new(Index::new(default_index_path())))
            .clone()
    }

    /// The process-wide index, backed by `path` if this is the first access
    ///
    /// Once the global index exists its location is fixed; later calls return it unchanged.
    pub fn init_global(path: impl Into<PathBuf>) -> Arc<Index> {
        let path = path.into();
        GLOBAL_INDEX
            .get_or_init(|| Arc::new(Index::new(path)))
            .clone()
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexData> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexData> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the in-memory index with the file's contents
    ///
    /// Returns `Ok(false)` without touching memory when the file does not exist.
    pub fn load(&self) -> Result<bool, SweepError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(SweepError::from_io_error(e, "reading index", Some(self.path.clone())))
            }
        };

        let data: IndexData = serde_json::from_slice(&bytes).map_err(|e| SweepError::IndexParseError {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        *self.write() = data;
        Ok(true)
    }

    /// Write the complete index, replacing any previous file
    pub fn save(&self) -> Result<(), SweepError> {
        let bytes = {
            let state = self.read();
            serde_json::to_vec_pretty(&*state).map_err(|e| SweepError::IndexWriteError {
                path: self.path.clone(),
                reason: e.to_string(),
            })?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SweepError::IndexWriteError {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })?;
            }
        }

        fs::write(&self.path, bytes).map_err(|e| SweepError::IndexWriteError {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    pub fn get(&self, path: &Path) -> Option<ScanResult> {
        self.read().data.get(path).cloned()
    }

    pub fn set(&self, path: impl Into<PathBuf>, result: ScanResult) {
        self.write().data.insert(path.into(), result);
    }

    /// Remove an entry, returning it if it was present
    pub fn delete(&self, path: &Path) -> Option<ScanResult> {
        self.write().data.remove(path)
    }

    pub fn clear(&self) {
        self.write().data.clear();
    }

    pub fn len(&self) -> usize {
        self.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().data.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.read().data.contains_key(path)
    }

    /// Snapshot of every entry at or below `root`
    pub fn entries_under(&self, root: &Path) -> Vec<ScanResult> {
        self.read()
            .data
            .iter()
            .filter(|(path, _)| path_utils::is_under(path, root))
            .map(|(_, result)| result.clone())
            .collect()
    }

    /// Validity timestamp, Unix seconds
    pub fn validity(&self) -> i64 {
        self.read().validity
    }

    pub fn set_validity(&self, validity: i64) {
        self.write().validity = validity;
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.read().validity
    }

    /// Drop every entry and start a new validity window of `ttl_hours`
    pub fn start_fresh_window(&self, ttl_hours: u64) {
        *self.write() = IndexData::with_ttl_hours(ttl_hours);
    }
}

/// `$HOME/sweepy.cache.json`, or the working directory when no home is known
pub fn default_index_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(INDEX_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(INDEX_FILE_NAME))
}
