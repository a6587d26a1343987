//! Scan-and-cache engine
//!
//! Finds dependency directories (node_modules by default), measures their
//! size and staleness, remembers the results in a persisted index and
//! deletes them on request.

pub mod cleanup;
pub mod engine;
pub mod error;
pub mod index;
pub mod metrics;
pub mod path_utils;
pub mod types;

pub use cleanup::Cleaner;
pub use engine::{sort_results, ScanEngine};
pub use error::SweepError;
pub use index::{default_index_path, Index, INDEX_FILE_NAME};
pub use metrics::{directory_size, last_modified, staleness_days};
pub use types::{ScanConfig, ScanResult, ScanStats, DEFAULT_CANDIDATE_NAME, DEFAULT_TTL_HOURS};
