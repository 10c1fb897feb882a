//! Environment-driven configuration, split between the storage engine's
//! tuning knobs and the HTTP servers' host/port settings.

use std::env;
use std::path::PathBuf;

/// Tuning knobs for the storage engine itself.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    /// Max memtable entry count before a flush (default 1000).
    pub memtable_max_entries: usize,
    /// Number of levels (default 4).
    pub max_levels: usize,
    /// Per-level compaction threshold (default 2).
    pub compaction_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./.lsm_data"),
            memtable_max_entries: 1000,
            max_levels: 4,
            compaction_threshold: 2,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(default.data_dir);

        let memtable_max_entries = env::var("MEMTABLE_MAX_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.memtable_max_entries);

        let max_levels = env::var("SSTABLE_LEVELS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.max_levels);

        let compaction_threshold = env::var("COMPACTION_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.compaction_threshold);

        Self {
            data_dir,
            memtable_max_entries,
            max_levels,
            compaction_threshold,
        }
    }
}

/// Host/port pair shared by all three HTTP roles.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env(host_var: &str, port_var: &str, default_port: u16) -> Self {
        let host = env::var(host_var).unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var(port_var)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_port);
        Self { host, port }
    }
}

/// Where the ingest/query edge processes forward requests.
pub fn storage_url_from_env() -> String {
    env::var("STORAGE_URL").unwrap_or_else(|_| "http://localhost:8087".to_string())
}
