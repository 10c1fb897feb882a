//! The LSM tree: memtable plus leveled SSTables, flush, compaction, recovery.
//!
//! A `Mutex`-guarded engine exposing `put`/`get`/`scan` and a startup
//! recovery loop, generalized from a flat SSTable list to leveled
//! compaction. Memtable and level lists sit behind a single mutex rather
//! than two, so reads are always serialized against an in-flight
//! compaction.

use crate::config::EngineConfig;
use crate::error::{LsmError, Result};
use crate::memtable::MemTable;
use crate::sstable::SSTable;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};

struct Inner {
    memtable: MemTable,
    /// `levels[l]` holds the SSTables at level `l`, oldest-created (lowest
    /// index) first; later entries shadow earlier ones for the same key.
    levels: Vec<Vec<SSTable>>,
}

pub struct LsmTree {
    inner: Mutex<Inner>,
    dir_path: PathBuf,
    max_levels: usize,
    compaction_threshold: usize,
}

impl LsmTree {
    /// Opens (or creates) the engine at `config.data_dir`, reloading every
    /// SSTable found on disk. The memtable always starts empty — there is
    /// no write-ahead log to rebuild it from.
    pub fn new(config: EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut levels = Vec::with_capacity(config.max_levels);
        for level in 0..config.max_levels {
            let mut tables = Vec::new();
            let mut index = 0;
            loop {
                match SSTable::load(&config.data_dir, level, index) {
                    Ok(Some(sst)) => {
                        tables.push(sst);
                        index += 1;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(level, index, error = %e, "stopping recovery scan at corrupt sstable");
                        break;
                    }
                }
            }
            levels.push(tables);
        }

        info!(
            levels = ?levels.iter().map(Vec::len).collect::<Vec<_>>(),
            "lsm engine recovered"
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                memtable: MemTable::new(config.memtable_max_entries),
                levels,
            }),
            dir_path: config.data_dir,
            max_levels: config.max_levels,
            compaction_threshold: config.compaction_threshold,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| LsmError::LockPoisoned("lsm"))
    }

    /// Insert into the memtable; if it overflowed, flush and compact from L0.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut inner = self.lock()?;
        let flushed = inner.memtable.put(key, value);
        if !flushed.is_empty() {
            info!(records = flushed.len(), "memtable flush triggered");
            self.compact(&mut inner, flushed, 0)?;
        }
        Ok(())
    }

    /// Memtable first, then each level in turn, newest-appended-first within
    /// a level so the most recent write for a key always wins.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.lock()?;
        if let Some(v) = inner.memtable.get(key) {
            return Ok(Some(v));
        }
        for level in &inner.levels {
            for sst in level.iter().rev() {
                if let Some(v) = sst.get(key) {
                    return Ok(Some(v));
                }
            }
        }
        Ok(None)
    }

    /// The merged, deduplicated view the query executor scans.
    /// Priority memtable > L0 > L1 > ... ; within a level, newest shadows oldest.
    pub fn scan(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let inner = self.lock()?;
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

        for level in inner.levels.iter().rev() {
            for sst in level.iter() {
                for (k, v) in sst.iter() {
                    merged.insert(k.clone(), v.clone());
                }
            }
        }
        for (k, v) in inner.memtable.iter_ordered() {
            merged.insert(k.clone(), v.clone());
        }

        Ok(merged.into_iter().collect())
    }

    /// Writes `data` as a new SSTable at `level`, then merges that level's
    /// tables down into the next level once it has at least
    /// `compaction_threshold` tables, cascading as far as it needs to.
    /// `data` is already key-ordered.
    fn compact(&self, inner: &mut Inner, data: Vec<(Vec<u8>, Vec<u8>)>, level: usize) -> Result<()> {
        if level >= self.max_levels {
            warn!(level, "dropping compacted data past the last level (bounded retention)");
            return Ok(());
        }

        let index = inner.levels[level].len();
        let sst = SSTable::from_sorted_entries(&self.dir_path, level, index, data);
        sst.save()?;
        inner.levels[level].push(sst);

        if inner.levels[level].len() >= self.compaction_threshold {
            let merged = self.merge_level(&inner.levels[level]);

            for sst in inner.levels[level].drain(..) {
                sst.delete()?;
            }

            info!(level, next_level = level + 1, records = merged.len(), "compacting level");
            self.compact(inner, merged, level + 1)?;
        }

        Ok(())
    }

    /// k-way merge of every SSTable at a level; on key collisions the value
    /// from the later-created (higher-index) table wins.
    fn merge_level(&self, tables: &[SSTable]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for sst in tables {
            for (k, v) in sst.iter() {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged.into_iter().collect()
    }
}
