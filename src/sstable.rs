//! Immutable on-disk sorted table.
//!
//! No bloom filter: membership is checked by binary search over the whole
//! table. Files are named per level and per-level index (`level_<L>_sstable_<i>.db`)
//! rather than one flat file per engine.
//!
//! File layout: `[u32 checksum][u32 record_count][bincode-encoded entries]`.
//! `save()` writes to a sibling temp file and renames it into place so a
//! process killed mid-write never leaves a half-written file at the real
//! path; `load()` recomputes the checksum over the decoded entry blob and
//! refuses to trust a file whose bytes don't match.

use crate::error::{LsmError, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct SSTable {
    pub level: usize,
    pub index: usize,
    pub path: PathBuf,
    data: Vec<(Vec<u8>, Vec<u8>)>,
}

pub fn file_name(level: usize, index: usize) -> String {
    format!("level_{level}_sstable_{index}.db")
}

impl SSTable {
    /// Build an in-memory table from already key-ordered entries, ready to `save`.
    pub fn from_sorted_entries(
        dir: &Path,
        level: usize,
        index: usize,
        data: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Self {
        Self {
            level,
            index,
            path: dir.join(file_name(level, index)),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Vec<u8>, Vec<u8>)> {
        self.data.iter()
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data
            .binary_search_by(|(k, _)| k.as_slice().cmp(key))
            .ok()
            .map(|idx| self.data[idx].1.clone())
    }

    /// Write-then-rename for crash-atomicity.
    pub fn save(&self) -> Result<()> {
        let blob = bincode::serialize(&self.data)?;
        let checksum = crc32fast::hash(&blob);

        let tmp_path = self.path.with_extension("db.tmp");
        {
            let mut file = BufWriter::new(File::create(&tmp_path)?);
            file.write_all(&checksum.to_le_bytes())?;
            file.write_all(&(self.data.len() as u32).to_le_bytes())?;
            file.write_all(&blob)?;
            file.flush()?;
            file.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Load from `dir` at `(level, index)`. Returns `Ok(None)` if the file
    /// doesn't exist — absence of the file is a no-op. A file that exists
    /// but fails its checksum is treated the same way as a half-written
    /// file: never loaded as valid, logged instead.
    pub fn load(dir: &Path, level: usize, index: usize) -> Result<Option<Self>> {
        let path = dir.join(file_name(level, index));
        if !path.exists() {
            return Ok(None);
        }

        let mut file = BufReader::new(File::open(&path)?);
        let mut u32_buf = [0u8; 4];

        file.read_exact(&mut u32_buf)?;
        let expected_checksum = u32::from_le_bytes(u32_buf);

        file.read_exact(&mut u32_buf)?;
        let record_count = u32::from_le_bytes(u32_buf) as usize;

        let mut blob = Vec::new();
        file.read_to_end(&mut blob)?;

        let actual_checksum = crc32fast::hash(&blob);
        if actual_checksum != expected_checksum {
            warn!(path = %path.display(), "sstable checksum mismatch, skipping");
            return Err(LsmError::InvalidSstable(path));
        }

        let data: Vec<(Vec<u8>, Vec<u8>)> = bincode::deserialize(&blob)?;
        if data.len() != record_count {
            warn!(path = %path.display(), "sstable record count mismatch, skipping");
            return Err(LsmError::InvalidSstable(path));
        }

        Ok(Some(Self {
            level,
            index,
            path,
            data,
        }))
    }

    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let entries = vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec()),
        ];
        let sst = SSTable::from_sorted_entries(dir.path(), 0, 0, entries.clone());
        sst.save().unwrap();

        let loaded = SSTable::load(dir.path(), 0, 0).unwrap().unwrap();
        assert_eq!(loaded.get(b"a"), Some(b"1".to_vec()));
        assert_eq!(loaded.get(b"b"), Some(b"2".to_vec()));
        assert_eq!(loaded.get(b"missing"), None);
    }

    #[test]
    fn load_of_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(SSTable::load(dir.path(), 0, 7).unwrap().is_none());
    }

    #[test]
    fn load_rejects_corrupted_file() {
        let dir = tempdir().unwrap();
        let sst = SSTable::from_sorted_entries(dir.path(), 0, 0, vec![(b"a".to_vec(), b"1".to_vec())]);
        sst.save().unwrap();

        // corrupt a byte in the payload
        let mut bytes = fs::read(&sst.path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&sst.path, bytes).unwrap();

        assert!(SSTable::load(dir.path(), 0, 0).is_err());
    }

    #[test]
    fn file_naming_matches_level_and_index() {
        assert_eq!(file_name(2, 5), "level_2_sstable_5.db");
    }
}
