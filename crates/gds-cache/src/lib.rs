//! Download cache keyed by the canonical remote absolute path.
//!
//! Blobs are stored once under their blake3 content hash (two-level
//! sharding); a JSON index maps each logical key to its blob and the
//! provider `modifiedTime` it was fetched at. `is_cached` and `is_up_to_date`
//! are deliberately separate queries. A deletion-history map records name
//! reuse so stale entries are invalidated instead of served.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use gds_core::{GdsError, GdsResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content hash; the blob lives at `blobs/<h[0..2]>/<h>`
    pub blob: String,
    /// Provider modifiedTime at fetch, the freshness authority
    pub modified_time: Option<String>,
    pub cached_at: String,
    pub size: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
    /// Name → times deleted (upload cleanup records both original and
    /// collision-renamed names here)
    #[serde(default)]
    deletion_history: BTreeMap<String, u32>,
}

pub struct DownloadCache {
    dir: PathBuf,
    index: IndexFile,
    dirty: bool,
}

impl DownloadCache {
    pub fn open(dir: &Path) -> GdsResult<Self> {
        let index_path = dir.join("index.json");
        let index = if index_path.exists() {
            let content = std::fs::read_to_string(&index_path)?;
            serde_json::from_str(&content).map_err(|e| {
                GdsError::CacheInconsistency(format!("cache index parse error: {e}"))
            })?
        } else {
            IndexFile::default()
        };
        Ok(DownloadCache {
            dir: dir.to_path_buf(),
            index,
            dirty: false,
        })
    }

    pub fn is_cached(&self, remote_path: &str) -> bool {
        self.index.entries.contains_key(remote_path)
    }

    /// Hit iff the key is present AND the provider's modifiedTime matches the
    /// one recorded at fetch.
    pub fn is_up_to_date(&self, remote_path: &str, remote_modified: Option<&str>) -> bool {
        match self.index.entries.get(remote_path) {
            Some(entry) => entry.modified_time.as_deref() == remote_modified,
            None => false,
        }
    }

    fn blob_path_of(&self, hash: &str) -> PathBuf {
        let shard = if hash.len() >= 2 { &hash[..2] } else { "xx" };
        self.dir.join("blobs").join(shard).join(hash)
    }

    /// On-disk location of the blob backing a key (for callers that want to
    /// hand out a local file path).
    pub fn blob_path(&self, remote_path: &str) -> Option<PathBuf> {
        self.index
            .entries
            .get(remote_path)
            .map(|e| self.blob_path_of(&e.blob))
    }

    /// Read cached bytes, verifying the content hash still matches the blob
    /// address.
    pub fn get(&self, remote_path: &str) -> GdsResult<Option<Vec<u8>>> {
        let entry = match self.index.entries.get(remote_path) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let path = self.blob_path_of(&entry.blob);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let actual = blake3::hash(&bytes).to_hex().to_string();
        if actual != entry.blob {
            return Err(GdsError::CacheInconsistency(format!(
                "{remote_path}: blob hash mismatch"
            )));
        }
        Ok(Some(bytes))
    }

    /// Store content atomically under its hash and point the key at it.
    pub fn put(
        &mut self,
        remote_path: &str,
        bytes: &[u8],
        modified_time: Option<&str>,
    ) -> GdsResult<PathBuf> {
        let hash = blake3::hash(bytes).to_hex().to_string();
        let path = self.blob_path_of(&hash);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            let tmp = path.with_extension("tmp");
            std::fs::write(&tmp, bytes)?;
            std::fs::rename(&tmp, &path)?;
        }
        self.index.entries.insert(
            remote_path.to_string(),
            CacheEntry {
                blob: hash,
                modified_time: modified_time.map(str::to_string),
                cached_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                size: bytes.len() as u64,
            },
        );
        self.dirty = true;
        self.flush()?;
        Ok(path)
    }

    /// Record that a name was deleted (or replaced) remotely, and drop any
    /// cache entries for that name so a reuse is never served stale.
    pub fn add_deletion_record(&mut self, name: &str) {
        *self.index.deletion_history.entry(name.to_string()).or_insert(0) += 1;
        let stale: Vec<String> = self
            .index
            .entries
            .keys()
            .filter(|key| key.rsplit('/').next() == Some(name))
            .cloned()
            .collect();
        for key in stale {
            tracing::debug!(%key, "cache entry invalidated by name reuse");
            self.index.entries.remove(&key);
        }
        self.dirty = true;
        if let Err(e) = self.flush() {
            tracing::warn!("cache index flush failed: {e}");
        }
    }

    pub fn deletion_count(&self, name: &str) -> u32 {
        self.index.deletion_history.get(name).copied().unwrap_or(0)
    }

    pub fn flush(&mut self) -> GdsResult<()> {
        if !self.dirty {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(&self.index)
            .map_err(|e| GdsError::CacheInconsistency(format!("cache index render: {e}")))?;
        let tmp = self.dir.join("index.json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, self.dir.join("index.json"))?;
        self.dirty = false;
        Ok(())
    }
}
