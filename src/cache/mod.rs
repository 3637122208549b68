// src/cache/mod.rs

use anyhow::{Context, Result};
use chrono::Utc;
use crc::{Crc, CRC_64_ECMA_182};
use moka::sync::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{IngestError, IngestResult};

const CRC_64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

pub const DEFAULT_CAPACITY: u64 = 100;
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
/// Results slower than this to compute are also written to disk.
pub const DEFAULT_PERSIST_AFTER: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    result: serde_json::Value,
    /// Unix seconds at write time.
    timestamp: i64,
}

/// Two-tier memo for expensive served views.
///
/// Memory: bounded, entries expire after `ttl`. Disk (optional): one JSON
/// file per key, honoured while younger than `ttl`.
pub struct ResultCache {
    memory: Cache<String, Arc<serde_json::Value>>,
    dir: Option<PathBuf>,
    ttl: Duration,
    persist_after: Duration,
}

impl ResultCache {
    pub fn new(capacity: u64, ttl: Duration, dir: Option<PathBuf>) -> Self {
        Self {
            memory: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            dir,
            ttl,
            persist_after: DEFAULT_PERSIST_AFTER,
        }
    }

    pub fn with_persist_after(mut self, persist_after: Duration) -> Self {
        self.persist_after = persist_after;
        self
    }

    pub fn key(fn_name: &str, args: &[&str]) -> String {
        let mut key = fn_name.to_string();
        for arg in args {
            key.push('|');
            key.push_str(arg);
        }
        key
    }

    fn file_for(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{:016x}.json", CRC_64.checksum(key.as_bytes())))
    }

    /// Cached value for `fn_name(args)`, or the result of `compute`.
    ///
    /// Disk problems never fail the call; they are logged and the value is recomputed.
    pub fn get_or_compute<T, F>(&self, fn_name: &str, args: &[&str], compute: F) -> IngestResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> IngestResult<T>,
    {
        let key = Self::key(fn_name, args);

        if let Some(hit) = self.memory.get(&key) {
            if let Ok(value) = T::deserialize(&*hit) {
                debug!(%key, "memory cache hit");
                return Ok(value);
            }
        }

        if let Some(dir) = &self.dir {
            match self.read_disk(dir, &key) {
                Ok(Some(json)) => {
                    if let Ok(value) = T::deserialize(&json) {
                        debug!(%key, "disk cache hit");
                        self.memory.insert(key, Arc::new(json));
                        return Ok(value);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(%key, "ignoring unreadable cache file: {e:#}"),
            }
        }

        let start = Instant::now();
        let value = compute()?;
        let elapsed = start.elapsed();

        let json = serde_json::to_value(&value)
            .map_err(|e| IngestError::Computation(format!("result of {fn_name} not serializable: {e}")))?;
        if let Some(dir) = &self.dir {
            if elapsed >= self.persist_after {
                if let Err(e) = self.write_disk(dir, &key, &json) {
                    warn!(%key, "could not persist cache entry: {e:#}");
                }
            }
        }
        self.memory.insert(key, Arc::new(json));
        Ok(value)
    }

    fn read_disk(&self, dir: &Path, key: &str) -> Result<Option<serde_json::Value>> {
        let path = Self::file_for(dir, key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let entry: DiskEntry = serde_json::from_slice(&raw)
            .with_context(|| format!("decoding {}", path.display()))?;
        let age = Utc::now().timestamp() - entry.timestamp;
        if age < 0 || age as u64 > self.ttl.as_secs() {
            debug!(key, age, "disk cache entry expired");
            return Ok(None);
        }
        Ok(Some(entry.result))
    }

    fn write_disk(&self, dir: &Path, key: &str, result: &serde_json::Value) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = Self::file_for(dir, key);
        let entry = DiskEntry {
            result: result.clone(),
            timestamp: Utc::now().timestamp(),
        };
        let bytes = serde_json::to_vec(&entry)?;
        fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Drop every memory entry and every `*.json` file in the cache directory.
    pub fn clear(&self) -> Result<usize> {
        self.memory.invalidate_all();
        let Some(dir) = &self.dir else {
            return Ok(0);
        };
        let pattern = dir.join("*.json");
        let pattern = pattern
            .to_str()
            .context("cache directory is not valid UTF-8")?;
        let mut removed = 0;
        for path in glob::glob(pattern).context("bad cache glob")? {
            let path = path?;
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
            removed += 1;
        }
        debug!(removed, "cache cleared");
        Ok(removed)
    }

    pub fn memory_entries(&self) -> u64 {
        self.memory.run_pending_tasks();
        self.memory.entry_count()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL, None)
    }
}
