// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{ResultCache, DEFAULT_CAPACITY, DEFAULT_TTL};

pub const DEFAULT_BATCH_SIZE: usize = 1_000;
pub const DEFAULT_REFERENCE_YEAR: i32 = 2023;

/// Where the data lives and how it is read and cached.
///
/// Precondition: a readable CSV file exists at `data_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub data_path: PathBuf,
    pub batch_size: usize,
    /// Cap on decoded rows; `None` reads the whole file.
    pub max_rows: Option<usize>,
    /// Cap on rows profiled by the schema analyzer.
    pub schema_sample_rows: Option<usize>,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    /// Year forecasts count back from when the data has no usable start years.
    pub reference_year: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/students.csv"),
            batch_size: DEFAULT_BATCH_SIZE,
            max_rows: None,
            schema_sample_rows: None,
            cache_dir: None,
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            cache_capacity: DEFAULT_CAPACITY,
            reference_year: DEFAULT_REFERENCE_YEAR,
        }
    }
}

fn parsed<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{name}={raw:?} is not valid"))
}

impl Config {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Defaults, then the optional YAML file, then `COHORT_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let base = match file {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        base.with_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides looked up by variable name.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("COHORT_DATA_PATH") {
            self.data_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("COHORT_BATCH_SIZE") {
            self.batch_size = parsed("COHORT_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("COHORT_MAX_ROWS") {
            self.max_rows = if v.trim().is_empty() {
                None
            } else {
                Some(parsed("COHORT_MAX_ROWS", &v)?)
            };
        }
        if let Some(v) = lookup("COHORT_CACHE_DIR") {
            self.cache_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("COHORT_CACHE_TTL_SECS") {
            self.cache_ttl_secs = parsed("COHORT_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("COHORT_CACHE_CAPACITY") {
            self.cache_capacity = parsed("COHORT_CACHE_CAPACITY", &v)?;
        }
        Ok(self)
    }

    pub fn cache(&self) -> ResultCache {
        ResultCache::new(
            self.cache_capacity,
            Duration::from_secs(self.cache_ttl_secs),
            self.cache_dir.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_overrides_defaults() -> Result<()> {
        let env = vars(&[
            ("COHORT_DATA_PATH", "/srv/cohort.csv"),
            ("COHORT_BATCH_SIZE", "250"),
            ("COHORT_MAX_ROWS", "10000"),
            ("COHORT_CACHE_DIR", "/tmp/cohort-cache"),
        ]);
        let cfg = Config::default().with_overrides(|k| env.get(k).cloned())?;
        assert_eq!(cfg.data_path, PathBuf::from("/srv/cohort.csv"));
        assert_eq!(cfg.batch_size, 250);
        assert_eq!(cfg.max_rows, Some(10_000));
        assert_eq!(cfg.cache_dir, Some(PathBuf::from("/tmp/cohort-cache")));
        assert_eq!(cfg.cache_ttl_secs, 3600);
        assert_eq!(cfg.cache_capacity, 100);
        Ok(())
    }

    #[test]
    fn bad_number_names_the_variable() {
        let env = vars(&[("COHORT_BATCH_SIZE", "lots")]);
        let err = Config::default()
            .with_overrides(|k| env.get(k).cloned())
            .unwrap_err();
        assert!(format!("{err:#}").contains("COHORT_BATCH_SIZE"));
    }

    #[test]
    fn yaml_file_then_env() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "data_path: cohort.csv\nbatch_size: 64\ncache_ttl_secs: 60")?;
        let cfg = Config::from_yaml_file(file.path())?;
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.cache_ttl_secs, 60);
        assert_eq!(cfg.max_rows, None);

        let env = vars(&[("COHORT_CACHE_TTL_SECS", "5")]);
        let cfg = cfg.with_overrides(|k| env.get(k).cloned())?;
        assert_eq!(cfg.cache_ttl_secs, 5);
        assert_eq!(cfg.data_path, PathBuf::from("cohort.csv"));
        Ok(())
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "data_path: cohort.csv\nbatchsize: 64")?;
        assert!(Config::from_yaml_file(file.path()).is_err());
        Ok(())
    }
}
