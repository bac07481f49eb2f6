use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};

/// Where chunk bytes and catalog rows live.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// `bucket<i>` directories under `data_dir` plus a libsql catalog file.
    #[default]
    Fs,
    /// Everything in process memory; lost on exit.
    Memory,
}

/// How downloads hand bytes to the caller.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Read and length-check every chunk before the first byte goes out.
    #[default]
    Buffered,
    /// Emit each chunk as soon as its bucket read completes.
    Streaming,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Number of buckets every file is split across.
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,

    #[serde(default)]
    pub backend: Backend,

    /// Parent of the `bucket1..bucketN` directories.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// libsql database file; ":memory:" keeps the catalog in process.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    #[serde(default)]
    pub read_mode: ReadMode,
}

fn default_fan_out() -> usize {
    3
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_catalog_path() -> String {
    "split.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fan_out: default_fan_out(),
            backend: Backend::default(),
            data_dir: default_data_dir(),
            catalog_path: default_catalog_path(),
            read_mode: ReadMode::default(),
        }
    }
}

impl StoreConfig {
    pub fn in_memory(fan_out: usize) -> Self {
        Self {
            fan_out,
            backend: Backend::Memory,
            catalog_path: ":memory:".to_string(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fan_out == 0 {
            return Err(SplitError::InvalidFanOut(self.fan_out));
        }
        if self.backend == Backend::Fs && self.catalog_path.trim().is_empty() {
            return Err(SplitError::Config("catalog_path must not be empty".into()));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: StoreConfig =
            toml::from_str(s).map_err(|e| SplitError::Config(format!("parse: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}
