//! Queue configuration (TOML)
//!
//! Contoh:
//! ```toml
//! capacity_bytes = 65536
//! backing = "mmap"
//! lock_pages = true
//! log_level = "debug"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Sumber memori untuk arena
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backing {
    /// Boxed slice di heap
    #[default]
    Heap,
    /// Anonymous memory map (page aligned)
    Mmap,
}

#[derive(Deserialize, Debug, Clone)]
pub struct QueueConfig {
    #[serde(default = "defaults::capacity_bytes")]
    pub capacity_bytes: usize,
    #[serde(default)]
    pub backing: Backing,
    /// `mlock` arena supaya thread real-time tidak kena page fault
    #[serde(default)]
    pub lock_pages: bool,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

mod defaults {
    pub fn capacity_bytes() -> usize {
        64 * 1024
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: defaults::capacity_bytes(),
            backing: Backing::default(),
            lock_pages: false,
            log_level: defaults::log_level(),
        }
    }
}

impl QueueConfig {
    /// Config dengan kapasitas tertentu, sisanya default
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            ..Self::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}
