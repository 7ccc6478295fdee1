//! Error types
//!
//! Hanya kondisi yang terjadi saat konstruksi yang menjadi `Result`.
//! "No space" dan "no data" adalah return value biasa, sedangkan
//! pelanggaran kontrak pada queue yang sudah hidup (publish melebihi
//! reservasi, commit saat kosong) adalah panic.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid capacity {requested} bytes (must be between {minimum} and {maximum})")]
    InvalidCapacity {
        requested: usize,
        minimum: usize,
        maximum: usize,
    },

    #[error("failed to set up arena: {0}")]
    Arena(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}
