use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotofastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Errors surfaced by the external media collaborators (index, marker
/// store, compression executor). The decision engine treats these as
/// transient and fails open; the pipeline records them into the batch.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Failed to read attributes of '{item}': {reason}")]
    Attributes { item: String, reason: String },

    #[error("Failed to read compression marker of '{item}': {reason}")]
    MarkerRead { item: String, reason: String },

    #[error("Failed to write compression marker to '{item}': {reason}")]
    MarkerWrite { item: String, reason: String },

    #[error("Compression failed for '{item}': {reason}")]
    CompressionFailed { item: String, reason: String },
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Unknown batch id: {0}")]
    UnknownBatch(String),
}

pub type Result<T> = std::result::Result<T, PhotofastError>;
