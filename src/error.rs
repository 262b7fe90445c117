//! Error types for the tree map
//!
//! Each concern gets its own enum:
//! - `PaginationError` for rejected controller input
//! - `GeometryError` for raw point strings that cannot be read
//! - `LoadError` for the one-time load of the tree table
//! - `ConfigError` for the optional config file
//! - `TileError` for map tiles that could not be fetched

use std::path::PathBuf;
use thiserror::Error;

/// Rejected input to the batch pagination controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    /// Step size outside {50, 100, 500, 1000}
    #[error("invalid step size {value}: expected one of 50, 100, 500 or 1000")]
    InvalidArgument { value: usize },
}

/// A raw geometry string that does not describe a valid point
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("malformed geometry {raw:?}: {reason}")]
    MalformedGeometry { raw: String, reason: String },
}

impl GeometryError {
    pub(crate) fn malformed(raw: &str, reason: impl Into<String>) -> Self {
        GeometryError::MalformedGeometry {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure while loading the tree table
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse tree table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tree {id} has an unreadable location: {source}")]
    Geometry {
        id: i64,
        #[source]
        source: GeometryError,
    },

    #[error("tree {id} has no height")]
    MissingHeight { id: i64 },

    #[error("load task failed: {0}")]
    TaskJoin(String),
}

/// Failure while reading the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure while fetching one map tile
#[derive(Debug, Error)]
pub enum TileError {
    #[error("tile request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tile server responded with {status} for {url}")]
    Status { url: String, status: u16 },
}
