//! Error handling types and utilities.

use std::path::PathBuf;

use thiserror::Error;

use crate::shard::ShardId;

/// A specialized Result type for symsearch operations.
///
/// This is an alias for `anyhow::Result` with context added via `.context()`
/// and `.with_context()` at I/O boundaries.
pub type Result<T> = anyhow::Result<T>;

/// Structural violation of the extractor contract, raised by the builder.
///
/// Strict builds abort on the first malformed record; lenient builds log and
/// drop it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    /// The record carries no display name at all.
    #[error("symbol record has an empty display name")]
    EmptyDisplayName,
    /// The record names a symbol but no documented location.
    #[error("symbol record '{display_name}' has no occurrences")]
    NoOccurrences { display_name: String },
    /// Every character of the name falls outside the key alphabet.
    #[error("symbol record '{display_name}' normalizes to an empty key")]
    EmptyKey { display_name: String },
}

/// Failure to fetch or parse a shard file.
///
/// The runtime never raises this to the caller: it degrades into a
/// [`crate::runtime::ShardWarning`] and the query answers from the shards
/// that did load.
#[derive(Debug, Error)]
pub enum ShardLoadError {
    #[error("shard {shard} not found at {path}")]
    NotFound { shard: ShardId, path: PathBuf },
    #[error("failed to read shard {shard}: {source}")]
    Io {
        shard: ShardId,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse shard {shard}: {message}")]
    Parse { shard: ShardId, message: String },
    #[error("shard {shard} has format version {found}, expected {expected}")]
    VersionMismatch {
        shard: ShardId,
        found: u32,
        expected: u32,
    },
}

impl ShardLoadError {
    /// The shard this failure belongs to.
    pub fn shard(&self) -> ShardId {
        match self {
            Self::NotFound { shard, .. }
            | Self::Io { shard, .. }
            | Self::Parse { shard, .. }
            | Self::VersionMismatch { shard, .. } => *shard,
        }
    }
}
