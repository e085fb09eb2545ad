//! Shard data model, key partitioning, and the on-disk index format.
//!
//! A shard is an independently loadable partition of the full index. The
//! builder writes one pretty-printed JSON file per non-empty shard plus a
//! manifest; the format is deliberately self-describing and byte-stable so
//! two builds over identical input diff clean.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::ShardLoadError;
use crate::record::SymbolOccurrence;

/// On-disk format version; bump when the shard layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Default number of shards. Bounds per-request payload size for a symbol
/// table of a few thousand entries.
pub const DEFAULT_SHARD_COUNT: u32 = 16;

/// Identifier of one shard, rendered as two-plus hex digits in file names
/// and in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardId(u16);

impl ShardId {
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// File name of this shard within an index directory.
    pub fn file_name(self) -> String {
        format!("shard_{self}.json")
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl FromStr for ShardId {
    type Err = ParseShardIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u16::from_str_radix(s.trim(), 16)
            .map(ShardId)
            .map_err(|_| ParseShardIdError(s.to_string()))
    }
}

impl Serialize for ShardId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ShardId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for shard id parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid shard id '{0}'")]
pub struct ParseShardIdError(String);

/// Assigns a normalized key to its shard.
///
/// Total and deterministic: a stable 64-bit hash of the key reduced modulo
/// the shard count. Independent of host map iteration order and identical
/// across processes, so re-running the builder can never reshuffle keys.
pub fn shard_for_key(key: &str, shard_count: u32) -> ShardId {
    debug_assert!(shard_count > 0 && shard_count <= u32::from(u16::MAX) + 1);
    ShardId((xxh3_64(key.as_bytes()) % u64::from(shard_count)) as u16)
}

/// The per-key unit of storage: one searchable key together with every
/// documented location it resolves to. Immutable after build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Normalized search key; unique within its shard.
    pub key: String,
    /// Display name of the first record that produced this entry.
    pub display_name: String,
    /// Concatenated occurrence lists of all merged records, in input order.
    pub occurrences: Vec<SymbolOccurrence>,
}

/// An independently loadable partition of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub version: u32,
    #[serde(rename = "shard")]
    pub id: ShardId,
    /// Entries sorted alphabetically by key.
    pub entries: Vec<IndexEntry>,
}

impl Shard {
    pub fn new(id: ShardId, entries: Vec<IndexEntry>) -> Self {
        Self {
            version: FORMAT_VERSION,
            id,
            entries,
        }
    }

    /// Serializes this shard in its on-disk form.
    pub fn to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parses a shard file fetched for `expected`, checking that the payload
    /// is the shard the caller asked for and speaks the current format.
    pub fn from_bytes(expected: ShardId, bytes: &[u8]) -> Result<Self, ShardLoadError> {
        let shard: Self =
            serde_json::from_slice(bytes).map_err(|e| ShardLoadError::Parse {
                shard: expected,
                message: e.to_string(),
            })?;
        if shard.version != FORMAT_VERSION {
            return Err(ShardLoadError::VersionMismatch {
                shard: expected,
                found: shard.version,
                expected: FORMAT_VERSION,
            });
        }
        if shard.id != expected {
            return Err(ShardLoadError::Parse {
                shard: expected,
                message: format!("payload describes shard {}", shard.id),
            });
        }
        Ok(shard)
    }
}

/// Top-level descriptor written beside the shard files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    /// Modulus of the partition function used at build time.
    pub shard_count: u32,
    /// Shards that actually contain entries; empty shards have no file.
    pub shards: Vec<ShardId>,
}

impl Manifest {
    pub const FILE_NAME: &'static str = "manifest.json";

    pub fn to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
