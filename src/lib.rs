//! Search index construction and query engine for generated documentation.
//!
//! The [`builder`] half turns raw symbol records from an upstream extractor
//! into deterministic, independently loadable shards. The [`runtime`] half
//! loads shards on demand and answers incremental substring queries with
//! stable ranking.

pub mod builder;
pub mod error;
pub mod normalize;
pub mod ranking;
pub mod record;
pub mod runtime;
pub mod shard;
pub mod tracing;

pub use builder::{
    BuildError, BuildOutput, BuilderConfig, BuiltIndex, IndexBuilder, SkippedRecord, ValidationMode,
};
pub use error::{MalformedRecord, Result, ShardLoadError};
pub use ranking::{SearchHit, SearchTarget};
pub use record::{SymbolOccurrence, SymbolRecord};
pub use runtime::{SearchReply, SearchResults, SearchRuntime, ShardEvent, ShardWarning};
pub use shard::{IndexEntry, Manifest, Shard, ShardId, shard_for_key};
