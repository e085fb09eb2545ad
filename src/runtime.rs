//! Incremental query engine over lazily loaded shards.
//!
//! Each shard moves `Unloaded → Loading → Ready` on demand. Loads are async
//! file reads deduplicated through shared futures, so concurrent queries that
//! need the same shard await a single fetch. Ready shards live in an
//! append-only cache for the life of the runtime: a build is immutable, so
//! nothing is ever evicted or invalidated.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::{Mutex, RwLock, broadcast};

use crate::error::{Result, ShardLoadError};
use crate::normalize::normalize_key;
use crate::ranking::{Candidate, SearchHit, collect_matches, rank};
use crate::shard::{Manifest, Shard, ShardId};

/// Capacity of the shard event channel; slow subscribers lose old events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Type alias for shared shard-load futures.
type SharedShardFuture = Shared<BoxFuture<'static, std::result::Result<Arc<Shard>, ShardWarning>>>;

/// Non-fatal report that a shard could not be served for a query.
///
/// The failing shard's keys are simply absent from the results; matches from
/// shards that loaded still come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardWarning {
    pub shard: ShardId,
    pub message: String,
}

impl ShardWarning {
    fn from_error(error: &ShardLoadError) -> Self {
        Self {
            shard: error.shard(),
            message: error.to_string(),
        }
    }
}

/// Progress notification for UI layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardEvent {
    Loaded(ShardId),
    Failed(ShardId),
}

/// Outcome of [`SearchRuntime::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchReply {
    /// Ranked, de-duplicated hits plus warnings for shards that failed.
    Hits(SearchResults),
    /// A newer query began while this one was loading shards; its result is
    /// discarded (last-query-wins). The shards it fetched stay cached.
    Superseded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub warnings: Vec<ShardWarning>,
}

/// Monotonic query generation; a token stays current until the next query
/// begins.
#[derive(Debug, Default)]
struct QueryTracker {
    generation: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueryToken(u64);

impl QueryTracker {
    fn begin(&self) -> QueryToken {
        QueryToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_current(&self, token: QueryToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.0
    }
}

/// Candidate set of the previous query, kept for the incremental fast path.
struct PreviousQuery {
    query: String,
    candidates: Vec<Candidate>,
}

/// Loads shards on demand and answers incremental substring queries.
pub struct SearchRuntime {
    dir: PathBuf,
    manifest: Manifest,
    /// Ready shards; append-only for the life of the runtime.
    cache: RwLock<HashMap<ShardId, Arc<Shard>>>,
    /// In-flight shard loads, awaitable by multiple queries.
    in_flight: Mutex<HashMap<ShardId, SharedShardFuture>>,
    queries: QueryTracker,
    /// Only set when the previous query saw every shard, so the fast path can
    /// never resurrect a partial view.
    previous: Mutex<Option<PreviousQuery>>,
    fast_path_hits: AtomicU64,
    events: broadcast::Sender<ShardEvent>,
}

impl SearchRuntime {
    /// Opens an index directory written by the builder.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(Manifest::FILE_NAME);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read index manifest at {}", path.display()))?;
        let manifest = Manifest::from_bytes(&bytes)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::debug!(
            "opened index at {} ({} shards)",
            dir.display(),
            manifest.shards.len()
        );

        Ok(Self {
            dir,
            manifest,
            cache: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            queries: QueryTracker::default(),
            previous: Mutex::new(None),
            fast_path_hits: AtomicU64::new(0),
            events,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Subscribe to shard load progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ShardEvent> {
        self.events.subscribe()
    }

    /// Number of queries served by filtering the previous result set instead
    /// of touching shards. Lets callers and tests observe the
    /// incremental-typing contract.
    pub fn fast_path_hits(&self) -> u64 {
        self.fast_path_hits.load(Ordering::Relaxed)
    }

    /// Answers one incremental query.
    ///
    /// The query text runs through the same normalization as the index keys;
    /// an entry matches when its key contains the normalized query as a
    /// substring. Empty or unnormalizable input returns an empty result set,
    /// never an error.
    pub async fn search(&self, text: &str) -> SearchReply {
        let query = normalize_key(text);
        if query.is_empty() {
            return SearchReply::Hits(SearchResults::default());
        }

        let token = self.queries.begin();

        if let Some(candidates) = self.filter_previous(&query).await {
            self.fast_path_hits.fetch_add(1, Ordering::Relaxed);
            return SearchReply::Hits(SearchResults {
                hits: rank(candidates, &query),
                warnings: Vec::new(),
            });
        }

        // Substring matching means every shard is a target bucket for every
        // query, so loads fan out across the whole manifest.
        let (shards, warnings) = self.load_all().await;

        if !self.queries.is_current(token) {
            return SearchReply::Superseded;
        }

        let mut candidates = Vec::new();
        for shard in &shards {
            collect_matches(shard, &query, &mut candidates);
        }

        let mut previous = self.previous.lock().await;
        *previous = if warnings.is_empty() {
            Some(PreviousQuery {
                query: query.clone(),
                candidates: candidates.clone(),
            })
        } else {
            None
        };
        drop(previous);

        SearchReply::Hits(SearchResults {
            hits: rank(candidates, &query),
            warnings,
        })
    }

    /// Incremental-typing fast path: when the new query extends the previous
    /// one, its matches are a pure filter of the previous candidate set and
    /// no shard I/O happens.
    async fn filter_previous(&self, query: &str) -> Option<Vec<Candidate>> {
        let mut previous = self.previous.lock().await;
        let prev = previous.as_ref()?;
        if !query.contains(prev.query.as_str()) {
            return None;
        }

        let candidates: Vec<Candidate> = prev
            .candidates
            .iter()
            .filter(|c| c.entry().key.contains(query))
            .cloned()
            .collect();

        *previous = Some(PreviousQuery {
            query: query.to_string(),
            candidates: candidates.clone(),
        });
        Some(candidates)
    }

    /// Loads every manifest shard concurrently, deduplicating in-flight
    /// fetches, and splits the outcome into ready shards and warnings.
    async fn load_all(&self) -> (Vec<Arc<Shard>>, Vec<ShardWarning>) {
        let loads = self.manifest.shards.iter().map(|&id| self.shard(id));
        let mut shards = Vec::with_capacity(self.manifest.shards.len());
        let mut warnings = Vec::new();

        for result in futures::future::join_all(loads).await {
            match result {
                Ok(shard) => shards.push(shard),
                Err(warning) => {
                    tracing::warn!("shard {} unavailable: {}", warning.shard, warning.message);
                    warnings.push(warning);
                }
            }
        }

        (shards, warnings)
    }

    /// Gets one shard, fetching it at most once regardless of how many
    /// queries race for it.
    async fn shard(&self, id: ShardId) -> std::result::Result<Arc<Shard>, ShardWarning> {
        if let Some(shard) = self.cache.read().await.get(&id) {
            return Ok(Arc::clone(shard));
        }

        let (future, owner) = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&id) {
                Some(future) => {
                    tracing::debug!("awaiting in-flight load for shard {}", id);
                    (future.clone(), false)
                }
                None => {
                    let path = self.dir.join(id.file_name());
                    let load: BoxFuture<'static, std::result::Result<Arc<Shard>, ShardWarning>> =
                        Box::pin(async move {
                            load_shard(id, path)
                                .await
                                .map(Arc::new)
                                .map_err(|e| ShardWarning::from_error(&e))
                        });
                    let shared = load.shared();
                    in_flight.insert(id, shared.clone());
                    (shared, true)
                }
            }
        };

        let result = future.await;

        if owner {
            self.in_flight.lock().await.remove(&id);
            match &result {
                Ok(shard) => {
                    // The fetch completes and populates the cache even when
                    // the query that triggered it was superseded.
                    self.cache.write().await.insert(id, Arc::clone(shard));
                    let _ = self.events.send(ShardEvent::Loaded(id));
                    tracing::debug!("shard {} ready ({} entries)", id, shard.entries.len());
                }
                Err(_) => {
                    // Failures are not cached; the next query retries.
                    let _ = self.events.send(ShardEvent::Failed(id));
                }
            }
        }

        result
    }
}

/// Fetches and parses one shard file.
async fn load_shard(id: ShardId, path: PathBuf) -> std::result::Result<Shard, ShardLoadError> {
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            return Err(ShardLoadError::NotFound { shard: id, path });
        }
        Err(source) => return Err(ShardLoadError::Io { shard: id, source }),
    };
    Shard::from_bytes(id, &bytes)
}
