//! Index construction: validation, overload merging, partitioning, and
//! serialization.
//!
//! The builder is the leaf of the pipeline. It runs once per documentation
//! build, synchronously, and its output fully replaces whatever the previous
//! build wrote.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use ahash::AHashMap;
use anyhow::Context;
use thiserror::Error;

use crate::error::{MalformedRecord, Result};
use crate::normalize::normalize_key;
use crate::record::SymbolRecord;
use crate::shard::{DEFAULT_SHARD_COUNT, FORMAT_VERSION, IndexEntry, Manifest, Shard, ShardId, shard_for_key};

/// How the builder reacts to records violating the extractor contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Abort the build on the first malformed record.
    #[default]
    Strict,
    /// Log the record, drop it, and report it in [`BuildOutput::skipped`].
    Lenient,
}

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Modulus of the partition function. Every key maps to exactly one of
    /// these shards.
    pub shard_count: u32,
    pub mode: ValidationMode,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            mode: ValidationMode::default(),
        }
    }
}

/// Build failure. Only strict builds raise malformed records; lenient builds
/// report them instead.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("malformed symbol record: {0}")]
    Malformed(#[from] MalformedRecord),
}

/// A record dropped by a lenient build.
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    pub display_name: String,
    pub error: MalformedRecord,
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildOutput {
    pub index: BuiltIndex,
    /// Records dropped in lenient mode; always empty in strict mode.
    pub skipped: Vec<SkippedRecord>,
}

/// The fully built, immutable index, ready to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltIndex {
    shard_count: u32,
    shards: BTreeMap<ShardId, Shard>,
}

impl BuiltIndex {
    /// Non-empty shards in id order.
    pub fn shards(&self) -> impl Iterator<Item = &Shard> {
        self.shards.values()
    }

    pub fn shard(&self, id: ShardId) -> Option<&Shard> {
        self.shards.get(&id)
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    pub fn entry_count(&self) -> usize {
        self.shards.values().map(|s| s.entries.len()).sum()
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            version: FORMAT_VERSION,
            shard_count: self.shard_count,
            shards: self.shards.keys().copied().collect(),
        }
    }

    /// Writes the manifest plus one file per non-empty shard.
    ///
    /// Output is byte-identical across re-runs on the same input: entries are
    /// sorted, shards iterate in id order, and the JSON field order is fixed
    /// by the types.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create index directory {}", dir.display()))?;

        let manifest_path = dir.join(Manifest::FILE_NAME);
        std::fs::write(&manifest_path, self.manifest().to_bytes()?)
            .with_context(|| format!("failed to write manifest to {}", manifest_path.display()))?;

        for shard in self.shards.values() {
            let path = dir.join(shard.id.file_name());
            std::fs::write(&path, shard.to_bytes()?)
                .with_context(|| format!("failed to write shard to {}", path.display()))?;
        }

        tracing::debug!(
            "wrote {} shard files ({} entries) to {}",
            self.shards.len(),
            self.entry_count(),
            dir.display()
        );
        Ok(())
    }
}

/// Converts an unordered stream of symbol records into deterministic shards.
pub struct IndexBuilder {
    config: BuilderConfig,
}

impl IndexBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Builds the index.
    ///
    /// Records sharing a normalized key merge into one entry whose occurrence
    /// list is the concatenation of their occurrence lists in input order;
    /// that is how a class with many overloaded constructors becomes one
    /// searchable row with several jump targets.
    pub fn build(
        &self,
        records: impl IntoIterator<Item = SymbolRecord>,
    ) -> std::result::Result<BuildOutput, BuildError> {
        let start = Instant::now();
        let mut entries: Vec<IndexEntry> = Vec::new();
        let mut by_key: AHashMap<String, usize> = AHashMap::new();
        let mut skipped = Vec::new();
        let mut record_count = 0usize;

        for record in records {
            record_count += 1;
            let key = match self.checked_key(&record) {
                Ok(key) => key,
                Err(error) => match self.config.mode {
                    ValidationMode::Strict => return Err(error.into()),
                    ValidationMode::Lenient => {
                        tracing::warn!("dropping malformed record: {}", error);
                        skipped.push(SkippedRecord {
                            display_name: record.display_name,
                            error,
                        });
                        continue;
                    }
                },
            };

            match by_key.get(&key) {
                Some(&index) => entries[index].occurrences.extend(record.occurrences),
                None => {
                    by_key.insert(key.clone(), entries.len());
                    entries.push(IndexEntry {
                        key,
                        display_name: record.display_name,
                        occurrences: record.occurrences,
                    });
                }
            }
        }

        let mut buckets: BTreeMap<ShardId, Vec<IndexEntry>> = BTreeMap::new();
        for entry in entries {
            let id = shard_for_key(&entry.key, self.config.shard_count);
            buckets.entry(id).or_default().push(entry);
        }

        let shards: BTreeMap<ShardId, Shard> = buckets
            .into_iter()
            .map(|(id, mut entries)| {
                // Keys are unique after the merge and already lowercase, so
                // byte order is the required case-insensitive, locale-free
                // alphabetical order. The sort is stable regardless.
                entries.sort_by(|a, b| a.key.cmp(&b.key));
                (id, Shard::new(id, entries))
            })
            .collect();

        let index = BuiltIndex {
            shard_count: self.config.shard_count,
            shards,
        };

        tracing::info!(
            "built search index: {} entries in {} shards from {} records in {:?}",
            index.entry_count(),
            index.shards.len(),
            record_count,
            start.elapsed()
        );

        Ok(BuildOutput { index, skipped })
    }

    fn checked_key(&self, record: &SymbolRecord) -> std::result::Result<String, MalformedRecord> {
        record.validate()?;
        let key = normalize_key(record.key_source());
        if key.is_empty() {
            return Err(MalformedRecord::EmptyKey {
                display_name: record.display_name.clone(),
            });
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SymbolOccurrence;
    use assert2::{check, let_assert};

    fn record(name: &str, anchor: &str) -> SymbolRecord {
        SymbolRecord::new(name, vec![SymbolOccurrence::new(anchor, name)])
    }

    #[test]
    fn strict_build_aborts_on_malformed_record() {
        let builder = IndexBuilder::new(BuilderConfig::default());
        let records = vec![record("EFqdn", "a"), SymbolRecord::new("", vec![])];
        let_assert!(Err(BuildError::Malformed(MalformedRecord::EmptyDisplayName)) =
            builder.build(records));
    }

    #[test]
    fn lenient_build_skips_and_reports() {
        let builder = IndexBuilder::new(BuilderConfig {
            mode: ValidationMode::Lenient,
            ..BuilderConfig::default()
        });
        let records = vec![
            record("EFqdn", "a"),
            SymbolRecord::new("EEvent", vec![]),
            record("::", "b"),
        ];
        let output = builder.build(records).unwrap();
        check!(output.index.entry_count() == 1);
        check!(output.skipped.len() == 2);
        check!(output.skipped[0].display_name == "EEvent");
        let_assert!(MalformedRecord::EmptyKey { .. } = &output.skipped[1].error);
    }

    #[test]
    fn unnormalizable_name_is_rejected_in_strict_mode() {
        let builder = IndexBuilder::new(BuilderConfig::default());
        let_assert!(Err(BuildError::Malformed(MalformedRecord::EmptyKey { display_name })) =
            builder.build(vec![record("::", "a")]));
        check!(display_name == "::");
    }

    #[test]
    fn first_display_name_wins_on_merge() {
        let builder = IndexBuilder::new(BuilderConfig::default());
        let output = builder
            .build(vec![record("EFqdn", "a"), record("EFqdn(cpStr val)", "b")])
            .unwrap();
        check!(output.index.entry_count() == 1);
        let entry = output.index.shards().next().unwrap().entries.first().unwrap();
        check!(entry.display_name == "EFqdn");
        check!(entry.occurrences.len() == 2);
    }
}
