//! Result ranking and expansion for the query engine.

use std::sync::Arc;

use crate::shard::{IndexEntry, Shard};

/// One jump target within a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget {
    pub anchor_url: String,
    pub scope_label: String,
}

/// One display row: a matching entry with every documented location it
/// resolves to. Overloads stay grouped under the row but each target remains
/// individually addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub key: String,
    pub display_name: String,
    pub targets: Vec<SearchTarget>,
}

/// A matched entry pinned inside its loaded shard.
///
/// Candidate lists are always assembled in shard order (shard id, then entry
/// index) so that ranking ties resolve stably.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    shard: Arc<Shard>,
    index: usize,
}

impl Candidate {
    pub(crate) fn entry(&self) -> &IndexEntry {
        &self.shard.entries[self.index]
    }
}

/// Collects matching candidates from one shard, preserving entry order.
pub(crate) fn collect_matches(shard: &Arc<Shard>, query: &str, out: &mut Vec<Candidate>) {
    for (index, entry) in shard.entries.iter().enumerate() {
        if entry.key.contains(query) {
            out.push(Candidate {
                shard: Arc::clone(shard),
                index,
            });
        }
    }
}

/// Orders candidates and expands them into display rows.
///
/// Primary key: match position, so prefix matches rank above inner matches.
/// Secondary: key length ascending, putting shorter, more specific names
/// first. Tertiary: key alphabetically. The sort is stable, so any remaining
/// ties keep shard order.
pub(crate) fn rank(mut candidates: Vec<Candidate>, query: &str) -> Vec<SearchHit> {
    candidates.sort_by(|a, b| {
        let (a, b) = (a.entry(), b.entry());
        // Candidates are pre-filtered on `contains`; a miss would sort last
        // rather than panic.
        let pos_a = a.key.find(query).unwrap_or(usize::MAX);
        let pos_b = b.key.find(query).unwrap_or(usize::MAX);
        pos_a
            .cmp(&pos_b)
            .then(a.key.len().cmp(&b.key.len()))
            .then_with(|| a.key.cmp(&b.key))
    });

    candidates
        .iter()
        .map(|candidate| {
            let entry = candidate.entry();
            SearchHit {
                key: entry.key.clone(),
                display_name: entry.display_name.clone(),
                targets: entry
                    .occurrences
                    .iter()
                    .map(|o| SearchTarget {
                        anchor_url: o.anchor_url.clone(),
                        scope_label: o.scope_label.clone(),
                    })
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SymbolOccurrence;
    use crate::shard::ShardId;
    use assert2::check;

    fn shard_of(keys: &[&str]) -> Arc<Shard> {
        let entries = keys
            .iter()
            .map(|key| IndexEntry {
                key: (*key).to_string(),
                display_name: key.to_uppercase(),
                occurrences: vec![SymbolOccurrence::new(format!("{key}.html"), *key)],
            })
            .collect();
        Arc::new(Shard::new(ShardId::new(0), entries))
    }

    fn ranked_keys(keys: &[&str], query: &str) -> Vec<String> {
        let shard = shard_of(keys);
        let mut candidates = Vec::new();
        collect_matches(&shard, query, &mut candidates);
        rank(candidates, query).into_iter().map(|h| h.key).collect()
    }

    #[test]
    fn shorter_keys_rank_first_among_prefix_matches() {
        // All three match "e" at position 0, so length decides, then the
        // alphabet: efqdn (5) before eevent (6) before emanagementendpoint.
        let keys = ["eevent", "efqdn", "emanagementendpoint"];
        check!(ranked_keys(&keys, "e") == ["efqdn", "eevent", "emanagementendpoint"]);
    }

    #[test]
    fn prefix_matches_rank_above_inner_matches() {
        let keys = ["efqdn", "fqdnutil"];
        check!(ranked_keys(&keys, "fqdn") == ["fqdnutil", "efqdn"]);
    }

    #[test]
    fn alphabet_breaks_equal_position_and_length() {
        let keys = ["ebzip2", "eerror"];
        check!(ranked_keys(&keys, "e") == ["ebzip2", "eerror"]);
    }

    #[test]
    fn every_occurrence_becomes_one_target() {
        let shard = Arc::new(Shard::new(
            ShardId::new(0),
            vec![IndexEntry {
                key: "efqdn".to_string(),
                display_name: "EFqdn".to_string(),
                occurrences: vec![
                    SymbolOccurrence::new("classEFqdn.html#a5d8b", "EFqdn::EFqdn()"),
                    SymbolOccurrence::new("classEFqdn.html#a6082", "EFqdn::EFqdn(cpStr val)"),
                ],
            }],
        ));
        let mut candidates = Vec::new();
        collect_matches(&shard, "fqdn", &mut candidates);
        let hits = rank(candidates, "fqdn");
        check!(hits.len() == 1);
        check!(hits[0].targets.len() == 2);
        check!(hits[0].targets[0].anchor_url == "classEFqdn.html#a5d8b");
        check!(hits[0].targets[1].scope_label == "EFqdn::EFqdn(cpStr val)");
    }
}
