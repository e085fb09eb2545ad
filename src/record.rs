//! Raw symbol records consumed by the index builder.

use serde::{Deserialize, Serialize};

use crate::error::MalformedRecord;

/// One concrete documented location a symbol name resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolOccurrence {
    /// Page anchor the viewer jumps to, e.g. `classEFqdn.html#a5d8b8a56`.
    pub anchor_url: String,
    /// Scope shown next to the result, e.g. `EFqdn` or `EPCDNS::Utility`.
    pub scope_label: String,
}

impl SymbolOccurrence {
    pub fn new(anchor_url: impl Into<String>, scope_label: impl Into<String>) -> Self {
        Self {
            anchor_url: anchor_url.into(),
            scope_label: scope_label.into(),
        }
    }
}

/// A raw symbol record as produced by the upstream symbol extractor.
///
/// Records are not required to have distinct names: overloads arrive as
/// separate records sharing one name and are merged by the builder into a
/// single entry. Occurrence order is upstream declaration order and is
/// preserved through the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// Case-normalized search token supplied upstream. May be empty, in which
    /// case the key is derived from `display_name` instead.
    #[serde(default)]
    pub raw_name: String,
    /// Human-readable name, possibly qualified (`Namespace::Class::method`)
    /// or carrying an overload signature (`EFqdn(cpStr val)`).
    pub display_name: String,
    /// Jump targets in declaration order. Never empty for a valid record.
    pub occurrences: Vec<SymbolOccurrence>,
}

impl SymbolRecord {
    pub fn new(display_name: impl Into<String>, occurrences: Vec<SymbolOccurrence>) -> Self {
        Self {
            raw_name: String::new(),
            display_name: display_name.into(),
            occurrences,
        }
    }

    /// Attach the extractor-supplied search token.
    pub fn with_raw_name(mut self, raw_name: impl Into<String>) -> Self {
        self.raw_name = raw_name.into();
        self
    }

    /// Checks the structural contract with the extractor.
    pub(crate) fn validate(&self) -> Result<(), MalformedRecord> {
        if self.display_name.is_empty() {
            return Err(MalformedRecord::EmptyDisplayName);
        }
        if self.occurrences.is_empty() {
            return Err(MalformedRecord::NoOccurrences {
                display_name: self.display_name.clone(),
            });
        }
        Ok(())
    }

    /// The name the search key is derived from.
    pub(crate) fn key_source(&self) -> &str {
        if self.raw_name.is_empty() {
            &self.display_name
        } else {
            &self.raw_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    fn occurrence() -> SymbolOccurrence {
        SymbolOccurrence::new("classEFqdn.html#a5d8b8a56", "EFqdn")
    }

    #[test]
    fn valid_record_passes() {
        let record = SymbolRecord::new("EFqdn", vec![occurrence()]);
        check!(record.validate() == Ok(()));
    }

    #[test]
    fn empty_display_name_is_malformed() {
        let record = SymbolRecord::new("", vec![occurrence()]);
        let_assert!(Err(MalformedRecord::EmptyDisplayName) = record.validate());
    }

    #[test]
    fn missing_occurrences_are_malformed() {
        let record = SymbolRecord::new("EFqdn", vec![]);
        let_assert!(Err(MalformedRecord::NoOccurrences { display_name }) = record.validate());
        check!(display_name == "EFqdn");
    }

    #[test]
    fn key_source_prefers_raw_name() {
        let record =
            SymbolRecord::new("EPCDNS::Utility::home_network", vec![occurrence()])
                .with_raw_name("home_network");
        check!(record.key_source() == "home_network");

        let record = SymbolRecord::new("EFqdn", vec![occurrence()]);
        check!(record.key_source() == "EFqdn");
    }
}
