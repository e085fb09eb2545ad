//! Shared fixtures: an EpcTools-flavored symbol table and built index
//! directories.

use symsearch::{
    BuildOutput, BuilderConfig, IndexBuilder, SymbolOccurrence, SymbolRecord,
};
use tempfile::TempDir;

pub fn occurrence(anchor: &str, scope: &str) -> SymbolOccurrence {
    SymbolOccurrence::new(anchor, scope)
}

pub fn record(name: &str, occurrences: &[(&str, &str)]) -> SymbolRecord {
    SymbolRecord::new(
        name,
        occurrences
            .iter()
            .map(|(anchor, scope)| occurrence(anchor, scope))
            .collect(),
    )
}

/// A small slice of a real documentation symbol table, overloads included.
pub fn sample_records() -> Vec<SymbolRecord> {
    vec![
        record("EEvent", &[("classEEvent.html#a30d9", "EEvent")]),
        record("EFqdn", &[("classEFqdn.html#a5d8b", "EFqdn::EFqdn()")]),
        record(
            "EFqdn(cpStr val)",
            &[("classEFqdn.html#a6082", "EFqdn::EFqdn(cpStr val)")],
        ),
        record(
            "EManagementEndpoint",
            &[("classEManagementEndpoint.html#a997a", "EManagementEndpoint")],
        ),
        record(
            "elementLength",
            &[
                ("classEMessage.html#abfe7", "EMessage::elementLength(Bool)"),
                ("classEMessage.html#a414e", "EMessage::elementLength(Char)"),
            ],
        ),
        record(
            "hdr_enrchmt",
            &[("classForwardingParametersIE.html#a6750", "PFCP_R15")],
        ),
        record("ELogger", &[("classELogger.html#a1571", "ELogger")]),
        record("EGetOpt", &[("classEGetOpt.html#ac9e1", "EGetOpt")]),
        record("EIpAddress", &[("classEIpAddress.html#a2c3c", "EIpAddress")]),
        record("EBzip2", &[("classEBzip2.html#a3d2b", "EBzip2")]),
    ]
}

/// A built sample index serialized into its own temporary directory.
pub struct FixtureIndex {
    pub dir: TempDir,
    pub output: BuildOutput,
}

pub fn build_fixture() -> FixtureIndex {
    build_fixture_from(sample_records())
}

pub fn build_fixture_from(records: Vec<SymbolRecord>) -> FixtureIndex {
    symsearch::tracing::init();
    let output = IndexBuilder::new(BuilderConfig::default())
        .build(records)
        .expect("fixture records are well-formed");
    let dir = TempDir::new().expect("temp dir");
    output.index.write_to(dir.path()).expect("fixture write");
    FixtureIndex { dir, output }
}
