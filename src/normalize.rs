//! Search-key normalization shared by the index builder and the query engine.

/// Key alphabet: lowercase ASCII letters, digits, and underscore.
fn is_key_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
}

/// Normalizes a display name (or query text) into its canonical search key.
///
/// The overload signature, if present, is cut at the opening parenthesis, the
/// remainder is lowercased, and every character outside `[a-z0-9_]` is
/// dropped. `EFqdn()` and `EFqdn(cpStr val)` both normalize to `efqdn`.
///
/// Distinct display names that collapse to the same key are treated as one
/// symbol for search purposes. That folds C++ overloads into one entry, which
/// is the point, but also folds e.g. `operator+` and `operator-` together.
pub fn normalize_key(text: &str) -> String {
    let name = text.split('(').next().unwrap_or(text);
    name.to_lowercase().chars().filter(|c| is_key_char(*c)).collect()
}
