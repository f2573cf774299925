//! Lookup key normalization shared by the cache and the subscriber registry.

/// Lowercases and trims a subject or partition name so that lookups are
/// case and whitespace insensitive. Idempotent.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}
