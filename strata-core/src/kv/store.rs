use crate::Result;
use async_trait::async_trait;

/// The key-value backend contract.
///
/// Rows live as text field maps under `<table>:<id>`; the set
/// `<table>:indices` holds the live identifiers of a table. No transactions
/// or multi-key atomicity are assumed anywhere.
///
/// `map_get_all` answers `None` for a missing key, an empty map, or a key
/// holding something that is not a field map (scans step over the index set
/// this way).
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Set one field of a field map, creating the map if needed.
    async fn map_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Write several fields of a field map in one call.
    async fn map_set_all(&self, key: &str, entries: &[(String, String)]) -> Result<()>;

    async fn map_get_all(&self, key: &str) -> Result<Option<Vec<(String, String)>>>;

    /// Keys matching a glob pattern with a single `*` wildcard.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Remove the given keys, returning how many existed.
    async fn delete(&self, keys: Vec<String>) -> Result<u64>;
}

/// Key of one row's field map.
pub fn row_key(table: &str, id: &str) -> String {
    format!("{table}:{id}")
}

/// Key of a table's identifier set.
pub fn index_key(table: &str) -> String {
    format!("{table}:indices")
}

/// Match a key against a pattern containing at most one `*`.
pub fn key_matches(pattern: &str, key: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            key.len() >= prefix.len() + suffix.len()
                && key.starts_with(prefix)
                && key.ends_with(suffix)
        }
        None => pattern == key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_naming() {
        assert_eq!(row_key("widgets", "3"), "widgets:3");
        assert_eq!(index_key("widgets"), "widgets:indices");
    }

    #[test]
    fn pattern_matching() {
        assert!(key_matches("widgets:*", "widgets:1"));
        assert!(key_matches("widgets:*", "widgets:indices"));
        assert!(!key_matches("widgets:*", "gadgets:1"));
        assert!(key_matches("*:indices", "widgets:indices"));
        assert!(!key_matches("*:indices", "widgets:1"));
        assert!(key_matches("widgets:1", "widgets:1"));
    }
}
