use super::Store;
use crate::cache::{CacheKey, CacheNamespace};
use crate::error::{is_unique_violation, Error, Result};
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Raw JSON value of a cache entry.
    pub fn cache_lookup(&self, namespace: CacheNamespace, key: &CacheKey) -> Result<Option<String>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT value FROM memo_cache
                 WHERE namespace = ?1 AND scope = ?2 AND strategy = ?3 AND key_digest = ?4",
                params![namespace.as_str(), key.scope, key.strategy, key.digest()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Append-only insert. A second write for the same key is `Error::Conflict`.
    pub fn cache_insert(&self, namespace: CacheNamespace, key: &CacheKey, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        match conn.execute(
            "INSERT INTO memo_cache (namespace, scope, strategy, cache_key, key_digest, value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![namespace.as_str(), key.scope, key.strategy, key.key, key.digest(), value],
        ) {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::conflict(format!(
                "{} cache entry {}",
                namespace.as_str(),
                key
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count_cache_entries(&self, namespace: CacheNamespace) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memo_cache WHERE namespace = ?1",
            params![namespace.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
