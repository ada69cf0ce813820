use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

/// Lifetime of every cached read.
pub const CACHE_TTL: Duration = Duration::from_millis(5000);

/// In-process memo of GET payloads keyed by canonical request path. A miss only
/// costs a spreadsheet read, so nothing here is ever authoritative.
///
/// Every invalidation bumps a generation counter for the invalidated path. A
/// reader samples [`ResponseCache::generation`] before going to the sheet and
/// stores its result with [`ResponseCache::put_if_unchanged`], which refuses
/// the payload when any enclosing path was invalidated in the meantime.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    generations: DashMap<String, u64>,
    ttl: Duration,
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generations: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn put(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), self.entry(value));
    }

    /// Sum of the invalidation counters of `key` and each of its ancestor paths.
    /// Counters only grow, so any invalidation covering `key` changes the sum.
    pub fn generation(&self, key: &str) -> u64 {
        scopes(key)
            .filter_map(|scope| self.generations.get(scope).map(|g| *g))
            .sum()
    }

    /// Store `value` only if nothing covering `key` was invalidated since
    /// `seen` was sampled. Returns whether the value was stored.
    pub fn put_if_unchanged(&self, key: impl Into<String>, value: Value, seen: u64) -> bool {
        // The entry guard holds the shard lock, and invalidations bump the
        // counter before they sweep entries, so a concurrent sweep either shows
        // up in the check below or removes what was inserted.
        let slot = self.entries.entry(key.into());
        if self.generation(slot.key()) != seen {
            return false;
        }
        slot.insert(self.entry(value));
        true
    }

    pub fn invalidate(&self, key: &str) {
        self.bump(key);
        self.entries.remove(key);
    }

    /// Drop `prefix` itself and every path below it.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.bump(prefix);
        let nested = format!("{prefix}/");
        self.entries
            .retain(|key, _| key != prefix && !key.starts_with(&nested));
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn bump(&self, scope: &str) {
        *self.generations.entry(scope.to_string()).or_insert(0) += 1;
    }

    fn entry(&self, value: Value) -> CacheEntry {
        CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        }
    }
}

/// `key` and every `/`-bounded prefix of it.
fn scopes(key: &str) -> impl Iterator<Item = &str> {
    key.match_indices('/')
        .map(move |(at, _)| &key[..at])
        .filter(|scope| !scope.is_empty())
        .chain(std::iter::once(key))
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

pub fn project_key(project_id: Uuid) -> String {
    format!("/api/{project_id}")
}

pub fn collection_key(project_id: Uuid, endpoint_name: &str) -> String {
    format!("/api/{project_id}/{endpoint_name}")
}

pub fn item_key(project_id: Uuid, endpoint_name: &str, item_id: u64) -> String {
    format!("/api/{project_id}/{endpoint_name}/{item_id}")
}
