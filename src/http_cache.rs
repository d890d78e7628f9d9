use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use reqwest::Url;

/// Endpoint plus sorted query params, so `?a=1&b=2` and `?b=2&a=1` share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(endpoint: &str, params: &[(&str, String)]) -> Self {
        let mut params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        params.sort();
        Self {
            endpoint: endpoint.to_string(),
            params,
        }
    }

    pub fn from_url(raw: &str) -> Self {
        let Ok(url) = Url::parse(raw) else {
            return Self {
                endpoint: raw.to_string(),
                params: Vec::new(),
            };
        };
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.sort();
        let mut endpoint = url.clone();
        endpoint.set_query(None);
        endpoint.set_fragment(None);
        Self {
            endpoint: endpoint.to_string(),
            params,
        }
    }
}

#[derive(Debug)]
struct CacheEntry<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

/// Memoizes fetch results as immutable snapshots.
///
/// Entries are only ever replaced whole; readers holding an `Arc` keep their
/// snapshot after `clear`. Failed fetches are not stored.
#[derive(Debug)]
pub struct FetchCache<T> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<T>>>,
    ttl: Option<Duration>,
}

impl<T> FetchCache<T> {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<T>> {
        let guard = self.entries.read().expect("fetch cache lock poisoned");
        let entry = guard.get(key)?;
        if self.is_expired(entry) {
            return None;
        }
        Some(Arc::clone(&entry.value))
    }

    pub fn insert(&self, key: CacheKey, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut guard = self.entries.write().expect("fetch cache lock poisoned");
        guard.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                fetched_at: Instant::now(),
            },
        );
        value
    }

    pub fn get_or_try_insert_with<E>(
        &self,
        key: &CacheKey,
        fetch: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = fetch()?;
        Ok(self.insert(key.clone(), value))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }

    pub fn clear(&self) {
        let mut guard = self.entries.write().expect("fetch cache lock poisoned");
        guard.clear();
    }

    pub fn len(&self) -> usize {
        let guard = self.entries.read().expect("fetch cache lock poisoned");
        guard.values().filter(|entry| !self.is_expired(entry)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry<T>) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.fetched_at.elapsed() >= ttl)
    }
}

impl<T> Default for FetchCache<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use super::{CacheKey, FetchCache};

    #[test]
    fn key_ignores_param_order() {
        let a = CacheKey::from_url("https://x.test/api/physical/?season=2&competition=1");
        let b = CacheKey::from_url("https://x.test/api/physical/?competition=1&season=2");
        assert_eq!(a, b);
        assert_eq!(a.endpoint, "https://x.test/api/physical/");
        assert_eq!(
            a,
            CacheKey::new(
                "https://x.test/api/physical/",
                &[("competition", "1".to_string()), ("season", "2".to_string())]
            )
        );
    }

    #[test]
    fn second_lookup_skips_fetch() {
        let cache: FetchCache<Vec<u32>> = FetchCache::new(None);
        let key = CacheKey::from_url("https://x.test/api/matches/?user=true");
        let calls = Cell::new(0);
        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(&key, || {
                    calls.set(calls.get() + 1);
                    Ok::<_, String>(vec![1, 2, 3])
                })
                .expect("fetch ok");
            assert_eq!(value.len(), 3);
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache: FetchCache<u32> = FetchCache::new(None);
        let key = CacheKey::from_url("https://x.test/api/matches/");
        let err = cache.get_or_try_insert_with(&key, || Err::<u32, _>("boom"));
        assert!(err.is_err());
        assert!(!cache.contains(&key));
        let ok = cache.get_or_try_insert_with(&key, || Ok::<_, &str>(7));
        assert_eq!(*ok.expect("second attempt"), 7);
    }

    #[test]
    fn clear_keeps_outstanding_snapshots() {
        let cache: FetchCache<String> = FetchCache::default();
        let key = CacheKey::from_url("https://x.test/api/competition_editions/?user=true");
        let snapshot = cache.insert(key.clone(), "v1".to_string());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(snapshot.as_str(), "v1");
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let cache: FetchCache<u8> = FetchCache::new(Some(Duration::ZERO));
        let key = CacheKey::from_url("https://x.test/a");
        cache.insert(key.clone(), 1);
        assert!(cache.get(&key).is_none());
    }
}
