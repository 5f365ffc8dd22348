use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chauffeur_core::model::PageRequest;
use tokio::time::Instant;

use super::EntityKind;

/// How long a cached list page is served without refetching.
pub const LIST_STALE_AFTER: Duration = Duration::from_secs(30);

/// Cache key for one list query.
#[must_use]
pub fn list_key(kind: EntityKind, request: &PageRequest) -> String {
    format!(
        "{}:list:page={}:limit={}:search={}",
        kind.as_str(),
        request.page(),
        request.limit(),
        request.search().unwrap_or_default()
    )
}

/// Short-lived cache of list query results, keyed by query.
///
/// Invalidation bumps an epoch; a fetch that started before the bump does
/// not write its result back.
#[derive(Clone)]
pub struct QueryCache<T> {
    entries: Arc<Mutex<HashMap<String, (Instant, T)>>>,
    epoch: Arc<AtomicU64>,
    stale_after: Duration,
}

impl<T: Clone> QueryCache<T> {
    #[must_use]
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            epoch: Arc::new(AtomicU64::new(0)),
            stale_after,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Instant, T)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A fresh entry, if any. Stale entries are dropped on read.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.stale_after => {
                Some(value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value and prune every expired entry.
    pub fn put(&self, key: impl Into<String>, value: T) {
        let stale_after = self.stale_after;
        let mut entries = self.lock();
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < stale_after);
        entries.insert(key.into(), (Instant::now(), value));
    }

    /// Serve from cache or run `fetch` and store its result. Errors are not cached.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` returns.
    pub async fn get_or_fetch<E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let epoch = self.epoch.load(Ordering::Acquire);
        let value = fetch().await?;
        // the guard and the insert share the lock with `invalidate_prefix`
        let stale_after = self.stale_after;
        let mut entries = self.lock();
        if self.epoch.load(Ordering::Acquire) == epoch {
            entries.retain(|_, (stored_at, _)| stored_at.elapsed() < stale_after);
            entries.insert(key.to_owned(), (Instant::now(), value.clone()));
        } else {
            tracing::debug!(key, "list fetch overtaken by invalidation, not cached");
        }
        Ok(value)
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many went.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.lock();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_keys_cover_page_limit_and_search() {
        let request = PageRequest::new(2, 25).with_search(" ada ");
        assert_eq!(
            list_key(EntityKind::User, &request),
            "user:list:page=2:limit=25:search=ada"
        );
        assert_ne!(
            list_key(EntityKind::User, &PageRequest::first()),
            list_key(EntityKind::Video, &PageRequest::first())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn entries_go_stale() {
        let cache = QueryCache::new(Duration::from_secs(30));
        cache.put("k", 1);
        assert_eq!(cache.get("k"), Some(1));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn fetch_runs_once_while_fresh() {
        let cache = QueryCache::new(LIST_STALE_AFTER);
        let mut calls = 0;
        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .get_or_fetch("k", || {
                    calls += 1;
                    async { Ok(7) }
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn invalidation_is_scoped_by_prefix() {
        let cache = QueryCache::new(LIST_STALE_AFTER);
        cache.put("user:list:page=1", 1);
        cache.put("user:list:page=2", 2);
        cache.put("video:list:page=1", 3);

        assert_eq!(cache.invalidate_prefix("user:list:"), 2);
        assert_eq!(cache.get("video:list:page=1"), Some(3));
    }

    #[tokio::test]
    async fn fetch_overtaken_by_invalidation_is_not_cached() {
        let cache = QueryCache::new(LIST_STALE_AFTER);
        let (release, released) = tokio::sync::oneshot::channel::<()>();

        let in_flight = cache.get_or_fetch("user:list:page=1", || async move {
            released.await.map_err(|_| ())?;
            Ok::<_, ()>("before create")
        });
        let mutation = async {
            tokio::task::yield_now().await;
            assert_eq!(cache.invalidate_prefix("user:list:"), 0);
            release.send(()).unwrap();
        };
        let (value, ()) = tokio::join!(in_flight, mutation);

        assert_eq!(value, Ok("before create"));
        assert_eq!(cache.get("user:list:page=1"), None);

        let next: Result<&str, ()> = cache
            .get_or_fetch("user:list:page=1", || async { Ok("after create") })
            .await;
        assert_eq!(next, Ok("after create"));
        assert_eq!(cache.get("user:list:page=1"), Some("after create"));
    }

    #[tokio::test(start_paused = true)]
    async fn put_prunes_expired_entries() {
        let cache = QueryCache::new(Duration::from_secs(30));
        cache.put("user:list:search=a", 1);
        cache.put("user:list:search=ab", 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        cache.put("user:list:search=abc", 3);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("user:list:search=abc"), Some(3));
    }
}
