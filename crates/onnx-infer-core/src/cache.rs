//! The session cache (C3): single-flight load, TTL expiry, LRU eviction
//! over a process-wide map from blob id to live inference session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

use crate::blob::BlobStore;
use crate::error::{InferError, Result};
use crate::session::{InferenceSession, SessionLoader};

/// Tuning knobs applied uniformly to every session the cache constructs.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum resident entries. `0` disables size-based eviction.
    pub capacity: usize,
    /// Entries older than this are treated as a miss. `Duration::ZERO`
    /// disables TTL expiry.
    pub ttl: Duration,
    /// Emit `cache_hit`/`cache_miss`/`cache_evict`/`cache_expired`/
    /// `cache_load_complete` events at `debug`. Off by default since these
    /// fire on every lookup.
    pub verbose_logging: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            ttl: Duration::ZERO,
            verbose_logging: false,
        }
    }
}

struct Entry {
    session: Arc<dyn InferenceSession>,
    loaded_at: Instant,
    last_used: Instant,
}

/// Normalize any well-formed identifier representation to a single
/// canonical lowercase-hex form, mirroring how a Mongo `ObjectId` is
/// accepted in either case. Anything that isn't 24 hex characters is
/// rejected as an invalid key, rather than silently treated as a fresh
/// cache slot.
pub fn normalize_key(raw: &str) -> Result<String> {
    if raw.len() == 24 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(raw.to_ascii_lowercase())
    } else {
        Err(InferError::InvalidInput(format!(
            "not a valid blob identifier: {raw}"
        )))
    }
}

/// Single-flight, TTL, LRU cache of live inference sessions keyed by blob
/// id.
///
/// Lock ordering: a per-key mutex (one per in-flight or resident key) is
/// always acquired before the short-held global mutex guarding the entry
/// map itself. The global mutex is never held across an `.await`.
pub struct SessionCache {
    config: CacheConfig,
    blob: Arc<dyn BlobStore>,
    loader: Arc<dyn SessionLoader>,
    entries: StdMutex<HashMap<String, Entry>>,
    key_locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionCache {
    pub fn new(config: CacheConfig, blob: Arc<dyn BlobStore>, loader: Arc<dyn SessionLoader>) -> Self {
        Self {
            config,
            blob,
            loader,
            entries: StdMutex::new(HashMap::new()),
            key_locks: StdMutex::new(HashMap::new()),
        }
    }

    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.key_locks.lock().unwrap();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Returns the session if present and not TTL-expired, touching
    /// `last_used`. Removes and returns `None` if expired.
    fn get_if_fresh(&self, key: &str) -> Option<Arc<dyn InferenceSession>> {
        let mut entries = self.entries.lock().unwrap();
        let expired = match entries.get(key) {
            Some(entry) => {
                self.config.ttl > Duration::ZERO && entry.loaded_at.elapsed() > self.config.ttl
            }
            None => return None,
        };
        if expired {
            entries.remove(key);
            if self.config.verbose_logging {
                tracing::debug!(event = "cache_expired", key = %key, "cache entry expired");
            }
            return None;
        }
        let entry = entries.get_mut(key).expect("checked above");
        entry.last_used = Instant::now();
        Some(entry.session.clone())
    }

    fn insert_and_evict(&self, key: String, session: Arc<dyn InferenceSession>) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            Entry {
                session,
                loaded_at: now,
                last_used: now,
            },
        );
        if self.config.capacity == 0 {
            return;
        }
        while entries.len() > self.config.capacity {
            let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            entries.remove(&victim);
            if self.config.verbose_logging {
                tracing::debug!(event = "cache_evict", key = %victim, "cache entry evicted");
            }
        }
    }

    /// Returns a live session for `blob_id`, loading it on miss. Concurrent
    /// callers for the same key observe exactly one load.
    pub async fn get(&self, blob_id: &str) -> Result<Arc<dyn InferenceSession>> {
        let key = normalize_key(blob_id)?;

        if let Some(session) = self.get_if_fresh(&key) {
            if self.config.verbose_logging {
                tracing::debug!(event = "cache_hit", key = %key, "cache hit");
            }
            return Ok(session);
        }

        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        if let Some(session) = self.get_if_fresh(&key) {
            if self.config.verbose_logging {
                tracing::debug!(event = "cache_hit", key = %key, "cache hit after lock wait");
            }
            return Ok(session);
        }

        if self.config.verbose_logging {
            tracing::debug!(event = "cache_miss", key = %key, "cache miss, loading");
        }
        let bytes = self
            .blob
            .read(&key)
            .await
            .map_err(|e| InferError::StorageUnavailable(e.to_string()))?;
        let session = self.loader.load(bytes).await?;
        self.insert_and_evict(key.clone(), session.clone());
        if self.config.verbose_logging {
            tracing::debug!(event = "cache_load_complete", key = %key, "cache load complete");
        }
        Ok(session)
    }

    /// Best-effort removal of one entry.
    pub fn invalidate(&self, blob_id: &str) {
        if let Ok(key) = normalize_key(blob_id) {
            self.entries.lock().unwrap().remove(&key);
        }
    }

    /// Best-effort removal of every entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    #[cfg(test)]
    fn contains(&self, blob_id: &str) -> bool {
        let key = normalize_key(blob_id).unwrap();
        self.entries.lock().unwrap().contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::ModelSignature;
    use crate::tensor::TensorData;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    struct FakeSession;

    #[async_trait]
    impl InferenceSession for FakeSession {
        fn signature(&self) -> ModelSignature {
            unimplemented!("not exercised by cache tests")
        }

        async fn run(&self, _input: TensorData, _dims: &[u64]) -> Result<(Vec<u64>, TensorData)> {
            unimplemented!("not exercised by cache tests")
        }
    }

    struct CountingBlob {
        reads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BlobStore for CountingBlob {
        async fn read(&self, _blob_id: &str) -> Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(5)).await;
            Ok(vec![0u8; 4])
        }
    }

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionLoader for CountingLoader {
        async fn load(&self, _bytes: Vec<u8>) -> Result<Arc<dyn InferenceSession>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeSession))
        }
    }

    fn make_cache(config: CacheConfig) -> (Arc<SessionCache>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let loads = Arc::new(AtomicUsize::new(0));
        let blob = Arc::new(CountingBlob {
            reads: reads.clone(),
        });
        let loader = Arc::new(CountingLoader {
            loads: loads.clone(),
        });
        (
            Arc::new(SessionCache::new(config, blob, loader)),
            reads,
            loads,
        )
    }

    const KEY: &str = "000000000000000000000001";

    #[tokio::test]
    async fn p1_single_flight_under_concurrent_burst() {
        let (cache, reads, loads) = make_cache(CacheConfig::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get(KEY).await.unwrap() }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn p2_lru_evicts_oldest_touch() {
        let (cache, _reads, _loads) = make_cache(CacheConfig {
            capacity: 2,
            ttl: Duration::ZERO,
            verbose_logging: false,
        });
        let k1 = "000000000000000000000001";
        let k2 = "000000000000000000000002";
        let k3 = "000000000000000000000003";
        cache.get(k1).await.unwrap();
        cache.get(k2).await.unwrap();
        cache.get(k3).await.unwrap();
        assert!(!cache.contains(k1));
        assert!(cache.contains(k2));
        assert!(cache.contains(k3));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn p3_ttl_expiry_triggers_reload() {
        let (cache, reads, _loads) = make_cache(CacheConfig {
            capacity: 64,
            ttl: Duration::from_millis(20),
            verbose_logging: false,
        });
        cache.get(KEY).await.unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.get(KEY).await.unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_key_rejected() {
        let (cache, _reads, _loads) = make_cache(CacheConfig::default());
        let err = cache.get("not-an-id").await.unwrap_err();
        assert!(matches!(err, InferError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn invalidate_then_clear() {
        let (cache, reads, _loads) = make_cache(CacheConfig::default());
        cache.get(KEY).await.unwrap();
        cache.invalidate(KEY);
        assert!(!cache.contains(KEY));
        cache.get(KEY).await.unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
