//! Persistent tier abstraction.

use crate::cache::types::{CacheKey, Completion};
use crate::cache::CacheStats;

/// Key-to-bytes persistence used as the image cache's second tier.
///
/// Implementations swallow their own failures: a failed store leaves the key
/// uncached, a failed read looks like a miss. This lets the facade run
/// against the real [`DiskStore`](crate::cache::DiskStore), a memory-only
/// [`NoOpBlobStore`], or an instrumented double in tests.
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` under `key` off the calling thread.
    ///
    /// `completion`, if any, fires exactly once after the write finishes or
    /// fails.
    fn store(&self, key: &CacheKey, bytes: Vec<u8>, completion: Option<Completion>);

    /// Read the bytes stored for `key`. May block.
    fn read(&self, key: &CacheKey) -> Option<Vec<u8>>;

    /// Remove every persisted entry, then fire `completion` once.
    fn clear(&self, completion: Option<Completion>);

    /// Statistics for this tier.
    fn stats(&self) -> CacheStats {
        CacheStats::new()
    }
}

/// Blob store that persists nothing.
///
/// Stores and clears complete immediately; reads always miss. Used when the
/// cache runs memory-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpBlobStore;

impl BlobStore for NoOpBlobStore {
    fn store(&self, _key: &CacheKey, _bytes: Vec<u8>, completion: Option<Completion>) {
        if let Some(done) = completion {
            done();
        }
    }

    fn read(&self, _key: &CacheKey) -> Option<Vec<u8>> {
        None
    }

    fn clear(&self, completion: Option<Completion>) {
        if let Some(done) = completion {
            done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_completion(counter: &Arc<AtomicUsize>) -> Completion {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_noop_store_always_misses() {
        let store = NoOpBlobStore;
        let key = CacheKey::new("k");

        store.store(&key, vec![1, 2, 3], None);

        assert_eq!(store.read(&key), None);
    }

    #[test]
    fn test_noop_store_completes_immediately() {
        let store = NoOpBlobStore;
        let fired = Arc::new(AtomicUsize::new(0));

        store.store(&CacheKey::new("k"), vec![1], Some(counting_completion(&fired)));
        store.clear(Some(counting_completion(&fired)));

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_noop_store_as_trait_object() {
        let store: Arc<dyn BlobStore> = Arc::new(NoOpBlobStore);
        assert_eq!(store.read(&CacheKey::new("k")), None);
        assert_eq!(store.stats().disk_writes, 0);
    }
}
