//! LRU cache for fetched slice payloads.
//!
//! Slices are keyed by the full [`SliceRequest`] (file, axis, index and
//! histogram reference), so switching the reference never serves a stale
//! unmatched raster. The cache tracks the total payload size in bytes and
//! evicts least-recently-used entries once the capacity is exceeded.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

use super::source::SliceRequest;

/// Default cache capacity: 32MB
pub const DEFAULT_SLICE_CACHE_CAPACITY: usize = 32 * 1024 * 1024;

/// Upper bound on entries regardless of size
const DEFAULT_MAX_ENTRIES: usize = 2_048;

/// Size-bounded LRU cache of encoded slice payloads.
///
/// # Example
///
/// ```
/// use landmark_annotator::service::{SliceCache, SliceRequest};
/// use landmark_annotator::volume::Axis;
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = SliceCache::new();
///
///     let plain = SliceRequest::new("case01.nii.gz", Axis::Axial, 12);
///     let matched = plain.clone().with_reference("case02.nii.gz");
///     let png = Bytes::from(vec![0x89, b'P', b'N', b'G']); // PNG signature
///
///     cache.put(plain.clone(), png.clone()).await;
///
///     assert_eq!(cache.get(&plain).await, Some(png));
///     // A histogram-matched slice is a different entry
///     assert!(cache.get(&matched).await.is_none());
/// }
/// ```
pub struct SliceCache {
    cache: RwLock<LruCache<SliceRequest, Bytes>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl SliceCache {
    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SLICE_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `max_size` bytes of payload.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache bounded by both bytes and entry count.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(entries)),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Look up a payload, marking it recently used.
    pub async fn get(&self, key: &SliceRequest) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check for a payload without touching LRU order.
    pub async fn contains(&self, key: &SliceRequest) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a payload, evicting LRU entries until back under capacity.
    pub async fn put(&self, key: SliceRequest, data: Bytes) {
        let data_size = data.len();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        // `push` hands back either the replaced value for this key or the
        // entry evicted by the entry-count bound.
        if let Some((_, displaced)) = cache.push(key, data) {
            *current_size = current_size.saturating_sub(displaced.len());
        }
        *current_size += data_size;

        while *current_size > self.max_size {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current_size = current_size.saturating_sub(evicted.len());
                }
                None => break,
            }
        }
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Current total payload size in bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    /// Maximum payload size in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for SliceCache {
    fn default() -> Self {
        Self::new()
    }
}
