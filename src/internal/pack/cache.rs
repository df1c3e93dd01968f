//! Decoded object-stream cache.
//!
//! Delta chains make re-reading the same pack entry expensive; this cache
//! keeps recently produced streams alive for a short window keyed by
//! `(pack path, offset)`. Hits hand out a fresh [`SharedStream`] handle over
//! the retained stream, so repeated delta resolution against a hot base is
//! amortised to a seek.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::internal::{object::types::ObjectType, stream::SharedStream};

/// How long an unused stream stays resident.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);
/// Ceiling on resident streams; oldest beyond it are trimmed.
pub const DEFAULT_CAPACITY: usize = 16;

/// One resident decoded stream.
struct CacheHolder {
    pack: PathBuf,
    offset: u64,
    kind: ObjectType,
    stream: SharedStream,
    expires: Instant,
    hits: u64,
}

struct CacheInner {
    /// Front is most recently used.
    holders: VecDeque<CacheHolder>,
    /// Invalidates timers armed before a membership change.
    epoch: u64,
}

/// LRU + TTL cache of decoded object streams.
pub struct StreamCache {
    inner: Arc<Mutex<CacheInner>>,
    ttl: Duration,
    capacity: usize,
}

impl StreamCache {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_TTL, DEFAULT_CAPACITY)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        StreamCache {
            inner: Arc::new(Mutex::new(CacheInner {
                holders: VecDeque::new(),
                epoch: 0,
            })),
            ttl,
            capacity,
        }
    }

    /// Look up `(pack, offset)`. A hit refreshes recency and TTL and
    /// returns a fresh handle positioned at 0.
    pub fn get(&self, pack: &Path, offset: u64) -> Option<(ObjectType, SharedStream)> {
        let mut evicted = Vec::new();
        let result = {
            let mut inner = self.inner.lock().expect("stream cache poisoned");
            Self::sweep_expired(&mut inner, &mut evicted);
            let pos = inner
                .holders
                .iter()
                .position(|h| h.offset == offset && h.pack == pack)?;
            let mut holder = inner.holders.remove(pos).expect("position just found");
            holder.expires = Instant::now() + self.ttl;
            holder.hits += 1;
            // Clone before the holder re-enters the shared list, so the
            // handle returned to the caller can never observe refcount 0.
            let handle = holder.stream.reopen();
            let kind = holder.kind;
            inner.holders.push_front(holder);
            inner.epoch += 1;
            self.arm_timer(&inner);
            Some((kind, handle))
        };
        // Evicted streams are dropped outside the lock; disposing one can
        // cascade into further disposals.
        drop(evicted);
        result
    }

    /// Insert a freshly decoded stream at the front.
    pub fn insert(&self, pack: &Path, offset: u64, kind: ObjectType, stream: &SharedStream) {
        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.lock().expect("stream cache poisoned");
            Self::sweep_expired(&mut inner, &mut evicted);
            if let Some(pos) = inner
                .holders
                .iter()
                .position(|h| h.offset == offset && h.pack == pack)
            {
                evicted.extend(inner.holders.remove(pos));
            }
            inner.holders.push_front(CacheHolder {
                pack: pack.to_path_buf(),
                offset,
                kind,
                stream: stream.reopen(),
                expires: Instant::now() + self.ttl,
                hits: 0,
            });
            while inner.holders.len() > self.capacity {
                if let Some(h) = inner.holders.pop_back() {
                    tracing::debug!(pack = %h.pack.display(), offset = h.offset, hits = h.hits, "stream cache trim");
                    evicted.push(h);
                }
            }
            inner.epoch += 1;
            self.arm_timer(&inner);
        }
        drop(evicted);
    }

    /// Drop every resident stream.
    pub fn flush(&self) {
        let drained: Vec<CacheHolder> = {
            let mut inner = self.inner.lock().expect("stream cache poisoned");
            inner.epoch += 1;
            inner.holders.drain(..).collect()
        };
        drop(drained);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("stream cache poisoned").holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep_expired(inner: &mut CacheInner, evicted: &mut Vec<CacheHolder>) {
        let now = Instant::now();
        let mut i = 0;
        while i < inner.holders.len() {
            if inner.holders[i].expires <= now {
                evicted.extend(inner.holders.remove(i));
            } else {
                i += 1;
            }
        }
    }

    /// Re-arm the single eviction timer to the earliest TTL.
    ///
    /// Timer eviction is best-effort: without an ambient tokio runtime the
    /// cache still expires entries opportunistically on every access.
    fn arm_timer(&self, inner: &CacheInner) {
        let Some(earliest) = inner.holders.iter().map(|h| h.expires).min() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let epoch = inner.epoch;
        handle.spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(earliest)).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut evicted = Vec::new();
            {
                let mut guard = inner.lock().expect("stream cache poisoned");
                // A membership change re-armed a newer timer; stand down.
                if guard.epoch != epoch {
                    return;
                }
                Self::sweep_expired(&mut guard, &mut evicted);
            }
            drop(evicted);
        });
    }
}

impl Default for StreamCache {
    fn default() -> Self {
        Self::new()
    }
}
