use crate::assets::{AssetHandle, AssetOrigin, AssetSource, LoadedAsset};
use crate::error::{PoolError, Result};
use ahash::AHashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Continuation invoked when an async load settles
pub type LoadCallback = Box<dyn FnOnce(Result<LoadedAsset>) + Send>;

/// A key that settled during an [`ResourceCache::update`] tick
#[derive(Debug)]
pub struct LoadCompletion {
    pub key: String,
    pub result: Result<LoadedAsset>,
}

enum EntryState {
    /// One underlying load in flight; every caller that asked meanwhile
    /// waits here, in registration order.
    Loading {
        pending: SmallVec<[LoadCallback; 2]>,
    },
    Loaded(LoadedAsset),
    Failed(PoolError),
}

struct CacheEntry {
    state: EntryState,
}

/// Cache statistics
#[derive(Clone, Debug, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_loads: u64,
    pub failed_loads: u64,
}

/// Shared countdown for a preload batch
struct PreloadBatch {
    remaining: AtomicUsize,
    on_done: parking_lot::Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl PreloadBatch {
    fn settle_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            if let Some(cb) = self.on_done.lock().take() {
                cb();
            }
        }
    }
}

/// Keyed asset cache with deferred async loading.
///
/// Async here means deferred to a later [`update`](Self::update) tick, never
/// another thread: continuations registered through
/// [`load_async`](Self::load_async) are invoked at most once, in per-key FIFO
/// order, and never synchronously from the registration call.
pub struct ResourceCache {
    source: Box<dyn AssetSource>,
    entries: AHashMap<String, CacheEntry>,
    /// Keys whose underlying load runs on the next tick
    load_queue: VecDeque<String>,
    /// Already-settled callbacks waiting for the next tick
    deferred_hits: Vec<(String, Result<LoadedAsset>, Option<LoadCallback>)>,
    /// Batch completions with nothing left to wait for
    deferred_done: Vec<Box<dyn FnOnce() + Send>>,
    stats: CacheStats,
}

impl ResourceCache {
    pub fn new(source: Box<dyn AssetSource>) -> Self {
        Self {
            source,
            entries: AHashMap::new(),
            load_queue: VecDeque::new(),
            deferred_hits: Vec::new(),
            deferred_done: Vec::new(),
            stats: CacheStats::default(),
        }
    }

    /// Load `key` synchronously, inserting it into the cache on success.
    ///
    /// A key already being loaded asynchronously is completed here and now;
    /// its queued continuations still fire on the next tick.
    pub fn load(&mut self, key: &str) -> Result<AssetHandle> {
        if key.is_empty() {
            return Err(PoolError::InvalidKey);
        }

        let cached = match self.entries.get(key) {
            Some(CacheEntry {
                state: EntryState::Loaded(asset),
            }) => Some(asset.handle),
            Some(_) => None, // in flight or failed; retry now
            None => {
                self.stats.misses += 1;
                None
            }
        };

        match cached {
            Some(handle) => {
                self.stats.hits += 1;
                Ok(handle)
            }
            None => self.load_now(key),
        }
    }

    /// Run the underlying load and settle the entry (and any waiters).
    fn load_now(&mut self, key: &str) -> Result<AssetHandle> {
        self.stats.total_loads += 1;
        let result = self.source.load(key);

        let (pending, was_loading) = match self.entries.remove(key) {
            Some(CacheEntry {
                state: EntryState::Loading { pending },
            }) => (pending, true),
            _ => (SmallVec::new(), false),
        };

        let (state, settled) = match &result {
            Ok(asset) => (EntryState::Loaded(*asset), Ok(*asset)),
            Err(err) => {
                self.stats.failed_loads += 1;
                (EntryState::Failed(err.clone()), Err(err.clone()))
            }
        };
        self.entries.insert(key.to_string(), CacheEntry { state });

        // Waiters keep their next-tick delivery guarantee. An in-flight key
        // with no continuations still settles in the next tick's completion
        // list so requesters see it.
        if was_loading && pending.is_empty() {
            self.deferred_hits
                .push((key.to_string(), settled.clone(), None));
        }
        for cb in pending {
            self.deferred_hits
                .push((key.to_string(), settled.clone(), Some(cb)));
        }

        result.map(|asset| asset.handle)
    }

    /// Request `key` asynchronously; `cb` fires on a later tick with the
    /// outcome. Concurrent requests for the same key share one underlying
    /// load.
    pub fn load_async<F>(&mut self, key: &str, cb: F)
    where
        F: FnOnce(Result<LoadedAsset>) + Send + 'static,
    {
        if key.is_empty() {
            self.deferred_hits
                .push((String::new(), Err(PoolError::InvalidKey), Some(Box::new(cb))));
            return;
        }

        match self.entries.get_mut(key) {
            Some(entry) => match &mut entry.state {
                EntryState::Loaded(asset) => {
                    self.stats.hits += 1;
                    self.deferred_hits
                        .push((key.to_string(), Ok(*asset), Some(Box::new(cb))));
                }
                EntryState::Loading { pending } => {
                    pending.push(Box::new(cb));
                }
                EntryState::Failed(_) => {
                    // retry; the stale failure is replaced by a fresh attempt
                    entry.state = EntryState::Loading {
                        pending: SmallVec::from_iter([Box::new(cb) as LoadCallback]),
                    };
                    self.load_queue.push_back(key.to_string());
                }
            },
            None => {
                self.stats.misses += 1;
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        state: EntryState::Loading {
                            pending: SmallVec::from_iter([Box::new(cb) as LoadCallback]),
                        },
                    },
                );
                self.load_queue.push_back(key.to_string());
            }
        }
    }

    /// Start a load for `key` without registering a continuation.
    ///
    /// No-op if the key is already cached or in flight; the settle still
    /// shows up in the next tick's [`update`](Self::update) completions.
    pub fn request(&mut self, key: &str) {
        if key.is_empty() {
            return;
        }
        match self.entries.get(key) {
            Some(CacheEntry {
                state: EntryState::Loaded(asset),
            }) => {
                let settled = Ok(*asset);
                self.deferred_hits.push((key.to_string(), settled, None));
            }
            Some(CacheEntry {
                state: EntryState::Loading { .. },
            }) => {}
            Some(CacheEntry {
                state: EntryState::Failed(_),
            })
            | None => {
                // fresh attempt; a stale failure is not poisoning
                if !self.entries.contains_key(key) {
                    self.stats.misses += 1;
                }
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        state: EntryState::Loading {
                            pending: SmallVec::new(),
                        },
                    },
                );
                self.load_queue.push_back(key.to_string());
            }
        }
    }

    /// Whether `key` has a settled, loaded entry. Pure lookup.
    pub fn is_cached(&self, key: &str) -> bool {
        matches!(
            self.entries.get(key),
            Some(CacheEntry {
                state: EntryState::Loaded(_)
            })
        )
    }

    /// Loaded asset for `key`, if any. Pure lookup.
    pub fn get_cached(&self, key: &str) -> Option<AssetHandle> {
        match self.entries.get(key) {
            Some(CacheEntry {
                state: EntryState::Loaded(asset),
            }) => Some(asset.handle),
            _ => None,
        }
    }

    /// Origin tag of a loaded entry. Pure lookup.
    pub fn origin(&self, key: &str) -> Option<AssetOrigin> {
        match self.entries.get(key) {
            Some(CacheEntry {
                state: EntryState::Loaded(asset),
            }) => Some(asset.origin),
            _ => None,
        }
    }

    /// Release the entry for `key` and free the underlying asset.
    ///
    /// No-op with a warning if the key is absent or still loading. Resident
    /// entries are platform-managed and only leave on
    /// [`release_all`](Self::release_all).
    pub fn release(&mut self, key: &str) {
        match self.entries.get(key) {
            None => {
                warn!(key, "release: key not cached, ignoring");
            }
            Some(CacheEntry {
                state: EntryState::Loading { .. },
            }) => {
                warn!(key, "release: load in flight, ignoring");
            }
            Some(CacheEntry {
                state: EntryState::Loaded(asset),
            }) => {
                if asset.origin == AssetOrigin::Resident {
                    debug!(key, "release: resident entry, bulk-unload only");
                    return;
                }
                let handle = asset.handle;
                self.entries.remove(key);
                self.source.unload(key, handle);
            }
            Some(CacheEntry {
                state: EntryState::Failed(_),
            }) => {
                self.entries.remove(key);
            }
        }
    }

    /// Release every entry; full teardown.
    ///
    /// In-flight continuations settle with an error so no caller waits
    /// forever.
    pub fn release_all(&mut self) {
        let torn_down = |key: &str| PoolError::LoadFailed {
            key: key.to_string(),
            reason: "cache released".to_string(),
        };

        for (key, entry) in self.entries.drain() {
            match entry.state {
                EntryState::Loaded(asset) => self.source.unload(&key, asset.handle),
                EntryState::Loading { pending } => {
                    for cb in pending {
                        cb(Err(torn_down(&key)));
                    }
                }
                EntryState::Failed(_) => {}
            }
        }
        self.load_queue.clear();
        for (key, _, cb) in self.deferred_hits.drain(..) {
            if let Some(cb) = cb {
                cb(Err(torn_down(&key)));
            }
        }
        self.deferred_done.clear();
    }

    /// Release every loaded addressable entry whose key is not in `keep`.
    ///
    /// Scene-transition memory shedding; in-flight and resident entries
    /// stay.
    pub fn release_unused(&mut self, keep: &[&str]) {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, entry)| {
                matches!(
                    entry.state,
                    EntryState::Loaded(LoadedAsset {
                        origin: AssetOrigin::Addressable,
                        ..
                    })
                ) && !keep.contains(&key.as_str())
            })
            .map(|(key, _)| key.clone())
            .collect();

        debug!(count = doomed.len(), "release_unused: shedding entries");
        for key in doomed {
            if let Some(CacheEntry {
                state: EntryState::Loaded(asset),
            }) = self.entries.remove(&key)
            {
                self.source.unload(&key, asset.handle);
            }
        }
    }

    /// Fire async loads for every key and invoke `on_done` once all have
    /// settled. Failures are logged and counted as settled, not fatal to the
    /// batch.
    pub fn preload_async<F>(&mut self, keys: &[&str], on_done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if keys.is_empty() {
            self.deferred_done.push(Box::new(on_done));
            return;
        }

        let batch = Arc::new(PreloadBatch {
            remaining: AtomicUsize::new(keys.len()),
            on_done: parking_lot::Mutex::new(Some(Box::new(on_done))),
        });

        for &key in keys {
            let batch = batch.clone();
            let key_owned = key.to_string();
            self.load_async(key, move |result| {
                if let Err(err) = result {
                    warn!(key = %key_owned, %err, "preload: load failed");
                }
                batch.settle_one();
            });
        }
    }

    /// Per-tick pump: run queued loads, deliver deferred continuations, and
    /// report everything that settled this tick.
    pub fn update(&mut self) -> Vec<LoadCompletion> {
        let mut completions = Vec::new();

        // Only work registered before this tick; callbacks may queue more.
        let hits = std::mem::take(&mut self.deferred_hits);
        let queued: Vec<String> = self.load_queue.drain(..).collect();
        let done = std::mem::take(&mut self.deferred_done);

        for (key, result, cb) in hits {
            if let Some(cb) = cb {
                cb(result.clone());
            }
            completions.push(LoadCompletion { key, result });
        }

        for key in queued {
            // A sync load (or a release) may have settled this key already
            let still_loading = matches!(
                self.entries.get(&key),
                Some(CacheEntry {
                    state: EntryState::Loading { .. }
                })
            );
            if !still_loading {
                continue;
            }

            self.stats.total_loads += 1;
            let result = self.source.load(&key);

            let pending = match self.entries.remove(&key) {
                Some(CacheEntry {
                    state: EntryState::Loading { pending },
                }) => pending,
                _ => SmallVec::new(),
            };

            let settled = match &result {
                Ok(asset) => {
                    self.entries.insert(
                        key.clone(),
                        CacheEntry {
                            state: EntryState::Loaded(*asset),
                        },
                    );
                    Ok(*asset)
                }
                Err(err) => {
                    self.stats.failed_loads += 1;
                    self.entries.insert(
                        key.clone(),
                        CacheEntry {
                            state: EntryState::Failed(err.clone()),
                        },
                    );
                    Err(err.clone())
                }
            };

            for cb in pending {
                cb(settled.clone());
            }
            completions.push(LoadCompletion {
                key,
                result: settled,
            });
        }

        for cb in done {
            cb();
        }

        completions
    }

    /// Cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of entries (loaded, loading or failed)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
