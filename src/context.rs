//! Platform composition: the loader-pool bridge and the public API surface.
//!
//! A [`Context`] owns the resource cache, the pool registry, the despawn
//! scheduler and the host's instantiation provider, and wires them into the
//! load-then-pool-then-spawn path every subsystem uses. All state lives
//! behind the context; collaborators hold keys and [`InstanceKey`]s, never
//! references into the internals.
//!
//! Most hosts construct one `Context` at their outermost composition point.
//! A thin process-wide default is available through [`install`] /
//! [`with_global`] for subsystems that cannot be handed one.

use crate::assets::{AssetHandle, AssetSource, CacheStats, LoadedAsset, ResourceCache};
use crate::error::{PoolError, Result};
use crate::manifest::PoolManifest;
use crate::pooling::{InstanceKey, PendingDespawn, PoolConfig, PoolInfo, PoolRegistry};
use crate::provider::{ContainerHandle, Instantiator, Placement};
use crate::scheduler::{Scheduler, TimerToken};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Callback for the combined load+pool+spawn path
pub type ReadyCallback = Box<dyn FnOnce(Result<InstanceKey>) + Send>;

/// Sizing applied to pools the bridge creates on first use
#[derive(Clone, Copy, Debug)]
struct DefaultSizing {
    initial: u32,
    max: u32,
    can_expand: bool,
}

enum PendingOp {
    /// ensure_instance caller waiting for the asset
    Spawn {
        placement: Placement,
        on_ready: ReadyCallback,
    },
    /// prepare_pool caller: create the pool, no spawn
    Prepare {
        initial: u32,
        max: u32,
        can_expand: bool,
        on_ready: Box<dyn FnOnce(Result<()>) + Send>,
    },
}

/// The platform's asset/pooling runtime.
pub struct Context {
    cache: ResourceCache,
    registry: PoolRegistry,
    provider: Box<dyn Instantiator>,
    timers: Scheduler<PendingDespawn>,
    /// Callers queued per address while its asset loads, in arrival order
    pending: AHashMap<String, Vec<PendingOp>>,
    default_sizing: DefaultSizing,
    default_container: ContainerHandle,
}

impl Context {
    pub fn new(source: Box<dyn AssetSource>, provider: Box<dyn Instantiator>) -> Self {
        Self {
            cache: ResourceCache::new(source),
            registry: PoolRegistry::new(),
            provider,
            timers: Scheduler::new(),
            pending: AHashMap::new(),
            default_sizing: DefaultSizing {
                initial: 0,
                max: u32::MAX,
                can_expand: false,
            },
            default_container: ContainerHandle::default(),
        }
    }

    /// Container node bridge-created pools hang their instances under
    pub fn set_default_container(&mut self, container: ContainerHandle) {
        self.default_container = container;
    }

    // ---- cache surface -----------------------------------------------------

    /// Blocking load; cached keys return immediately.
    pub fn load(&mut self, key: &str) -> Result<AssetHandle> {
        self.cache.load(key)
    }

    /// Deferred load; `cb` fires on a later [`update`](Self::update) tick.
    pub fn load_async<F>(&mut self, key: &str, cb: F)
    where
        F: FnOnce(Result<LoadedAsset>) + Send + 'static,
    {
        self.cache.load_async(key, cb);
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.is_cached(key)
    }

    pub fn get_cached(&self, key: &str) -> Option<AssetHandle> {
        self.cache.get_cached(key)
    }

    /// Release a cached asset.
    ///
    /// Does not cascade into pools: a pool still built on the asset is a
    /// caller error and is flagged, nothing more.
    pub fn release(&mut self, key: &str) {
        if self.registry.has_pool(key) {
            warn!(key, "release: a pool still references this asset");
        }
        self.cache.release(key);
    }

    /// Release every cached asset.
    ///
    /// Bridge callers still queued on an in-flight load are settled with a
    /// load-failed error first; nobody waits on a cache that no longer
    /// exists.
    pub fn release_all(&mut self) {
        self.fail_pending("cache released");
        self.cache.release_all();
    }

    fn fail_pending(&mut self, reason: &str) {
        for (key, ops) in self.pending.drain() {
            for op in ops {
                let err = PoolError::LoadFailed {
                    key: key.clone(),
                    reason: reason.to_string(),
                };
                match op {
                    PendingOp::Spawn { on_ready, .. } => on_ready(Err(err)),
                    PendingOp::Prepare { on_ready, .. } => on_ready(Err(err)),
                }
            }
        }
    }

    pub fn release_unused(&mut self, keep: &[&str]) {
        self.cache.release_unused(keep);
    }

    pub fn preload_async<F>(&mut self, keys: &[&str], on_done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cache.preload_async(keys, on_done);
    }

    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    // ---- pool surface ------------------------------------------------------

    pub fn create_pool(&mut self, config: PoolConfig) -> Result<()> {
        self.registry.create_pool(config, self.provider.as_mut())
    }

    pub fn spawn(&mut self, pool: &str) -> Result<InstanceKey> {
        self.registry.spawn(pool, self.provider.as_mut())
    }

    pub fn spawn_at(&mut self, pool: &str, placement: Placement) -> Result<InstanceKey> {
        self.registry.spawn_at(pool, placement, self.provider.as_mut())
    }

    pub fn despawn(&mut self, pool: &str, instance: InstanceKey) -> Result<()> {
        self.registry.despawn(pool, instance, self.provider.as_mut())
    }

    /// Despawn without naming the pool; scans every pool for the owner.
    pub fn despawn_instance(&mut self, instance: InstanceKey) -> Result<()> {
        self.registry.despawn_instance(instance, self.provider.as_mut())
    }

    /// Schedule a despawn after `delay`.
    ///
    /// The timer is bound to this spawn of the instance: a manual despawn,
    /// a respawn of the slot, or destroying the pool all invalidate it.
    pub fn despawn_after(
        &mut self,
        pool: &str,
        instance: InstanceKey,
        delay: Duration,
    ) -> Result<TimerToken> {
        match self.registry.pending_despawn(pool, instance) {
            Some(pending) => Ok(self.timers.after(delay, pending)),
            None if !self.registry.has_pool(pool) => {
                Err(PoolError::PoolNotFound(pool.to_string()))
            }
            None => Err(PoolError::OrphanInstance),
        }
    }

    /// Cancel a scheduled despawn explicitly
    pub fn cancel_despawn(&mut self, token: TimerToken) -> bool {
        self.timers.cancel(token)
    }

    pub fn despawn_all(&mut self, pool: &str) -> Result<()> {
        self.registry.despawn_all(pool, self.provider.as_mut())
    }

    pub fn despawn_all_pools(&mut self) -> Result<()> {
        self.registry.despawn_all_pools(self.provider.as_mut())
    }

    pub fn destroy_pool(&mut self, pool: &str) -> Result<()> {
        self.registry.destroy_pool(pool, self.provider.as_mut())
    }

    pub fn destroy_all_pools(&mut self) -> Result<()> {
        self.registry.destroy_all(self.provider.as_mut())
    }

    pub fn has_pool(&self, pool: &str) -> bool {
        self.registry.has_pool(pool)
    }

    pub fn pool_info(&self, pool: &str) -> Option<PoolInfo> {
        self.registry.info(pool)
    }

    // ---- bridge ------------------------------------------------------------

    /// Get an instance for `address`, loading the asset and creating its
    /// pool on first use.
    ///
    /// If a pool named `address` already exists the spawn happens here and
    /// now. Otherwise the caller is queued on the (coalesced) async load and
    /// served, in arrival order, once it settles. Exactly one pool per
    /// address is created no matter how many callers race.
    pub fn ensure_instance<F>(&mut self, address: &str, placement: Placement, on_ready: F)
    where
        F: FnOnce(Result<InstanceKey>) + Send + 'static,
    {
        if address.is_empty() {
            on_ready(Err(PoolError::InvalidKey));
            return;
        }
        if self.registry.has_pool(address) {
            let result = self.spawn_at(address, placement);
            on_ready(result);
            return;
        }

        self.pending
            .entry(address.to_string())
            .or_default()
            .push(PendingOp::Spawn {
                placement,
                on_ready: Box::new(on_ready),
            });
        self.cache.request(address);
    }

    /// Load `address` and create its pool with the given sizing, without
    /// spawning anything. `on_ready` fires once the pool exists (or the
    /// load failed).
    pub fn prepare_pool<F>(
        &mut self,
        address: &str,
        initial: u32,
        max: u32,
        can_expand: bool,
        on_ready: F,
    ) where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        if address.is_empty() {
            on_ready(Err(PoolError::InvalidKey));
            return;
        }
        if self.registry.has_pool(address) {
            on_ready(Ok(()));
            return;
        }

        self.pending
            .entry(address.to_string())
            .or_default()
            .push(PendingOp::Prepare {
                initial,
                max,
                can_expand,
                on_ready: Box::new(on_ready),
            });
        self.cache.request(address);
    }

    /// Warm up every pool a manifest lists; `on_done` fires once all of
    /// them settled (load failures are logged, not fatal to the batch).
    pub fn apply_manifest<F>(&mut self, manifest: &PoolManifest, on_done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if manifest.pools.is_empty() {
            on_done();
            return;
        }

        let remaining = Arc::new(AtomicUsize::new(manifest.pools.len()));
        let on_done = Arc::new(Mutex::new(Some(Box::new(on_done) as Box<dyn FnOnce() + Send>)));

        for preset in &manifest.pools {
            let remaining = remaining.clone();
            let on_done = on_done.clone();
            let address = preset.address.clone();
            self.prepare_pool(
                &preset.address,
                preset.initial_size,
                preset.max_size,
                preset.can_expand,
                move |result| {
                    if let Err(err) = result {
                        warn!(%address, %err, "manifest: pool preparation failed");
                    }
                    if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                        if let Some(cb) = on_done.lock().take() {
                            cb();
                        }
                    }
                },
            );
        }
    }

    /// Per-frame tick: pumps async loads, serves queued bridge callers and
    /// fires due deferred despawns.
    pub fn update(&mut self, dt: Duration) {
        let completions = self.cache.update();
        for completion in completions {
            let Some(ops) = self.pending.remove(&completion.key) else {
                continue;
            };
            self.serve_pending(&completion.key, completion.result, ops);
        }

        for pending in self.timers.advance(dt) {
            self.registry.apply_deferred(pending, self.provider.as_mut());
        }
    }

    fn serve_pending(&mut self, address: &str, result: Result<LoadedAsset>, ops: Vec<PendingOp>) {
        let asset = match result {
            Ok(asset) => asset,
            Err(err) => {
                for op in ops {
                    match op {
                        PendingOp::Spawn { on_ready, .. } => on_ready(Err(err.clone())),
                        PendingOp::Prepare { on_ready, .. } => on_ready(Err(err.clone())),
                    }
                }
                return;
            }
        };

        // The first queued caller decides the sizing; a plain ensure gets
        // the defaults. A pool created meanwhile (sync path) wins as usual.
        if !self.registry.has_pool(address) {
            let (initial, max, can_expand) = match ops.first() {
                Some(PendingOp::Prepare {
                    initial,
                    max,
                    can_expand,
                    ..
                }) => (*initial, *max, *can_expand),
                _ => (
                    self.default_sizing.initial,
                    self.default_sizing.max,
                    self.default_sizing.can_expand,
                ),
            };
            let config = PoolConfig::new(address, asset.handle)
                .with_sizes(initial, max, can_expand)
                .with_container(self.default_container);
            if let Err(err) = self.create_pool(config) {
                warn!(address, %err, "bridge: pool creation failed");
                for op in ops {
                    match op {
                        PendingOp::Spawn { on_ready, .. } => on_ready(Err(err.clone())),
                        PendingOp::Prepare { on_ready, .. } => on_ready(Err(err.clone())),
                    }
                }
                return;
            }
            debug!(address, "bridge: pool created on first use");
        }

        for op in ops {
            match op {
                PendingOp::Spawn {
                    placement,
                    on_ready,
                } => {
                    let result = self.spawn_at(address, placement);
                    on_ready(result);
                }
                PendingOp::Prepare { on_ready, .. } => on_ready(Ok(())),
            }
        }
    }

    /// Full teardown: destroy every pool, then release every cached asset.
    pub fn teardown(&mut self) {
        if let Err(err) = self.destroy_all_pools() {
            warn!(%err, "teardown: pool destruction reported an error");
        }
        self.release_all();
    }
}

// ---- process-wide default --------------------------------------------------

static GLOBAL: OnceLock<Mutex<Context>> = OnceLock::new();

/// Install the process-wide default context. Returns false if one is
/// already installed (the existing one stays).
pub fn install(context: Context) -> bool {
    GLOBAL.set(Mutex::new(context)).is_ok()
}

/// Run `f` against the process-wide default context, if installed.
pub fn with_global<R>(f: impl FnOnce(&mut Context) -> R) -> Option<R> {
    GLOBAL.get().map(|ctx| f(&mut ctx.lock()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;
    use crate::provider::testing::RecordingProvider;
    use glam::Vec3;
    use std::sync::Mutex as StdMutex;

    const TICK: Duration = Duration::from_millis(16);

    fn context_with(keys: &[&str]) -> Context {
        let mut source = MemorySource::new();
        for &key in keys {
            source.register(key);
        }
        Context::new(Box::new(source), Box::new(RecordingProvider::new()))
    }

    #[test]
    fn test_ensure_instance_creates_pool_once() {
        let mut ctx = context_with(&["enemy"]);
        let spawned = Arc::new(StdMutex::new(Vec::new()));

        for _ in 0..3 {
            let spawned = spawned.clone();
            ctx.ensure_instance("enemy", Placement::at(Vec3::ZERO), move |result| {
                spawned.lock().unwrap().push(result.unwrap());
            });
        }
        assert!(spawned.lock().unwrap().is_empty());

        ctx.update(TICK);

        let spawned = spawned.lock().unwrap();
        assert_eq!(spawned.len(), 3);
        // three distinct instances
        assert_ne!(spawned[0], spawned[1]);
        assert_ne!(spawned[1], spawned[2]);
        assert_eq!(
            ctx.pool_info("enemy").unwrap(),
            PoolInfo { active: 3, available: 0, total: 3 }
        );
    }

    #[test]
    fn test_ensure_instance_existing_pool_spawns_now() {
        let mut ctx = context_with(&["enemy"]);
        let asset = ctx.load("enemy").unwrap();
        ctx.create_pool(PoolConfig::new("enemy", asset).with_sizes(1, 4, false))
            .unwrap();

        let got = Arc::new(StdMutex::new(None));
        let g = got.clone();
        ctx.ensure_instance("enemy", Placement::default(), move |result| {
            *g.lock().unwrap() = Some(result.unwrap());
        });
        // no tick needed on the fast path
        assert!(got.lock().unwrap().is_some());
    }

    #[test]
    fn test_ensure_instance_load_failure_reaches_callers() {
        let mut ctx = context_with(&[]);
        let errors = Arc::new(StdMutex::new(0u32));

        for _ in 0..2 {
            let errors = errors.clone();
            ctx.ensure_instance("missing", Placement::default(), move |result| {
                assert!(result.is_err());
                *errors.lock().unwrap() += 1;
            });
        }
        ctx.update(TICK);
        assert_eq!(*errors.lock().unwrap(), 2);
        assert!(!ctx.has_pool("missing"));
    }

    #[test]
    fn test_despawn_after_fires() {
        let mut ctx = context_with(&["fx"]);
        let asset = ctx.load("fx").unwrap();
        ctx.create_pool(PoolConfig::new("fx", asset).with_sizes(0, 4, false))
            .unwrap();

        let key = ctx.spawn("fx").unwrap();
        ctx.despawn_after("fx", key, Duration::from_secs(3)).unwrap();

        ctx.update(Duration::from_secs(1));
        assert_eq!(ctx.pool_info("fx").unwrap().active, 1);
        ctx.update(Duration::from_secs(2));
        assert_eq!(ctx.pool_info("fx").unwrap().active, 0);
        assert_eq!(ctx.pool_info("fx").unwrap().available, 1);
    }

    #[test]
    fn test_despawn_after_invalid_target() {
        let mut ctx = context_with(&["fx"]);
        let asset = ctx.load("fx").unwrap();
        ctx.create_pool(PoolConfig::new("fx", asset).with_sizes(0, 4, false))
            .unwrap();
        let key = ctx.spawn("fx").unwrap();
        ctx.despawn("fx", key).unwrap();

        // already despawned: nothing to schedule
        assert_eq!(
            ctx.despawn_after("fx", key, Duration::from_secs(1)),
            Err(PoolError::OrphanInstance)
        );
        assert_eq!(
            ctx.despawn_after("ghost", key, Duration::from_secs(1)),
            Err(PoolError::PoolNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_release_warns_but_keeps_pool() {
        let mut ctx = context_with(&["enemy"]);
        let asset = ctx.load("enemy").unwrap();
        ctx.create_pool(PoolConfig::new("enemy", asset).with_sizes(1, 4, false))
            .unwrap();

        ctx.release("enemy");
        assert!(!ctx.is_cached("enemy"));
        // release never cascades into pooling
        assert!(ctx.has_pool("enemy"));
    }

    #[test]
    fn test_apply_manifest() {
        let mut ctx = context_with(&["enemies/grunt", "fx/spark"]);
        let manifest = PoolManifest::from_json(
            r#"{ "pools": [
                { "address": "enemies/grunt", "initial_size": 2, "max_size": 8 },
                { "address": "fx/spark", "initial_size": 1, "max_size": 4 } ] }"#,
        )
        .unwrap();

        let done = Arc::new(StdMutex::new(false));
        let d = done.clone();
        ctx.apply_manifest(&manifest, move || {
            *d.lock().unwrap() = true;
        });
        ctx.update(TICK);

        assert!(*done.lock().unwrap());
        assert_eq!(ctx.pool_info("enemies/grunt").unwrap().available, 2);
        assert_eq!(ctx.pool_info("fx/spark").unwrap().available, 1);
    }

    #[test]
    fn test_teardown() {
        let mut ctx = context_with(&["enemy"]);
        let asset = ctx.load("enemy").unwrap();
        ctx.create_pool(PoolConfig::new("enemy", asset).with_sizes(2, 4, false))
            .unwrap();
        ctx.spawn("enemy").unwrap();

        ctx.teardown();
        assert!(!ctx.has_pool("enemy"));
        assert!(!ctx.is_cached("enemy"));
    }
}
