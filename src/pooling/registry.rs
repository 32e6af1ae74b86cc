use crate::error::{PoolError, Result};
use crate::pooling::{InstanceArena, InstanceKey, Pool, PoolConfig, PoolInfo};
use crate::provider::{Instantiator, NativeHandle, Placement};
use ahash::AHashMap;
use tracing::{debug, warn};

/// Deferred despawn payload handed to the scheduler.
///
/// Captures the slot generation at schedule time so a recycled instance is
/// never despawned by a stale timer.
#[derive(Clone, Debug)]
pub struct PendingDespawn {
    pub pool: String,
    pub key: InstanceKey,
    pub generation: u32,
}

/// Owner of every named [`Pool`] and of the shared instance arena.
///
/// Callers only ever hold [`InstanceKey`]s; all mutation goes through the
/// registry's operations.
pub struct PoolRegistry {
    pools: AHashMap<String, Pool>,
    arena: InstanceArena,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            pools: AHashMap::new(),
            arena: InstanceArena::default(),
        }
    }

    /// Register a pool. A duplicate name is a warning, not an error; the
    /// existing pool wins.
    pub fn create_pool(
        &mut self,
        config: PoolConfig,
        provider: &mut dyn Instantiator,
    ) -> Result<()> {
        if config.name.is_empty() {
            return Err(PoolError::InvalidKey);
        }
        if self.pools.contains_key(&config.name) {
            warn!(pool = %config.name, "create_pool: pool already exists, keeping it");
            return Ok(());
        }

        let name = config.name.clone();
        let pool = Pool::create(config, &mut self.arena, provider)?;
        self.pools.insert(name, pool);
        Ok(())
    }

    pub fn has_pool(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    /// Introspection snapshot; `None` for an unknown name (polling-safe).
    pub fn info(&self, name: &str) -> Option<PoolInfo> {
        self.pools.get(name).map(|pool| pool.info())
    }

    pub fn pool_names(&self) -> Vec<String> {
        self.pools.keys().cloned().collect()
    }

    /// Issue an instance from the named pool.
    pub fn spawn(
        &mut self,
        name: &str,
        provider: &mut dyn Instantiator,
    ) -> Result<InstanceKey> {
        if name.is_empty() {
            return Err(PoolError::InvalidKey);
        }
        let pool = self
            .pools
            .get_mut(name)
            .ok_or_else(|| PoolError::PoolNotFound(name.to_string()))?;
        pool.spawn(&mut self.arena, provider)
    }

    /// Spawn and place. A placement failure does not roll back issuance;
    /// the instance is still returned, just unplaced.
    pub fn spawn_at(
        &mut self,
        name: &str,
        placement: Placement,
        provider: &mut dyn Instantiator,
    ) -> Result<InstanceKey> {
        let key = self.spawn(name, provider)?;
        let native = self.arena[key].native;
        if let Err(err) = provider.set_placement(native, placement) {
            warn!(pool = name, %err, "spawn: placement failed, instance issued unplaced");
        }
        Ok(key)
    }

    /// Return an instance to the named pool.
    ///
    /// If the named pool does not own it, every pool is scanned before the
    /// instance is treated as an orphan and forcibly destroyed.
    pub fn despawn(
        &mut self,
        name: &str,
        key: InstanceKey,
        provider: &mut dyn Instantiator,
    ) -> Result<()> {
        if let Some(pool) = self.pools.get_mut(name) {
            if pool.owns(key) {
                return pool.despawn(key, &mut self.arena, provider);
            }
            warn!(pool = name, "despawn: instance not in named pool, scanning registry");
        } else {
            warn!(pool = name, "despawn: no such pool, scanning registry");
        }
        self.despawn_instance(key, provider)
    }

    /// Return an instance without naming its pool: O(pools) ownership scan.
    pub fn despawn_instance(
        &mut self,
        key: InstanceKey,
        provider: &mut dyn Instantiator,
    ) -> Result<()> {
        let owner = self
            .pools
            .iter()
            .find(|(_, pool)| pool.owns(key))
            .map(|(name, _)| name.clone());

        if let Some(name) = owner {
            if let Some(pool) = self.pools.get_mut(&name) {
                return pool.despawn(key, &mut self.arena, provider);
            }
        }

        // No pool claims it. Destroy rather than leak, if there is still a
        // backing object to destroy.
        if let Some(slot) = self.arena.remove(key) {
            warn!("despawn: orphan instance, destroying it");
            provider.destroy(slot.native)?;
        } else {
            warn!("despawn: unknown instance handle");
        }
        Err(PoolError::OrphanInstance)
    }

    /// Capture a deferred-despawn payload for `key` as spawned right now.
    ///
    /// `None` if the instance is not currently issued from that pool.
    pub fn pending_despawn(&self, name: &str, key: InstanceKey) -> Option<PendingDespawn> {
        let pool = self.pools.get(name)?;
        if !pool.owns_active(key) {
            return None;
        }
        let slot = self.arena.get(key)?;
        Some(PendingDespawn {
            pool: name.to_string(),
            key,
            generation: slot.generation,
        })
    }

    /// Apply a deferred despawn if it is still current.
    ///
    /// Stale payloads (instance despawned manually, respawned, or its pool
    /// destroyed since scheduling) are dropped silently.
    pub fn apply_deferred(&mut self, pending: PendingDespawn, provider: &mut dyn Instantiator) {
        let generation = self.arena.get(pending.key).map(|slot| slot.generation);
        let Some(pool) = self.pools.get_mut(&pending.pool) else {
            debug!(pool = %pending.pool, "deferred despawn: pool gone, ignoring");
            return;
        };
        if generation != Some(pending.generation) || !pool.owns_active(pending.key) {
            debug!(pool = %pending.pool, "deferred despawn is stale, ignoring");
            return;
        }

        if let Err(err) = pool.despawn(pending.key, &mut self.arena, provider) {
            warn!(pool = %pending.pool, %err, "deferred despawn failed");
        }
    }

    /// Despawn every active instance in one pool.
    pub fn despawn_all(&mut self, name: &str, provider: &mut dyn Instantiator) -> Result<()> {
        let pool = self
            .pools
            .get_mut(name)
            .ok_or_else(|| PoolError::PoolNotFound(name.to_string()))?;
        pool.despawn_all(&mut self.arena, provider)
    }

    /// Despawn every active instance in every pool; capacity is kept.
    pub fn despawn_all_pools(&mut self, provider: &mut dyn Instantiator) -> Result<()> {
        let names = self.pool_names();
        for name in names {
            self.despawn_all(&name, provider)?;
        }
        Ok(())
    }

    /// Destroy a pool and every instance it created.
    pub fn destroy_pool(&mut self, name: &str, provider: &mut dyn Instantiator) -> Result<()> {
        let mut pool = self
            .pools
            .remove(name)
            .ok_or_else(|| PoolError::PoolNotFound(name.to_string()))?;
        pool.teardown(&mut self.arena, provider)
    }

    /// Full teardown: destroy every pool.
    pub fn destroy_all(&mut self, provider: &mut dyn Instantiator) -> Result<()> {
        let mut first_err = None;
        let names = self.pool_names();
        for name in names {
            if let Err(err) = self.destroy_pool(&name, provider) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Provider-side handle for an instance, if it exists
    pub fn native_of(&self, key: InstanceKey) -> Option<NativeHandle> {
        self.arena.get(key).map(|slot| slot.native)
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
