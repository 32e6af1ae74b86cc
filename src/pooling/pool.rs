use crate::assets::AssetHandle;
use crate::error::{PoolError, Result};
use crate::pooling::{InstanceArena, InstanceKey, InstanceSlot, PoolInfo};
use crate::provider::{ContainerHandle, Instantiator};
use ahash::AHashSet;
use std::collections::VecDeque;
use tracing::warn;

/// Immutable pool configuration, supplied at creation.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Unique pool key, conventionally the asset address
    pub name: String,
    /// Asset every instance in this pool is created from.
    /// Non-owning: the pool does not keep the cache entry alive.
    pub asset: AssetHandle,
    /// Instances created eagerly at pool creation
    pub initial_size: u32,
    /// Capacity ceiling; ignored when `can_expand` is set
    pub max_size: u32,
    /// Allow creation above `max_size`
    pub can_expand: bool,
    /// Grouping node instances live under while inactive
    pub container: ContainerHandle,
}

impl PoolConfig {
    pub fn new(name: impl Into<String>, asset: AssetHandle) -> Self {
        Self {
            name: name.into(),
            asset,
            initial_size: 0,
            max_size: u32::MAX,
            can_expand: false,
            container: ContainerHandle::default(),
        }
    }

    pub fn with_sizes(mut self, initial: u32, max: u32, can_expand: bool) -> Self {
        self.initial_size = initial;
        self.max_size = max;
        self.can_expand = can_expand;
        self
    }

    pub fn with_container(mut self, container: ContainerHandle) -> Self {
        self.container = container;
        self
    }
}

/// One named collection of reusable instances backed by a single asset.
///
/// Reuse is FIFO. `total == available + active` holds between every call,
/// and `total <= max_size` unless `can_expand`.
#[derive(Debug)]
pub struct Pool {
    config: PoolConfig,
    available: VecDeque<InstanceKey>,
    active: AHashSet<InstanceKey>,
}

impl Pool {
    /// Create the pool and eagerly instantiate `initial_size` inactive
    /// instances.
    ///
    /// An oversized `initial_size` on a non-expanding pool is clamped with a
    /// warning. Provider failure during warm-up rolls back everything
    /// created so far.
    pub(crate) fn create(
        mut config: PoolConfig,
        arena: &mut InstanceArena,
        provider: &mut dyn Instantiator,
    ) -> Result<Self> {
        if !config.can_expand && config.initial_size > config.max_size {
            warn!(
                pool = %config.name,
                initial = config.initial_size,
                max = config.max_size,
                "initial_size exceeds max_size, clamping"
            );
            config.initial_size = config.max_size;
        }

        let mut pool = Self {
            config,
            available: VecDeque::new(),
            active: AHashSet::new(),
        };

        for _ in 0..pool.config.initial_size {
            if let Err(err) = pool.warm_one(arena, provider) {
                pool.teardown(arena, provider).ok();
                return Err(err);
            }
        }
        Ok(pool)
    }

    fn warm_one(
        &mut self,
        arena: &mut InstanceArena,
        provider: &mut dyn Instantiator,
    ) -> Result<()> {
        let native = provider.create(self.config.asset, self.config.container)?;
        provider.deactivate(native);
        let key = arena.insert(InstanceSlot {
            native,
            generation: 0,
        });
        self.available.push_back(key);
        Ok(())
    }

    /// Issue an instance: reuse the oldest available one, or create a new
    /// one within the capacity policy.
    pub(crate) fn spawn(
        &mut self,
        arena: &mut InstanceArena,
        provider: &mut dyn Instantiator,
    ) -> Result<InstanceKey> {
        let key = match self.available.pop_front() {
            Some(key) => key,
            None => {
                if self.total() >= self.config.max_size && !self.config.can_expand {
                    return Err(PoolError::AtCapacity {
                        pool: self.config.name.clone(),
                        max: self.config.max_size,
                    });
                }
                let native = provider.create(self.config.asset, self.config.container)?;
                arena.insert(InstanceSlot {
                    native,
                    generation: 0,
                })
            }
        };

        let slot = &mut arena[key];
        slot.generation = slot.generation.wrapping_add(1);
        let native = slot.native;

        self.active.insert(key);
        provider.activate(native);
        if let Some(hooks) = provider.lifecycle(native) {
            hooks.on_spawned();
        }
        Ok(key)
    }

    /// Return an active instance to the available queue.
    ///
    /// Never destroys; deactivates, reparents back under the pool container
    /// and requeues. Despawning an instance that is already back in the
    /// queue is deliberately idempotent: it warns, does not requeue, and
    /// returns `Ok` so game-side cleanup paths can run unconditionally.
    /// Only a key this pool has never owned is an error.
    pub(crate) fn despawn(
        &mut self,
        key: InstanceKey,
        arena: &mut InstanceArena,
        provider: &mut dyn Instantiator,
    ) -> Result<()> {
        if !self.active.remove(&key) {
            if self.available.contains(&key) {
                warn!(pool = %self.config.name, "despawn: instance already despawned");
                return Ok(());
            }
            return Err(PoolError::OrphanInstance);
        }

        let native = arena[key].native;

        if let Some(hooks) = provider.lifecycle(native) {
            hooks.on_returned();
        }
        provider.deactivate(native);
        provider.reparent(native, self.config.container);
        self.available.push_back(key);
        Ok(())
    }

    /// Despawn every active instance, keeping capacity.
    pub(crate) fn despawn_all(
        &mut self,
        arena: &mut InstanceArena,
        provider: &mut dyn Instantiator,
    ) -> Result<()> {
        let keys: Vec<InstanceKey> = self.active.iter().copied().collect();
        for key in keys {
            self.despawn(key, arena, provider)?;
        }
        Ok(())
    }

    /// Destroy every instance (available and active) via the provider.
    ///
    /// The only path that actually frees instances. A provider failure is
    /// reported after the remaining instances have still been torn down.
    pub(crate) fn teardown(
        &mut self,
        arena: &mut InstanceArena,
        provider: &mut dyn Instantiator,
    ) -> Result<()> {
        let mut first_err = None;

        let keys: Vec<InstanceKey> = self
            .available
            .drain(..)
            .chain(self.active.drain())
            .collect();
        for key in keys {
            if let Some(slot) = arena.remove(key) {
                if let Err(err) = provider.destroy(slot.native) {
                    first_err.get_or_insert(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Whether this pool currently has `key` issued
    pub fn owns_active(&self, key: InstanceKey) -> bool {
        self.active.contains(&key)
    }

    /// Whether `key` belongs to this pool at all
    pub fn owns(&self, key: InstanceKey) -> bool {
        self.active.contains(&key) || self.available.contains(&key)
    }

    pub fn total(&self) -> u32 {
        (self.available.len() + self.active.len()) as u32
    }

    pub fn info(&self) -> PoolInfo {
        PoolInfo {
            active: self.active.len() as u32,
            available: self.available.len() as u32,
            total: self.total(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn asset(&self) -> AssetHandle {
        self.config.asset
    }

    pub fn container(&self) -> ContainerHandle {
        self.config.container
    }
}
