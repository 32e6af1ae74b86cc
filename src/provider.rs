//! Instantiation provider seam.
//!
//! The cache/pool core never constructs or destroys engine objects itself;
//! everything that touches a real runtime instance goes through the
//! [`Instantiator`] trait. The host supplies an implementation backed by its
//! engine; tests supply recording fakes.

use crate::assets::AssetHandle;
use crate::error::Result;
use glam::{Quat, Vec3};

/// Raw engine-side identifier for a created instance.
///
/// Minted by the provider on `create`; opaque to the pooling core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

/// Logical grouping node for created instances (e.g. a scene node).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub u64);

/// World placement applied to a spawned instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
    /// Parent override; `None` leaves the instance under its pool container.
    pub parent: Option<ContainerHandle>,
}

impl Placement {
    /// Placement at a position with identity rotation
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            parent: None,
        }
    }

    /// Placement under a parent node, keeping identity transform
    pub fn under(parent: ContainerHandle) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            parent: Some(parent),
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            parent: None,
        }
    }
}

/// Optional per-instance lifecycle capability.
///
/// Queried from the provider around activation/deactivation; instances that
/// implement it get reset hooks, everything else gets the no-op defaults.
pub trait Lifecycle {
    /// Called after the instance is activated and issued to a caller
    fn on_spawned(&mut self) {}

    /// Called before the instance is deactivated and requeued
    fn on_returned(&mut self) {}
}

/// External collaborator that creates, destroys and places runtime instances.
pub trait Instantiator: Send {
    /// Create a new inactive instance from an asset under a container node
    fn create(&mut self, asset: AssetHandle, container: ContainerHandle) -> Result<NativeHandle>;

    /// Destroy an instance for good
    fn destroy(&mut self, instance: NativeHandle) -> Result<()>;

    /// Make an instance live/visible
    fn activate(&mut self, instance: NativeHandle);

    /// Make an instance dormant/invisible
    fn deactivate(&mut self, instance: NativeHandle);

    /// Apply a world placement to an instance
    fn set_placement(&mut self, instance: NativeHandle, placement: Placement) -> Result<()>;

    /// Move an instance back under a container node
    fn reparent(&mut self, instance: NativeHandle, container: ContainerHandle);

    /// Query the instance's lifecycle capability, if it has one.
    ///
    /// Default: no capability, hooks are skipped.
    fn lifecycle(&mut self, _instance: NativeHandle) -> Option<&mut dyn Lifecycle> {
        None
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::PoolError;
    use ahash::AHashSet;

    /// Provider fake that records every call and can be told to fail.
    pub(crate) struct RecordingProvider {
        next: u64,
        pub created: Vec<NativeHandle>,
        pub destroyed: Vec<NativeHandle>,
        pub active: AHashSet<u64>,
        pub placements: Vec<(NativeHandle, Placement)>,
        pub reparents: Vec<(NativeHandle, ContainerHandle)>,
        pub fail_create: bool,
        pub fail_placement: bool,
    }

    impl RecordingProvider {
        pub fn new() -> Self {
            Self {
                next: 1,
                created: Vec::new(),
                destroyed: Vec::new(),
                active: AHashSet::new(),
                placements: Vec::new(),
                reparents: Vec::new(),
                fail_create: false,
                fail_placement: false,
            }
        }

        pub fn live_count(&self) -> usize {
            self.created.len() - self.destroyed.len()
        }
    }

    impl Instantiator for RecordingProvider {
        fn create(
            &mut self,
            _asset: AssetHandle,
            _container: ContainerHandle,
        ) -> Result<NativeHandle> {
            if self.fail_create {
                return Err(PoolError::Provider("create failed".to_string()));
            }
            let handle = NativeHandle(self.next);
            self.next += 1;
            self.created.push(handle);
            Ok(handle)
        }

        fn destroy(&mut self, instance: NativeHandle) -> Result<()> {
            self.destroyed.push(instance);
            self.active.remove(&instance.0);
            Ok(())
        }

        fn activate(&mut self, instance: NativeHandle) {
            self.active.insert(instance.0);
        }

        fn deactivate(&mut self, instance: NativeHandle) {
            self.active.remove(&instance.0);
        }

        fn set_placement(&mut self, instance: NativeHandle, placement: Placement) -> Result<()> {
            if self.fail_placement {
                return Err(PoolError::Provider("placement failed".to_string()));
            }
            self.placements.push((instance, placement));
            Ok(())
        }

        fn reparent(&mut self, instance: NativeHandle, container: ContainerHandle) {
            self.reparents.push((instance, container));
        }
    }
}
