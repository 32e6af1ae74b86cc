//! Convenience re-exports for host code.

pub use crate::assets::{AssetHandle, AssetOrigin, AssetSource, LoadedAsset, ResourceCache};
pub use crate::context::{install, with_global, Context};
pub use crate::error::{PoolError, Result};
pub use crate::manifest::{PoolManifest, PoolPreset};
pub use crate::pooling::{InstanceKey, Pool, PoolConfig, PoolInfo, PoolRegistry};
pub use crate::provider::{
    ContainerHandle, Instantiator, Lifecycle, NativeHandle, Placement,
};
pub use crate::scheduler::TimerToken;
