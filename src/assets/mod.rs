// Asset loading and caching
//
// Provides:
// - Keyed, reference-shared asset cache with deferred async loads
// - Request coalescing (one in-flight load per key)
// - Pluggable load backends (filesystem, preregistered/in-memory)

pub mod cache;
pub mod source;

pub use cache::{CacheStats, LoadCompletion, ResourceCache};
pub use source::{AssetSource, FileSource, MemorySource};

/// Opaque identifier for a loaded asset.
///
/// Minted by the [`AssetSource`]; shared by copy between the cache and every
/// pool built on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AssetHandle(u64);

impl AssetHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Where a cache entry came from, deciding its release semantics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AssetOrigin {
    /// Addressable-style entry: explicitly released by key
    #[default]
    Addressable,
    /// Platform-managed entry: survives per-key and keep-set release,
    /// removed only on full teardown
    Resident,
}

/// A settled asset together with its release semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadedAsset {
    pub handle: AssetHandle,
    pub origin: AssetOrigin,
}
