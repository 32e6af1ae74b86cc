//! Load backends for the resource cache.
//!
//! A source resolves a logical key to an [`AssetHandle`] and frees it again
//! on release. The cache is backend-agnostic; the host wires in whichever
//! source matches its asset system.

use crate::assets::{AssetHandle, AssetOrigin, LoadedAsset};
use crate::error::{PoolError, Result};
use ahash::AHashMap;
use std::path::{Path, PathBuf};

/// Backend that resolves keys to assets.
pub trait AssetSource: Send {
    /// Resolve `key` to an asset. Blocking; the cache defers calls to its
    /// tick pump for async requests.
    fn load(&mut self, key: &str) -> Result<LoadedAsset>;

    /// Free a previously loaded asset
    fn unload(&mut self, key: &str, asset: AssetHandle);
}

/// In-memory source backed by a preregistered key table.
///
/// Used by tests and for platform-resident entries that are known up front.
pub struct MemorySource {
    entries: AHashMap<String, (AssetHandle, AssetOrigin)>,
    next_id: u64,
    pub load_count: u64,
    pub unload_count: u64,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
            next_id: 1,
            load_count: 0,
            unload_count: 0,
        }
    }

    /// Register an addressable asset under `key`
    pub fn register(&mut self, key: impl Into<String>) -> AssetHandle {
        self.register_with_origin(key, AssetOrigin::Addressable)
    }

    /// Register an asset with an explicit origin tag
    pub fn register_with_origin(
        &mut self,
        key: impl Into<String>,
        origin: AssetOrigin,
    ) -> AssetHandle {
        let handle = AssetHandle::new(self.next_id);
        self.next_id += 1;
        self.entries.insert(key.into(), (handle, origin));
        handle
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetSource for MemorySource {
    fn load(&mut self, key: &str) -> Result<LoadedAsset> {
        self.load_count += 1;
        self.entries
            .get(key)
            .map(|&(handle, origin)| LoadedAsset { handle, origin })
            .ok_or_else(|| PoolError::AssetNotFound(key.to_string()))
    }

    fn unload(&mut self, _key: &str, _asset: AssetHandle) {
        self.unload_count += 1;
    }
}

/// Filesystem source: keys are paths relative to a base directory.
///
/// Mints a fresh handle per load; the host maps handles back to file data.
pub struct FileSource {
    base_path: PathBuf,
    next_id: u64,
    loaded: AHashMap<u64, PathBuf>,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
            next_id: 1,
            loaded: AHashMap::new(),
        }
    }

    /// Path backing a handle minted by this source
    pub fn path_of(&self, asset: AssetHandle) -> Option<&Path> {
        self.loaded.get(&asset.id()).map(|p| p.as_path())
    }
}

impl AssetSource for FileSource {
    fn load(&mut self, key: &str) -> Result<LoadedAsset> {
        let full = self.base_path.join(key);
        if !full.is_file() {
            return Err(PoolError::AssetNotFound(key.to_string()));
        }

        let handle = AssetHandle::new(self.next_id);
        self.next_id += 1;
        self.loaded.insert(handle.id(), full);
        Ok(LoadedAsset {
            handle,
            origin: AssetOrigin::Addressable,
        })
    }

    fn unload(&mut self, _key: &str, asset: AssetHandle) {
        self.loaded.remove(&asset.id());
    }
}
