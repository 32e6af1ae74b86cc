// Copyright 2025 the asset_pool authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use std::fmt;

/// Cache/pool error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Empty or otherwise invalid asset key / pool name
    InvalidKey,

    /// Asset could not be resolved by the source
    AssetNotFound(String),

    /// Underlying load operation failed
    LoadFailed { key: String, reason: String },

    /// No pool registered under this name
    PoolNotFound(String),

    /// Spawn requested beyond `max_size` with expansion disabled
    AtCapacity { pool: String, max: u32 },

    /// Despawn called with an instance no pool owns
    OrphanInstance,

    /// The instantiation provider failed to create/destroy/place an instance
    Provider(String),

    /// Manifest / preset parse error
    ManifestError(String),

    /// IO error (file operations, etc.)
    IoError(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InvalidKey => write!(f, "Invalid (empty) key"),
            PoolError::AssetNotFound(key) => write!(f, "Asset not found: {key}"),
            PoolError::LoadFailed { key, reason } => {
                write!(f, "Failed to load asset {key}: {reason}")
            }
            PoolError::PoolNotFound(name) => write!(f, "Pool not found: {name}"),
            PoolError::AtCapacity { pool, max } => {
                write!(f, "Pool {pool} at capacity ({max}) and cannot expand")
            }
            PoolError::OrphanInstance => write!(f, "Instance not owned by any pool"),
            PoolError::Provider(msg) => write!(f, "Instantiation provider error: {msg}"),
            PoolError::ManifestError(msg) => write!(f, "Manifest error: {msg}"),
            PoolError::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<std::io::Error> for PoolError {
    fn from(err: std::io::Error) -> Self {
        PoolError::IoError(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PoolError>;
