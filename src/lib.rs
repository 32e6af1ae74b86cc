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

//! asset_pool - Asset cache and instance pooling runtime
//!
//! Loads game assets on demand, caches them by logical key, and recycles
//! runtime instances created from them instead of constructing and
//! destroying them per use. Single-threaded cooperative: drive it from the
//! host's frame tick via [`Context::update`].

pub mod assets;
pub mod context;
pub mod error;
pub mod manifest;
pub mod pooling;
pub mod prelude;
pub mod provider;
pub mod scheduler;


pub use assets::{AssetHandle, AssetOrigin, LoadedAsset, ResourceCache};
pub use context::Context;
pub use error::{PoolError, Result};
pub use manifest::{PoolManifest, PoolPreset};
pub use pooling::{InstanceKey, PoolConfig, PoolInfo, PoolRegistry};
pub use provider::{ContainerHandle, Instantiator, Lifecycle, NativeHandle, Placement};
pub use scheduler::{Scheduler, TimerToken};
