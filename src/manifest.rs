//! Declarative pool presets.
//!
//! A manifest lists the asset addresses a game wants pooled and their sizing,
//! so per-game warm-up is data instead of code:
//!
//! ```json
//! {
//!   "pools": [
//!     { "address": "enemies/grunt", "initial_size": 4, "max_size": 16 },
//!     { "address": "fx/explosion", "initial_size": 8, "max_size": 8, "can_expand": true }
//!   ]
//! }
//! ```

use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sizing preset for one pool, keyed by asset address.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolPreset {
    pub address: String,
    #[serde(default)]
    pub initial_size: u32,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(default)]
    pub can_expand: bool,
}

fn default_max_size() -> u32 {
    u32::MAX
}

/// A set of pool presets, typically one manifest per game.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolManifest {
    pub pools: Vec<PoolPreset>,
}

impl PoolManifest {
    /// Parse a manifest from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PoolError::ManifestError(format!("JSON parse error: {e}")))
    }

    /// Read and parse a manifest file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Addresses listed in this manifest, in order
    pub fn addresses(&self) -> Vec<&str> {
        self.pools.iter().map(|p| p.address.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let manifest = PoolManifest::from_json(
            r#"{ "pools": [ { "address": "enemies/grunt", "initial_size": 4, "max_size": 16 },
                            { "address": "fx/spark" } ] }"#,
        )
        .unwrap();

        assert_eq!(manifest.pools.len(), 2);
        assert_eq!(manifest.pools[0].address, "enemies/grunt");
        assert_eq!(manifest.pools[0].initial_size, 4);
        assert!(!manifest.pools[0].can_expand);

        // omitted fields take the permissive defaults
        assert_eq!(manifest.pools[1].initial_size, 0);
        assert_eq!(manifest.pools[1].max_size, u32::MAX);
    }

    #[test]
    fn test_parse_error() {
        let err = PoolManifest::from_json("{ not json").unwrap_err();
        assert!(matches!(err, PoolError::ManifestError(_)));
    }

    #[test]
    fn test_roundtrip() {
        let manifest = PoolManifest {
            pools: vec![PoolPreset {
                address: "ui/popup".to_string(),
                initial_size: 1,
                max_size: 3,
                can_expand: false,
            }],
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert_eq!(PoolManifest::from_json(&json).unwrap(), manifest);
    }
}
