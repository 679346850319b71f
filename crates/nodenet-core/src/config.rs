//! # Network Configuration
//!
//! Static configuration read once at startup: engine settings and the
//! group-kind table that maps each kind onto a registered variant.
//!
//! ```toml
//! [engine]
//! singleton_groups = true
//! verify_after_remake = false
//!
//! [[kinds]]
//! name = "pipe"
//! variant = "pool"
//! singleton_groups = false
//! ```

use crate::primitives::{BASE_VARIANT, DEFAULT_KIND, MAX_CONFIG_SIZE, MAX_KIND_LENGTH, WIRE_NET_KIND};
use crate::{GroupKind, NetworkError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Engine-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    /// Whether an isolated node gets a group of its own. Kinds may override.
    #[serde(default = "default_true")]
    pub singleton_groups: bool,
    /// Run the full invariant check after every remake pass.
    #[serde(default)]
    pub verify_after_remake: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            singleton_groups: true,
            verify_after_remake: false,
        }
    }
}

/// One row of the kind table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindConfig {
    pub name: GroupKind,
    pub variant: String,
    #[serde(default)]
    pub singleton_groups: Option<bool>,
}

impl KindConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            name: GroupKind::new(name),
            variant: variant.into(),
            singleton_groups: None,
        }
    }

    #[must_use]
    pub fn with_singletons(mut self, enabled: bool) -> Self {
        self.singleton_groups = Some(enabled);
        self
    }
}

/// The complete static configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub kinds: Vec<KindConfig>,
}

impl NetworkConfig {
    /// The configuration used when none is supplied: `default` and
    /// `wire_net`, both on the payload-free variant.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            engine: EngineSettings::default(),
            kinds: vec![
                KindConfig::new(DEFAULT_KIND, BASE_VARIANT),
                KindConfig::new(WIRE_NET_KIND, BASE_VARIANT),
            ],
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, NetworkError> {
        let config: Self =
            toml::from_str(input).map_err(|e| NetworkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            NetworkError::Io(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_SIZE {
            return Err(NetworkError::Config(format!(
                "'{}' is {} bytes, limit is {}",
                path.display(),
                metadata.len(),
                MAX_CONFIG_SIZE
            )));
        }
        let input = std::fs::read_to_string(path).map_err(|e| {
            NetworkError::Io(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&input)
    }

    /// Reject empty, oversized and duplicate kind names.
    pub fn validate(&self) -> Result<(), NetworkError> {
        let mut seen = BTreeSet::new();
        for kind in &self.kinds {
            let name = kind.name.as_str();
            if name.is_empty() || name.len() > MAX_KIND_LENGTH {
                return Err(NetworkError::Config(format!(
                    "kind name must be 1..={} bytes, got {:?}",
                    MAX_KIND_LENGTH, name
                )));
            }
            if kind.variant.is_empty() {
                return Err(NetworkError::Config(format!(
                    "kind '{}' has an empty variant",
                    name
                )));
            }
            if !seen.insert(&kind.name) {
                return Err(NetworkError::DuplicateKind(kind.name.clone()));
            }
        }
        Ok(())
    }

    /// Effective singleton policy of a configured kind.
    #[must_use]
    pub fn singleton_groups(&self, kind: &KindConfig) -> bool {
        kind.singleton_groups.unwrap_or(self.engine.singleton_groups)
    }
}
