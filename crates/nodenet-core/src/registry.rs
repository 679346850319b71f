//! # Group Registry
//!
//! Maps each group kind onto the variant constructor that builds its
//! payload. Variants are compiled in and listed in a [`VariantTable`]; the
//! kind table comes from [`NetworkConfig`]. The registry is built once at
//! startup and never changes afterwards, so networks share it through an
//! `Arc` without locking.

use crate::builtin::{BaseGroup, PoolGroup};
use crate::config::{KindConfig, NetworkConfig};
use crate::group::GroupBehavior;
use crate::primitives::{BASE_VARIANT, POOL_VARIANT};
use crate::{GroupKind, NetworkError};
use std::collections::BTreeMap;

/// Constructor of a group variant's payload.
pub type GroupConstructor = fn(&GroupKind) -> Box<dyn GroupBehavior>;

// =============================================================================
// VARIANT TABLE
// =============================================================================

/// Variant name -> constructor.
#[derive(Debug, Clone, Default)]
pub struct VariantTable {
    variants: BTreeMap<String, GroupConstructor>,
}

impl VariantTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding the `base` and `pool` variants.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with(BASE_VARIANT, BaseGroup::construct)
            .with(POOL_VARIANT, PoolGroup::construct)
    }

    /// Add or replace a variant.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, constructor: GroupConstructor) -> Self {
        self.variants.insert(name.into(), constructor);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<GroupConstructor> {
        self.variants.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Clone)]
struct KindEntry {
    variant: String,
    constructor: GroupConstructor,
    singleton_groups: bool,
}

/// Read-only kind -> variant mapping.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    kinds: BTreeMap<GroupKind, KindEntry>,
}

impl GroupRegistry {
    /// Start an empty registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build from a configuration, resolving variant names in `variants`.
    pub fn from_config(
        config: &NetworkConfig,
        variants: &VariantTable,
    ) -> Result<Self, NetworkError> {
        config.validate()?;
        let mut builder = Self::builder();
        for kind in &config.kinds {
            builder = builder.kind_from_config(config, kind, variants)?;
        }
        Ok(builder.build())
    }

    /// Registry for [`NetworkConfig::builtin`].
    #[must_use]
    pub fn builtin() -> Self {
        // The builtin config only names builtin variants.
        Self::from_config(&NetworkConfig::builtin(), &VariantTable::builtin()).unwrap_or_default()
    }

    /// Build a fresh payload for `kind`.
    pub fn construct(&self, kind: &GroupKind) -> Result<Box<dyn GroupBehavior>, NetworkError> {
        let entry = self
            .kinds
            .get(kind)
            .ok_or_else(|| NetworkError::UnknownKind(kind.clone()))?;
        Ok((entry.constructor)(kind))
    }

    #[must_use]
    pub fn contains(&self, kind: &GroupKind) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Whether an isolated node of `kind` gets its own group.
    /// Unknown kinds report `false`.
    #[must_use]
    pub fn singleton_groups(&self, kind: &GroupKind) -> bool {
        self.kinds.get(kind).is_some_and(|e| e.singleton_groups)
    }

    /// Variant name registered for `kind`.
    #[must_use]
    pub fn variant(&self, kind: &GroupKind) -> Option<&str> {
        self.kinds.get(kind).map(|e| e.variant.as_str())
    }

    /// Registered kinds in order.
    pub fn kinds(&self) -> impl Iterator<Item = &GroupKind> {
        self.kinds.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Programmatic registry construction, for hosts without a config file.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    kinds: BTreeMap<GroupKind, KindEntry>,
    duplicate: Option<GroupKind>,
}

impl RegistryBuilder {
    /// Register `kind` with a named constructor.
    #[must_use]
    pub fn kind(
        mut self,
        kind: impl Into<String>,
        variant: impl Into<String>,
        constructor: GroupConstructor,
        singleton_groups: bool,
    ) -> Self {
        let kind = GroupKind::new(kind);
        let entry = KindEntry {
            variant: variant.into(),
            constructor,
            singleton_groups,
        };
        if self.kinds.insert(kind.clone(), entry).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(kind);
        }
        self
    }

    fn kind_from_config(
        self,
        config: &NetworkConfig,
        kind: &KindConfig,
        variants: &VariantTable,
    ) -> Result<Self, NetworkError> {
        let constructor =
            variants
                .get(&kind.variant)
                .ok_or_else(|| NetworkError::UnknownVariant {
                    kind: kind.name.clone(),
                    variant: kind.variant.clone(),
                })?;
        Ok(self.kind(
            kind.name.as_str(),
            kind.variant.as_str(),
            constructor,
            config.singleton_groups(kind),
        ))
    }

    /// Finish, rejecting kinds registered twice.
    pub fn try_build(self) -> Result<GroupRegistry, NetworkError> {
        match self.duplicate {
            Some(kind) => Err(NetworkError::DuplicateKind(kind)),
            None => Ok(GroupRegistry { kinds: self.kinds }),
        }
    }

    /// Finish; a kind registered twice keeps its last entry.
    #[must_use]
    pub fn build(self) -> GroupRegistry {
        GroupRegistry { kinds: self.kinds }
    }
}

// =============================================================================
// TESTS
// =============================================================================
