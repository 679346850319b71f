//! # Builtin Group Variants
//!
//! - `BaseGroup`: no payload, plain connectivity (power wires, default nets)
//! - `PoolGroup`: one shared integer quantity per network, divided by node
//!   count on split and summed on merge

use crate::group::{GroupBehavior, MergedGroup, RemovedNode, SplitSet};
use crate::{GroupKind, HookFault};
use std::any::Any;

// =============================================================================
// BASE GROUP
// =============================================================================

/// Payload-free group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseGroup;

impl BaseGroup {
    /// Variant constructor for the registry.
    pub fn construct(_kind: &GroupKind) -> Box<dyn GroupBehavior> {
        Box::new(Self)
    }
}

impl GroupBehavior for BaseGroup {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// =============================================================================
// POOL GROUP
// =============================================================================

/// A network-wide pool of some integer quantity.
///
/// The pool is spread evenly over the members: a destroyed member takes its
/// share with it, and a split hands each part a share proportional to its
/// node count. Integer remainders stay with the splitting group, or go to
/// the first part when nothing is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolGroup {
    amount: u64,
}

impl PoolGroup {
    /// Variant constructor for the registry.
    pub fn construct(_kind: &GroupKind) -> Box<dyn GroupBehavior> {
        Box::new(Self::default())
    }

    #[must_use]
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Add to the pool, saturating at `u64::MAX`.
    pub fn fill(&mut self, amount: u64) {
        self.amount = self.amount.saturating_add(amount);
    }

    /// Remove up to `amount` from the pool. Returns what was removed.
    pub fn drain(&mut self, amount: u64) -> u64 {
        let taken = amount.min(self.amount);
        self.amount -= taken;
        taken
    }

    /// `amount * part / whole`, without overflow.
    fn share(amount: u64, part: usize, whole: usize) -> u64 {
        if whole == 0 {
            return 0;
        }
        let share = u128::from(amount) * part as u128 / whole as u128;
        u64::try_from(share).unwrap_or(u64::MAX)
    }
}

impl GroupBehavior for PoolGroup {
    fn node_removed(&mut self, removed: &RemovedNode) -> Result<(), HookFault> {
        let lost = Self::share(self.amount, 1, removed.members_before);
        self.amount -= lost;
        Ok(())
    }

    fn split(&mut self, split: &mut SplitSet<'_>) -> Result<(), HookFault> {
        let total = split.total_nodes();
        let before = self.amount;
        let mut handed = 0u64;
        let mut shares = Vec::with_capacity(split.parts.len());
        for part in &split.parts {
            let share = Self::share(before, part.nodes.len(), total);
            handed = handed.saturating_add(share);
            shares.push(share);
        }
        let mut remainder = before.saturating_sub(handed);
        if !split.keeps_any() {
            if let Some(first) = shares.first_mut() {
                *first = first.saturating_add(remainder);
                remainder = 0;
            }
        }

        for (part, share) in split.parts.iter_mut().zip(shares) {
            let target = part.group.downcast_mut::<PoolGroup>().ok_or_else(|| {
                HookFault::new(format!("split target {} is not a pool", part.net_id))
            })?;
            target.fill(share);
        }
        self.amount = remainder;
        Ok(())
    }

    fn merge(&mut self, retiring: &mut [MergedGroup<'_>]) -> Result<(), HookFault> {
        for merged in retiring.iter_mut() {
            let other = merged.group.downcast_mut::<PoolGroup>().ok_or_else(|| {
                HookFault::new(format!("merged group {} is not a pool", merged.net_id))
            })?;
            self.fill(std::mem::take(&mut other.amount));
        }
        Ok(())
    }

    fn debug_data(&self) -> Option<String> {
        Some(format!("amount: {}", self.amount))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
