//! Policy store holding the active rule set
//!
//! Readers take a snapshot with [`PolicyStore::current`] and keep using it for
//! the whole evaluation. Writers publish a fully-built [`RuleSet`] with one
//! atomic pointer replacement, so a reader sees either the old set or the new
//! one and never blocks on a writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::policy::RuleSet;

/// Holds exactly one current [`RuleSet`]
#[derive(Debug)]
pub struct PolicyStore {
    current: ArcSwap<RuleSet>,
    generation: AtomicU64,
}

impl PolicyStore {
    /// Store serving `initial` as generation 1
    pub fn new(initial: RuleSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            generation: AtomicU64::new(1),
        }
    }

    /// Store that has not loaded anything yet (generation 0)
    pub fn empty() -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSet::empty()),
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the active rule set
    pub fn current(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Publish a new rule set, returning the one it replaced
    pub fn swap(&self, rules: RuleSet) -> Arc<RuleSet> {
        let previous = self.current.swap(Arc::new(rules));
        self.generation.fetch_add(1, Ordering::AcqRel);
        previous
    }

    /// Number of successful publishes, including the initial load
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn rule_count(&self) -> usize {
        self.current.load().len()
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::empty()
    }
}
