//! Gradual-rollout cap for exit adjusters.
//!
//! A manager acts live on at most `max` symbols. Symbols join in the order
//! they are first seen and leave when their position closes; everything
//! else runs in shadow.

use std::collections::BTreeSet;

use crate::domain::shared::Symbol;

/// Symbols under live management.
#[derive(Debug, Clone, Default)]
pub struct ManagedSet {
    max: usize,
    symbols: BTreeSet<Symbol>,
}

impl ManagedSet {
    /// Empty set admitting up to `max` symbols.
    #[must_use]
    pub const fn new(max: usize) -> Self {
        Self {
            max,
            symbols: BTreeSet::new(),
        }
    }

    /// Whether `symbol` is managed live, admitting it if there is room.
    pub fn admit(&mut self, symbol: &Symbol) -> bool {
        if self.symbols.contains(symbol) {
            return true;
        }
        if self.symbols.len() < self.max {
            self.symbols.insert(symbol.clone());
            tracing::info!(symbol = %symbol, managed = self.symbols.len(), max = self.max, "Symbol under live exit management");
            return true;
        }
        false
    }

    /// Drop symbols whose positions are gone.
    pub fn retain_open(&mut self, open: &[Symbol]) {
        self.symbols.retain(|s| open.contains(s));
    }

    /// Managed symbols.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().cloned().collect()
    }
}
