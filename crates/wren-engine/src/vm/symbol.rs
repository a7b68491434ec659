//! Symbol tables
//!
//! A symbol table maps names to small, stable integer indices. The VM keeps
//! one global table of method signatures, so every class's method table can
//! be indexed by the same symbol, and each module keeps one for its
//! top-level variable names.

use rustc_hash::FxHashMap;

/// Name ↔ index bijection with stable indices.
///
/// Indices are assigned in insertion order and never change, so they can be
/// baked into bytecode operands.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Map from name to index
    map: FxHashMap<String, usize>,

    /// Names in index order
    names: Vec<String>,
}

impl SymbolTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a name, returning its index if present.
    #[inline]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.map.get(name).copied()
    }

    /// Return the index for `name`, adding it if missing.
    pub fn ensure(&mut self, name: &str) -> usize {
        if let Some(&symbol) = self.map.get(name) {
            return symbol;
        }
        self.push(name)
    }

    /// Append `name` unconditionally and return its index.
    ///
    /// Callers must have checked with [`find`](Self::find) that the name is new.
    pub fn add(&mut self, name: &str) -> usize {
        debug_assert!(!self.map.contains_key(name), "symbol '{}' already present", name);
        self.push(name)
    }

    fn push(&mut self, name: &str) -> usize {
        let symbol = self.names.len();
        self.names.push(name.to_string());
        self.map.insert(name.to_string(), symbol);
        symbol
    }

    /// Resolve an index back to its name.
    ///
    /// # Panics
    ///
    /// Panics if the index was not produced by this table.
    #[inline]
    pub fn name(&self, symbol: usize) -> &str {
        &self.names[symbol]
    }

    /// Resolve an index, returning `None` when out of range.
    pub fn get(&self, symbol: usize) -> Option<&str> {
        self.names.get(symbol).map(String::as_str)
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    /// Drop every symbol with index `len` or above.
    pub fn truncate(&mut self, len: usize) {
        for name in self.names.drain(len.min(self.names.len())..) {
            self.map.remove(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_deduplicates() {
        let mut table = SymbolTable::new();

        let a = table.ensure("foo(_)");
        let b = table.ensure("bar");
        let c = table.ensure("foo(_)");

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_indices_are_stable() {
        let mut table = SymbolTable::new();
        let names = ["a", "b", "c", "d"];
        let symbols: Vec<_> = names.iter().map(|n| table.ensure(n)).collect();

        assert_eq!(symbols, vec![0, 1, 2, 3]);
        for (symbol, name) in symbols.iter().zip(names) {
            assert_eq!(table.name(*symbol), name);
        }
    }

    #[test]
    fn test_find_missing() {
        let mut table = SymbolTable::new();
        table.add("present");
        assert_eq!(table.find("present"), Some(0));
        assert_eq!(table.find("absent"), None);
        assert_eq!(table.get(7), None);
    }
}
