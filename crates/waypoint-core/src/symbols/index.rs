//! Arena-backed symbol store with address and name indices.

use std::collections::{BTreeMap, HashMap};

use super::Symbol;
use crate::types::Address;

/// Every symbol ever inserted, in insertion order, plus two key indices.
///
/// Records are only appended; the indices point at the most recent record
/// for each key, so a later insertion with the same address or the same name
/// shadows the earlier one on that index alone. Both indices are updated in
/// the same call as the push, so they never disagree with the arena.
#[derive(Debug, Default)]
pub struct SymbolIndex
{
    records: Vec<Symbol>,
    by_address: BTreeMap<Address, usize>,
    by_name: HashMap<String, usize>,
}

impl SymbolIndex
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append `symbol` and point both indices at it.
    pub fn insert(&mut self, symbol: Symbol)
    {
        let slot = self.records.len();
        self.by_address.insert(symbol.address, slot);
        self.by_name.insert(symbol.name.clone(), slot);
        self.records.push(symbol);
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Symbol>
    {
        self.by_name.get(name).map(|&slot| &self.records[slot])
    }

    pub fn find_by_address(&self, address: Address) -> Option<&Symbol>
    {
        self.by_address.get(&address).map(|&slot| &self.records[slot])
    }

    /// The symbol whose range contains `address`.
    ///
    /// Only the closest start at or below `address` is considered; if that
    /// symbol is too short to reach `address` the lookup fails even when an
    /// earlier, larger symbol would cover it.
    pub fn find_nearest(&self, address: Address) -> Option<&Symbol>
    {
        let (_, &slot) = self.by_address.range(..=address).next_back()?;
        let symbol = &self.records[slot];
        symbol.contains(address).then_some(symbol)
    }

    /// All inserted records in insertion order, shadowed ones included.
    pub fn all(&self) -> &[Symbol]
    {
        &self.records
    }

    pub fn len(&self) -> usize
    {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.records.is_empty()
    }

    pub fn clear(&mut self)
    {
        self.records.clear();
        self.by_address.clear();
        self.by_name.clear();
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn sym(name: &str, address: u64, size: u64) -> Symbol
    {
        Symbol::new("libtest.so", name, Address::new(address), size, 'T')
    }

    #[test]
    fn test_nearest_uses_closest_lower_start_only()
    {
        let mut index = SymbolIndex::new();
        index.insert(sym("outer", 0x1000, 0x100));
        index.insert(sym("inner", 0x1010, 0x4));

        assert_eq!(index.find_nearest(Address::new(0x1012)).unwrap().raw_name, "inner");
        // covered by `outer`, but `inner` is the closest start and ends at 0x1014
        assert!(index.find_nearest(Address::new(0x1020)).is_none());
        assert!(index.find_nearest(Address::new(0x0fff)).is_none());
    }

    #[test]
    fn test_shadowing_is_per_index()
    {
        let mut index = SymbolIndex::new();
        index.insert(sym("first", 0x2000, 8));
        index.insert(sym("second", 0x2000, 8));
        index.insert(sym("first", 0x3000, 8));

        assert_eq!(index.find_by_address(Address::new(0x2000)).unwrap().raw_name, "second");
        assert_eq!(index.find_by_name("libtest.so::first").unwrap().address, Address::new(0x3000));
        assert_eq!(index.len(), 3);
    }
}
