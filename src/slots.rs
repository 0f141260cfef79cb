//! Per-variable, per-factor slot bookkeeping for combined factors.
//!
//! A combined factor is assembled as one block of rows per component factor.
//! In each row block, some column blocks are empty because factors involving
//! different variable sets are interleaved. [`VariableSlots`] describes that
//! 2D block structure: for every involved variable it records, per factor,
//! which local column block of the component factor lands in the combined
//! factor's column for that variable.
//!
//! For example, combining factors over variables {1, 3, 5} where factor 2
//! lists variable 3 at local position 0, `slots(3)[2] == Some(0)`. A `None`
//! entry means the factor does not involve the variable.

use std::collections::BTreeMap;

use tracing::trace;

use crate::graph::{Factor, FactorGraph, Key};

/// Key-sorted map from each involved variable to its local slot in every
/// factor being combined.
///
/// Every slot vector has length equal to the factor count supplied at
/// construction and never changes size afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableSlots {
    slots: BTreeMap<Key, Vec<Option<usize>>>,
    num_factors: usize,
}

impl VariableSlots {
    /// Compute the slot structure for an ordered set of factors.
    ///
    /// Runs in O(sum of factor sizes). If a factor lists the same variable
    /// twice, the last local occurrence wins for that factor's slot; this is
    /// implementation-defined and deliberately not deduplicated.
    pub fn new<F: Factor>(graph: &FactorGraph<F>) -> Self {
        let num_factors = graph.len();
        let mut slots: BTreeMap<Key, Vec<Option<usize>>> = BTreeMap::new();

        for (row_block, factor) in graph.iter().enumerate() {
            for (local_slot, key) in factor.keys().iter().enumerate() {
                let entry = slots
                    .entry(*key)
                    .or_insert_with(|| vec![None; num_factors]);
                trace!(key, row_block, local_slot, "variable slot assigned");
                entry[row_block] = Some(local_slot);
            }
        }

        Self { slots, num_factors }
    }

    /// Slot vector for `key`: entry `j` is the local column of `key` in
    /// factor `j`, or `None` if factor `j` does not involve it.
    pub fn get(&self, key: Key) -> Option<&[Option<usize>]> {
        self.slots.get(&key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: Key) -> bool {
        self.slots.contains_key(&key)
    }

    /// Number of involved variables.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of factors supplied at construction; the length of every slot
    /// vector.
    pub fn num_factors(&self) -> usize {
        self.num_factors
    }

    /// Iterate over (key, slots) pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, &[Option<usize>])> {
        self.slots.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SymbolicFactor;

    fn graph(key_lists: &[&[Key]]) -> FactorGraph<SymbolicFactor> {
        key_lists
            .iter()
            .map(|keys| SymbolicFactor::new(keys.to_vec(), vec![1; keys.len()]).unwrap())
            .collect()
    }

    #[test]
    fn test_two_factor_slot_structure() {
        // factor0 touches (3,5), factor1 touches (1,3)
        let slots = VariableSlots::new(&graph(&[&[3, 5], &[1, 3]]));

        assert_eq!(slots.len(), 3);
        assert_eq!(slots.num_factors(), 2);
        assert_eq!(slots.get(1).unwrap(), &[None, Some(0)]);
        assert_eq!(slots.get(3).unwrap(), &[Some(0), Some(1)]);
        assert_eq!(slots.get(5).unwrap(), &[Some(1), None]);
        assert!(slots.get(4).is_none());
    }

    #[test]
    fn test_keys_iterate_in_ascending_order() {
        let slots = VariableSlots::new(&graph(&[&[9, 2], &[7, 2, 4]]));
        let keys: Vec<Key> = slots.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![2, 4, 7, 9]);
    }

    #[test]
    fn test_every_entry_has_factor_count_length() {
        let slots = VariableSlots::new(&graph(&[&[1], &[2], &[3, 1]]));
        for (_, entry) in slots.iter() {
            assert_eq!(entry.len(), 3);
        }
    }

    #[test]
    fn test_duplicate_key_in_one_factor_last_wins() {
        let slots = VariableSlots::new(&graph(&[&[2, 2]]));
        assert_eq!(slots.get(2).unwrap(), &[Some(1)]);
    }

    #[test]
    fn test_empty_graph() {
        let slots = VariableSlots::new(&graph(&[]));
        assert!(slots.is_empty());
        assert_eq!(slots.num_factors(), 0);
    }
}
