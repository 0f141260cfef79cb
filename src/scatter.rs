//! Ordered (key, width) layout of the variables in a combined block matrix.
//!
//! [`Scatter`] is the intermediate structure used when assembling factors
//! into one combined system: it fixes the column order of the involved
//! variables and, through the prefix sum of their block widths, the column
//! offset at which each variable's block starts.

use tracing::{debug, trace};

use crate::error::{LinearError, LinearResult};
use crate::graph::{Factor, FactorGraph, Key};

/// One block's position in a combined matrix: variable key and column width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    pub key: Key,
    pub dim: usize,
}

impl SlotEntry {
    pub fn new(key: Key, dim: usize) -> Self {
        Self { key, dim }
    }
}

/// Ordered, duplicate-free sequence of [`SlotEntry`].
///
/// The column offset of entry `i` is the sum of the widths of entries before
/// it. Zero-width entries mark already-eliminated variables; removing them
/// never changes the offsets of surviving entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scatter {
    entries: Vec<SlotEntry>,
}

impl Scatter {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build the layout for a set of factors, with an optional (partial or
    /// complete) variable ordering.
    ///
    /// Keys named in the ordering come first, in ordering position; keys the
    /// ordering does not mention are appended afterwards sorted ascending.
    /// Without an ordering, all keys are sorted ascending. Ordering keys that
    /// no factor involves are dropped at finalization.
    pub fn from_graph<F: Factor>(
        graph: &FactorGraph<F>,
        ordering: Option<&[Key]>,
    ) -> LinearResult<Self> {
        let mut scatter = Self::new();

        // Pre-fill ordered keys with zero width; the factor sweep fills the
        // real widths in.
        let num_ordered = if let Some(keys) = ordering {
            for &key in keys {
                scatter.add(key, 0)?;
            }
            scatter.entries.len()
        } else {
            0
        };

        for factor in graph.iter() {
            for (index, &key) in factor.keys().iter().enumerate() {
                scatter.add(key, factor.dim(index))?;
            }
        }

        // Keys beyond the ordering prefix are laid out in ascending key order.
        scatter.entries[num_ordered..].sort_by_key(|entry| entry.key);

        // Ordering keys that never appeared in a factor still have zero width.
        scatter.drop_zero_entries();

        debug!(
            variables = scatter.len(),
            total_dim = scatter.total_dim(),
            "scatter layout built"
        );
        Ok(scatter)
    }

    /// Record a key/width pair.
    ///
    /// A new key is appended. An existing entry with width zero (ordering
    /// pre-fill) adopts the observed width; an equal width is a no-op; a
    /// conflicting nonzero width is a contract violation.
    pub fn add(&mut self, key: Key, dim: usize) -> LinearResult<()> {
        let Some(index) = self.entries.iter().position(|entry| entry.key == key) else {
            trace!(key, dim, "scatter entry added");
            self.entries.push(SlotEntry::new(key, dim));
            return Ok(());
        };

        let entry = &mut self.entries[index];
        if entry.dim == 0 {
            entry.dim = dim;
        } else if entry.dim != dim && dim != 0 {
            return Err(LinearError::DimensionMismatch {
                expected: entry.dim,
                actual: dim,
            });
        }
        Ok(())
    }

    /// Find the entry with the given key. Linear scan: the number of distinct
    /// variables per combination step is small.
    pub fn find(&self, key: Key) -> Option<&SlotEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Column offset of entry `i`: exclusive prefix sum of widths.
    pub fn offset(&self, index: usize) -> usize {
        self.entries[..index].iter().map(|entry| entry.dim).sum()
    }

    /// Total column width of the combined layout.
    pub fn total_dim(&self) -> usize {
        self.entries.iter().map(|entry| entry.dim).sum()
    }

    /// Remove zero-width entries (already-eliminated variables). Offsets of
    /// the surviving entries are unchanged.
    pub fn drop_zero_entries(&mut self) {
        self.entries.retain(|entry| entry.dim > 0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SlotEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SlotEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SymbolicFactor;

    fn graph(factors: &[(&[Key], &[usize])]) -> FactorGraph<SymbolicFactor> {
        factors
            .iter()
            .map(|(keys, dims)| SymbolicFactor::new(keys.to_vec(), dims.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_unordered_layout_sorts_by_key() {
        // pairs (3,2), (1,1), (5,3) with no explicit ordering
        let graph = graph(&[(&[3, 1, 5], &[2, 1, 3])]);
        let scatter = Scatter::from_graph(&graph, None).unwrap();

        let keys: Vec<Key> = scatter.iter().map(|entry| entry.key).collect();
        assert_eq!(keys, vec![1, 3, 5]);
        assert_eq!(scatter.offset(0), 0);
        assert_eq!(scatter.offset(1), 1);
        assert_eq!(scatter.offset(2), 3);
        assert_eq!(scatter.total_dim(), 6);
    }

    #[test]
    fn test_explicit_ordering_comes_first() {
        let graph = graph(&[(&[1, 3], &[1, 2]), (&[5], &[3])]);
        let scatter = Scatter::from_graph(&graph, Some(&[5, 3])).unwrap();

        let keys: Vec<Key> = scatter.iter().map(|entry| entry.key).collect();
        assert_eq!(keys, vec![5, 3, 1]);
        assert_eq!(scatter.offset(0), 0);
        assert_eq!(scatter.offset(1), 3);
        assert_eq!(scatter.offset(2), 5);
        assert_eq!(scatter.total_dim(), 6);
    }

    #[test]
    fn test_ordering_key_without_factor_is_dropped() {
        let graph = graph(&[(&[2], &[4])]);
        let scatter = Scatter::from_graph(&graph, Some(&[9, 2])).unwrap();

        let keys: Vec<Key> = scatter.iter().map(|entry| entry.key).collect();
        assert_eq!(keys, vec![2]);
        assert_eq!(scatter.total_dim(), 4);
    }

    #[test]
    fn test_repeated_key_must_match_width() {
        let mut scatter = Scatter::new();
        scatter.add(1, 2).unwrap();
        scatter.add(1, 2).unwrap();
        assert_eq!(scatter.len(), 1);

        assert_eq!(
            scatter.add(1, 3).unwrap_err(),
            LinearError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_zero_width_prefill_adopts_observed_width() {
        let mut scatter = Scatter::new();
        scatter.add(7, 0).unwrap();
        scatter.add(7, 4).unwrap();
        assert_eq!(scatter.find(7).unwrap().dim, 4);
    }

    #[test]
    fn test_drop_zero_entries_preserves_offsets() {
        let mut scatter = Scatter::new();
        scatter.add(1, 2).unwrap();
        scatter.add(2, 0).unwrap();
        scatter.add(3, 5).unwrap();

        let offset_before = scatter.offset(2);
        scatter.drop_zero_entries();

        assert_eq!(scatter.len(), 2);
        assert_eq!(scatter.offset(1), offset_before);
        assert_eq!(scatter.total_dim(), 7);
    }
}
