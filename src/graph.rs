//! Factor and factor-graph interfaces consumed by the combination machinery.
//!
//! The slot and scatter bookkeeping only needs the *structure* of a factor:
//! which variables it touches, in which local order, and how many columns
//! each variable block occupies. The numeric payload (residuals, Jacobians,
//! noise) is handled separately during assembly.

use crate::error::{LinearError, LinearResult};

/// Variable identifier. Opaque non-negative integer, totally ordered.
pub type Key = usize;

/// Structural view of a single measurement constraint.
///
/// `keys()` returns the participating variables in local column order: the
/// position of a key in the returned slice is its local slot within this
/// factor.
pub trait Factor {
    /// Participating variable keys, in local column order.
    fn keys(&self) -> &[Key];

    /// Column width of the variable block at local position `index`.
    fn dim(&self, index: usize) -> usize;
}

/// A structure-only factor: keys plus per-block widths, no numeric payload.
///
/// Useful for layout computations and tests; real solvers implement [`Factor`]
/// on their own measurement types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicFactor {
    keys: Vec<Key>,
    dims: Vec<usize>,
}

impl SymbolicFactor {
    /// Create a factor from parallel key and width lists.
    pub fn new(keys: Vec<Key>, dims: Vec<usize>) -> LinearResult<Self> {
        if keys.len() != dims.len() {
            return Err(LinearError::DimensionMismatch {
                expected: keys.len(),
                actual: dims.len(),
            });
        }
        Ok(Self { keys, dims })
    }
}

impl Factor for SymbolicFactor {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self, index: usize) -> usize {
        self.dims[index]
    }
}

/// Ordered collection of factors being combined or eliminated together.
#[derive(Debug, Clone)]
pub struct FactorGraph<F: Factor> {
    factors: Vec<F>,
}

impl<F: Factor> FactorGraph<F> {
    pub fn new() -> Self {
        Self {
            factors: Vec::new(),
        }
    }

    /// Append a factor; factor order defines row-block order downstream.
    pub fn add(&mut self, factor: F) {
        self.factors.push(factor);
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&F> {
        self.factors.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, F> {
        self.factors.iter()
    }
}

impl<F: Factor> Default for FactorGraph<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Factor> FromIterator<F> for FactorGraph<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        Self {
            factors: iter.into_iter().collect(),
        }
    }
}
