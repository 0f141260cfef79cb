//! Error types for the sqrtsam library
//!
//! This module provides the error and result types used throughout the
//! library. All errors use the `thiserror` crate for automatic trait
//! implementations.
//!
//! The library is a pure computational core: every failure is either a
//! programmer error (bad construction arguments, size mismatches) or a
//! genuine numerical singularity. Both are reported immediately to the
//! caller; nothing is retried or silently patched.

use thiserror::Error;

/// Result type used throughout the sqrtsam library
pub type LinearResult<T> = Result<T, LinearError>;

/// Error type for the sqrtsam library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinearError {
    /// Invalid construction argument (negative/NaN sigma, zero sigma for an
    /// isotropic model, mismatched mu/sigma lengths)
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A vector or matrix argument whose size disagrees with the model or
    /// layout it is used with
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Elimination could not unambiguously classify a pivot as free or
    /// constrained within tolerance
    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),
}
