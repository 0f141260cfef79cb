//! Dense linear algebra utilities for weighted elimination.
//!
//! This module provides the in-place dense operations the noise models build
//! their QR elimination on:
//! - Givens-rotation triangularization of an augmented system
//! - Weighted pseudo-inverse of a column under per-row precisions, including
//!   infinite-precision (hard constraint) rows

pub mod qr;

pub use qr::{inplace_qr, weighted_pseudoinverse};
pub use qr::{CLEAN_ZERO, PIVOT_THRESHOLD, PRECISION_FLOOR};
