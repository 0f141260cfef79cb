//! In-place triangularization and weighted pseudo-inverse.
//!
//! The thresholds below are fixed constants so elimination results are
//! reproducible across platforms.

use nalgebra::{DMatrix, DVector};

use crate::error::{LinearError, LinearResult};

/// Columns whose weighted precision falls below this floor carry no
/// information and are skipped during elimination.
pub const PRECISION_FLOOR: f64 = 1e-8;

/// Minimum magnitude of a hard-constraint row entry usable as an exact pivot.
pub const PIVOT_THRESHOLD: f64 = 1e-9;

/// Entries below this magnitude are treated as exact zeros. A
/// hard-constraint entry between [`CLEAN_ZERO`] and [`PIVOT_THRESHOLD`] is
/// neither a usable pivot nor cleanly zero and is reported as degenerate.
pub const CLEAN_ZERO: f64 = 1e-12;

/// Triangularize `ab` in place with Givens rotations.
///
/// On return the strictly sub-diagonal entries are exact zeros and each
/// diagonal entry of the triangularized prefix is non-negative (rows are
/// sign-normalized, which is itself an orthogonal transformation).
pub fn inplace_qr(ab: &mut DMatrix<f64>) {
    let (m, n) = ab.shape();
    let steps = m.min(n);

    for j in 0..steps {
        for i in (j + 1)..m {
            let b = ab[(i, j)];
            if b == 0.0 {
                continue;
            }
            let a = ab[(j, j)];
            let r = a.hypot(b);
            if r == 0.0 {
                continue;
            }
            let (c, s) = (a / r, b / r);
            for k in j..n {
                let t1 = ab[(j, k)];
                let t2 = ab[(i, k)];
                ab[(j, k)] = c * t1 + s * t2;
                ab[(i, k)] = -s * t1 + c * t2;
            }
            ab[(i, j)] = 0.0;
        }
    }

    ab.fill_lower_triangle(0.0, 1);

    for j in 0..steps {
        if ab[(j, j)] < 0.0 {
            let mut row = ab.row_mut(j);
            row *= -1.0;
        }
    }
}

/// Weighted pseudo-inverse of column `a` under per-row `weights`
/// (precisions), returning the pseudo-inverse vector and the precision of
/// the eliminated scalar.
///
/// Rows with infinite weight are hard constraints: if such a row has a
/// usable entry, elimination pivots on it exactly and the returned precision
/// is infinite. Otherwise the free rows contribute
/// `precision = a' * diag(weights) * a` and
/// `pseudo = diag(weights) * a / precision`; a precision below
/// [`PRECISION_FLOOR`] yields a zero pseudo-inverse (the column carries no
/// information).
pub fn weighted_pseudoinverse(
    a: &DVector<f64>,
    weights: &DVector<f64>,
) -> LinearResult<(DVector<f64>, f64)> {
    let m = a.len();
    if weights.len() != m {
        return Err(LinearError::DimensionMismatch {
            expected: m,
            actual: weights.len(),
        });
    }

    // A valid hard-constraint entry wins outright; pivoting on it turns
    // a*x + A*S = b into x + (A/a)*S = b/a for that row.
    for i in 0..m {
        if weights[i].is_infinite() {
            let magnitude = a[i].abs();
            if magnitude >= PIVOT_THRESHOLD {
                let mut pseudo = DVector::zeros(m);
                pseudo[i] = 1.0 / a[i];
                return Ok((pseudo, f64::INFINITY));
            }
            if magnitude >= CLEAN_ZERO {
                return Err(LinearError::NumericalDegeneracy(format!(
                    "constrained row {i} entry {magnitude:e} is between the clean-zero and pivot thresholds"
                )));
            }
        }
    }

    // Free path: precision = a' * diag(weights) * a over usable rows.
    let mut precision = 0.0;
    for i in 0..m {
        let ai = a[i];
        if weights[i].is_finite() && ai.abs() >= CLEAN_ZERO {
            precision += weights[i] * ai * ai;
        }
    }

    let mut pseudo = DVector::zeros(m);
    if precision >= PRECISION_FLOOR {
        for i in 0..m {
            let ai = a[i];
            if weights[i].is_finite() && ai.abs() >= CLEAN_ZERO {
                pseudo[i] = weights[i] * ai / precision;
            }
        }
    }
    Ok((pseudo, precision))
}
