//! Constrained noise model: diagonal with zero sigmas allowed.

use nalgebra::{DMatrix, DVector, RowDVector};
use tracing::trace;

use super::{check_augmented, check_dim, Diagonal, NoiseModel};
use crate::error::{LinearError, LinearResult};
use crate::linalg::{weighted_pseudoinverse, PRECISION_FLOOR};

/// A specialization of the diagonal model in which some or all sigmas may be
/// zero, forcing the error to be zero on those dimensions.
///
/// Every other model is guaranteed a non-singular square-root information
/// matrix; this one is equipped for the singular case: whitening returns zero
/// on components with zero sigma *and* zero error, and applies the penalty
/// weight `mu` otherwise. A hard constraint may look like infinite error, but
/// no operation here ever produces an infinity: the finite penalty keeps
/// badly initialized constraints optimizable instead of self-destructing.
#[derive(Debug, Clone, PartialEq)]
pub struct Constrained {
    sigmas: DVector<f64>,
    /// Zero on constrained dimensions, 1/sigma elsewhere
    invsigmas: DVector<f64>,
    /// Zero on constrained dimensions, 1/sigma² elsewhere
    precisions: DVector<f64>,
    /// Penalty weight per dimension; must be large enough to dominate the
    /// soft constraints
    mu: DVector<f64>,
}

impl Constrained {
    /// Penalty weight used when none is supplied.
    pub const DEFAULT_MU: f64 = 1000.0;

    /// Create from standard deviations, some of which may be zero, with the
    /// default penalty weight.
    pub fn mixed_sigmas(sigmas: DVector<f64>) -> LinearResult<NoiseModel> {
        let mu = DVector::from_element(sigmas.len(), Self::DEFAULT_MU);
        Self::mixed_sigmas_with_mu(mu, sigmas)
    }

    /// Create from standard deviations and an explicit penalty weight per
    /// dimension.
    pub fn mixed_sigmas_with_mu(mu: DVector<f64>, sigmas: DVector<f64>) -> LinearResult<NoiseModel> {
        Ok(NoiseModel::Constrained(Self::checked(mu, sigmas)?))
    }

    /// Create from variances, some of which may be zero.
    pub fn mixed_variances(variances: DVector<f64>) -> LinearResult<NoiseModel> {
        if variances.iter().any(|&v| !v.is_finite() || v < 0.0) {
            return Err(LinearError::InvalidParameter(
                "variances must be finite and non-negative".to_string(),
            ));
        }
        Self::mixed_sigmas(variances.map(f64::sqrt))
    }

    /// Create from precisions, some of which may be infinite (the hard
    /// dimensions).
    pub fn mixed_precisions(mu: DVector<f64>, precisions: DVector<f64>) -> LinearResult<NoiseModel> {
        let mut sigmas = DVector::zeros(precisions.len());
        for i in 0..precisions.len() {
            let p = precisions[i];
            if p.is_infinite() {
                sigmas[i] = 0.0;
            } else if p.is_finite() && p > 0.0 {
                sigmas[i] = 1.0 / p.sqrt();
            } else {
                return Err(LinearError::InvalidParameter(
                    "precisions must be strictly positive or infinite".to_string(),
                ));
            }
        }
        Self::mixed_sigmas_with_mu(mu, sigmas)
    }

    /// Fully constrained model: every dimension is a hard equality.
    pub fn all(dim: usize) -> LinearResult<NoiseModel> {
        Self::mixed_sigmas(DVector::zeros(dim))
    }

    /// Fully constrained model with a shared penalty weight.
    pub fn all_with_mu(dim: usize, mu: f64) -> LinearResult<NoiseModel> {
        Self::mixed_sigmas_with_mu(DVector::from_element(dim, mu), DVector::zeros(dim))
    }

    fn checked(mu: DVector<f64>, sigmas: DVector<f64>) -> LinearResult<Self> {
        if sigmas.is_empty() {
            return Err(LinearError::InvalidParameter(
                "noise model dimension must be positive".to_string(),
            ));
        }
        if mu.len() != sigmas.len() {
            return Err(LinearError::InvalidParameter(format!(
                "mu length {} does not match sigma length {}",
                mu.len(),
                sigmas.len()
            )));
        }
        if sigmas.iter().any(|&s| !s.is_finite() || s < 0.0) {
            return Err(LinearError::InvalidParameter(
                "sigmas must be finite and non-negative".to_string(),
            ));
        }
        if mu.iter().any(|&m| !m.is_finite() || m <= 0.0) {
            return Err(LinearError::InvalidParameter(
                "penalty weights must be finite and strictly positive".to_string(),
            ));
        }

        // Keep the cached vectors finite: constrained dimensions carry zero
        // here and are handled explicitly in every operation.
        let invsigmas = sigmas.map(|s| if s == 0.0 { 0.0 } else { 1.0 / s });
        let precisions = invsigmas.map(|s| s * s);
        Ok(Self {
            sigmas,
            invsigmas,
            precisions,
            mu,
        })
    }

    pub fn dim(&self) -> usize {
        self.sigmas.len()
    }

    pub fn sigmas(&self) -> &DVector<f64> {
        &self.sigmas
    }

    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    /// True if dimension `i` is a hard equality constraint.
    pub fn constrained_dim(&self, i: usize) -> bool {
        self.sigmas[i] == 0.0
    }

    /// A model in which free sigmas are rescaled to one and constrained
    /// dimensions stay constrained.
    pub fn unit(&self) -> NoiseModel {
        let sigmas = self.sigmas.map(|s| if s == 0.0 { 0.0 } else { 1.0 });
        NoiseModel::Constrained(Self {
            invsigmas: sigmas.map(|s| if s == 0.0 { 0.0 } else { 1.0 }),
            precisions: sigmas.map(|s| if s == 0.0 { 0.0 } else { 1.0 }),
            sigmas,
            mu: self.mu.clone(),
        })
    }

    /// Error vector with weights applied.
    ///
    /// Free dimensions divide by sigma. A satisfied constraint (zero sigma,
    /// zero error) whitens to zero; a violated one scales by the finite
    /// penalty `mu`, never to infinity.
    pub fn whiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        check_dim(self.dim(), v.len())?;
        let mut whitened = DVector::zeros(v.len());
        for i in 0..v.len() {
            whitened[i] = if self.sigmas[i] == 0.0 {
                if v[i] == 0.0 {
                    0.0
                } else {
                    self.mu[i] * v[i]
                }
            } else {
                v[i] * self.invsigmas[i]
            };
        }
        Ok(whitened)
    }

    /// Inverse of whiten on the free dimensions; constrained dimensions map
    /// to zero (their sigma).
    pub fn unwhiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        check_dim(self.dim(), v.len())?;
        Ok(v.component_mul(&self.sigmas))
    }

    /// Partial whitening: rows with nonzero sigma are scaled, constrained
    /// rows are left untouched for the QR step to treat as exact equations.
    pub fn whiten_matrix(&self, h: &DMatrix<f64>) -> LinearResult<DMatrix<f64>> {
        let mut whitened = h.clone();
        self.whiten_matrix_in_place(&mut whitened)?;
        Ok(whitened)
    }

    pub fn whiten_matrix_in_place(&self, h: &mut DMatrix<f64>) -> LinearResult<()> {
        check_dim(self.dim(), h.nrows())?;
        for i in 0..h.nrows() {
            if self.sigmas[i] != 0.0 {
                let mut row = h.row_mut(i);
                row *= self.invsigmas[i];
            }
        }
        Ok(())
    }

    /// Quadratic cost: penalty-weighted on constrained dimensions, precision-
    /// weighted on free ones. Finite for all finite inputs.
    pub fn distance(&self, v: &DVector<f64>) -> LinearResult<f64> {
        check_dim(self.dim(), v.len())?;
        let mut total = 0.0;
        for i in 0..v.len() {
            total += if self.sigmas[i] == 0.0 {
                self.mu[i] * v[i] * v[i]
            } else {
                self.precisions[i] * v[i] * v[i]
            };
        }
        Ok(total)
    }

    pub fn whiten_system(
        &self,
        blocks: &mut [DMatrix<f64>],
        b: &mut DVector<f64>,
    ) -> LinearResult<()> {
        check_dim(self.dim(), b.len())?;
        for block in blocks.iter_mut() {
            self.whiten_matrix_in_place(block)?;
        }
        for i in 0..b.len() {
            if self.sigmas[i] != 0.0 {
                b[i] *= self.invsigmas[i];
            }
        }
        Ok(())
    }

    /// Weighted QR elimination honoring the hard constraints.
    ///
    /// Columns are eliminated one at a time: each scalar variable is solved
    /// as d - r·S against the remaining separator S via the weighted
    /// pseudo-inverse, with hard-constraint rows carrying infinite weight so
    /// an exact equation, when present, pivots exactly. Columns whose
    /// precision falls below the documented floor carry no information and
    /// are skipped. The reduced rows end up free (finite precision) or
    /// constrained (infinite); the returned model tags them accordingly.
    pub fn qr(&self, ab: &mut DMatrix<f64>) -> LinearResult<NoiseModel> {
        check_augmented(self.dim(), ab)?;
        let m = ab.nrows();
        let n = ab.ncols() - 1;
        let max_rank = m.min(n);

        let mut weights = DVector::zeros(m);
        for i in 0..m {
            weights[i] = if self.constrained_dim(i) {
                f64::INFINITY
            } else {
                self.precisions[i]
            };
        }

        // (column, row of [R d] starting at that column, precision)
        let mut rows: Vec<(usize, RowDVector<f64>, f64)> = Vec::with_capacity(max_rank);

        for j in 0..n {
            let a = ab.column(j).clone_owned();
            let (pseudo, precision) = weighted_pseudoinverse(&a, &weights)?;

            if precision < PRECISION_FLOOR {
                trace!(column = j, precision, "column carries no information");
                continue;
            }

            // Solution row [1 r d]: unit pivot, then the pseudo-inverse
            // applied to the separator columns and rhs.
            let tail_cols = n - j;
            let mut rd = RowDVector::zeros(tail_cols + 1);
            rd[0] = 1.0;
            let tail = pseudo.transpose() * ab.view((0, j + 1), (m, tail_cols));
            rd.view_mut((0, 1), (1, tail_cols)).copy_from(&tail);
            rows.push((j, rd, precision));

            if rows.len() >= max_rank {
                break;
            }

            // Substitute x = d - r·S into the remaining columns.
            let rd_row = &rows[rows.len() - 1].1;
            let update = &a * rd_row.view((0, 1), (1, tail_cols));
            let mut remainder = ab.view_mut((0, j + 1), (m, tail_cols));
            remainder -= &update;
        }

        if rows.is_empty() {
            return Err(LinearError::NumericalDegeneracy(
                "no column carried information above the precision floor".to_string(),
            ));
        }

        // Write [R d] back; everything else is zero.
        ab.fill(0.0);
        let mut precisions = DVector::zeros(rows.len());
        let mut mixed = false;
        for (i, (j, rd, precision)) in rows.iter().enumerate() {
            precisions[i] = *precision;
            if precision.is_infinite() {
                mixed = true;
            }
            ab.view_mut((i, *j), (1, rd.len())).copy_from(rd);
        }

        if mixed {
            let mu = self.mu.rows(0, rows.len()).clone_owned();
            Constrained::mixed_precisions(mu, precisions)
        } else {
            Diagonal::from_precisions(precisions, true)
        }
    }
}
