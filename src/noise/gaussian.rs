//! Full-covariance Gaussian noise model.

use nalgebra::{Cholesky, DMatrix, DVector};

use super::{check_augmented, check_dim, is_diagonal, Diagonal, Isotropic, NoiseModel};
use crate::error::{LinearError, LinearResult};
use crate::linalg::inplace_qr;

/// Gaussian noise with a full covariance matrix.
///
/// Implements `|R·x|² = |y|²` with `RᵀR = Σ⁻¹`, where `y = whiten(x) = R·x`
/// and `x = unwhiten(y) = R⁻¹·y`. R is the upper-triangular square-root
/// information matrix; it is guaranteed non-singular here (singular models
/// belong to [`Constrained`](super::Constrained)).
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    /// Upper-triangular square root of the information matrix
    r: DMatrix<f64>,
    /// Standard deviations, computed once at construction
    sigmas: DVector<f64>,
}

impl Gaussian {
    /// Create from an upper-triangular square-root information matrix R.
    ///
    /// With `smart` set, a numerically diagonal R is returned as the cheaper
    /// diagonal (or isotropic) variant instead.
    pub fn from_sqrt_information(r: DMatrix<f64>, smart: bool) -> LinearResult<NoiseModel> {
        check_dim(r.nrows(), r.ncols())?;
        if r.nrows() == 0 {
            return Err(LinearError::InvalidParameter(
                "noise model dimension must be positive".to_string(),
            ));
        }
        if r.iter().any(|x| !x.is_finite()) {
            return Err(LinearError::InvalidParameter(
                "square-root information matrix has non-finite entries".to_string(),
            ));
        }
        if r.diagonal().iter().any(|&x| x == 0.0) {
            return Err(LinearError::InvalidParameter(
                "singular square-root information matrix; exact constraints belong to the constrained model"
                    .to_string(),
            ));
        }

        if smart && is_diagonal(&r) && r.diagonal().iter().all(|&x| x > 0.0) {
            let sigmas = r.diagonal().map(|x| 1.0 / x);
            return Diagonal::from_sigmas(sigmas, true);
        }

        let sigmas = Self::sigmas_from_r(&r)?;
        Ok(NoiseModel::Gaussian(Self { r, sigmas }))
    }

    /// Create from an information matrix Σ⁻¹ via Cholesky factorization.
    pub fn from_information(m: DMatrix<f64>, smart: bool) -> LinearResult<NoiseModel> {
        check_dim(m.nrows(), m.ncols())?;
        if smart && is_diagonal(&m) {
            return Diagonal::from_precisions(m.diagonal(), true);
        }
        let chol = Cholesky::new(m).ok_or_else(|| {
            LinearError::InvalidParameter("information matrix is not positive definite".to_string())
        })?;
        Self::from_sqrt_information(chol.l().transpose(), smart)
    }

    /// Create from a covariance matrix Σ via inversion and Cholesky.
    pub fn from_covariance(s: DMatrix<f64>, smart: bool) -> LinearResult<NoiseModel> {
        check_dim(s.nrows(), s.ncols())?;
        if smart && is_diagonal(&s) {
            return Diagonal::from_variances(s.diagonal(), true);
        }
        let information = s.try_inverse().ok_or_else(|| {
            LinearError::InvalidParameter("covariance matrix is not invertible".to_string())
        })?;
        Self::from_information(information, smart)
    }

    fn sigmas_from_r(r: &DMatrix<f64>) -> LinearResult<DVector<f64>> {
        let covariance = Self::covariance_of(r)?;
        Ok(covariance.diagonal().map(f64::sqrt))
    }

    fn covariance_of(r: &DMatrix<f64>) -> LinearResult<DMatrix<f64>> {
        let d = r.nrows();
        let r_inv = r
            .solve_upper_triangular(&DMatrix::<f64>::identity(d, d))
            .ok_or_else(|| {
                LinearError::NumericalDegeneracy(
                    "square-root information matrix could not be back-substituted".to_string(),
                )
            })?;
        Ok(&r_inv * r_inv.transpose())
    }

    pub fn dim(&self) -> usize {
        self.r.nrows()
    }

    /// R itself; note that [`whiten_matrix`](Self::whiten_matrix) is the
    /// preferred way to apply it.
    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Information matrix RᵀR.
    pub fn information_matrix(&self) -> DMatrix<f64> {
        self.r.transpose() * &self.r
    }

    /// Covariance matrix (RᵀR)⁻¹.
    pub fn covariance_matrix(&self) -> LinearResult<DMatrix<f64>> {
        Self::covariance_of(&self.r)
    }

    pub fn sigmas(&self) -> &DVector<f64> {
        &self.sigmas
    }

    pub fn whiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        check_dim(self.dim(), v.len())?;
        Ok(&self.r * v)
    }

    pub fn unwhiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        check_dim(self.dim(), v.len())?;
        self.r.solve_upper_triangular(v).ok_or_else(|| {
            LinearError::NumericalDegeneracy(
                "square-root information matrix could not be back-substituted".to_string(),
            )
        })
    }

    pub fn whiten_matrix(&self, h: &DMatrix<f64>) -> LinearResult<DMatrix<f64>> {
        check_dim(self.dim(), h.nrows())?;
        Ok(&self.r * h)
    }

    pub fn whiten_matrix_in_place(&self, h: &mut DMatrix<f64>) -> LinearResult<()> {
        check_dim(self.dim(), h.nrows())?;
        let whitened = &self.r * &*h;
        *h = whitened;
        Ok(())
    }

    /// Mahalanobis distance `vᵀ·RᵀR·v = <R·v, R·v>`.
    pub fn distance(&self, v: &DVector<f64>) -> LinearResult<f64> {
        Ok(self.whiten(v)?.norm_squared())
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
        let whitened = &self.r * &*b;
        b.copy_from(&whitened);
        Ok(())
    }

    /// Whiten the augmented system with R, then triangularize in place. The
    /// reduced rows are unit-whitened.
    pub fn qr(&self, ab: &mut DMatrix<f64>) -> LinearResult<NoiseModel> {
        check_augmented(self.dim(), ab)?;
        let whitened = &self.r * &*ab;
        *ab = whitened;
        inplace_qr(ab);
        Isotropic::unit(ab.nrows().min(ab.ncols() - 1))
    }
}
