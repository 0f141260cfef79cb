//! Measurement noise models for weighted least squares.
//!
//! A noise model describes the uncertainty of one measurement. Its job during
//! assembly and elimination is *whitening*: rescaling (or rotating) a residual
//! and the matching Jacobian blocks so their noise becomes unit-variance,
//! turning a weighted least-squares problem into an ordinary one.
//!
//! The hierarchy is a closed set of four variants:
//! - [`Gaussian`] — full covariance, held as an upper-triangular square-root
//!   information matrix R with RᵀR = Σ⁻¹
//! - [`Diagonal`] — per-dimension sigmas with cached inverse sigmas and
//!   precisions
//! - [`Constrained`] — a diagonal model that allows zero sigmas (exact
//!   equality constraints), with a finite penalty weight `mu` as the
//!   soft fallback so nothing ever whitens to infinity
//! - [`Isotropic`] — one scalar sigma shared by all dimensions, O(1) storage
//!
//! Factory constructors take a `smart` flag: when set, a model that is
//! numerically diagonal or scalar is returned as the cheaper variant. This is
//! a representation change only, never a semantic one.
//!
//! # Mathematical formulation
//!
//! For the Gaussian model `whiten(v) = R·v` and the Mahalanobis distance is
//! `|R·v|² = vᵀΣ⁻¹v`; the other variants are specializations with cheaper
//! paths. `whiten_matrix(H)` applies the same reweighting to every column of
//! a Jacobian block, which is equivalent to (but cheaper than) forming `R·H`.
//!
//! # Concurrency
//!
//! Models are immutable after construction: `&self` operations on distinct
//! or shared instances may run concurrently without coordination. The
//! in-place operations (`whiten_in_place`, `whiten_system`, `qr`) mutate
//! caller-owned buffers through `&mut` and therefore demand the caller's
//! exclusive access for the duration of the call.

pub mod constrained;
pub mod diagonal;
pub mod gaussian;
pub mod isotropic;

pub use constrained::Constrained;
pub use diagonal::Diagonal;
pub use gaussian::Gaussian;
pub use isotropic::Isotropic;

use nalgebra::{DMatrix, DVector};

use crate::error::{LinearError, LinearResult};

/// Off-diagonal entries below this magnitude count as zero when a smart
/// factory decides whether a matrix is diagonal.
pub const DIAGONALITY_EPS: f64 = 1e-9;

/// Closed set of measurement noise models.
///
/// Every variant implements the full shared capability set; this enum
/// dispatches to the active variant. See the module documentation for the
/// semantics of each operation.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseModel {
    Gaussian(Gaussian),
    Diagonal(Diagonal),
    Constrained(Constrained),
    Isotropic(Isotropic),
}

impl NoiseModel {
    /// Unit model: every dimension has sigma one; whitening is the identity.
    pub fn unit(dim: usize) -> LinearResult<Self> {
        Isotropic::unit(dim)
    }

    /// Dimensionality of the model.
    pub fn dim(&self) -> usize {
        match self {
            NoiseModel::Gaussian(m) => m.dim(),
            NoiseModel::Diagonal(m) => m.dim(),
            NoiseModel::Constrained(m) => m.dim(),
            NoiseModel::Isotropic(m) => m.dim(),
        }
    }

    /// True for the constrained variant, which tolerates zero sigmas.
    pub fn is_constrained(&self) -> bool {
        matches!(self, NoiseModel::Constrained(_))
    }

    /// True when whitening is the identity (isotropic with sigma one).
    pub fn is_unit(&self) -> bool {
        matches!(self, NoiseModel::Isotropic(m) if m.is_unit())
    }

    /// Per-dimension standard deviations.
    pub fn sigmas(&self) -> DVector<f64> {
        match self {
            NoiseModel::Gaussian(m) => m.sigmas().clone(),
            NoiseModel::Diagonal(m) => m.sigmas().clone(),
            NoiseModel::Constrained(m) => m.sigmas().clone(),
            NoiseModel::Isotropic(m) => m.sigmas(),
        }
    }

    /// Whiten an error vector.
    pub fn whiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        match self {
            NoiseModel::Gaussian(m) => m.whiten(v),
            NoiseModel::Diagonal(m) => m.whiten(v),
            NoiseModel::Constrained(m) => m.whiten(v),
            NoiseModel::Isotropic(m) => m.whiten(v),
        }
    }

    /// Whiten an error vector in place.
    pub fn whiten_in_place(&self, v: &mut DVector<f64>) -> LinearResult<()> {
        let whitened = self.whiten(v)?;
        v.copy_from(&whitened);
        Ok(())
    }

    /// Unwhiten an error vector. Inverse of [`whiten`](Self::whiten) on all
    /// free (non-constrained) dimensions.
    pub fn unwhiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        match self {
            NoiseModel::Gaussian(m) => m.unwhiten(v),
            NoiseModel::Diagonal(m) => m.unwhiten(v),
            NoiseModel::Constrained(m) => m.unwhiten(v),
            NoiseModel::Isotropic(m) => m.unwhiten(v),
        }
    }

    /// Whiten every column of a d-row Jacobian block.
    pub fn whiten_matrix(&self, h: &DMatrix<f64>) -> LinearResult<DMatrix<f64>> {
        match self {
            NoiseModel::Gaussian(m) => m.whiten_matrix(h),
            NoiseModel::Diagonal(m) => m.whiten_matrix(h),
            NoiseModel::Constrained(m) => m.whiten_matrix(h),
            NoiseModel::Isotropic(m) => m.whiten_matrix(h),
        }
    }

    /// Whiten a Jacobian block in place.
    pub fn whiten_matrix_in_place(&self, h: &mut DMatrix<f64>) -> LinearResult<()> {
        match self {
            NoiseModel::Gaussian(m) => m.whiten_matrix_in_place(h),
            NoiseModel::Diagonal(m) => m.whiten_matrix_in_place(h),
            NoiseModel::Constrained(m) => m.whiten_matrix_in_place(h),
            NoiseModel::Isotropic(m) => m.whiten_matrix_in_place(h),
        }
    }

    /// Weighted squared norm of a residual: its quadratic cost contribution.
    pub fn distance(&self, v: &DVector<f64>) -> LinearResult<f64> {
        match self {
            NoiseModel::Gaussian(m) => m.distance(v),
            NoiseModel::Diagonal(m) => m.distance(v),
            NoiseModel::Constrained(m) => m.distance(v),
            NoiseModel::Isotropic(m) => m.distance(v),
        }
    }

    /// Whiten one to three Jacobian blocks and the residual together,
    /// in place. Cheaper than whitening each block separately when a factor
    /// touches several variables.
    pub fn whiten_system(
        &self,
        blocks: &mut [DMatrix<f64>],
        b: &mut DVector<f64>,
    ) -> LinearResult<()> {
        match self {
            NoiseModel::Gaussian(m) => m.whiten_system(blocks, b),
            NoiseModel::Diagonal(m) => m.whiten_system(blocks, b),
            NoiseModel::Constrained(m) => m.whiten_system(blocks, b),
            NoiseModel::Isotropic(m) => m.whiten_system(blocks, b),
        }
    }

    /// Weighted QR elimination of the augmented system `[A | b]`, in place.
    ///
    /// On success `ab` holds the upper-triangular reduced system (strictly
    /// sub-diagonal entries zeroed) and the returned model describes the
    /// already-whitened residual of that reduced system, with each remaining
    /// row tagged free or constrained.
    pub fn qr(&self, ab: &mut DMatrix<f64>) -> LinearResult<NoiseModel> {
        match self {
            NoiseModel::Gaussian(m) => m.qr(ab),
            NoiseModel::Diagonal(m) => m.qr(ab),
            NoiseModel::Constrained(m) => m.qr(ab),
            NoiseModel::Isotropic(m) => m.qr(ab),
        }
    }
}

/// Shared argument check: `actual` must equal the model dimension.
pub(crate) fn check_dim(expected: usize, actual: usize) -> LinearResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(LinearError::DimensionMismatch { expected, actual })
    }
}

/// An augmented system must be d rows tall and carry at least one matrix
/// column besides the right-hand side.
pub(crate) fn check_augmented(dim: usize, ab: &DMatrix<f64>) -> LinearResult<()> {
    check_dim(dim, ab.nrows())?;
    if ab.ncols() < 2 {
        return Err(LinearError::InvalidParameter(
            "augmented system needs at least one column besides the rhs".to_string(),
        ));
    }
    Ok(())
}

/// True when all off-diagonal entries are negligible.
pub(crate) fn is_diagonal(m: &DMatrix<f64>) -> bool {
    let (rows, cols) = m.shape();
    for i in 0..rows {
        for j in 0..cols {
            if i != j && m[(i, j)].abs() >= DIAGONALITY_EPS {
                return false;
            }
        }
    }
    true
}
