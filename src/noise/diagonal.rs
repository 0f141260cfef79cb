//! Axis-aligned diagonal noise model.

use nalgebra::{DMatrix, DVector};

use super::{check_augmented, check_dim, Constrained, Isotropic, NoiseModel};
use crate::error::{LinearError, LinearResult};
use crate::linalg::inplace_qr;

/// Diagonal covariance: an independent sigma per dimension.
///
/// The inverse sigmas and precisions (inverse variances) are computed once at
/// construction; the common use case is one shared model reused across many
/// structurally identical factors.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagonal {
    sigmas: DVector<f64>,
    invsigmas: DVector<f64>,
    precisions: DVector<f64>,
}

impl Diagonal {
    /// Create from per-dimension standard deviations.
    ///
    /// All sigmas must be finite and strictly positive. With `smart` set, a
    /// vector containing zeros routes to the constrained model and a vector
    /// of identical values collapses to the isotropic one; without it, a zero
    /// sigma is rejected.
    pub fn from_sigmas(sigmas: DVector<f64>, smart: bool) -> LinearResult<NoiseModel> {
        if smart {
            if sigmas.iter().any(|&s| s == 0.0) {
                return Constrained::mixed_sigmas(sigmas);
            }
            if sigmas.len() > 1 && sigmas.iter().all(|&s| s == sigmas[0]) {
                return Isotropic::from_sigma(sigmas.len(), sigmas[0]);
            }
        }
        Ok(NoiseModel::Diagonal(Self::checked(sigmas)?))
    }

    /// Create from per-dimension variances (diagonal of the covariance).
    pub fn from_variances(variances: DVector<f64>, smart: bool) -> LinearResult<NoiseModel> {
        if variances.iter().any(|&v| !v.is_finite() || v < 0.0) {
            return Err(LinearError::InvalidParameter(
                "variances must be finite and non-negative".to_string(),
            ));
        }
        Self::from_sigmas(variances.map(f64::sqrt), smart)
    }

    /// Create from per-dimension precisions (diagonal of the information
    /// matrix). With `smart` set, infinite precisions route to the
    /// constrained model.
    pub fn from_precisions(precisions: DVector<f64>, smart: bool) -> LinearResult<NoiseModel> {
        if smart && precisions.iter().any(|&p| p.is_infinite()) {
            let mu = DVector::from_element(precisions.len(), Constrained::DEFAULT_MU);
            return Constrained::mixed_precisions(mu, precisions);
        }
        if precisions.iter().any(|&p| !p.is_finite() || p <= 0.0) {
            return Err(LinearError::InvalidParameter(
                "precisions must be finite and strictly positive".to_string(),
            ));
        }
        Self::from_sigmas(precisions.map(|p| 1.0 / p.sqrt()), smart)
    }

    fn checked(sigmas: DVector<f64>) -> LinearResult<Self> {
        if sigmas.is_empty() {
            return Err(LinearError::InvalidParameter(
                "noise model dimension must be positive".to_string(),
            ));
        }
        if sigmas.iter().any(|&s| !s.is_finite() || s <= 0.0) {
            return Err(LinearError::InvalidParameter(
                "sigmas must be finite and strictly positive; zero sigmas belong to the constrained model"
                    .to_string(),
            ));
        }
        let invsigmas = sigmas.map(|s| 1.0 / s);
        let precisions = invsigmas.map(|s| s * s);
        Ok(Self {
            sigmas,
            invsigmas,
            precisions,
        })
    }

    pub fn dim(&self) -> usize {
        self.sigmas.len()
    }

    pub fn sigmas(&self) -> &DVector<f64> {
        &self.sigmas
    }

    pub fn sigma(&self, i: usize) -> f64 {
        self.sigmas[i]
    }

    pub fn invsigmas(&self) -> &DVector<f64> {
        &self.invsigmas
    }

    pub fn invsigma(&self, i: usize) -> f64 {
        self.invsigmas[i]
    }

    pub fn precisions(&self) -> &DVector<f64> {
        &self.precisions
    }

    pub fn precision(&self, i: usize) -> f64 {
        self.precisions[i]
    }

    /// R as a matrix: diag(1/sigma). [`whiten_matrix`](Self::whiten_matrix)
    /// is cheaper than multiplying by it.
    pub fn r(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&self.invsigmas)
    }

    pub fn whiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        check_dim(self.dim(), v.len())?;
        Ok(v.component_mul(&self.invsigmas))
    }

    pub fn unwhiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        check_dim(self.dim(), v.len())?;
        Ok(v.component_mul(&self.sigmas))
    }

    pub fn whiten_matrix(&self, h: &DMatrix<f64>) -> LinearResult<DMatrix<f64>> {
        let mut whitened = h.clone();
        self.whiten_matrix_in_place(&mut whitened)?;
        Ok(whitened)
    }

    pub fn whiten_matrix_in_place(&self, h: &mut DMatrix<f64>) -> LinearResult<()> {
        check_dim(self.dim(), h.nrows())?;
        for i in 0..h.nrows() {
            let mut row = h.row_mut(i);
            row *= self.invsigmas[i];
        }
        Ok(())
    }

    pub fn distance(&self, v: &DVector<f64>) -> LinearResult<f64> {
        check_dim(self.dim(), v.len())?;
        Ok(v
            .iter()
            .zip(self.precisions.iter())
            .map(|(vi, pi)| pi * vi * vi)
            .sum())
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
            b[i] *= self.invsigmas[i];
        }
        Ok(())
    }

    /// Whiten the augmented system row by row, then triangularize in place.
    /// The reduced rows are unit-whitened.
    pub fn qr(&self, ab: &mut DMatrix<f64>) -> LinearResult<NoiseModel> {
        check_augmented(self.dim(), ab)?;
        for i in 0..ab.nrows() {
            let mut row = ab.row_mut(i);
            row *= self.invsigmas[i];
        }
        inplace_qr(ab);
        Isotropic::unit(ab.nrows().min(ab.ncols() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    fn diagonal(sigmas: DVector<f64>) -> Diagonal {
        match Diagonal::from_sigmas(sigmas, false).unwrap() {
            NoiseModel::Diagonal(m) => m,
            other => panic!("expected diagonal, got {other:?}"),
        }
    }

    #[test]
    fn test_whiten_and_distance() {
        let model = diagonal(dvector![2.0, 4.0]);
        assert_eq!(model.whiten(&dvector![4.0, 8.0]).unwrap(), dvector![2.0, 2.0]);
        assert_eq!(model.distance(&dvector![4.0, 8.0]).unwrap(), 8.0);
    }

    #[test]
    fn test_cached_invsigmas_and_precisions() {
        let model = diagonal(dvector![2.0, 4.0]);
        assert_eq!(model.invsigmas(), &dvector![0.5, 0.25]);
        assert_eq!(model.precisions(), &dvector![0.25, 0.0625]);
        assert_eq!(model.sigma(1), 4.0);
    }

    #[test]
    fn test_whiten_unwhiten_round_trip() {
        let model = diagonal(dvector![2.0, 0.5, 3.0]);
        let v = dvector![1.0, -2.0, 0.25];
        let round = model.unwhiten(&model.whiten(&v).unwrap()).unwrap();
        assert!((round - v).norm() < 1e-15);
    }

    #[test]
    fn test_from_variances() {
        let model = Diagonal::from_variances(dvector![4.0, 16.0], false).unwrap();
        assert_eq!(model.sigmas(), dvector![2.0, 4.0]);
    }

    #[test]
    fn test_from_precisions() {
        let model = Diagonal::from_precisions(dvector![0.25, 0.0625], false).unwrap();
        assert_eq!(model.sigmas(), dvector![2.0, 4.0]);
    }

    #[test]
    fn test_invalid_sigmas_rejected() {
        assert!(Diagonal::from_sigmas(dvector![1.0, -1.0], false).is_err());
        assert!(Diagonal::from_sigmas(dvector![1.0, f64::NAN], false).is_err());
        assert!(Diagonal::from_sigmas(dvector![1.0, 0.0], false).is_err());
        assert!(Diagonal::from_sigmas(DVector::zeros(0), false).is_err());
    }

    #[test]
    fn test_smart_collapses_to_isotropic() {
        let model = Diagonal::from_sigmas(dvector![3.0, 3.0, 3.0], true).unwrap();
        assert!(matches!(model, NoiseModel::Isotropic(_)));
    }

    #[test]
    fn test_whiten_matrix_scales_rows() {
        let model = diagonal(dvector![2.0, 4.0]);
        let h = dmatrix![4.0, 8.0;
                         8.0, 16.0];
        let whitened = model.whiten_matrix(&h).unwrap();
        assert_eq!(whitened, dmatrix![2.0, 4.0; 2.0, 4.0]);
    }

    #[test]
    fn test_whiten_system_scales_blocks_and_rhs() {
        let model = diagonal(dvector![2.0, 4.0]);
        let mut blocks = vec![dmatrix![2.0; 4.0], dmatrix![4.0; 8.0]];
        let mut b = dvector![2.0, 4.0];
        model.whiten_system(&mut blocks, &mut b).unwrap();
        assert_eq!(blocks[0], dmatrix![1.0; 1.0]);
        assert_eq!(blocks[1], dmatrix![2.0; 2.0]);
        assert_eq!(b, dvector![1.0, 1.0]);
    }

    #[test]
    fn test_qr_whitens_then_triangularizes() {
        let model = diagonal(dvector![0.5, 0.5]);
        let mut ab = dmatrix![1.0, 0.0, 1.0;
                              0.0, 1.0, 2.0];
        let reduced = model.qr(&mut ab).unwrap();

        assert!(reduced.is_unit());
        assert_eq!(reduced.dim(), 2);
        assert_eq!(ab, dmatrix![2.0, 0.0, 2.0; 0.0, 2.0, 4.0]);
    }
}
