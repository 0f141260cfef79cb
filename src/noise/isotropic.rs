//! Isotropic noise model: one sigma shared by every dimension.

use nalgebra::{DMatrix, DVector};

use super::{check_augmented, check_dim, NoiseModel};
use crate::error::{LinearError, LinearResult};
use crate::linalg::inplace_qr;

/// Scaled-identity covariance. Stores the scalar sigma and its inverse only,
/// so whitening and distance run on the scalar path regardless of dimension.
///
/// Sigma must be strictly positive; a zero sigma is a hard constraint and
/// belongs to [`Constrained`](super::Constrained).
#[derive(Debug, Clone, PartialEq)]
pub struct Isotropic {
    dim: usize,
    sigma: f64,
    invsigma: f64,
}

impl Isotropic {
    /// Create from a standard deviation shared by all `dim` dimensions.
    pub fn from_sigma(dim: usize, sigma: f64) -> LinearResult<NoiseModel> {
        if dim == 0 {
            return Err(LinearError::InvalidParameter(
                "noise model dimension must be positive".to_string(),
            ));
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(LinearError::InvalidParameter(
                "sigma must be finite and strictly positive; a zero sigma belongs to the constrained model"
                    .to_string(),
            ));
        }
        Ok(NoiseModel::Isotropic(Self {
            dim,
            sigma,
            invsigma: 1.0 / sigma,
        }))
    }

    /// Create from a shared variance.
    pub fn from_variance(dim: usize, variance: f64) -> LinearResult<NoiseModel> {
        if !variance.is_finite() || variance <= 0.0 {
            return Err(LinearError::InvalidParameter(
                "variance must be finite and strictly positive".to_string(),
            ));
        }
        Self::from_sigma(dim, variance.sqrt())
    }

    /// Create from a shared precision.
    pub fn from_precision(dim: usize, precision: f64) -> LinearResult<NoiseModel> {
        if !precision.is_finite() || precision <= 0.0 {
            return Err(LinearError::InvalidParameter(
                "precision must be finite and strictly positive".to_string(),
            ));
        }
        Self::from_sigma(dim, 1.0 / precision.sqrt())
    }

    /// Unit model: sigma one, whitening is the identity.
    pub fn unit(dim: usize) -> LinearResult<NoiseModel> {
        Self::from_sigma(dim, 1.0)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn invsigma(&self) -> f64 {
        self.invsigma
    }

    pub fn is_unit(&self) -> bool {
        self.sigma == 1.0
    }

    pub fn sigmas(&self) -> DVector<f64> {
        DVector::from_element(self.dim, self.sigma)
    }

    pub fn whiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        check_dim(self.dim, v.len())?;
        Ok(v * self.invsigma)
    }

    pub fn unwhiten(&self, v: &DVector<f64>) -> LinearResult<DVector<f64>> {
        check_dim(self.dim, v.len())?;
        Ok(v * self.sigma)
    }

    pub fn whiten_matrix(&self, h: &DMatrix<f64>) -> LinearResult<DMatrix<f64>> {
        check_dim(self.dim, h.nrows())?;
        Ok(h * self.invsigma)
    }

    pub fn whiten_matrix_in_place(&self, h: &mut DMatrix<f64>) -> LinearResult<()> {
        check_dim(self.dim, h.nrows())?;
        *h *= self.invsigma;
        Ok(())
    }

    /// Scalar path: precision times the squared norm.
    pub fn distance(&self, v: &DVector<f64>) -> LinearResult<f64> {
        check_dim(self.dim, v.len())?;
        Ok(self.invsigma * self.invsigma * v.norm_squared())
    }

    pub fn whiten_system(
        &self,
        blocks: &mut [DMatrix<f64>],
        b: &mut DVector<f64>,
    ) -> LinearResult<()> {
        check_dim(self.dim, b.len())?;
        for block in blocks.iter_mut() {
            self.whiten_matrix_in_place(block)?;
        }
        *b *= self.invsigma;
        Ok(())
    }

    /// Scale the augmented system by 1/sigma, then triangularize in place.
    pub fn qr(&self, ab: &mut DMatrix<f64>) -> LinearResult<NoiseModel> {
        check_augmented(self.dim, ab)?;
        *ab *= self.invsigma;
        inplace_qr(ab);
        Self::unit(ab.nrows().min(ab.ncols() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    fn isotropic(model: LinearResult<NoiseModel>) -> Isotropic {
        match model.unwrap() {
            NoiseModel::Isotropic(m) => m,
            other => panic!("expected isotropic, got {other:?}"),
        }
    }

    #[test]
    fn test_whiten_scales_by_inverse_sigma() {
        let model = isotropic(Isotropic::from_sigma(3, 2.0));
        assert_eq!(
            model.whiten(&dvector![2.0, 4.0, 6.0]).unwrap(),
            dvector![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_distance_uses_scalar_path() {
        let model = isotropic(Isotropic::from_sigma(3, 2.0));
        let v = dvector![2.0, 2.0, 2.0];
        // d * (v/sigma)^2 = 3 * 1
        assert_eq!(model.distance(&v).unwrap(), 3.0);
        let w = model.whiten(&v).unwrap();
        assert_eq!(model.distance(&v).unwrap(), w.dot(&w));
    }

    #[test]
    fn test_whiten_unwhiten_round_trip() {
        let model = isotropic(Isotropic::from_variance(2, 4.0));
        let v = dvector![1.5, -2.5];
        assert_eq!(model.unwhiten(&model.whiten(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn test_zero_sigma_rejected() {
        assert!(matches!(
            Isotropic::from_sigma(3, 0.0),
            Err(LinearError::InvalidParameter(_))
        ));
        assert!(Isotropic::from_sigma(3, -1.0).is_err());
        assert!(Isotropic::from_sigma(3, f64::NAN).is_err());
        assert!(Isotropic::from_sigma(0, 1.0).is_err());
    }

    #[test]
    fn test_unit_flag() {
        assert!(isotropic(Isotropic::unit(2)).is_unit());
        assert!(!isotropic(Isotropic::from_sigma(2, 2.0)).is_unit());
    }

    #[test]
    fn test_from_precision() {
        let model = isotropic(Isotropic::from_precision(2, 4.0));
        assert_eq!(model.sigma(), 0.5);
    }

    #[test]
    fn test_qr_scales_then_triangularizes() {
        let model = isotropic(Isotropic::from_sigma(2, 0.5));
        let mut ab = dmatrix![1.0, 0.0, 1.0;
                              0.0, 1.0, 2.0];
        let reduced = model.qr(&mut ab).unwrap();

        assert!(reduced.is_unit());
        assert_eq!(ab, dmatrix![2.0, 0.0, 2.0; 0.0, 2.0, 4.0]);
    }
}
