use crate::error::FitError;
use crate::model::joint::JointModel;

use nalgebra::DMatrix;

/// Gaussian approximation of the posterior around its mode
///
/// The Hessian of the log-posterior is estimated by central differences of the exact gradient and
/// inverted to give the covariance of the internal parameters.
#[derive(Clone, Debug)]
pub struct LaplaceApproximation {
    pub mode: Vec<f64>,
    pub covariance: DMatrix<f64>,
}

impl LaplaceApproximation {
    pub fn default_step() -> f64 {
        1e-5
    }

    pub fn new(model: &JointModel, mode: &[f64], step: f64) -> Result<Self, FitError> {
        assert!(step > 0.0, "step must be positive");
        let dim = mode.len();
        let mut hessian = DMatrix::zeros(dim, dim);
        for j in 0..dim {
            let mut plus = mode.to_vec();
            plus[j] += step;
            let mut minus = mode.to_vec();
            minus[j] -= step;
            let (_, g_plus) = model.ln_posterior_full_grad(&plus)?;
            let (_, g_minus) = model.ln_posterior_full_grad(&minus)?;
            for i in 0..dim {
                hessian[(i, j)] = -(g_plus[i] - g_minus[i]) / (2.0 * step);
            }
        }
        let hessian = 0.5 * (&hessian + hessian.transpose());
        let covariance = hessian
            .cholesky()
            .ok_or_else(|| {
                FitError::NumericalDegeneracy(
                    "negative log-posterior Hessian is not positive definite".to_owned(),
                )
            })?
            .inverse();
        Ok(Self {
            mode: mode.to_vec(),
            covariance,
        })
    }

    /// Marginal standard deviations of the internal parameters
    pub fn std(&self) -> Vec<f64> {
        self.covariance.diagonal().iter().map(|v| v.sqrt()).collect()
    }
}
