use crate::error::FitError;
use crate::model::JointModel;

/// Unnormalised log-density over an unconstrained parameter vector
///
/// Implementations must be pure functions of `theta`, so samplers may evaluate them from several
/// chains at once.
pub trait LogDensity {
    fn dim(&self) -> usize;

    fn ln_density(&self, theta: &[f64]) -> Result<f64, FitError>;

    /// Log-density and its gradient with respect to every parameter
    fn ln_density_grad(&self, theta: &[f64]) -> Result<(f64, Vec<f64>), FitError>;

    fn parameter_names(&self) -> Vec<String> {
        (0..self.dim()).map(|i| format!("theta_{i}")).collect()
    }
}

impl LogDensity for JointModel {
    fn dim(&self) -> usize {
        JointModel::dim(self)
    }

    fn ln_density(&self, theta: &[f64]) -> Result<f64, FitError> {
        self.ln_posterior(theta)
    }

    fn ln_density_grad(&self, theta: &[f64]) -> Result<(f64, Vec<f64>), FitError> {
        self.ln_posterior_full_grad(theta)
    }

    fn parameter_names(&self) -> Vec<String> {
        self.layout().names()
    }
}
