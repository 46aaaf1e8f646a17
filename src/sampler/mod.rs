//! Interface to posterior samplers

mod density;
pub use density::LogDensity;

mod draws;
pub use draws::{ParameterSummary, PosteriorDraws};

mod ensemble;
pub use ensemble::EnsembleSampler;

/// Sampler of a [LogDensity] started near a known mode
///
/// `centre` is the starting point, usually the maximum a posteriori solution, and `scale` gives
/// the typical posterior width of every parameter, e.g. from a Laplace approximation.
pub trait PosteriorSampler {
    fn sample<D: LogDensity + ?Sized>(
        &self,
        density: &D,
        centre: &[f64],
        scale: &[f64],
    ) -> Result<PosteriorDraws, crate::error::FitError>;
}
