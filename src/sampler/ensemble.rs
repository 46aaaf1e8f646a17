use crate::error::FitError;
use crate::sampler::density::LogDensity;
use crate::sampler::draws::PosteriorDraws;
use crate::sampler::PosteriorSampler;

use emcee::{Guess, Prob};
use ndarray::{Array2, Array3};
use rand::prelude::*;
use rand_distr::StandardNormal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Affine-invariant ensemble sampler of Goodman & Weare (2010)
///
/// Walkers live in single precision, so they move in the coordinates
/// `z = (theta - centre) / scale` and the log-density is taken relative to its value at the
/// centre. Walkers start from a normal ball of radius `initial_spread` around the centre. Every
/// walker is reported as a separate chain, the first `n_tune` steps are discarded.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct EnsembleSampler {
    /// Number of walkers per parameter, the ensemble size is rounded up to an even number
    pub walkers_per_dim: usize,
    pub n_tune: usize,
    pub n_draws: usize,
    pub initial_spread: f64,
    pub seed: u64,
}

impl EnsembleSampler {
    pub fn new(
        walkers_per_dim: usize,
        n_tune: usize,
        n_draws: usize,
        initial_spread: f64,
        seed: u64,
    ) -> Self {
        assert!(
            walkers_per_dim >= 2,
            "ensemble needs at least two walkers per dimension"
        );
        assert!(n_draws > 0, "number of draws must be positive");
        assert!(initial_spread > 0.0, "initial spread must be positive");
        Self {
            walkers_per_dim,
            n_tune,
            n_draws,
            initial_spread,
            seed,
        }
    }

    #[inline]
    pub fn default_walkers_per_dim() -> usize {
        4
    }

    #[inline]
    pub fn default_n_tune() -> usize {
        1000
    }

    #[inline]
    pub fn default_n_draws() -> usize {
        1000
    }

    #[inline]
    pub fn default_initial_spread() -> f64 {
        1e-2
    }

    #[inline]
    pub fn default_seed() -> u64 {
        0
    }

    pub fn n_walkers(&self, dim: usize) -> usize {
        let n = self.walkers_per_dim * dim;
        n + n % 2
    }
}

impl Default for EnsembleSampler {
    fn default() -> Self {
        Self::new(
            Self::default_walkers_per_dim(),
            Self::default_n_tune(),
            Self::default_n_draws(),
            Self::default_initial_spread(),
            Self::default_seed(),
        )
    }
}

/// Log-density in the scaled single-precision coordinates of the walkers
struct ScaledDensity<'a, D: ?Sized> {
    density: &'a D,
    centre: &'a [f64],
    scale: &'a [f64],
    reference: f64,
}

impl<D: LogDensity + ?Sized> ScaledDensity<'_, D> {
    fn theta(&self, z: &[f32]) -> Vec<f64> {
        self.centre
            .iter()
            .zip(self.scale)
            .zip(z)
            .map(|((&c, &s), &z)| c + s * f64::from(z))
            .collect()
    }
}

impl<D: LogDensity + ?Sized> Prob for ScaledDensity<'_, D> {
    fn lnlike(&self, params: &Guess) -> f32 {
        match self.density.ln_density(&self.theta(&params.values)) {
            Ok(value) => (value - self.reference) as f32,
            Err(_) => f32::NEG_INFINITY,
        }
    }

    fn lnprior(&self, _params: &Guess) -> f32 {
        0.0
    }
}

impl PosteriorSampler for EnsembleSampler {
    fn sample<D: LogDensity + ?Sized>(
        &self,
        density: &D,
        centre: &[f64],
        scale: &[f64],
    ) -> Result<PosteriorDraws, FitError> {
        let dim = density.dim();
        assert_eq!(centre.len(), dim, "centre has wrong size");
        assert_eq!(scale.len(), dim, "scale has wrong size");
        if let Some(&s) = scale.iter().find(|&&s| !(s.is_finite() && s > 0.0)) {
            return Err(FitError::NumericalDegeneracy(format!(
                "walker scale {s} is not positive"
            )));
        }
        let reference = density.ln_density(centre)?;
        let scaled = ScaledDensity {
            density,
            centre,
            scale,
            reference,
        };

        let n_walkers = self.n_walkers(dim);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let initial: Vec<Guess> = (0..n_walkers)
            .map(|_| {
                let z: Vec<f32> = (0..dim)
                    .map(|_| (self.initial_spread * rng.sample::<f64, _>(StandardNormal)) as f32)
                    .collect();
                Guess::new(&z)
            })
            .collect();

        let mut sampler = emcee::EnsembleSampler::new(n_walkers, dim, &scaled)
            .map_err(|err| FitError::Sampler(format!("{err:?}")))?;
        sampler.seed(&[self.seed as usize]);

        let mut samples = Array3::zeros((n_walkers, self.n_draws, dim));
        let mut ln_density = Array2::zeros((n_walkers, self.n_draws));
        let mut steps: usize = 0;
        sampler
            .sample(&initial, self.n_tune + self.n_draws, |step| {
                let current = steps;
                steps += 1;
                let Some(draw) = current.checked_sub(self.n_tune) else {
                    return;
                };
                if draw >= self.n_draws {
                    return;
                }
                for (walker, (guess, &lnprob)) in step.pos.iter().zip(step.lnprob).enumerate() {
                    for (k, value) in scaled.theta(&guess.values).into_iter().enumerate() {
                        samples[[walker, draw, k]] = value;
                    }
                    ln_density[[walker, draw]] = reference + f64::from(lnprob);
                }
            })
            .map_err(|err| FitError::Sampler(format!("{err:?}")))?;

        let acceptance: Vec<f64> = sampler
            .acceptance_fraction()
            .into_iter()
            .map(f64::from)
            .collect();
        tracing::info!(
            walkers = n_walkers,
            draws = self.n_draws,
            mean_acceptance = acceptance.iter().sum::<f64>() / n_walkers as f64,
            "ensemble sampling finished"
        );
        Ok(PosteriorDraws::new(
            density.parameter_names(),
            samples,
            ln_density,
            acceptance,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    serde_default_test!(ensemble_sampler_defaults, EnsembleSampler);

    /// Independent normal distributions with unit-spaced means and widths
    struct Normal {
        dim: usize,
    }

    impl LogDensity for Normal {
        fn dim(&self) -> usize {
            self.dim
        }

        fn ln_density(&self, theta: &[f64]) -> Result<f64, FitError> {
            Ok(theta
                .iter()
                .enumerate()
                .map(|(i, x)| {
                    let sigma = (i + 1) as f64;
                    -0.5 * ((x - i as f64) / sigma).powi(2)
                })
                .sum())
        }

        fn ln_density_grad(&self, theta: &[f64]) -> Result<(f64, Vec<f64>), FitError> {
            let grad = theta
                .iter()
                .enumerate()
                .map(|(i, x)| -(x - i as f64) / ((i + 1) as f64).powi(2))
                .collect();
            Ok((self.ln_density(theta)?, grad))
        }
    }

    #[test]
    fn recovers_normal_moments() {
        let density = Normal { dim: 2 };
        let sampler = EnsembleSampler::new(8, 500, 1000, 1e-2, 1);
        let draws = sampler
            .sample(&density, &[0.0, 1.0], &[1.0, 2.0])
            .unwrap();
        assert_eq!(draws.n_chains(), 16);
        assert_eq!(draws.n_draws(), 1000);
        assert_eq!(draws.names, vec!["theta_0".to_owned(), "theta_1".to_owned()]);
        let summary = draws.summary().unwrap();
        assert_relative_eq!(summary[0].mean, 0.0, epsilon = 0.15);
        assert_relative_eq!(summary[1].mean, 1.0, epsilon = 0.3);
        assert_relative_eq!(summary[0].std, 1.0, max_relative = 0.15);
        assert_relative_eq!(summary[1].std, 2.0, max_relative = 0.15);
        assert!(draws.acceptance.iter().all(|&a| a > 0.1 && a < 0.9));
        assert_relative_eq!(
            draws.ln_density[[0, 0]],
            density
                .ln_density(&draws.samples.slice(ndarray::s![0, 0, ..]).to_vec())
                .unwrap(),
            epsilon = 1e-4
        );
    }

    #[test]
    fn non_positive_scale() {
        let density = Normal { dim: 2 };
        assert!(matches!(
            EnsembleSampler::default().sample(&density, &[0.0, 1.0], &[1.0, 0.0]),
            Err(FitError::NumericalDegeneracy(_))
        ));
    }

    #[test]
    fn walker_count_is_even() {
        let sampler = EnsembleSampler::new(3, 0, 1, 1.0, 0);
        assert_eq!(sampler.n_walkers(5), 16);
        assert_eq!(sampler.n_walkers(4), 12);
    }
}
