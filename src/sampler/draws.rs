use crate::data::SortedArray;
use crate::error::FitError;

use ndarray::{Array2, Array3, Axis};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Posterior draws as returned by a sampler
///
/// `samples` has the shape (chain, draw, parameter), `ln_density` has the shape (chain, draw).
#[derive(Clone, Debug)]
pub struct PosteriorDraws {
    pub names: Vec<String>,
    pub samples: Array3<f64>,
    pub ln_density: Array2<f64>,
    /// Per-chain fraction of accepted proposals
    pub acceptance: Vec<f64>,
}

impl PosteriorDraws {
    pub fn new(
        names: Vec<String>,
        samples: Array3<f64>,
        ln_density: Array2<f64>,
        acceptance: Vec<f64>,
    ) -> Self {
        let (n_chains, n_draws, dim) = samples.dim();
        assert_eq!(names.len(), dim, "every parameter should have a name");
        assert_eq!(
            ln_density.dim(),
            (n_chains, n_draws),
            "log-density should be given for every draw"
        );
        assert_eq!(acceptance.len(), n_chains);
        Self {
            names,
            samples,
            ln_density,
            acceptance,
        }
    }

    pub fn n_chains(&self) -> usize {
        self.samples.len_of(Axis(0))
    }

    pub fn n_draws(&self) -> usize {
        self.samples.len_of(Axis(1))
    }

    pub fn dim(&self) -> usize {
        self.samples.len_of(Axis(2))
    }

    /// Draws of all chains concatenated, shape (chain * draw, parameter)
    pub fn flat(&self) -> Array2<f64> {
        let (n_chains, n_draws, dim) = self.samples.dim();
        let mut flat = Array2::zeros((n_chains * n_draws, dim));
        for (c, chain) in self.samples.outer_iter().enumerate() {
            for (d, draw) in chain.outer_iter().enumerate() {
                flat.row_mut(c * n_draws + d).assign(&draw);
            }
        }
        flat
    }

    fn require_draws(&self) -> Result<(), FitError> {
        let n = self.n_chains() * self.n_draws();
        if n == 0 {
            Err(FitError::InsufficientData {
                actual: 0,
                minimum: 1,
                context: "posterior draws",
            })
        } else {
            Ok(())
        }
    }

    /// Quantiles of a single parameter over all chains
    pub fn quantiles(&self, index: usize, q: &[f64]) -> Result<Vec<f64>, FitError> {
        self.require_draws()?;
        let sorted: SortedArray = self
            .samples
            .index_axis(Axis(2), index)
            .iter()
            .copied()
            .collect::<Vec<_>>()
            .into();
        Ok(q.iter().map(|&q| sorted.ppf(q)).collect())
    }

    /// Mean, standard deviation and the central 68% interval of every parameter
    pub fn summary(&self) -> Result<Vec<ParameterSummary>, FitError> {
        self.derived_summary(self.names.clone(), |theta| Ok(theta.to_vec()))
    }

    /// Value of a function at every draw, in the order of [PosteriorDraws::flat]
    pub fn derived<T, F>(&self, mut f: F) -> Result<Vec<T>, FitError>
    where
        F: FnMut(&[f64]) -> Result<T, FitError>,
    {
        self.flat()
            .outer_iter()
            .map(|draw| f(&draw.to_vec()))
            .collect()
    }

    /// Summary of named derived quantities, e.g. planet densities computed from every draw
    pub fn derived_summary<F>(
        &self,
        names: Vec<String>,
        f: F,
    ) -> Result<Vec<ParameterSummary>, FitError>
    where
        F: FnMut(&[f64]) -> Result<Vec<f64>, FitError>,
    {
        self.require_draws()?;
        let values = self.derived(f)?;
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let column: Vec<f64> = values
                    .iter()
                    .map(|v| {
                        v.get(i).copied().ok_or_else(|| {
                            FitError::NumericalDegeneracy(format!(
                                "derived quantity {name} is missing"
                            ))
                        })
                    })
                    .collect::<Result<_, _>>()?;
                Ok(ParameterSummary::new(name, column))
            })
            .collect()
    }
}

/// Marginal summary of a scalar quantity
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ParameterSummary {
    pub name: String,
    pub mean: f64,
    pub std: f64,
    /// 16th percentile
    pub lower: f64,
    pub median: f64,
    /// 84th percentile
    pub upper: f64,
}

impl ParameterSummary {
    fn new(name: String, values: Vec<f64>) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
        let sorted: SortedArray = values.into();
        Self {
            name,
            mean,
            std,
            lower: sorted.ppf(0.16),
            median: sorted.median(),
            upper: sorted.ppf(0.84),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::Array;

    fn draws() -> PosteriorDraws {
        // Parameter 0 runs over 0..200, parameter 1 is its double
        let samples = Array::from_shape_fn((2, 100, 2), |(chain, draw, k)| {
            ((chain * 100 + draw) * (k + 1)) as f64
        });
        PosteriorDraws::new(
            vec!["a".to_owned(), "b".to_owned()],
            samples,
            Array2::zeros((2, 100)),
            vec![0.3, 0.4],
        )
    }

    #[test]
    fn flat_keeps_chain_order() {
        let flat = draws().flat();
        assert_eq!(flat.dim(), (200, 2));
        assert_eq!(flat[[150, 0]], 150.0);
        assert_eq!(flat[[150, 1]], 300.0);
    }

    #[test]
    fn quantiles_and_summary() {
        let draws = draws();
        let q = draws.quantiles(0, &[0.0, 0.5, 1.0]).unwrap();
        assert_eq!(q, vec![0.0, 99.5, 199.0]);
        let summary = draws.summary().unwrap();
        assert_eq!(summary[1].name, "b");
        assert_relative_eq!(summary[0].mean, 99.5);
        assert_relative_eq!(summary[1].median, 199.0);
        assert!(summary[0].lower < summary[0].median && summary[0].median < summary[0].upper);
    }

    #[test]
    fn derived_quantity() {
        let summary = draws()
            .derived_summary(vec!["ratio".to_owned()], |theta| {
                Ok(vec![if theta[0] == 0.0 { 2.0 } else { theta[1] / theta[0] }])
            })
            .unwrap();
        assert_relative_eq!(summary[0].mean, 2.0);
        assert_relative_eq!(summary[0].std, 0.0);
    }
}
