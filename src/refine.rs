use crate::array_stats::median_abs;
use crate::data::Mask;
use crate::error::FitError;
use crate::model::JointModel;
use crate::optimize::{OptimizationResult, StagedOptimizer};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ratio of the standard deviation to the median absolute deviation of a normal distribution
const MAD_TO_SIGMA: f64 = 1.482_602_218_505_602;

/// Robust standard deviation of residuals with zero centre
pub fn robust_scale(residuals: &[f64]) -> Option<f64> {
    median_abs(residuals).map(|mad| MAD_TO_SIGMA * mad)
}

/// Sigma clipping of light-curve points against the full MAP model
///
/// Every pass predicts the light curve at all observed times, with the Gaussian process
/// conditioned on the currently selected points, and selects the points whose residuals are
/// within `threshold` robust standard deviations. The new mask is built from scratch, so points
/// rejected earlier may come back. The optimizer is then re-run from the previous optimum on the
/// new mask. Passes stop early once the mask no longer changes.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct OutlierRefinement {
    pub threshold: f64,
    pub max_passes: usize,
}

impl OutlierRefinement {
    pub fn new(threshold: f64, max_passes: usize) -> Self {
        assert!(threshold > 0.0, "threshold must be positive");
        assert!(max_passes > 0, "at least one pass is required");
        Self {
            threshold,
            max_passes,
        }
    }

    #[inline]
    pub fn default_threshold() -> f64 {
        7.0
    }

    #[inline]
    pub fn default_max_passes() -> usize {
        1
    }

    /// Mask of the points with residuals within the threshold
    pub fn clip(&self, residuals: &[f64]) -> Result<(Mask, f64), FitError> {
        let scale = robust_scale(residuals).unwrap_or(f64::NAN);
        if !(scale.is_finite() && scale > 0.0) {
            return Err(FitError::NumericalDegeneracy(format!(
                "robust residual scale is {scale}"
            )));
        }
        let limit = self.threshold * scale;
        let mask = residuals.iter().map(|r| r.abs() <= limit).collect();
        Ok((mask, scale))
    }

    /// Light-curve residuals of the full model at every observed point
    pub fn residuals(model: &JointModel, theta: &[f64]) -> Result<Vec<f64>, FitError> {
        let prediction = model.light_curve_prediction(theta)?;
        Ok(model
            .light_curve()
            .y
            .iter()
            .zip(prediction.total())
            .map(|(y, m)| y - m)
            .collect())
    }

    pub fn run(
        &self,
        model: &mut JointModel,
        optimizer: &StagedOptimizer,
        theta: &[f64],
    ) -> Result<RefinementResult, FitError> {
        let mut optimization = None;
        let mut scale = f64::NAN;
        let mut passes = 0;
        while passes < self.max_passes {
            let current = optimization
                .as_ref()
                .map_or(theta, |o: &OptimizationResult| o.theta.as_slice());
            let residuals = Self::residuals(model, current)?;
            let (mask, pass_scale) = self.clip(&residuals)?;
            scale = pass_scale;
            if passes > 0 && &mask == model.mask() {
                break;
            }
            tracing::info!(
                pass = passes,
                scale,
                rejected = mask.len() - mask.count(),
                "refined light-curve mask"
            );
            model.set_mask(mask)?;
            optimization = Some(optimizer.run(model, current)?);
            passes += 1;
        }
        let optimization = match optimization {
            Some(optimization) => optimization,
            None => optimizer.run(model, theta)?,
        };
        Ok(RefinementResult {
            optimization,
            mask: model.mask().clone(),
            passes,
            scale,
        })
    }
}

impl Default for OutlierRefinement {
    fn default() -> Self {
        Self::new(Self::default_threshold(), Self::default_max_passes())
    }
}

#[derive(Clone, Debug)]
pub struct RefinementResult {
    /// Optimisation on the final mask
    pub optimization: OptimizationResult,
    pub mask: Mask,
    /// Number of optimizer re-runs
    pub passes: usize,
    /// Robust residual scale of the last pass
    pub scale: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tests::*;

    use approx::assert_relative_eq;

    serde_default_test!(refinement_defaults, OutlierRefinement);

    #[test]
    fn robust_scale_of_normal_sample() {
        let mut x = normal_noise(0, 20000, 2.0);
        x[0] = 1e6;
        x[1] = -1e6;
        assert_relative_eq!(robust_scale(&x).unwrap(), 2.0, max_relative = 0.03);
        assert_eq!(robust_scale(&[]), None);
    }

    #[test]
    fn clip_rejects_spikes_only() {
        let mut residuals = normal_noise(1, 1000, 1.0);
        for &i in &[10, 300, 301, 777] {
            residuals[i] = if i % 2 == 0 { -20.0 } else { 20.0 };
        }
        let (mask, scale) = OutlierRefinement::default().clip(&residuals).unwrap();
        assert_relative_eq!(scale, 1.0, max_relative = 0.1);
        assert_eq!(mask.rejected(), vec![10, 300, 301, 777]);
    }

    #[test]
    fn constant_residuals_are_degenerate() {
        assert!(matches!(
            OutlierRefinement::default().clip(&[0.0; 10]),
            Err(FitError::NumericalDegeneracy(_))
        ));
    }
}
