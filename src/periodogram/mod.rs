//! Periodic transit search

use crate::data::{Mask, TimeSeries};
use crate::error::FitError;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod bls;
pub use bls::{BlsPeak, BlsSpectrum, BoxLeastSquares};

mod grid;
pub use grid::{GeometricPeriodGrid, LinearPeriodGrid, PeriodGrid, PeriodGridTrait};

/// Transit signal found by [TransitSearch]
#[derive(Clone, Debug)]
pub struct TransitCandidate {
    pub period: f64,
    pub epoch: f64,
    pub duration: f64,
    pub depth: f64,
    pub power: f64,
    /// Power spectrum of the search iteration which found this candidate
    pub spectrum: BlsSpectrum,
}

/// Points within `duration / 2` of a transit centre
pub fn transit_mask(t: &[f64], period: f64, duration: f64, epoch: f64) -> Mask {
    let half_period = 0.5 * period;
    t.iter()
        .map(|&t| ((t - epoch + half_period).rem_euclid(period) - half_period).abs() < 0.5 * duration)
        .collect()
}

/// Iterative multi-planet search
///
/// Every iteration runs [BoxLeastSquares] over the points not yet masked, takes the highest power
/// peak and masks out its transits before the next iteration. The masked window is
/// `mask_duration_factor` times the duration of the peak. No detection threshold is applied.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct TransitSearch {
    pub period_grid: PeriodGrid,
    pub bls: BoxLeastSquares,
    /// Number of signals to extract
    pub n_planets: usize,
    /// Width of the window masked around every found transit in units of its duration
    pub mask_duration_factor: f64,
}

impl TransitSearch {
    pub fn new(
        period_grid: PeriodGrid,
        bls: BoxLeastSquares,
        n_planets: usize,
        mask_duration_factor: f64,
    ) -> Self {
        assert!(n_planets > 0, "number of planets must be positive");
        assert!(
            mask_duration_factor.is_finite() && mask_duration_factor >= 1.0,
            "mask duration factor must be finite and at least unity"
        );
        Self {
            period_grid,
            bls,
            n_planets,
            mask_duration_factor,
        }
    }

    pub fn default_n_planets() -> usize {
        2
    }

    pub fn default_mask_duration_factor() -> f64 {
        3.0
    }

    pub fn search(&self, ts: &TimeSeries) -> Result<Vec<TransitCandidate>, FitError> {
        ts.require_finite()?;
        let t = ts.t.as_slice().expect("owned arrays are contiguous");
        let mut available = Mask::all(ts.lenu());
        let mut candidates = Vec::with_capacity(self.n_planets);
        for i in 0..self.n_planets {
            let sub = ts.select(&available);
            let w = bls_weights(&sub);
            let spectrum = self.bls.power(
                sub.t.as_slice().expect("owned arrays are contiguous"),
                sub.y.as_slice().expect("owned arrays are contiguous"),
                &w,
                &self.period_grid,
            )?;
            let best = spectrum.best().ok_or_else(|| {
                FitError::NumericalDegeneracy(format!(
                    "no transit-like signal left for planet {i}"
                ))
            })?;
            tracing::info!(
                planet = i,
                period = best.period,
                epoch = best.epoch,
                depth = best.depth,
                power = best.power,
                "transit search peak"
            );
            let width = self.mask_duration_factor * best.duration;
            let in_transit = transit_mask(t, best.period, width, best.epoch);
            let out_of_transit: Mask = in_transit.as_slice().iter().map(|&x| !x).collect();
            available.and_assign(&out_of_transit);
            candidates.push(TransitCandidate {
                period: best.period,
                epoch: best.epoch,
                duration: best.duration,
                depth: best.depth,
                power: best.power,
                spectrum,
            });
        }
        Ok(candidates)
    }
}

impl Default for TransitSearch {
    fn default() -> Self {
        Self::new(
            PeriodGrid::default(),
            BoxLeastSquares::default(),
            Self::default_n_planets(),
            Self::default_mask_duration_factor(),
        )
    }
}

/// Inverse variances, or unity weights when uncertainties are not available
fn bls_weights(ts: &TimeSeries) -> Vec<f64> {
    if ts.yerr.iter().all(|&e| e > 0.0) {
        ts.yerr.iter().map(|e| e.powi(-2)).collect()
    } else {
        vec![1.0; ts.lenu()]
    }
}
