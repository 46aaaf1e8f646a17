//! Long-term trend removal

use crate::array_stats::rms;
use crate::data::{Mask, TimeSeries};
use crate::error::FitError;

use itertools::Itertools;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod savgol;
pub use savgol::SavitzkyGolay;

/// Iterative sigma-clipped Savitzky-Golay detrending
///
/// At every iteration the flux of the currently accepted points is linearly interpolated onto all
/// observation times, smoothed, and the points deviating from the smooth curve by more than
/// `n_sigma` RMS are rejected. The loop stops when the number of accepted points stops changing or
/// after `max_iterations`. Finally only positive outliers are removed, so transit dips survive.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct Detrender {
    /// Filter window length in points, must be odd
    pub window: usize,
    /// Filter polynomial order
    pub order: usize,
    pub n_sigma: f64,
    pub max_iterations: usize,
}

/// Output of [Detrender::detrend]
#[derive(Clone, Debug)]
pub struct Detrended {
    /// Retained points with the trend subtracted
    pub series: TimeSeries,
    /// Raw flux of the retained points
    pub flux: Vec<f64>,
    /// Smooth trend at the retained points
    pub trend: Vec<f64>,
    /// Indices of the retained points in the input series
    pub retained: Vec<usize>,
    /// RMS of the final residuals
    pub sigma: f64,
}

impl Detrender {
    pub fn new(window: usize, order: usize, n_sigma: f64, max_iterations: usize) -> Self {
        assert!(window % 2 == 1, "window length must be odd");
        assert!(order < window, "polynomial order must be less than window length");
        assert!(n_sigma > 0.0, "n_sigma must be positive");
        assert!(max_iterations > 0, "max_iterations must be positive");
        Self {
            window,
            order,
            n_sigma,
            max_iterations,
        }
    }

    pub fn default_window() -> usize {
        101
    }

    pub fn default_order() -> usize {
        3
    }

    pub fn default_n_sigma() -> f64 {
        3.0
    }

    pub fn default_max_iterations() -> usize {
        10
    }

    pub fn detrend(&self, ts: &TimeSeries) -> Result<Detrended, FitError> {
        ts.require_len(self.window, "detrending")?;
        ts.require_finite()?;
        let filter = SavitzkyGolay::new(self.window, self.order)?;
        let t = ts.t.as_slice().expect("owned arrays are contiguous");
        let y = ts.y.as_slice().expect("owned arrays are contiguous");

        let mut mask = Mask::all(t.len());
        let mut smooth = Vec::new();
        let mut resid = Vec::new();
        let mut sigma = 0.0;
        for iteration in 0..self.max_iterations {
            let t_kept = mask.select(t);
            if t_kept.len() < 2 {
                return Err(FitError::InsufficientData {
                    actual: t_kept.len(),
                    minimum: 2,
                    context: "detrending interpolation",
                });
            }
            let y_interp = interp(t, &t_kept, &mask.select(y));
            smooth = filter.filter(&y_interp)?;
            resid = y.iter().zip(&smooth).map(|(y, s)| y - s).collect();
            sigma = rms(&resid).unwrap_or(0.0);
            let new_mask: Mask = resid.iter().map(|r| r.abs() < self.n_sigma * sigma).collect();
            let stable = new_mask.count() == mask.count();
            mask = new_mask;
            tracing::debug!(iteration, sigma, kept = mask.count(), "detrending iteration");
            if stable {
                break;
            }
            if iteration + 1 == self.max_iterations {
                tracing::warn!(
                    iterations = self.max_iterations,
                    "detrending clip loop did not stabilise"
                );
            }
        }

        let retained: Vec<_> = resid
            .iter()
            .positions(|&r| r < self.n_sigma * sigma)
            .collect();
        if retained.len() < 2 {
            return Err(FitError::InsufficientData {
                actual: retained.len(),
                minimum: 2,
                context: "detrending output",
            });
        }
        let pick = |a: &[f64]| retained.iter().map(|&i| a[i]).collect::<Vec<_>>();
        let flux = pick(y);
        let trend = pick(&smooth);
        let series = TimeSeries::new(
            pick(t),
            pick(&resid),
            pick(ts.yerr.as_slice().expect("owned arrays are contiguous")),
        );
        Ok(Detrended {
            series,
            flux,
            trend,
            retained,
            sigma,
        })
    }
}

impl Default for Detrender {
    fn default() -> Self {
        Self::new(
            Self::default_window(),
            Self::default_order(),
            Self::default_n_sigma(),
            Self::default_max_iterations(),
        )
    }
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`, values are clamped outside of `xp`
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    assert_eq!(xp.len(), fp.len(), "xp and fp should have the same size");
    assert!(!xp.is_empty(), "xp must not be empty");
    let last = xp.len() - 1;
    x.iter()
        .map(|&x| {
            if x <= xp[0] {
                return fp[0];
            }
            if x >= xp[last] {
                return fp[last];
            }
            let j = xp.partition_point(|&v| v <= x);
            let (x0, x1) = (xp[j - 1], xp[j]);
            if x1 == x0 {
                fp[j]
            } else {
                fp[j - 1] + (fp[j] - fp[j - 1]) * (x - x0) / (x1 - x0)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tests::*;

    serde_json_test!(detrender_serde, Detrender::new(301, 2, 4.0, 5));
    serde_default_test!(detrender_defaults, Detrender);

    #[test]
    fn interp_matches_linear() {
        let actual = interp(&[-1.0, 0.5, 1.0, 2.5, 5.0], &[0.0, 1.0, 3.0], &[0.0, 2.0, 0.0]);
        all_close(&actual, &[0.0, 1.0, 2.0, 0.5, 0.0], 1e-12);
    }

    #[test]
    fn removes_trend_and_positive_outliers_only() {
        let mut rng = StdRng::seed_from_u64(0);
        let t: Vec<f64> = linspace(0.0, 30.0, 1500);
        let mut y: Vec<_> = t
            .iter()
            .map(|&t| 5.0 * f64::sin(t / 10.0) + 0.1 * rng.sample::<f64, _>(StandardNormal))
            .collect();
        y[300] += 5.0;
        y[700] -= 5.0;
        let ts = TimeSeries::new_without_errors(t, y);
        let out = Detrender::default().detrend(&ts).unwrap();
        assert!(!out.retained.contains(&300));
        assert!(out.retained.contains(&700));
        assert!(out.sigma < 0.25, "{}", out.sigma);
        let resid_rms = rms(out.series.y.as_slice().unwrap()).unwrap();
        assert!(resid_rms < 0.25, "{resid_rms}");
        assert_eq!(out.flux.len(), out.trend.len());
    }

    #[test]
    fn short_series_is_rejected() {
        let ts = TimeSeries::new_without_errors(linspace(0.0_f64, 1.0, 50), vec![0.0; 50]);
        assert!(matches!(
            Detrender::default().detrend(&ts),
            Err(FitError::InsufficientData {
                actual: 50,
                minimum: 101,
                ..
            })
        ));
    }
}
