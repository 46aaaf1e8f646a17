use crate::error::FitError;
use crate::periodogram::grid::{PeriodGrid, PeriodGridTrait};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Best box model found at a single trial period
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlsPeak {
    pub period: f64,
    /// Mid-transit time of the first transit at or after the first observation
    pub epoch: f64,
    pub duration: f64,
    /// Out-of-transit level minus in-transit level, always positive
    pub depth: f64,
    pub power: f64,
}

/// Box least squares power over a period grid
#[derive(Clone, Debug)]
pub struct BlsSpectrum {
    pub periods: Vec<f64>,
    pub power: Vec<f64>,
    pub peaks: Vec<Option<BlsPeak>>,
}

impl BlsSpectrum {
    /// Peak with the highest power, the first one wins on ties
    pub fn best(&self) -> Option<BlsPeak> {
        self.peaks
            .iter()
            .flatten()
            .fold(None, |best: Option<BlsPeak>, peak| match best {
                Some(b) if b.power >= peak.power => Some(b),
                _ => Some(*peak),
            })
    }
}

/// Box least squares periodogram
///
/// Observations are phase-folded into bins of `duration / oversample` width and every run of
/// `oversample` consecutive bins (wrapped around the phase) is tried as the transit window. The
/// power of a window is the log-likelihood improvement of the box model over a constant:
/// $$
/// P = \frac12 \frac{\delta^2}{1/W_\mathrm{in} + 1/W_\mathrm{out}},
/// $$
/// where $\delta$ is the depth and $W$ are the sums of weights in and out of transit. Only dips
/// ($\delta > 0$) are considered.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BoxLeastSquares {
    /// Trial transit durations
    pub durations: Vec<f64>,
    /// Number of phase bins per duration
    pub oversample: usize,
}

impl BoxLeastSquares {
    pub fn new(durations: Vec<f64>, oversample: usize) -> Self {
        assert!(!durations.is_empty(), "durations must not be empty");
        assert!(
            durations.iter().all(|&d| d.is_finite() && d > 0.0),
            "durations must be finite and positive"
        );
        assert!(oversample > 0, "oversample must be positive");
        Self {
            durations,
            oversample,
        }
    }

    pub fn default_durations() -> Vec<f64> {
        vec![0.08, 0.1, 0.12, 0.15]
    }

    pub fn default_oversample() -> usize {
        10
    }

    /// Compute the spectrum, `w` are inverse variances of `y`
    pub fn power(
        &self,
        t: &[f64],
        y: &[f64],
        w: &[f64],
        grid: &PeriodGrid,
    ) -> Result<BlsSpectrum, FitError> {
        assert_eq!(t.len(), y.len(), "t and y should have the same size");
        assert_eq!(t.len(), w.len(), "t and w should have the same size");
        if t.len() < 3 {
            return Err(FitError::InsufficientData {
                actual: t.len(),
                minimum: 3,
                context: "box least squares",
            });
        }
        let max_duration = self.durations.iter().copied().fold(0.0, f64::max);
        assert!(
            max_duration < grid.minimum(),
            "durations must be shorter than the shortest period"
        );

        let w_sum: f64 = w.iter().sum();
        if !(w_sum.is_finite() && w_sum > 0.0) {
            return Err(FitError::NumericalDegeneracy(
                "sum of BLS weights must be positive and finite".to_owned(),
            ));
        }
        let y_mean = y.iter().zip(w).map(|(y, w)| y * w).sum::<f64>() / w_sum;
        let wy: Vec<_> = y.iter().zip(w).map(|(y, w)| (y - y_mean) * w).collect();
        let t_ref = t[0];

        let mut bins = BinBuffer::default();
        let (power, peaks) = (0..grid.size())
            .map(|i| {
                let period = grid.get(i);
                let peak = self.durations.iter().fold(None, |best: Option<BlsPeak>, &duration| {
                    let candidate = self.best_window(&mut bins, t, w, &wy, w_sum, t_ref, period, duration);
                    match (best, candidate) {
                        (Some(b), Some(c)) if c.power > b.power => Some(c),
                        (None, c) => c,
                        (b, _) => b,
                    }
                });
                (peak.map_or(0.0, |p| p.power), peak)
            })
            .unzip();

        Ok(BlsSpectrum {
            periods: grid.to_vec(),
            power,
            peaks,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn best_window(
        &self,
        bins: &mut BinBuffer,
        t: &[f64],
        w: &[f64],
        wy: &[f64],
        w_sum: f64,
        t_ref: f64,
        period: f64,
        duration: f64,
    ) -> Option<BlsPeak> {
        let bin_width = duration / self.oversample as f64;
        let n_bins = usize::max((period / bin_width).ceil() as usize, self.oversample + 1);
        bins.fill(n_bins, self.oversample);
        for ((&t, &w), &wy) in t.iter().zip(w).zip(wy) {
            let phase = (t - t_ref).rem_euclid(period);
            let idx = usize::min((phase / bin_width) as usize, n_bins - 1);
            bins.w[idx + 1] += w;
            bins.wy[idx + 1] += wy;
        }
        bins.wrap_cumsum(n_bins, self.oversample);

        let k = self.oversample;
        let mut best: Option<BlsPeak> = None;
        for start in 0..n_bins {
            let w_in = bins.w[start + k] - bins.w[start];
            let w_out = w_sum - w_in;
            if w_in <= 0.0 || w_out <= 0.0 {
                continue;
            }
            let wy_in = bins.wy[start + k] - bins.wy[start];
            let y_in = wy_in / w_in;
            let y_out = -wy_in / w_out;
            let depth = y_out - y_in;
            if depth <= 0.0 {
                continue;
            }
            let power = 0.5 * depth * depth / (w_in.recip() + w_out.recip());
            if best.is_none_or(|b| power > b.power) {
                let epoch = t_ref + ((start as f64 + 0.5 * k as f64) * bin_width).rem_euclid(period);
                best = Some(BlsPeak {
                    period,
                    epoch,
                    duration,
                    depth,
                    power,
                });
            }
        }
        best
    }
}

impl Default for BoxLeastSquares {
    fn default() -> Self {
        Self::new(Self::default_durations(), Self::default_oversample())
    }
}

/// Prefix sums over phase bins extended by `k` wrapped bins
#[derive(Default)]
struct BinBuffer {
    w: Vec<f64>,
    wy: Vec<f64>,
}

impl BinBuffer {
    fn fill(&mut self, n_bins: usize, k: usize) {
        self.w.clear();
        self.w.resize(n_bins + k + 1, 0.0);
        self.wy.clear();
        self.wy.resize(n_bins + k + 1, 0.0);
    }

    fn wrap_cumsum(&mut self, n_bins: usize, k: usize) {
        for i in 0..k {
            self.w[n_bins + 1 + i] = self.w[1 + i];
            self.wy[n_bins + 1 + i] = self.wy[1 + i];
        }
        for i in 1..self.w.len() {
            self.w[i] += self.w[i - 1];
            self.wy[i] += self.wy[i - 1];
        }
    }
}
