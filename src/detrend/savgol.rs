use crate::error::FitError;

use nalgebra::DMatrix;

/// Savitzky-Golay smoothing filter
///
/// Interior points are smoothed with the central row of the least-squares projection
/// ("hat") matrix of a polynomial fit over the window. The first and last `window / 2` points use
/// the other rows of the same matrix, which is the polynomial fitted to the edge window evaluated
/// at their positions.
#[derive(Clone, Debug)]
pub struct SavitzkyGolay {
    window: usize,
    hat: DMatrix<f64>,
}

impl SavitzkyGolay {
    pub fn new(window: usize, order: usize) -> Result<Self, FitError> {
        assert!(window % 2 == 1, "window length must be odd");
        assert!(order < window, "polynomial order must be less than window length");

        let half = (window / 2) as f64;
        let scale = if half > 0.0 { half } else { 1.0 };
        let vandermonde = DMatrix::from_fn(window, order + 1, |i, j| {
            ((i as f64 - half) / scale).powi(j as i32)
        });
        let pinv = vandermonde.clone().pseudo_inverse(1e-12).map_err(|err| {
            FitError::NumericalDegeneracy(format!("Savitzky-Golay design matrix: {err}"))
        })?;
        Ok(Self {
            window,
            hat: vandermonde * pinv,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn filter(&self, y: &[f64]) -> Result<Vec<f64>, FitError> {
        let n = y.len();
        if n < self.window {
            return Err(FitError::InsufficientData {
                actual: n,
                minimum: self.window,
                context: "Savitzky-Golay filter",
            });
        }
        let half = self.window / 2;
        let smooth_at = |row: usize, offset: usize| -> f64 {
            (0..self.window)
                .map(|j| self.hat[(row, j)] * y[offset + j])
                .sum()
        };
        let smooth = (0..n)
            .map(|i| {
                if i < half {
                    smooth_at(i, 0)
                } else if i + half >= n {
                    smooth_at(i + self.window - n, n - self.window)
                } else {
                    smooth_at(half, i - half)
                }
            })
            .collect();
        Ok(smooth)
    }
}
