use crate::data::{Mask, SortedArray};
use crate::error::FitError;

use itertools::Itertools;
use ndarray::{Array1, Zip};

/// Ordered observations `(t, y, yerr)`
///
/// Statistics are cached on first access, that's why some getters take a mutable reference.
#[derive(Clone, Debug)]
pub struct TimeSeries {
    pub t: Array1<f64>,
    pub y: Array1<f64>,
    pub yerr: Array1<f64>,
    y_std: Option<f64>,
    yerr_median: Option<f64>,
}

macro_rules! time_series_getter {
    ($attr: ident, $getter: ident, $func: expr) => {
        // This lint is false-positive in macros
        // https://github.com/rust-lang/rust-clippy/issues/1553
        #[allow(clippy::redundant_closure_call)]
        pub fn $getter(&mut self) -> f64 {
            match self.$attr {
                Some(x) => x,
                None => {
                    let x = $func(&*self);
                    self.$attr = Some(x);
                    x
                }
            }
        }
    };
}

impl TimeSeries {
    /// Construct `TimeSeries` from time, values and value uncertainties
    ///
    /// All arrays must have the same length and `t` must not decrease.
    pub fn new(
        t: impl Into<Array1<f64>>,
        y: impl Into<Array1<f64>>,
        yerr: impl Into<Array1<f64>>,
    ) -> Self {
        let t = t.into();
        let y = y.into();
        let yerr = yerr.into();

        assert_eq!(t.len(), y.len(), "t and y should have the same size");
        assert_eq!(y.len(), yerr.len(), "y and yerr should have the same size");
        assert!(
            t.iter().tuple_windows().all(|(a, b)| a <= b),
            "t should be sorted"
        );

        Self {
            t,
            y,
            yerr,
            y_std: None,
            yerr_median: None,
        }
    }

    /// Construct `TimeSeries` with zero uncertainties
    pub fn new_without_errors(t: impl Into<Array1<f64>>, y: impl Into<Array1<f64>>) -> Self {
        let t = t.into();
        let yerr = Array1::zeros(t.len());
        Self::new(t, y, yerr)
    }

    /// Time series length
    #[inline]
    pub fn lenu(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Fail if there are fewer than `minimum` observations
    pub fn require_len(&self, minimum: usize, context: &'static str) -> Result<(), FitError> {
        if self.lenu() < minimum {
            return Err(FitError::InsufficientData {
                actual: self.lenu(),
                minimum,
                context,
            });
        }
        Ok(())
    }

    /// Fail on non-finite values
    pub fn require_finite(&self) -> Result<(), FitError> {
        let finite = Zip::from(&self.t)
            .and(&self.y)
            .and(&self.yerr)
            .all(|t, y, e| t.is_finite() && y.is_finite() && e.is_finite());
        if finite {
            Ok(())
        } else {
            Err(FitError::NumericalDegeneracy(
                "time series contains non-finite values".to_owned(),
            ))
        }
    }

    time_series_getter!(y_std, get_y_std, |ts: &TimeSeries| ts.y.std(0.0));

    time_series_getter!(yerr_median, get_yerr_median, |ts: &TimeSeries| {
        if ts.is_empty() {
            0.0
        } else {
            SortedArray::from(ts.yerr.view()).median()
        }
    });

    /// New series holding points selected by the mask
    pub fn select(&self, mask: &Mask) -> Self {
        let t = mask.select(self.t.as_slice().expect("owned arrays are contiguous"));
        let y = mask.select(self.y.as_slice().expect("owned arrays are contiguous"));
        let yerr = mask.select(self.yerr.as_slice().expect("owned arrays are contiguous"));
        Self::new(t, y, yerr)
    }

    pub fn t_min(&self) -> f64 {
        self.t[0]
    }

    pub fn t_max(&self) -> f64 {
        self.t[self.lenu() - 1]
    }
}
