use crate::data::SortedArray;
use crate::error::SortedArrayError;

use enum_dispatch::enum_dispatch;
use ndarray::{Array1, ArrayView1};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trial periods of the transit search
#[enum_dispatch]
pub trait PeriodGridTrait: Send + Sync + Clone + Debug {
    fn size(&self) -> usize;
    fn get(&self, i: usize) -> f64;
    fn minimum(&self) -> f64;
    fn maximum(&self) -> f64;

    fn to_vec(&self) -> Vec<f64> {
        (0..self.size()).map(|i| self.get(i)).collect()
    }
}

#[enum_dispatch(PeriodGridTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[non_exhaustive]
pub enum PeriodGrid {
    Arbitrary(SortedArray),
    Geometric(GeometricPeriodGrid),
    Linear(LinearPeriodGrid),
}

impl PeriodGrid {
    /// Construct from a sorted period array
    pub fn try_from_sorted_array(
        sorted_array: impl Into<Array1<f64>>,
    ) -> Result<Self, SortedArrayError> {
        Ok(Self::Arbitrary(SortedArray::from_sorted(sorted_array)?))
    }

    /// Construct from an array reference, array will be copied and sorted
    pub fn from_array<'a>(array: impl Into<ArrayView1<'a, f64>>) -> Self {
        Self::Arbitrary(array.into().into())
    }

    /// Log-uniform grid of `size` periods from `min_period` to `max_period` inclusive
    pub fn geometric(min_period: f64, max_period: f64, size: usize) -> Self {
        Self::Geometric(GeometricPeriodGrid::new(min_period, max_period, size))
    }

    pub fn linear(start: f64, step: f64, size: usize) -> Self {
        Self::Linear(LinearPeriodGrid::new(start, step, size))
    }
}

impl Default for PeriodGrid {
    fn default() -> Self {
        Self::geometric(5.0, 45.0, 50_000)
    }
}

impl PeriodGridTrait for SortedArray {
    fn size(&self) -> usize {
        self.len()
    }

    fn get(&self, i: usize) -> f64 {
        self.0[i]
    }

    fn minimum(&self) -> f64 {
        self.0[0]
    }

    fn maximum(&self) -> f64 {
        self.0[self.0.len() - 1]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GeometricPeriodGrid {
    min_period: f64,
    max_period: f64,
    size: usize,
}

impl GeometricPeriodGrid {
    pub fn new(min_period: f64, max_period: f64, size: usize) -> Self {
        assert!(
            min_period.is_finite() && min_period > 0.0,
            "minimum period must be finite and positive"
        );
        assert!(
            max_period.is_finite() && max_period >= min_period,
            "maximum period must be finite and not less than minimum period"
        );
        assert!(size > 0, "Size must not be zero");
        Self {
            min_period,
            max_period,
            size,
        }
    }

    fn log_step(&self) -> f64 {
        if self.size == 1 {
            0.0
        } else {
            f64::ln(self.max_period / self.min_period) / (self.size - 1) as f64
        }
    }
}

impl PeriodGridTrait for GeometricPeriodGrid {
    fn size(&self) -> usize {
        self.size
    }

    fn get(&self, i: usize) -> f64 {
        if i + 1 == self.size {
            self.max_period
        } else {
            self.min_period * f64::exp(self.log_step() * i as f64)
        }
    }

    fn minimum(&self) -> f64 {
        self.min_period
    }

    fn maximum(&self) -> f64 {
        self.max_period
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LinearPeriodGrid {
    /// Grid start point
    start: f64,
    /// Distance between points
    step: f64,
    /// Number of points
    size: usize,
}

impl LinearPeriodGrid {
    pub fn new(start: f64, step: f64, size: usize) -> Self {
        assert!(start > 0.0, "start must be positive");
        assert!(
            step.is_finite() && step.is_sign_positive(),
            "period step must be finite and positive"
        );
        assert!(size > 0, "Size must not be zero");
        Self { start, step, size }
    }
}

impl PeriodGridTrait for LinearPeriodGrid {
    fn size(&self) -> usize {
        self.size
    }

    fn get(&self, i: usize) -> f64 {
        self.start + self.step * i as f64
    }

    fn minimum(&self) -> f64 {
        self.start
    }

    fn maximum(&self) -> f64 {
        self.start + self.step * (self.size - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn geometric_grid_has_constant_ratio() {
        let grid = PeriodGrid::geometric(5.0, 45.0, 101);
        assert_eq!(grid.size(), 101);
        assert_eq!(grid.minimum(), 5.0);
        assert_eq!(grid.get(100), 45.0);
        let ratio = grid.get(1) / grid.get(0);
        for i in 1..100 {
            assert_relative_eq!(grid.get(i + 1) / grid.get(i), ratio, max_relative = 1e-12);
        }
    }

    #[test]
    fn arbitrary_grid_is_sorted() {
        let grid = PeriodGrid::from_array(&[3.0, 1.0, 2.0]);
        assert_eq!(grid.to_vec(), vec![1.0, 2.0, 3.0]);
        assert!(PeriodGrid::try_from_sorted_array(vec![2.0, 1.0]).is_err());
    }

    #[test]
    fn linear_grid() {
        let grid = PeriodGrid::linear(1.0, 0.5, 3);
        assert_eq!(grid.to_vec(), vec![1.0, 1.5, 2.0]);
        assert_eq!(grid.maximum(), 2.0);
    }

    #[test]
    fn serde_round_trip() {
        let grid = PeriodGrid::geometric(5.0, 45.0, 10);
        let json = serde_json::to_string(&grid).unwrap();
        let back: PeriodGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(grid, back);
    }
}
