//! Exposes a subset of the joint log-posterior as an `argmin` problem
//!
//! The cost is the negative log-posterior divided by a positive scale, as a function of the free
//! parameters only. The remaining parameters are frozen at their values in `base`. Trial points
//! where the orbit geometry is undefined get an infinite cost, so the line search backs off.

use crate::error::FitError;
use crate::model::JointModel;

use argmin::core::{CostFunction, Error, Gradient};
use std::sync::Mutex;

/// Lowest cost evaluated so far and the free parameters it was found at
#[derive(Debug, Default)]
pub struct BestPoint {
    pub cost: Option<f64>,
    pub x: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SubsetProblem<'a> {
    model: &'a JointModel,
    base: &'a [f64],
    free: &'a [usize],
    scale: f64,
    best: &'a Mutex<BestPoint>,
}

impl<'a> SubsetProblem<'a> {
    pub fn new(
        model: &'a JointModel,
        base: &'a [f64],
        free: &'a [usize],
        scale: f64,
        best: &'a Mutex<BestPoint>,
    ) -> Self {
        assert!(scale > 0.0, "cost scale must be positive");
        Self {
            model,
            base,
            free,
            scale,
            best,
        }
    }

    /// Full parameter vector with the free entries replaced by `x`
    pub fn embed(&self, x: &[f64]) -> Vec<f64> {
        let mut theta = self.base.to_vec();
        for (&i, &value) in self.free.iter().zip(x) {
            theta[i] = value;
        }
        theta
    }

    /// Free entries of a full parameter vector
    pub fn project(&self, theta: &[f64]) -> Vec<f64> {
        self.free.iter().map(|&i| theta[i]).collect()
    }

    fn record(&self, x: &[f64], cost: f64) {
        if let Ok(mut best) = self.best.lock() {
            if best.cost.is_none_or(|c| cost < c) {
                best.cost = Some(cost);
                best.x = x.to_vec();
            }
        }
    }
}

impl CostFunction for SubsetProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        let ln_post = match self.model.ln_posterior(&self.embed(x)) {
            Ok(ln_post) => ln_post,
            Err(FitError::ParameterOutOfSupport { parameter, value }) => {
                tracing::debug!(parameter, value, "trial point outside of the support");
                return Ok(f64::INFINITY);
            }
            Err(err) => return Err(err.into()),
        };
        let cost = -ln_post / self.scale;
        self.record(x, cost);
        Ok(cost)
    }
}

impl Gradient for SubsetProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, Error> {
        let (value, grad) = match self.model.ln_posterior_grad(&self.embed(x), self.free) {
            Ok(value_grad) => value_grad,
            Err(FitError::ParameterOutOfSupport { .. }) => return Ok(vec![0.0; x.len()]),
            Err(err) => return Err(err.into()),
        };
        self.record(x, -value / self.scale);
        Ok(grad.into_iter().map(|g| -g / self.scale).collect())
    }
}
