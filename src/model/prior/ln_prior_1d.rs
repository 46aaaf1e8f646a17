use enum_dispatch::enum_dispatch;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[enum_dispatch]
pub trait LnPrior1DTrait: Clone + Debug + Serialize + DeserializeOwned + PartialEq {
    /// Evaluate the natural logarithm of the prior at x
    ///
    /// If `grad` is `Some`, the gradient d(ln_prior)/dx is also computed and stored in it.
    fn ln_prior_1d(&self, x: f64, grad: Option<&mut f64>) -> f64;
}

/// Natural logarithm of prior for a single model parameter
#[enum_dispatch(LnPrior1DTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[non_exhaustive]
pub enum LnPrior1D {
    Normal(NormalLnPrior1D),
    Uniform(UniformLnPrior1D),
}

impl LnPrior1D {
    pub fn normal(mu: f64, std: f64) -> Self {
        NormalLnPrior1D::new(mu, std).into()
    }

    pub fn uniform(left: f64, right: f64) -> Self {
        UniformLnPrior1D::new(left, right).into()
    }
}

/// Natural logarithm of the normal distribution normalization for standard deviation `std`
fn normal_ln_coeff(std: f64) -> f64 {
    -f64::ln(std) - 0.5 * f64::ln(std::f64::consts::TAU)
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(into = "NormalLnPrior1DParameters", from = "NormalLnPrior1DParameters")]
pub struct NormalLnPrior1D {
    mu: f64,
    inv_std2: f64,
    ln_prob_coeff: f64,
}

impl NormalLnPrior1D {
    pub fn new(mu: f64, std: f64) -> Self {
        assert!(mu.is_finite(), "mu must be finite");
        assert!(std.is_finite() && std > 0.0, "std must be positive and finite");
        Self {
            mu,
            inv_std2: std.powi(-2),
            ln_prob_coeff: normal_ln_coeff(std),
        }
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn std(&self) -> f64 {
        self.inv_std2.recip().sqrt()
    }
}

impl LnPrior1DTrait for NormalLnPrior1D {
    fn ln_prior_1d(&self, x: f64, grad: Option<&mut f64>) -> f64 {
        let diff = self.mu - x;
        let ln_prior = self.ln_prob_coeff - 0.5 * diff.powi(2) * self.inv_std2;

        if let Some(g) = grad {
            *g = diff * self.inv_std2;
        }

        ln_prior
    }
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(rename = "NormalLnPrior1D")]
struct NormalLnPrior1DParameters {
    mu: f64,
    std: f64,
}

impl From<NormalLnPrior1D> for NormalLnPrior1DParameters {
    fn from(f: NormalLnPrior1D) -> Self {
        Self {
            mu: f.mu,
            std: f.std(),
        }
    }
}

impl From<NormalLnPrior1DParameters> for NormalLnPrior1D {
    fn from(f: NormalLnPrior1DParameters) -> Self {
        Self::new(f.mu, f.std)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(
    into = "UniformLnPrior1DParameters",
    from = "UniformLnPrior1DParameters"
)]
pub struct UniformLnPrior1D {
    left: f64,
    right: f64,
    ln_prob: f64,
}

impl UniformLnPrior1D {
    pub fn new(left: f64, right: f64) -> Self {
        assert!(left.is_finite(), "left must be finite");
        assert!(right.is_finite() && left < right, "right must be larger than left");
        Self {
            left,
            right,
            ln_prob: -f64::ln(right - left),
        }
    }
}

impl LnPrior1DTrait for UniformLnPrior1D {
    fn ln_prior_1d(&self, x: f64, grad: Option<&mut f64>) -> f64 {
        if let Some(g) = grad {
            *g = 0.0;
        }
        if (self.left..=self.right).contains(&x) {
            self.ln_prob
        } else {
            f64::NEG_INFINITY
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(rename = "UniformLnPrior")]
struct UniformLnPrior1DParameters {
    range: std::ops::RangeInclusive<f64>,
}

impl From<UniformLnPrior1D> for UniformLnPrior1DParameters {
    fn from(f: UniformLnPrior1D) -> Self {
        Self {
            range: f.left..=f.right,
        }
    }
}

impl From<UniformLnPrior1DParameters> for UniformLnPrior1D {
    fn from(f: UniformLnPrior1DParameters) -> Self {
        Self::new(*f.range.start(), *f.range.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hyperdual::Hyperdual;

    fn ln_prior_normal(x: Hyperdual<f64, 2>, mu: f64, std: f64) -> Hyperdual<f64, 2> {
        let diff = Hyperdual::from_real(mu) - x;
        Hyperdual::from_real(normal_ln_coeff(std))
            - diff * diff * Hyperdual::from_real(0.5 / (std * std))
    }

    fn test_prior_gradient<F, P>(f: F, test_values: &[f64], prior: P)
    where
        F: Fn(Hyperdual<f64, 2>) -> Hyperdual<f64, 2>,
        P: LnPrior1DTrait,
    {
        for &x in test_values {
            let mut actual_grad = 0.0;
            let actual_ln_p = prior.ln_prior_1d(x, Some(&mut actual_grad));

            let mut x_dual = Hyperdual::<f64, 2>::from_real(x);
            x_dual[1] = 1.0;
            let ln_p_dual = f(x_dual);

            assert_relative_eq!(actual_ln_p, ln_p_dual.real(), epsilon = 1e-12);
            assert_relative_eq!(actual_grad, ln_p_dual[1], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_normal_gradient() {
        test_prior_gradient(
            |x| ln_prior_normal(x, 5.0, 2.0),
            &[0.0, 3.0, 5.0, 7.0, 10.0],
            NormalLnPrior1D::new(5.0, 2.0),
        );
    }

    #[test]
    fn test_uniform_outside() {
        let prior = UniformLnPrior1D::new(0.0, 10.0);
        assert_relative_eq!(prior.ln_prior_1d(5.0, None), -f64::ln(10.0));
        assert_eq!(prior.ln_prior_1d(11.0, None), f64::NEG_INFINITY);
    }

    #[test]
    fn serde_round_trip() {
        for prior in [LnPrior1D::normal(0.0, 2.0), LnPrior1D::uniform(-1.0, 3.0)] {
            let json = serde_json::to_string(&prior).unwrap();
            let back: LnPrior1D = serde_json::from_str(&json).unwrap();
            assert_eq!(prior.ln_prior_1d(1.3, None), back.ln_prior_1d(1.3, None));
        }
    }
}
