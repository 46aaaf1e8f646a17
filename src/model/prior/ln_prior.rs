use crate::model::prior::ln_prior_1d::{LnPrior1D, LnPrior1DTrait};

use enum_dispatch::enum_dispatch;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Numerically stable $\ln(1 + e^x)$
pub fn softplus(x: f64) -> f64 {
    x.max(0.0) + f64::ln_1p(f64::exp(-x.abs()))
}

/// Map from an unconstrained internal parameter to the value its prior is defined on
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum Transform {
    Identity,
    /// $y = e^x$, positive values
    Exp,
    /// $y = 1 / (1 + e^{-x})$, values in the unit interval
    Logistic,
}

impl Transform {
    pub fn forward(self, x: f64) -> f64 {
        match self {
            Self::Identity => x,
            Self::Exp => x.exp(),
            Self::Logistic => logistic(x),
        }
    }

    /// Transformed value, its derivative, log-Jacobian and the derivative of the log-Jacobian
    fn forward_with_jacobian(self, x: f64) -> (f64, f64, f64, f64) {
        match self {
            Self::Identity => (x, 1.0, 0.0, 0.0),
            Self::Exp => {
                let y = x.exp();
                (y, y, x, 1.0)
            }
            Self::Logistic => {
                let y = logistic(x);
                (y, y * (1.0 - y), -softplus(-x) - softplus(x), 1.0 - 2.0 * y)
            }
        }
    }
}

fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        (1.0 + (-x).exp()).recip()
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// A term of the joint prior
#[enum_dispatch]
pub trait LnPriorComponentTrait: Clone + Debug {
    /// Natural logarithm of the prior term, its gradient is added to `grad`
    fn ln_prior(&self, params: &[f64], grad: Option<&mut [f64]>) -> f64;
}

#[enum_dispatch(LnPriorComponentTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[non_exhaustive]
pub enum LnPriorComponent {
    Single(SingleLnPrior),
    UnitDisk(UnitDiskLnPrior),
}

/// One-dimensional prior on a transformed parameter including the log-Jacobian of the transform
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SingleLnPrior {
    pub index: usize,
    pub transform: Transform,
    pub prior: LnPrior1D,
}

impl LnPriorComponentTrait for SingleLnPrior {
    fn ln_prior(&self, params: &[f64], grad: Option<&mut [f64]>) -> f64 {
        let x = params[self.index];
        let (y, dy_dx, ln_jac, dln_jac_dx) = self.transform.forward_with_jacobian(x);
        match grad {
            Some(grad) => {
                let mut dp_dy = 0.0;
                let value = self.prior.ln_prior_1d(y, Some(&mut dp_dy)) + ln_jac;
                grad[self.index] += dp_dy * dy_dx + dln_jac_dx;
                value
            }
            None => self.prior.ln_prior_1d(y, None) + ln_jac,
        }
    }
}

/// Uniform prior over the unit disk for a pair of unconstrained parameters
///
/// The pair $(a, b)$ maps onto the disk as $(u, w \sqrt{1 - u^2})$ with $u = \tanh a$ and
/// $w = \tanh b$.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct UnitDiskLnPrior {
    pub indices: [usize; 2],
}

impl UnitDiskLnPrior {
    /// Point on the unit disk
    pub fn forward(a: f64, b: f64) -> [f64; 2] {
        let (u, w) = (a.tanh(), b.tanh());
        [u, w * f64::sqrt(1.0 - u * u)]
    }
}

/// $\ln(1 - \tanh^2 x)$
fn ln_sech2(x: f64) -> f64 {
    2.0 * (std::f64::consts::LN_2 - x.abs() - f64::ln_1p(f64::exp(-2.0 * x.abs())))
}

impl LnPriorComponentTrait for UnitDiskLnPrior {
    fn ln_prior(&self, params: &[f64], grad: Option<&mut [f64]>) -> f64 {
        let [ia, ib] = self.indices;
        let (a, b) = (params[ia], params[ib]);
        if let Some(grad) = grad {
            grad[ia] -= 3.0 * a.tanh();
            grad[ib] -= 2.0 * b.tanh();
        }
        -std::f64::consts::PI.ln() + 1.5 * ln_sech2(a) + ln_sech2(b)
    }
}

/// Joint prior as a sum of independent terms
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LnPrior {
    components: Vec<LnPriorComponent>,
}

impl LnPrior {
    pub fn new(components: Vec<LnPriorComponent>) -> Self {
        Self { components }
    }

    pub fn push(&mut self, component: impl Into<LnPriorComponent>) {
        self.components.push(component.into());
    }

    pub fn components(&self) -> &[LnPriorComponent] {
        &self.components
    }

    /// Largest parameter index used by any term
    pub fn max_index(&self) -> Option<usize> {
        self.components
            .iter()
            .map(|c| match c {
                LnPriorComponent::Single(single) => single.index,
                LnPriorComponent::UnitDisk(disk) => disk.indices[0].max(disk.indices[1]),
            })
            .max()
    }

    /// Evaluate the natural logarithm of the prior at params
    ///
    /// If `grad` is `Some`, it is overwritten with d(ln_prior)/d(params).
    pub fn ln_prior(&self, params: &[f64], mut grad: Option<&mut [f64]>) -> f64 {
        if let Some(g) = grad.as_deref_mut() {
            g.fill(0.0);
        }
        self.components
            .iter()
            .map(|c| c.ln_prior(params, grad.as_deref_mut()))
            .sum()
    }

    pub fn as_func(&self) -> impl '_ + Fn(&[f64]) -> f64 {
        |params| self.ln_prior(params, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use hyperdual::{Float, Hyperdual};

    #[test]
    fn softplus_is_stable() {
        assert_relative_eq!(softplus(0.0), std::f64::consts::LN_2);
        assert_relative_eq!(softplus(800.0), 800.0);
        assert!(softplus(-800.0) >= 0.0 && softplus(-800.0) < 1e-300);
    }

    #[test]
    fn transformed_gradient_matches_dual() {
        let components = [
            SingleLnPrior {
                index: 0,
                transform: Transform::Exp,
                prior: LnPrior1D::normal(1.0, 0.1),
            },
            SingleLnPrior {
                index: 0,
                transform: Transform::Logistic,
                prior: LnPrior1D::uniform(0.0, 1.0),
            },
            SingleLnPrior {
                index: 0,
                transform: Transform::Identity,
                prior: LnPrior1D::normal(-1.0, 3.0),
            },
        ];
        let dual_fns: [fn(Hyperdual<f64, 2>) -> Hyperdual<f64, 2>; 3] = [
            |x| {
                let y = x.exp();
                let d = (y - Hyperdual::from_real(1.0)) * Hyperdual::from_real(10.0);
                Hyperdual::from_real(-f64::ln(0.1) - 0.5 * f64::ln(std::f64::consts::TAU))
                    - d * d * Hyperdual::from_real(0.5)
                    + x
            },
            |x| {
                let y = (Hyperdual::from_real(1.0) + (-x).exp()).recip();
                (y * (Hyperdual::from_real(1.0) - y)).ln()
            },
            |x| {
                let d = (x + Hyperdual::from_real(1.0)) * Hyperdual::from_real(1.0 / 3.0);
                Hyperdual::from_real(-f64::ln(3.0) - 0.5 * f64::ln(std::f64::consts::TAU))
                    - d * d * Hyperdual::from_real(0.5)
            },
        ];
        for (component, f) in components.iter().zip(dual_fns) {
            for &x in &[-2.0, -0.3, 0.0, 0.4, 1.7] {
                let mut grad = [0.0];
                let value = component.ln_prior(&[x], Some(&mut grad));
                let mut x_dual = Hyperdual::<f64, 2>::from_real(x);
                x_dual[1] = 1.0;
                let expected = f(x_dual);
                assert_relative_eq!(value, expected.real(), max_relative = 1e-10);
                assert_relative_eq!(grad[0], expected[1], max_relative = 1e-9, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn unit_disk_density_integrates_to_unity() {
        // Integrate exp(ln prior) over the unconstrained plane
        let prior = UnitDiskLnPrior { indices: [0, 1] };
        let (n, half_width) = (800, 12.0);
        let step = 2.0 * half_width / n as f64;
        let mut total = 0.0;
        for i in 0..n {
            for j in 0..n {
                let a = -half_width + (i as f64 + 0.5) * step;
                let b = -half_width + (j as f64 + 0.5) * step;
                total += prior.ln_prior(&[a, b], None).exp() * step * step;
            }
        }
        assert_relative_eq!(total, 1.0, max_relative = 1e-3);
    }

    #[test]
    fn unit_disk_gradient_matches_difference() {
        let prior = UnitDiskLnPrior { indices: [1, 0] };
        let params = [0.7, -0.4];
        let mut grad = [0.0; 2];
        prior.ln_prior(&params, Some(&mut grad));
        let h = 1e-6;
        for k in 0..2 {
            let mut plus = params;
            plus[k] += h;
            let mut minus = params;
            minus[k] -= h;
            let numeric = (prior.ln_prior(&plus, None) - prior.ln_prior(&minus, None)) / (2.0 * h);
            assert_relative_eq!(grad[k], numeric, max_relative = 1e-6);
        }
        let [x, y] = UnitDiskLnPrior::forward(5.0, 5.0);
        assert!(x * x + y * y < 1.0);
    }

    #[test]
    fn joint_prior_overwrites_gradient() {
        let prior = LnPrior::new(vec![
            SingleLnPrior {
                index: 0,
                transform: Transform::Identity,
                prior: LnPrior1D::normal(0.0, 1.0),
            }
            .into(),
            UnitDiskLnPrior { indices: [1, 2] }.into(),
        ]);
        let mut grad = [100.0; 3];
        let value = prior.ln_prior(&[1.0, 0.0, 0.0], Some(&mut grad));
        assert_relative_eq!(
            value,
            -0.5 - 0.5 * f64::ln(std::f64::consts::TAU) - std::f64::consts::PI.ln()
        );
        assert_eq!(grad, [-1.0, 0.0, 0.0]);
        assert_eq!(prior.as_func()(&[1.0, 0.0, 0.0]), value);
    }
}
