use crate::error::FitError;
use crate::float_trait::LikeFloat;
use crate::gp::{CeleriteCoefficients, ShoTerm};

use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::TAU;

/// Semi-separable factorization of a celerite covariance matrix
///
/// The covariance $K = \mathrm{diag}(\sigma_n^2) + k(|t_n - t_m|)$ is factorized as
/// $K = L D L^T$ with $L = I + \mathrm{tril}(U W^T)$, where $U$ and $W$ are $N \times 2$
/// matrices (Foreman-Mackey et al. 2017). Factorization, solves and products all take $O(N)$
/// operations.
#[derive(Clone, Debug)]
pub struct CeleriteFactor<T> {
    t: Vec<f64>,
    t_ref: f64,
    coeffs: CeleriteCoefficients<T>,
    noise: Vec<T>,
    u: Vec<[T; 2]>,
    w: Vec<[T; 2]>,
    /// `p[n] = exp(-c (t[n] - t[n - 1]))`, `p[0]` is unused
    p: Vec<T>,
    d: Vec<T>,
}

impl<T: LikeFloat> CeleriteFactor<T> {
    /// Factorize the covariance at sorted times `t` with per-point white noise variances `noise`
    pub fn new(term: &ShoTerm<T>, t: &[f64], noise: Vec<T>) -> Result<Self, FitError> {
        assert_eq!(t.len(), noise.len(), "t and noise should have the same size");
        if t.is_empty() {
            return Err(FitError::InsufficientData {
                actual: 0,
                minimum: 1,
                context: "Gaussian process factorization",
            });
        }
        let coeffs = term.coefficients();
        let CeleriteCoefficients { a, c, .. } = coeffs;
        if !(a.value() > 0.0 && c.value() > 0.0 && c.value().is_finite()) {
            return Err(FitError::NumericalDegeneracy(format!(
                "invalid kernel coefficients a = {}, c = {}",
                a.value(),
                c.value()
            )));
        }

        let n = t.len();
        let t_ref = t[0];
        let (u, v): (Vec<_>, Vec<_>) = t.iter().map(|&t| uv(&coeffs, t - t_ref)).unzip();
        let mut p = Vec::with_capacity(n);
        p.push(T::one());
        for i in 1..n {
            let dt = t[i] - t[i - 1];
            if dt < 0.0 {
                return Err(FitError::NumericalDegeneracy(
                    "Gaussian process times must be sorted".to_owned(),
                ));
            }
            p.push((-c * T::from_f64(dt)).exp());
        }

        let mut d = Vec::with_capacity(n);
        let mut w = Vec::with_capacity(n);
        // S is symmetric 2x2, stored as (s00, s01, s11)
        let (mut s00, mut s01, mut s11) = (T::zero(), T::zero(), T::zero());
        for i in 0..n {
            let diag = noise[i] + a;
            let d_i;
            let w_i;
            if i == 0 {
                d_i = diag;
                w_i = [v[0][0] / d_i, v[0][1] / d_i];
            } else {
                let (d_prev, w_prev) = (d[i - 1], w[i - 1]);
                let [w0, w1]: [T; 2] = w_prev;
                let p2 = p[i] * p[i];
                s00 = p2 * (s00 + d_prev * w0 * w0);
                s01 = p2 * (s01 + d_prev * w0 * w1);
                s11 = p2 * (s11 + d_prev * w1 * w1);
                let [u0, u1] = u[i];
                let su0 = s00 * u0 + s01 * u1;
                let su1 = s01 * u0 + s11 * u1;
                d_i = diag - (u0 * su0 + u1 * su1);
                w_i = [(v[i][0] - su0) / d_i, (v[i][1] - su1) / d_i];
            }
            if !(d_i.value() > 0.0 && d_i.value().is_finite()) {
                return Err(FitError::NumericalDegeneracy(format!(
                    "non-positive pivot {} at index {i}",
                    d_i.value()
                )));
            }
            d.push(d_i);
            w.push(w_i);
        }

        Ok(Self {
            t: t.to_vec(),
            t_ref,
            coeffs,
            noise,
            u,
            w,
            p,
            d,
        })
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Logarithm of the covariance determinant
    pub fn log_det(&self) -> T {
        self.d.iter().fold(T::zero(), |acc, d| acc + d.ln())
    }

    /// Solve $L z = y$
    pub fn solve_lower(&self, y: &[T]) -> Vec<T> {
        assert_eq!(y.len(), self.len(), "y has wrong size");
        let mut z = Vec::with_capacity(y.len());
        let mut f = [T::zero(), T::zero()];
        z.push(y[0]);
        for i in 1..y.len() {
            let [w0, w1] = self.w[i - 1];
            f = [
                self.p[i] * (f[0] + w0 * z[i - 1]),
                self.p[i] * (f[1] + w1 * z[i - 1]),
            ];
            let [u0, u1] = self.u[i];
            z.push(y[i] - (u0 * f[0] + u1 * f[1]));
        }
        z
    }

    /// Solve $L^T x = y$
    pub fn solve_upper(&self, y: &[T]) -> Vec<T> {
        assert_eq!(y.len(), self.len(), "y has wrong size");
        let n = y.len();
        let mut x = vec![T::zero(); n];
        let mut g = [T::zero(), T::zero()];
        x[n - 1] = y[n - 1];
        for i in (0..n - 1).rev() {
            let [u0, u1] = self.u[i + 1];
            g = [
                self.p[i + 1] * (g[0] + u0 * x[i + 1]),
                self.p[i + 1] * (g[1] + u1 * x[i + 1]),
            ];
            let [w0, w1] = self.w[i];
            x[i] = y[i] - (w0 * g[0] + w1 * g[1]);
        }
        x
    }

    /// Compute $L y$
    pub fn matmul_lower(&self, y: &[T]) -> Vec<T> {
        assert_eq!(y.len(), self.len(), "y has wrong size");
        let mut z = Vec::with_capacity(y.len());
        let mut f = [T::zero(), T::zero()];
        z.push(y[0]);
        for i in 1..y.len() {
            let [w0, w1] = self.w[i - 1];
            f = [
                self.p[i] * (f[0] + w0 * y[i - 1]),
                self.p[i] * (f[1] + w1 * y[i - 1]),
            ];
            let [u0, u1] = self.u[i];
            z.push(y[i] + u0 * f[0] + u1 * f[1]);
        }
        z
    }

    /// Compute $K^{-1} y$
    pub fn solve(&self, y: &[T]) -> Vec<T> {
        let z: Vec<_> = self
            .solve_lower(y)
            .into_iter()
            .zip(&self.d)
            .map(|(z, &d)| z / d)
            .collect();
        self.solve_upper(&z)
    }

    /// Marginal log-likelihood of zero-mean residuals `r`
    pub fn log_likelihood(&self, r: &[T]) -> T {
        let z = self.solve_lower(r);
        let chi2 = z
            .iter()
            .zip(&self.d)
            .fold(T::zero(), |acc, (&z, &d)| acc + z * z / d);
        -T::half() * (chi2 + self.log_det())
            - T::from_f64(0.5 * self.len() as f64 * TAU.ln())
    }

    /// Conditional mean of the process at the observed times given residuals `r`
    pub fn predict_observed(&self, r: &[T]) -> Vec<T> {
        let alpha = self.solve(r);
        r.iter()
            .zip(&alpha)
            .zip(&self.noise)
            .map(|((&r, &alpha), &noise)| r - noise * alpha)
            .collect()
    }

    /// Conditional mean of the process at arbitrary times given residuals `r`
    pub fn predict(&self, r: &[T], t_pred: &[f64]) -> Vec<T> {
        let alpha = self.solve(r);
        let c = self.coeffs.c;
        let mut order: Vec<_> = (0..t_pred.len()).collect();
        order.sort_unstable_by(|&i, &j| t_pred[i].total_cmp(&t_pred[j]));
        let mut mu = vec![T::zero(); t_pred.len()];

        // Observations at or before the prediction time
        let mut forward = [T::zero(), T::zero()];
        let mut m = 0;
        for &k in &order {
            let tk = t_pred[k];
            while m < self.len() && self.t[m] <= tk {
                let decay = if m == 0 { T::one() } else { self.p[m] };
                let (_u, v) = uv(&self.coeffs, self.t[m] - self.t_ref);
                forward = [
                    decay * forward[0] + v[0] * alpha[m],
                    decay * forward[1] + v[1] * alpha[m],
                ];
                m += 1;
            }
            if m > 0 {
                let decay = (-c * T::from_f64(tk - self.t[m - 1])).exp();
                let (u, _v) = uv(&self.coeffs, tk - self.t_ref);
                mu[k] += decay * (u[0] * forward[0] + u[1] * forward[1]);
            }
        }

        // Observations after the prediction time
        let mut backward = [T::zero(), T::zero()];
        let mut m = self.len();
        for &k in order.iter().rev() {
            let tk = t_pred[k];
            while m > 0 && self.t[m - 1] > tk {
                let decay = if m == self.len() {
                    T::one()
                } else {
                    self.p[m]
                };
                let u = self.u[m - 1];
                backward = [
                    decay * backward[0] + u[0] * alpha[m - 1],
                    decay * backward[1] + u[1] * alpha[m - 1],
                ];
                m -= 1;
            }
            if m < self.len() {
                let decay = (-c * T::from_f64(self.t[m] - tk)).exp();
                let (_u, v) = uv(&self.coeffs, tk - self.t_ref);
                mu[k] += decay * (v[0] * backward[0] + v[1] * backward[1]);
            }
        }
        mu
    }
}

impl CeleriteFactor<f64> {
    /// Draw a realisation of the process plus white noise
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        let y: Vec<f64> = self
            .d
            .iter()
            .map(|d| d.sqrt() * rng.sample::<f64, _>(StandardNormal))
            .collect();
        self.matmul_lower(&y)
    }
}

fn uv<T: LikeFloat>(coeffs: &CeleriteCoefficients<T>, t: f64) -> ([T; 2], [T; 2]) {
    let (sin, cos) = (coeffs.d * T::from_f64(t)).sin_cos();
    (
        [
            coeffs.a * cos + coeffs.b * sin,
            coeffs.a * sin - coeffs.b * cos,
        ],
        [cos, sin],
    )
}
