use crate::float_trait::LikeFloat;

/// Coefficients of a single complex celerite term
///
/// $k(\tau) = e^{-c\tau} \left[a \cos(d\tau) + b \sin(d\tau)\right]$ for $\tau \ge 0$
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CeleriteCoefficients<T> {
    pub a: T,
    pub b: T,
    pub c: T,
    pub d: T,
}

/// Stochastically driven, damped harmonic oscillator with quality factor $Q = 1 / \sqrt{2}$
///
/// `sigma` is the standard deviation of the process and `rho` is its undamped period. With this
/// quality factor the kernel is
/// $$
/// k(\tau) = \sigma^2 e^{-\eta} (\cos\eta + \sin\eta), \quad \eta = \frac{\omega_0 \tau}{\sqrt2},
/// \quad \omega_0 = \frac{2\pi}{\rho},
/// $$
/// which is positive semi-definite for every positive `sigma` and `rho`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShoTerm<T> {
    pub sigma: T,
    pub rho: T,
}

impl<T: LikeFloat> ShoTerm<T> {
    pub fn new(sigma: T, rho: T) -> Self {
        Self { sigma, rho }
    }

    pub fn coefficients(&self) -> CeleriteCoefficients<T> {
        let a = self.sigma * self.sigma;
        let c = T::tau() / self.rho * T::from_f64(std::f64::consts::FRAC_1_SQRT_2);
        CeleriteCoefficients { a, b: a, c, d: c }
    }

    /// Kernel value at lag `tau`
    pub fn value(&self, tau: f64) -> T {
        let CeleriteCoefficients { a, b, c, d } = self.coefficients();
        let tau = T::from_f64(tau.abs());
        (-c * tau).exp() * (a * (d * tau).cos() + b * (d * tau).sin())
    }

    /// Power spectral density at angular frequency `omega`
    pub fn psd(&self, omega: f64) -> T {
        let omega0 = T::tau() / self.rho;
        let q = T::from_f64(std::f64::consts::FRAC_1_SQRT_2);
        let s0 = self.sigma * self.sigma / (omega0 * q);
        let omega = T::from_f64(omega);
        let w2 = omega * omega;
        let w02 = omega0 * omega0;
        T::from_f64(std::f64::consts::FRAC_2_PI.sqrt()) * s0 * w02 * w02
            / ((w2 - w02) * (w2 - w02) + w02 * w2 / (q * q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use std::f64::consts::{PI, SQRT_2};

    #[test]
    fn kernel_shape() {
        let term = ShoTerm::new(2.0, 3.0);
        assert_relative_eq!(term.value(0.0), 4.0, max_relative = 1e-15);
        let eta = 2.0 * PI / 3.0 / SQRT_2 * 0.7;
        assert_relative_eq!(
            term.value(-0.7),
            4.0 * (-eta).exp() * (eta.cos() + eta.sin()),
            max_relative = 1e-14
        );
    }

    #[test]
    fn psd_integrates_to_variance() {
        // sigma^2 = sqrt(2 / pi) * int_0^inf S(omega) d omega
        let term = ShoTerm::new(1.5, 2.0);
        let n = 200_000;
        let omega_max = 400.0;
        let step = omega_max / n as f64;
        let integral: f64 = (0..n).map(|i| term.psd((i as f64 + 0.5) * step) * step).sum();
        assert_relative_eq!(
            integral * (2.0 / PI).sqrt(),
            term.value(0.0),
            max_relative = 1e-3
        );
    }
}
