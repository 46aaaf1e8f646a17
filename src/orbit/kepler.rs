use crate::float_trait::LikeFloat;

use std::f64::consts::{PI, TAU};

const MAX_ITERATIONS: usize = 64;

/// Solve Kepler's equation $E - e \sin E = M$ for the eccentric anomaly
///
/// `mean_anomaly` may be any finite number, the result lies in $[0, 2\pi)$. The root is bracketed
/// on $[0, \pi]$ (the other half follows from symmetry) and found with Newton steps falling back to
/// bisection whenever a step leaves the bracket, so it converges for any $0 \le e < 1$.
pub fn eccentric_anomaly(mean_anomaly: f64, ecc: f64) -> f64 {
    debug_assert!((0.0..1.0).contains(&ecc), "eccentricity must be in [0, 1)");
    let m = mean_anomaly.rem_euclid(TAU);
    if ecc == 0.0 {
        return m;
    }
    if m > PI {
        return TAU - solve_upper_half(TAU - m, ecc);
    }
    solve_upper_half(m, ecc)
}

/// Root of $E - e \sin E - M$ for $M \in [0, \pi]$
fn solve_upper_half(m: f64, ecc: f64) -> f64 {
    if m == 0.0 || m == PI {
        return m;
    }
    // Starter from the third-order series, clamped into the bracket
    let (mut lo, mut hi) = (0.0, PI);
    let mut e_anom = f64::clamp(m + ecc * f64::sin(m) / (1.0 - f64::sin(m + ecc) + f64::sin(m)), lo, hi);
    for _ in 0..MAX_ITERATIONS {
        let (sin_e, cos_e) = e_anom.sin_cos();
        let f = e_anom - ecc * sin_e - m;
        if f.abs() < 1e-15 {
            break;
        }
        if f > 0.0 {
            hi = e_anom;
        } else {
            lo = e_anom;
        }
        let df = 1.0 - ecc * cos_e;
        let mut next = e_anom - f / df;
        if !(next > lo && next < hi) {
            next = 0.5 * (lo + hi);
        }
        if (next - e_anom).abs() < 4.0 * f64::EPSILON {
            e_anom = next;
            break;
        }
        e_anom = next;
    }
    e_anom
}

/// Eccentric anomaly carrying derivatives with respect to `mean_anomaly` and `ecc`
///
/// The value is found in `f64` with [eccentric_anomaly], the derivatives come from a single Newton
/// step evaluated in `T`, which is exact to first order by the implicit function theorem.
pub fn eccentric_anomaly_generic<T: LikeFloat>(mean_anomaly: T, ecc: T) -> T {
    let m_value = mean_anomaly.value();
    let turns = (m_value / TAU).floor();
    let m = mean_anomaly - T::from_f64(turns * TAU);
    let e_real = T::from_f64(eccentric_anomaly(m_value, ecc.value()));
    let (sin_e, cos_e) = e_real.sin_cos();
    e_real - (e_real - ecc * sin_e - m) / (T::one() - ecc * cos_e)
}

/// True anomaly from the eccentric anomaly
pub fn true_anomaly<T: LikeFloat>(eccentric_anomaly: T, ecc: T) -> T {
    let half = eccentric_anomaly * T::half();
    T::two()
        * T::atan2(
            T::sqrt(T::one() + ecc) * half.sin(),
            T::sqrt(T::one() - ecc) * half.cos(),
        )
}

/// Eccentric anomaly from the true anomaly
pub fn eccentric_from_true<T: LikeFloat>(true_anomaly: T, ecc: T) -> T {
    let half = true_anomaly * T::half();
    T::two()
        * T::atan2(
            T::sqrt(T::one() - ecc) * half.sin(),
            T::sqrt(T::one() + ecc) * half.cos(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use hyperdual::Hyperdual;

    #[test]
    fn residual_is_tiny_over_the_domain() {
        for i_e in 0..=99 {
            let ecc = 0.01 * i_e as f64;
            for i_m in 0..500 {
                let m = TAU * i_m as f64 / 500.0;
                let e_anom = eccentric_anomaly(m, ecc);
                let residual = e_anom - ecc * e_anom.sin() - m;
                assert!(
                    residual.abs() < 1e-10,
                    "e = {ecc}, M = {m}, residual = {residual}"
                );
                assert!((0.0..TAU).contains(&e_anom));
            }
        }
    }

    #[test]
    fn wraps_mean_anomaly() {
        let ecc = 0.3;
        assert_relative_eq!(
            eccentric_anomaly(1.0 + 3.0 * TAU, ecc),
            eccentric_anomaly(1.0, ecc),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            eccentric_anomaly(-1.0, ecc),
            eccentric_anomaly(TAU - 1.0, ecc),
            epsilon = 1e-12
        );
    }

    #[test]
    fn derivatives_match_implicit_function() {
        let (m, ecc) = (2.1, 0.4);
        let mut m_dual = Hyperdual::<f64, 3>::from_real(m);
        m_dual[1] = 1.0;
        let mut e_dual = Hyperdual::<f64, 3>::from_real(ecc);
        e_dual[2] = 1.0;
        let e_anom = eccentric_anomaly_generic(m_dual, e_dual);
        let value = e_anom.real();
        let denom = 1.0 - ecc * value.cos();
        assert_relative_eq!(e_anom[1], 1.0 / denom, max_relative = 1e-10);
        assert_relative_eq!(e_anom[2], value.sin() / denom, max_relative = 1e-10);
    }

    #[test]
    fn true_and_eccentric_anomalies_are_inverse() {
        for &ecc in &[0.0, 0.2, 0.9] {
            for i in 0..20 {
                let f = -3.0 + 0.3 * i as f64;
                let e_anom = eccentric_from_true(f, ecc);
                assert_relative_eq!(true_anomaly(e_anom, ecc), f, epsilon = 1e-12);
            }
        }
    }
}
