use crate::constants::{G_GRAV, M_EARTH_IN_M_SUN, RSUN_PER_DAY_TO_M_PER_S};
use crate::error::FitError;

use nalgebra::{DMatrix, DVector};
use std::f64::consts::TAU;

/// Estimate RV semi-amplitudes (m/s) of circular orbits with known periods
///
/// Weighted linear least squares of the velocities on a constant plus a sine and cosine harmonic
/// per period, the amplitude of each harmonic pair is returned.
pub fn estimate_semi_amplitude(
    periods: &[f64],
    t: &[f64],
    rv: &[f64],
    rv_err: &[f64],
) -> Result<Vec<f64>, FitError> {
    assert_eq!(t.len(), rv.len(), "t and rv should have the same size");
    assert_eq!(t.len(), rv_err.len(), "t and rv_err should have the same size");
    let n_coeff = 1 + 2 * periods.len();
    if t.len() < n_coeff {
        return Err(FitError::InsufficientData {
            actual: t.len(),
            minimum: n_coeff,
            context: "RV semi-amplitude estimate",
        });
    }

    let weights: Vec<_> = rv_err
        .iter()
        .map(|&e| if e > 0.0 { e.recip() } else { 1.0 })
        .collect();
    let design = DMatrix::from_fn(t.len(), n_coeff, |i, j| {
        let value = if j == 0 {
            1.0
        } else {
            let phase = TAU * t[i] / periods[(j - 1) / 2];
            if j % 2 == 1 { phase.sin() } else { phase.cos() }
        };
        value * weights[i]
    });
    let target = DVector::from_iterator(t.len(), rv.iter().zip(&weights).map(|(v, w)| v * w));
    let coeff = design
        .svd(true, true)
        .solve(&target, 1e-12)
        .map_err(|err| FitError::NumericalDegeneracy(format!("RV least squares: {err}")))?;
    Ok((0..periods.len())
        .map(|i| f64::hypot(coeff[1 + 2 * i], coeff[2 + 2 * i]))
        .collect())
}

/// Minimum planet mass ($m \sin i$) in Earth masses from the RV semi-amplitude
///
/// Valid for circular orbits of planets much lighter than the star. `semi_amplitude` is in m/s,
/// `period` in days and `m_star` in solar masses.
pub fn estimate_minimum_mass(semi_amplitude: f64, period: f64, m_star: f64) -> f64 {
    let k = semi_amplitude / RSUN_PER_DAY_TO_M_PER_S;
    let m_sun = k * f64::cbrt(period * m_star * m_star / (TAU * G_GRAV));
    m_sun / M_EARTH_IN_M_SUN
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::orbit::{KeplerianOrbit, OrbitElements};

    use approx::assert_relative_eq;
    use light_curve_common::linspace;

    #[test]
    fn recovers_two_sinusoids() {
        let t: Vec<f64> = linspace(0.0, 100.0, 60);
        let rv: Vec<_> = t
            .iter()
            .map(|&t| {
                3.0 + 5.0 * f64::sin(TAU * t / 10.0 + 0.3) + 2.0 * f64::cos(TAU * t / 21.0 - 1.0)
            })
            .collect();
        let err = vec![1.0; t.len()];
        let k = estimate_semi_amplitude(&[10.0, 21.0], &t, &rv, &err).unwrap();
        assert_relative_eq!(k[0], 5.0, max_relative = 1e-8);
        assert_relative_eq!(k[1], 2.0, max_relative = 1e-8);
    }

    #[test]
    fn minimum_mass_inverts_orbit_amplitude() {
        let m_planet = 12.0;
        let orbit = KeplerianOrbit::new(OrbitElements {
            period: 15.0,
            t0: 0.0,
            b: 0.0,
            ecc: 0.0,
            cos_w: 1.0,
            sin_w: 0.0,
            m_star: 0.9,
            r_star: 0.9,
            m_planet: m_planet * M_EARTH_IN_M_SUN,
        })
        .unwrap();
        let mass = estimate_minimum_mass(orbit.semi_amplitude(), 15.0, 0.9);
        assert_relative_eq!(mass, m_planet, max_relative = 1e-3);
    }

    #[test]
    fn not_enough_points() {
        let err = estimate_semi_amplitude(&[10.0, 21.0], &[0.0; 4], &[0.0; 4], &[1.0; 4]);
        assert!(matches!(
            err,
            Err(FitError::InsufficientData { minimum: 5, .. })
        ));
    }
}
