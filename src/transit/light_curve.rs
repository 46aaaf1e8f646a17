use crate::float_trait::LikeFloat;
use crate::orbit::KeplerianOrbit;
use crate::transit::{QuadraticLimbDarkening, occultation};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Instrument and numerical settings of the transit light curve
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct LightCurveSettings {
    /// Exposure duration in days, zero for instantaneous samples
    pub exposure_time: f64,
    /// Number of sub-exposures averaged over the exposure
    pub oversample: usize,
    /// Number of annuli of the limb-darkening integral
    pub n_annuli: usize,
    /// Multiplier converting relative flux to the units of the data, 1e3 for ppt
    pub flux_scale: f64,
}

impl LightCurveSettings {
    pub fn new(exposure_time: f64, oversample: usize, n_annuli: usize, flux_scale: f64) -> Self {
        assert!(
            exposure_time.is_finite() && exposure_time >= 0.0,
            "exposure time must be finite and non-negative"
        );
        assert!(oversample > 0, "oversample must be positive");
        assert!(n_annuli > 0, "number of annuli must be positive");
        assert!(flux_scale > 0.0, "flux scale must be positive");
        Self {
            exposure_time,
            oversample,
            n_annuli,
            flux_scale,
        }
    }

    /// Two minute cadence
    pub fn default_exposure_time() -> f64 {
        2.0 / 60.0 / 24.0
    }

    pub fn default_oversample() -> usize {
        7
    }

    pub fn default_n_annuli() -> usize {
        32
    }

    pub fn default_flux_scale() -> f64 {
        1e3
    }

    /// Time offsets of sub-exposures relative to the exposure centre
    pub fn sub_exposure_offsets(&self) -> Vec<f64> {
        if self.oversample == 1 || self.exposure_time == 0.0 {
            return vec![0.0];
        }
        let k = self.oversample as f64;
        (0..self.oversample)
            .map(|j| self.exposure_time * ((j as f64 + 0.5) / k - 0.5))
            .collect()
    }

    /// Exposure-averaged flux change of a single planet at time `t`, in data units
    pub fn planet_flux_at<T: LikeFloat>(
        &self,
        orbit: &KeplerianOrbit<T>,
        ror: T,
        ld: &QuadraticLimbDarkening<T>,
        offsets: &[f64],
        t: f64,
    ) -> T {
        let mut blocked = T::zero();
        for &dt in offsets {
            let (z, in_front) = orbit.sky_separation(t + dt);
            if in_front {
                blocked += occultation(z, ror, ld, self.n_annuli);
            }
        }
        -blocked * T::from_f64(self.flux_scale / offsets.len() as f64)
    }

    /// Flux change of a single planet at every time of `t`
    pub fn planet_light_curve<T: LikeFloat>(
        &self,
        orbit: &KeplerianOrbit<T>,
        ror: T,
        ld: &QuadraticLimbDarkening<T>,
        t: &[f64],
    ) -> Vec<T> {
        let offsets = self.sub_exposure_offsets();
        t.iter()
            .map(|&t| self.planet_flux_at(orbit, ror, ld, &offsets, t))
            .collect()
    }

    /// Flux change summed over planets, every planet is given by its orbit and radius ratio
    pub fn light_curve<T: LikeFloat>(
        &self,
        planets: &[(KeplerianOrbit<T>, T)],
        ld: &QuadraticLimbDarkening<T>,
        t: &[f64],
    ) -> Vec<T> {
        let mut total = vec![T::zero(); t.len()];
        for (orbit, ror) in planets {
            for (acc, flux) in total
                .iter_mut()
                .zip(self.planet_light_curve(orbit, *ror, ld, t))
            {
                *acc += flux;
            }
        }
        total
    }
}

impl Default for LightCurveSettings {
    fn default() -> Self {
        Self::new(
            Self::default_exposure_time(),
            Self::default_oversample(),
            Self::default_n_annuli(),
            Self::default_flux_scale(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::orbit::OrbitElements;

    use approx::assert_relative_eq;
    use light_curve_common::linspace;

    fn orbit(t0: f64, period: f64, b: f64) -> KeplerianOrbit<f64> {
        KeplerianOrbit::new(OrbitElements {
            period,
            t0,
            b,
            ecc: 0.0,
            cos_w: 1.0,
            sin_w: 0.0,
            m_star: 1.0,
            r_star: 1.0,
            m_planet: 0.0,
        })
        .unwrap()
    }

    #[test]
    fn offsets_are_centred() {
        let settings = LightCurveSettings::new(0.7, 7, 8, 1.0);
        let offsets = settings.sub_exposure_offsets();
        assert_eq!(offsets.len(), 7);
        assert_relative_eq!(offsets.iter().sum::<f64>(), 0.0, epsilon = 1e-14);
        assert_relative_eq!(offsets[0], -0.3, max_relative = 1e-12);
        assert_eq!(
            LightCurveSettings::new(0.0, 7, 8, 1.0).sub_exposure_offsets(),
            vec![0.0]
        );
    }

    #[test]
    fn uniform_disk_depth_in_ppt() {
        let settings = LightCurveSettings::new(0.0, 1, 8, 1e3);
        let ld = QuadraticLimbDarkening::new(0.0, 0.0);
        let flux = settings.planet_light_curve(&orbit(2.0, 10.0, 0.0), 0.1, &ld, &[2.0, 7.0]);
        assert_relative_eq!(flux[0], -10.0, max_relative = 1e-10);
        assert_eq!(flux[1], 0.0);
    }

    #[test]
    fn exposure_smooths_ingress() {
        let ld = QuadraticLimbDarkening::new(0.4, 0.2);
        let o = orbit(2.0, 10.0, 0.2);
        let t: Vec<f64> = linspace(1.8, 2.2, 401);
        let sharp = LightCurveSettings::new(0.0, 1, 32, 1e3).planet_light_curve(&o, 0.05, &ld, &t);
        let smooth =
            LightCurveSettings::new(0.02, 9, 32, 1e3).planet_light_curve(&o, 0.05, &ld, &t);
        let sharp_area: f64 = sharp.iter().sum();
        let smooth_area: f64 = smooth.iter().sum();
        assert_relative_eq!(sharp_area, smooth_area, max_relative = 1e-2);
        let first_sharp = sharp.iter().position(|&f| f < 0.0).unwrap();
        let first_smooth = smooth.iter().position(|&f| f < 0.0).unwrap();
        assert!(first_smooth < first_sharp);
    }

    #[test]
    fn planets_add_up() {
        let settings = LightCurveSettings::default();
        let ld = QuadraticLimbDarkening::new(0.3, 0.2);
        let t: Vec<f64> = linspace(0.0, 30.0, 3000);
        let planets = [(orbit(2.0, 10.0, 0.1), 0.03), (orbit(5.0, 21.0, 0.4), 0.05)];
        let total = settings.light_curve(&planets, &ld, &t);
        let first = settings.planet_light_curve(&planets[0].0, planets[0].1, &ld, &t);
        let second = settings.planet_light_curve(&planets[1].0, planets[1].1, &ld, &t);
        for ((a, b), c) in total.iter().zip(&first).zip(&second) {
            assert_relative_eq!(*a, b + c, epsilon = 1e-12);
        }
        assert!(total.iter().any(|&f| f < -2.0));
    }
}
