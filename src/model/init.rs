use crate::data::TimeSeries;
use crate::error::FitError;
use crate::model::layout::{ParameterBlock, ParameterLayout};
use crate::model::prior::{LnPrior, LnPrior1D, SingleLnPrior, Transform, UnitDiskLnPrior};
use crate::orbit::{estimate_minimum_mass, estimate_semi_amplitude};
use crate::periodogram::TransitCandidate;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Value with a Gaussian uncertainty
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub uncertainty: f64,
}

impl Measurement {
    pub fn new(value: f64, uncertainty: f64) -> Self {
        assert!(value.is_finite(), "value must be finite");
        assert!(
            uncertainty.is_finite() && uncertainty > 0.0,
            "uncertainty must be finite and positive"
        );
        Self { value, uncertainty }
    }
}

/// Widths of the weakly informative priors and the literature stellar parameters
///
/// Every `*_log_std` is the standard deviation of a normal prior on the natural logarithm of the
/// parameter, the prior is centred on the initial estimate.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PriorSettings {
    /// Stellar mass, solar masses
    pub m_star: Measurement,
    /// Stellar radius, solar radii
    pub r_star: Measurement,
    pub mean_std: f64,
    pub period_log_std: f64,
    /// Standard deviation of the epoch prior, days
    pub epoch_std: f64,
    pub depth_log_std: f64,
    pub planet_mass_log_std: f64,
    /// Prior width for the light-curve jitter and the GP amplitude, centred on the flux scatter
    pub light_curve_noise_log_std: f64,
    /// Prior width for the GP undamped period, centred on one day
    pub gp_rho_log_std: f64,
    /// Prior width for the RV jitter, centred on the median RV uncertainty
    pub rv_jitter_log_std: f64,
    /// Lower limit of the initial planet mass estimate, Earth masses
    pub min_planet_mass: f64,
}

impl PriorSettings {
    pub fn default_m_star() -> Measurement {
        Measurement::new(1.0, 0.1)
    }

    pub fn default_r_star() -> Measurement {
        Measurement::new(1.0, 0.1)
    }

    pub fn default_mean_std() -> f64 {
        10.0
    }

    pub fn default_period_log_std() -> f64 {
        1.0
    }

    pub fn default_epoch_std() -> f64 {
        1.0
    }

    pub fn default_depth_log_std() -> f64 {
        2.0
    }

    pub fn default_planet_mass_log_std() -> f64 {
        1.0
    }

    pub fn default_light_curve_noise_log_std() -> f64 {
        10.0
    }

    pub fn default_gp_rho_log_std() -> f64 {
        10.0
    }

    pub fn default_rv_jitter_log_std() -> f64 {
        5.0
    }

    pub fn default_min_planet_mass() -> f64 {
        0.1
    }

    /// Initial point and prior table from transit candidates, stellar parameters and the data
    ///
    /// Planet masses start from the minimum masses of a harmonic fit to the RV series at the
    /// candidate periods, noise parameters start from the scatter of the data.
    pub fn initialize(
        &self,
        layout: &ParameterLayout,
        candidates: &[TransitCandidate],
        light_curve: &mut TimeSeries,
        rv: &mut TimeSeries,
    ) -> Result<InitialModel, FitError> {
        if candidates.len() < layout.n_planets() {
            return Err(FitError::InsufficientData {
                actual: candidates.len(),
                minimum: layout.n_planets(),
                context: "transit candidates",
            });
        }
        let candidates = &candidates[..layout.n_planets()];
        let mut theta = vec![0.0; layout.dim()];
        let mut prior = LnPrior::default();
        let mut normal = |block, planet, mu: f64, std: f64| {
            let index = layout.index(block, planet);
            theta[index] = mu;
            prior.push(SingleLnPrior {
                index,
                transform: Transform::Identity,
                prior: LnPrior1D::normal(mu, std),
            });
        };

        let lc_std = light_curve.get_y_std();
        if !(lc_std > 0.0) {
            return Err(FitError::NumericalDegeneracy(
                "light curve has no scatter".to_owned(),
            ));
        }
        let rv_err = rv.get_yerr_median();
        let rv_jitter = if rv_err > 0.0 { rv_err } else { rv.get_y_std() };
        if !(rv_jitter > 0.0) {
            return Err(FitError::NumericalDegeneracy(
                "RV series has neither uncertainties nor scatter".to_owned(),
            ));
        }

        normal(ParameterBlock::Mean, 0, 0.0, self.mean_std);
        normal(ParameterBlock::LogSigmaLc, 0, lc_std.ln(), self.light_curve_noise_log_std);
        normal(ParameterBlock::LogSigmaGp, 0, lc_std.ln(), self.light_curve_noise_log_std);
        normal(ParameterBlock::LogRhoGp, 0, 0.0, self.gp_rho_log_std);
        normal(ParameterBlock::LogSigmaRv, 0, rv_jitter.ln(), self.rv_jitter_log_std);

        let t_rv = rv.t.as_slice().expect("owned arrays are contiguous");
        let periods: Vec<_> = candidates.iter().map(|c| c.period).collect();
        let semi_amplitudes = estimate_semi_amplitude(
            &periods,
            t_rv,
            rv.y.as_slice().expect("owned arrays are contiguous"),
            rv.yerr.as_slice().expect("owned arrays are contiguous"),
        )?;
        for (i, (candidate, k)) in candidates.iter().zip(semi_amplitudes).enumerate() {
            if !(candidate.depth > 0.0 && candidate.period > 0.0) {
                return Err(FitError::ParameterOutOfSupport {
                    parameter: "candidate depth",
                    value: candidate.depth,
                });
            }
            let mass = estimate_minimum_mass(k, candidate.period, self.m_star.value)
                .max(self.min_planet_mass);
            tracing::debug!(planet = i, semi_amplitude = k, mass, "initial planet mass");
            normal(ParameterBlock::LogPeriod, i, candidate.period.ln(), self.period_log_std);
            normal(ParameterBlock::Epoch, i, candidate.epoch, self.epoch_std);
            normal(ParameterBlock::LogDepth, i, candidate.depth.ln(), self.depth_log_std);
            normal(ParameterBlock::LogPlanetMass, i, mass.ln(), self.planet_mass_log_std);
        }

        // Coefficient of x^p has the prior width 10^-p
        let degree = layout.trend_degree();
        let trend = layout.index(ParameterBlock::RvTrend, 0);
        for (k, index) in (trend..=trend + degree).enumerate() {
            prior.push(SingleLnPrior {
                index,
                transform: Transform::Identity,
                prior: LnPrior1D::normal(0.0, 10f64.powi(-((degree - k) as i32))),
            });
        }

        for (block, star) in [
            (ParameterBlock::LogStellarMass, self.m_star),
            (ParameterBlock::LogStellarRadius, self.r_star),
        ] {
            let index = layout.index(block, 0);
            theta[index] = star.value.ln();
            prior.push(SingleLnPrior {
                index,
                transform: Transform::Exp,
                prior: LnPrior1D::normal(star.value, star.uncertainty),
            });
        }

        let logit_uniform = |index| SingleLnPrior {
            index,
            transform: Transform::Logistic,
            prior: LnPrior1D::uniform(0.0, 1.0),
        };
        for index in layout.block_indices(ParameterBlock::LimbDarkening) {
            prior.push(logit_uniform(index));
        }
        for index in layout.block_indices(ParameterBlock::ImpactParameter) {
            prior.push(logit_uniform(index));
        }
        for i in 0..layout.n_planets() {
            let index = layout.index(ParameterBlock::Eccentricity, i);
            // Slightly off the centre of the disk, where the argument of periastron is undefined
            theta[index] = 0.01;
            theta[index + 1] = 0.01;
            prior.push(UnitDiskLnPrior {
                indices: [index, index + 1],
            });
        }

        Ok(InitialModel { theta, prior })
    }
}

impl Default for PriorSettings {
    fn default() -> Self {
        Self {
            m_star: Self::default_m_star(),
            r_star: Self::default_r_star(),
            mean_std: Self::default_mean_std(),
            period_log_std: Self::default_period_log_std(),
            epoch_std: Self::default_epoch_std(),
            depth_log_std: Self::default_depth_log_std(),
            planet_mass_log_std: Self::default_planet_mass_log_std(),
            light_curve_noise_log_std: Self::default_light_curve_noise_log_std(),
            gp_rho_log_std: Self::default_gp_rho_log_std(),
            rv_jitter_log_std: Self::default_rv_jitter_log_std(),
            min_planet_mass: Self::default_min_planet_mass(),
        }
    }
}

/// Starting point of the optimisation and the prior it is evaluated with
#[derive(Clone, Debug)]
pub struct InitialModel {
    pub theta: Vec<f64>,
    pub prior: LnPrior,
}
