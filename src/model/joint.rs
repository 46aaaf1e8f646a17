use crate::data::{Mask, TimeSeries};
use crate::error::FitError;
use crate::float_trait::LikeFloat;
use crate::gp::{CeleriteFactor, ShoTerm};
use crate::model::layout::{ModelParameters, ParameterLayout};
use crate::model::prior::LnPrior;
use crate::orbit::KeplerianOrbit;
use crate::transit::{LightCurveSettings, QuadraticLimbDarkening};

use hyperdual::Hyperdual;

/// Number of derivative directions carried by a single forward-mode pass
const DUAL_DIRECTIONS: usize = 8;

type Dual = Hyperdual<f64, 9>;

/// Observations entering a likelihood, with measurement variances
#[derive(Clone, Debug)]
struct Observations {
    t: Vec<f64>,
    y: Vec<f64>,
    var: Vec<f64>,
}

impl Observations {
    fn new(ts: &TimeSeries) -> Self {
        Self {
            t: ts.t.to_vec(),
            y: ts.y.to_vec(),
            var: ts.yerr.iter().map(|e| e * e).collect(),
        }
    }
}

/// Log-likelihood terms of a single evaluation
struct LikelihoodTerms<T> {
    light_curve: T,
    rv: T,
    /// Planet flux at the masked light-curve points
    transit: Vec<T>,
}

/// Joint log-posterior of a light curve and an RV series
///
/// The light curve is modelled as a constant plus the transits of all planets, with residuals
/// following a celerite Gaussian process with white noise of variance `yerr^2 + sigma_lc^2`. The
/// RV model is the sum of the Keplerian signals and a polynomial background in time relative to
/// the middle of the RV baseline, with white noise of variance `yerr^2 + sigma_rv^2`. Only
/// light-curve points selected by the current [Mask] enter the likelihood.
///
/// The model holds no mutable state apart from the mask, so it can be shared between threads.
#[derive(Clone, Debug)]
pub struct JointModel {
    layout: ParameterLayout,
    prior: LnPrior,
    settings: LightCurveSettings,
    offsets: Vec<f64>,
    light_curve: TimeSeries,
    mask: Mask,
    masked: Observations,
    rv: Observations,
    rv_t_ref: f64,
}

impl JointModel {
    pub fn new(
        layout: ParameterLayout,
        prior: LnPrior,
        light_curve: TimeSeries,
        rv: TimeSeries,
        settings: LightCurveSettings,
    ) -> Result<Self, FitError> {
        assert!(
            prior.max_index().is_none_or(|i| i < layout.dim()),
            "prior refers to parameters outside of the layout"
        );
        light_curve.require_len(1, "light curve likelihood")?;
        light_curve.require_finite()?;
        rv.require_len(1, "RV likelihood")?;
        rv.require_finite()?;
        let rv_t_ref = 0.5 * (rv.t_min() + rv.t_max());
        let mask = Mask::all(light_curve.lenu());
        Ok(Self {
            layout,
            prior,
            offsets: settings.sub_exposure_offsets(),
            settings,
            masked: Observations::new(&light_curve),
            light_curve,
            mask,
            rv: Observations::new(&rv),
            rv_t_ref,
        })
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    pub fn prior(&self) -> &LnPrior {
        &self.prior
    }

    pub fn settings(&self) -> &LightCurveSettings {
        &self.settings
    }

    pub fn dim(&self) -> usize {
        self.layout.dim()
    }

    /// Full light curve, including points rejected by the mask
    pub fn light_curve(&self) -> &TimeSeries {
        &self.light_curve
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Reference time of the RV background polynomial
    pub fn rv_reference_time(&self) -> f64 {
        self.rv_t_ref
    }

    /// First and last RV observation times
    pub fn rv_time_range(&self) -> (f64, f64) {
        self.rv
            .t
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
                (lo.min(t), hi.max(t))
            })
    }

    /// Replace the light-curve mask
    pub fn set_mask(&mut self, mask: Mask) -> Result<(), FitError> {
        assert_eq!(
            mask.len(),
            self.light_curve.lenu(),
            "mask and light curve should have the same size"
        );
        if mask.count() == 0 {
            return Err(FitError::InsufficientData {
                actual: 0,
                minimum: 1,
                context: "masked light curve",
            });
        }
        self.masked = Observations::new(&self.light_curve.select(&mask));
        self.mask = mask;
        Ok(())
    }

    pub fn decode<T: LikeFloat>(&self, theta: &[T]) -> ModelParameters<T> {
        self.layout.decode(theta, self.settings.flux_scale)
    }

    fn check_dim(&self, theta: &[f64]) -> Result<(), FitError> {
        assert_eq!(theta.len(), self.dim(), "parameter vector has wrong size");
        if theta.iter().all(|x| x.is_finite()) {
            Ok(())
        } else {
            Err(FitError::NumericalDegeneracy(format!(
                "non-finite parameter vector {theta:?}"
            )))
        }
    }

    /// Summed planet flux at the masked points
    ///
    /// With `support` only the listed points are evaluated, the rest are zero.
    fn transit_model<T: LikeFloat>(
        &self,
        planets: &[(KeplerianOrbit<T>, T)],
        ld: &QuadraticLimbDarkening<T>,
        support: Option<&[usize]>,
    ) -> Vec<T> {
        let t = &self.masked.t;
        let mut flux = vec![T::zero(); t.len()];
        let mut add = |i: usize| {
            for (orbit, ror) in planets {
                flux[i] += self
                    .settings
                    .planet_flux_at(orbit, *ror, ld, &self.offsets, t[i]);
            }
        };
        match support {
            Some(support) => support.iter().copied().for_each(&mut add),
            None => (0..t.len()).for_each(&mut add),
        }
        flux
    }

    fn rv_log_likelihood<T: LikeFloat>(
        &self,
        params: &ModelParameters<T>,
        planets: &[(KeplerianOrbit<T>, T)],
    ) -> T {
        let jitter2 = params.sigma_rv * params.sigma_rv;
        let mut ln_l = T::zero();
        for ((&t, &y), &var) in self.rv.t.iter().zip(&self.rv.y).zip(&self.rv.var) {
            let mut model = params.rv_background(t - self.rv_t_ref);
            for (orbit, _) in planets {
                model += orbit.radial_velocity(t);
            }
            let var = T::from_f64(var) + jitter2;
            let r = T::from_f64(y) - model;
            ln_l += r * r / var + (T::tau() * var).ln();
        }
        -T::half() * ln_l
    }

    fn log_likelihood_terms<T: LikeFloat>(
        &self,
        theta: &[T],
        support: Option<&[usize]>,
    ) -> Result<LikelihoodTerms<T>, FitError> {
        let params = self.decode(theta);
        let planets = params.orbits()?;
        let transit = self.transit_model(&planets, &params.limb_darkening, support);

        let residual: Vec<T> = self
            .masked
            .y
            .iter()
            .zip(&transit)
            .map(|(&y, &flux)| T::from_f64(y) - params.mean - flux)
            .collect();
        let jitter2 = params.sigma_lc * params.sigma_lc;
        let noise = self
            .masked
            .var
            .iter()
            .map(|&var| T::from_f64(var) + jitter2)
            .collect();
        let term = ShoTerm::new(params.sigma_gp, params.rho_gp);
        let gp = CeleriteFactor::new(&term, &self.masked.t, noise)?;

        Ok(LikelihoodTerms {
            light_curve: gp.log_likelihood(&residual),
            rv: self.rv_log_likelihood(&params, &planets),
            transit,
        })
    }

    /// Log-likelihood of both data streams
    pub fn log_likelihood(&self, theta: &[f64]) -> Result<f64, FitError> {
        self.check_dim(theta)?;
        let terms = self.log_likelihood_terms(theta, None)?;
        require_finite("log-likelihood", terms.light_curve + terms.rv)
    }

    /// Logarithm of the unnormalised posterior density
    pub fn ln_posterior(&self, theta: &[f64]) -> Result<f64, FitError> {
        self.check_dim(theta)?;
        let ln_prior = self.prior.ln_prior(theta, None);
        let terms = self.log_likelihood_terms(theta, None)?;
        require_finite("log-posterior", ln_prior + terms.light_curve + terms.rv)
    }

    /// Log-posterior and its derivatives with respect to the parameters listed in `free`
    ///
    /// The returned gradient follows the order of `free`, which must not contain duplicates.
    /// Prior derivatives are analytic, likelihood derivatives are propagated by hyper-dual
    /// numbers in passes of up to eight directions. Dual passes evaluate the transit model only
    /// at exposures which overlap the stellar disk in the value pass.
    pub fn ln_posterior_grad(
        &self,
        theta: &[f64],
        free: &[usize],
    ) -> Result<(f64, Vec<f64>), FitError> {
        self.check_dim(theta)?;
        let mut prior_grad = vec![0.0; theta.len()];
        let ln_prior = self.prior.ln_prior(theta, Some(&mut prior_grad));
        let terms = self.log_likelihood_terms(theta, None)?;
        let value = require_finite("log-posterior", ln_prior + terms.light_curve + terms.rv)?;
        let support: Vec<usize> = terms
            .transit
            .iter()
            .enumerate()
            .filter_map(|(i, &flux)| (flux != 0.0).then_some(i))
            .collect();

        let mut grad: Vec<f64> = free.iter().map(|&i| prior_grad[i]).collect();
        for (chunk_index, chunk) in free.chunks(DUAL_DIRECTIONS).enumerate() {
            let mut theta_dual: Vec<Dual> = theta.iter().map(|&x| Dual::from_real(x)).collect();
            for (k, &i) in chunk.iter().enumerate() {
                theta_dual[i][k + 1] = 1.0;
            }
            let terms = self.log_likelihood_terms(&theta_dual, Some(&support))?;
            let ln_l = terms.light_curve + terms.rv;
            for k in 0..chunk.len() {
                grad[chunk_index * DUAL_DIRECTIONS + k] += ln_l[k + 1];
            }
        }
        if let Some(k) = grad.iter().position(|g| !g.is_finite()) {
            return Err(FitError::NumericalDegeneracy(format!(
                "non-finite log-posterior derivative with respect to {}",
                self.layout.name(free[k])
            )));
        }
        Ok((value, grad))
    }

    /// Log-posterior and its gradient with respect to every parameter
    pub fn ln_posterior_full_grad(&self, theta: &[f64]) -> Result<(f64, Vec<f64>), FitError> {
        let free: Vec<_> = (0..self.dim()).collect();
        self.ln_posterior_grad(theta, &free)
    }

    /// Model of the whole light curve, including points rejected by the mask
    ///
    /// The Gaussian process is conditioned on the residuals of the masked points only.
    pub fn light_curve_prediction(
        &self,
        theta: &[f64],
    ) -> Result<LightCurvePrediction, FitError> {
        self.check_dim(theta)?;
        let params = self.decode(theta);
        let planets = params.orbits()?;
        let t_all = self.light_curve.t.as_slice().expect("owned arrays are contiguous");
        let transit = self
            .settings
            .light_curve(&planets, &params.limb_darkening, t_all);

        let masked_transit = self.mask.select(&transit);
        let residual: Vec<f64> = self
            .masked
            .y
            .iter()
            .zip(&masked_transit)
            .map(|(y, flux)| y - params.mean - flux)
            .collect();
        let noise = self
            .masked
            .var
            .iter()
            .map(|var| var + params.sigma_lc * params.sigma_lc)
            .collect();
        let gp = CeleriteFactor::new(
            &ShoTerm::new(params.sigma_gp, params.rho_gp),
            &self.masked.t,
            noise,
        )?;
        let gp_mean = gp.predict(&residual, t_all);
        Ok(LightCurvePrediction {
            mean: params.mean,
            transit,
            gp: gp_mean,
        })
    }

    /// Flux change of every planet on an arbitrary time grid, in data units
    pub fn planet_light_curves(
        &self,
        theta: &[f64],
        t: &[f64],
    ) -> Result<Vec<Vec<f64>>, FitError> {
        self.check_dim(theta)?;
        let params = self.decode(theta);
        Ok(params
            .orbits()?
            .iter()
            .map(|(orbit, ror)| {
                self.settings
                    .planet_light_curve(orbit, *ror, &params.limb_darkening, t)
            })
            .collect())
    }

    /// RV signal of every planet on an arbitrary time grid, m/s
    pub fn planet_radial_velocities(
        &self,
        theta: &[f64],
        t: &[f64],
    ) -> Result<Vec<Vec<f64>>, FitError> {
        self.check_dim(theta)?;
        let params = self.decode(theta);
        Ok(params
            .orbits()?
            .iter()
            .map(|(orbit, _)| t.iter().map(|&t| orbit.radial_velocity(t)).collect())
            .collect())
    }

    /// RV background polynomial on an arbitrary time grid, m/s
    pub fn rv_background(&self, theta: &[f64], t: &[f64]) -> Result<Vec<f64>, FitError> {
        self.check_dim(theta)?;
        let params = self.decode(theta);
        Ok(t
            .iter()
            .map(|&t| params.rv_background(t - self.rv_t_ref))
            .collect())
    }
}

/// Components of the light-curve model at every observed time
#[derive(Clone, Debug)]
pub struct LightCurvePrediction {
    pub mean: f64,
    /// Summed planet flux change
    pub transit: Vec<f64>,
    /// Conditional mean of the Gaussian process
    pub gp: Vec<f64>,
}

impl LightCurvePrediction {
    /// Full model: constant plus transits plus the Gaussian process
    pub fn total(&self) -> Vec<f64> {
        self.transit
            .iter()
            .zip(&self.gp)
            .map(|(transit, gp)| self.mean + transit + gp)
            .collect()
    }
}

fn require_finite(what: &str, value: f64) -> Result<f64, FitError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FitError::NumericalDegeneracy(format!("{what} is {value}")))
    }
}
