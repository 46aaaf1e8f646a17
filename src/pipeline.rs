//! End-to-end fit of a light curve and an RV series

use crate::data::{Mask, TimeSeries};
use crate::detrend::{Detrended, Detrender};
use crate::error::FitError;
use crate::model::{
    JointModel, LaplaceApproximation, LightCurvePrediction, ParameterLayout, PhysicalParameters,
    PriorSettings,
};
use crate::optimize::{StageReport, StagedOptimizer};
use crate::periodogram::{TransitCandidate, TransitSearch};
use crate::refine::OutlierRefinement;
use crate::sampler::{PosteriorDraws, PosteriorSampler};
use crate::transit::LightCurveSettings;

use ndarray::Array1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configuration of every step of [PipelineConfig::fit]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub detrender: Detrender,
    pub search: TransitSearch,
    pub light_curve: LightCurveSettings,
    pub priors: PriorSettings,
    /// Degree of the RV background polynomial
    pub rv_trend_degree: usize,
    pub optimizer: StagedOptimizer,
    pub refinement: OutlierRefinement,
    /// Number of points of the model curves
    pub fine_grid_size: usize,
    /// Half-width of the folded light-curve grid around mid-transit, days
    pub fold_half_width: f64,
}

impl PipelineConfig {
    #[inline]
    pub fn default_rv_trend_degree() -> usize {
        2
    }

    #[inline]
    pub fn default_fine_grid_size() -> usize {
        1000
    }

    #[inline]
    pub fn default_fold_half_width() -> f64 {
        0.3
    }

    /// Detrend, search, optimise and refine
    pub fn fit(&self, light_curve: &TimeSeries, rv: &TimeSeries) -> Result<Fit, FitError> {
        assert!(self.fine_grid_size > 1, "fine grid needs at least two points");
        assert!(
            self.fold_half_width > 0.0,
            "folded light-curve window must be positive"
        );
        let detrended = self.detrender.detrend(light_curve)?;
        tracing::info!(
            retained = detrended.retained.len(),
            total = light_curve.lenu(),
            sigma = detrended.sigma,
            "light curve detrended"
        );
        let candidates = self.search.search(&detrended.series)?;
        let layout = ParameterLayout::new(candidates.len(), self.rv_trend_degree);
        let init = self.priors.initialize(
            &layout,
            &candidates,
            &mut detrended.series.clone(),
            &mut rv.clone(),
        )?;
        let mut model = JointModel::new(
            layout,
            init.prior,
            detrended.series.clone(),
            rv.clone(),
            self.light_curve.clone(),
        )?;

        let initial = self.optimizer.run(&model, &init.theta)?;
        tracing::info!(ln_posterior = initial.ln_posterior, "initial optimisation finished");
        let refined = self
            .refinement
            .run(&mut model, &self.optimizer, &initial.theta)?;
        tracing::info!(
            ln_posterior = refined.optimization.ln_posterior,
            rejected = refined.mask.len() - refined.mask.count(),
            "refined optimisation finished"
        );

        let mut stages = initial.stages;
        stages.extend(refined.optimization.stages);
        let solution = MapSolution::new(
            &model,
            refined.optimization.theta,
            stages,
            self.fine_grid_size,
            self.fold_half_width,
        )?;
        Ok(Fit {
            model,
            detrended,
            candidates,
            solution,
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detrender: Detrender::default(),
            search: TransitSearch::default(),
            light_curve: LightCurveSettings::default(),
            priors: PriorSettings::default(),
            rv_trend_degree: Self::default_rv_trend_degree(),
            optimizer: StagedOptimizer::default(),
            refinement: OutlierRefinement::default(),
            fine_grid_size: Self::default_fine_grid_size(),
            fold_half_width: Self::default_fold_half_width(),
        }
    }
}

/// Output of [PipelineConfig::fit]
#[derive(Clone, Debug)]
pub struct Fit {
    /// Model with the refined mask
    pub model: JointModel,
    pub detrended: Detrended,
    pub candidates: Vec<TransitCandidate>,
    pub solution: MapSolution,
}

impl Fit {
    pub fn laplace(&self) -> Result<LaplaceApproximation, FitError> {
        LaplaceApproximation::new(
            &self.model,
            &self.solution.theta,
            LaplaceApproximation::default_step(),
        )
    }

    /// Sample the posterior around the MAP point, walkers are scaled by the Laplace widths
    pub fn sample<S: PosteriorSampler>(&self, sampler: &S) -> Result<PosteriorDraws, FitError> {
        let scale = self.laplace()?.std();
        sampler.sample(&self.model, &self.solution.theta, &scale)
    }

    /// Mask of the light-curve points which entered the final likelihood, in the input indexing
    pub fn input_mask(&self, n_input: usize) -> Mask {
        let mut mask = vec![false; n_input];
        for (&i, &kept) in self
            .detrended
            .retained
            .iter()
            .zip(self.solution.mask.as_slice())
        {
            mask[i] = kept;
        }
        Mask::from_vec(mask)
    }
}

/// Model curves of a single planet
#[derive(Clone, Debug)]
pub struct PlanetCurves {
    /// Time from mid-transit, days
    pub transit_time: Vec<f64>,
    /// Flux change in data units
    pub flux: Vec<f64>,
    /// Orbital phase in [0, 1), zero at mid-transit
    pub phase: Vec<f64>,
    /// RV signal of this planet only, m/s
    pub rv: Vec<f64>,
}

/// Maximum a posteriori solution with model curves for visualisation
#[derive(Clone, Debug)]
pub struct MapSolution {
    pub theta: Vec<f64>,
    pub names: Vec<String>,
    pub ln_posterior: f64,
    pub physical: PhysicalParameters,
    /// Reports of every optimisation stage, the refined run follows the initial one
    pub stages: Vec<StageReport>,
    /// Light-curve mask of the detrended series after refinement
    pub mask: Mask,
    /// Model at every detrended light-curve point
    pub prediction: LightCurvePrediction,
    pub planets: Vec<PlanetCurves>,
    /// Uniform grid over the RV baseline
    pub rv_time: Vec<f64>,
    /// Full RV model on `rv_time`: planets plus the background
    pub rv_model: Vec<f64>,
}

impl MapSolution {
    pub fn new(
        model: &JointModel,
        theta: Vec<f64>,
        stages: Vec<StageReport>,
        grid_size: usize,
        fold_half_width: f64,
    ) -> Result<Self, FitError> {
        let ln_posterior = model.ln_posterior(&theta)?;
        let physical =
            PhysicalParameters::new(model.layout(), &theta, model.settings().flux_scale)?;
        let prediction = model.light_curve_prediction(&theta)?;

        let transit_time = Array1::linspace(-fold_half_width, fold_half_width, grid_size).to_vec();
        let phase = Array1::linspace(0.0, 1.0 - 1.0 / grid_size as f64, grid_size).to_vec();
        let planets = physical
            .planets
            .iter()
            .enumerate()
            .map(|(i, planet)| {
                let t: Vec<f64> = transit_time.iter().map(|dt| planet.t0 + dt).collect();
                let flux = model.planet_light_curves(&theta, &t)?.swap_remove(i);
                let t: Vec<f64> = phase
                    .iter()
                    .map(|p| planet.t0 + p * planet.period)
                    .collect();
                let rv = model.planet_radial_velocities(&theta, &t)?.swap_remove(i);
                Ok(PlanetCurves {
                    transit_time: transit_time.clone(),
                    flux,
                    phase: phase.clone(),
                    rv,
                })
            })
            .collect::<Result<_, FitError>>()?;

        let (t_min, t_max) = model.rv_time_range();
        let rv_time = Array1::linspace(t_min, t_max, grid_size).to_vec();
        let mut rv_model = model.rv_background(&theta, &rv_time)?;
        for planet in model.planet_radial_velocities(&theta, &rv_time)? {
            for (total, v) in rv_model.iter_mut().zip(planet) {
                *total += v;
            }
        }

        Ok(Self {
            names: model.layout().names(),
            theta,
            ln_posterior,
            physical,
            stages,
            mask: model.mask().clone(),
            prediction,
            planets,
            rv_time,
            rv_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    serde_default_test!(pipeline_config_defaults, PipelineConfig);

    json_schema_test!(pipeline_config_schema, PipelineConfig);

    serde_json_test!(
        pipeline_config_serde,
        PipelineConfig {
            rv_trend_degree: 1,
            fine_grid_size: 64,
            ..PipelineConfig::default()
        }
    );
}
