use crate::constants::{M_EARTH_IN_M_SUN, R_EARTH_IN_R_SUN, RHO_EARTH_CGS};
use crate::error::FitError;
use crate::model::layout::ParameterLayout;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Physical planet parameters
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PlanetSummary {
    /// Days
    pub period: f64,
    pub t0: f64,
    /// Approximate transit depth in flux units
    pub depth: f64,
    pub ror: f64,
    pub b: f64,
    pub ecc: f64,
    /// Argument of periastron, radians
    pub omega: f64,
    /// Earth masses
    pub mass: f64,
    /// Earth radii
    pub radius: f64,
    /// Bulk density, g cm^-3
    pub density: f64,
    /// RV semi-amplitude, m/s
    pub semi_amplitude: f64,
    /// Solar radii
    pub semi_major_axis: f64,
    /// Orbit inclination, degrees
    pub inclination: f64,
}

/// Named physical values of an internal parameter vector
///
/// Works for any vector, so it also gives derived quantities of posterior draws.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PhysicalParameters {
    pub mean: f64,
    pub u1: f64,
    pub u2: f64,
    pub m_star: f64,
    pub r_star: f64,
    pub sigma_lc: f64,
    pub sigma_gp: f64,
    pub rho_gp: f64,
    pub sigma_rv: f64,
    pub rv_trend: Vec<f64>,
    pub planets: Vec<PlanetSummary>,
}

impl PhysicalParameters {
    pub fn new(layout: &ParameterLayout, theta: &[f64], flux_scale: f64) -> Result<Self, FitError> {
        let params = layout.decode(theta, flux_scale);
        let planets = params
            .planets
            .iter()
            .map(|p| {
                let orbit = p.orbit(params.m_star, params.r_star)?;
                let mass = p.m_planet / M_EARTH_IN_M_SUN;
                let radius = p.ror * params.r_star / R_EARTH_IN_R_SUN;
                Ok(PlanetSummary {
                    period: p.period,
                    t0: p.t0,
                    depth: p.depth * flux_scale,
                    ror: p.ror,
                    b: p.b,
                    ecc: p.ecc,
                    omega: f64::atan2(p.sin_w, p.cos_w),
                    mass,
                    radius,
                    density: RHO_EARTH_CGS * mass / radius.powi(3),
                    semi_amplitude: orbit.semi_amplitude(),
                    semi_major_axis: orbit.semi_major_axis(),
                    inclination: orbit.cos_inclination().acos().to_degrees(),
                })
            })
            .collect::<Result<_, FitError>>()?;
        Ok(Self {
            mean: params.mean,
            u1: params.limb_darkening.u1,
            u2: params.limb_darkening.u2,
            m_star: params.m_star,
            r_star: params.r_star,
            sigma_lc: params.sigma_lc,
            sigma_gp: params.sigma_gp,
            rho_gp: params.rho_gp,
            sigma_rv: params.sigma_rv,
            rv_trend: params.rv_trend,
            planets,
        })
    }
}
