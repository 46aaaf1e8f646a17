use crate::constants::M_EARTH_IN_M_SUN;
use crate::error::FitError;
use crate::float_trait::LikeFloat;
use crate::orbit::{KeplerianOrbit, OrbitElements};
use crate::transit::QuadraticLimbDarkening;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Named group of entries of the internal parameter vector
///
/// Per-planet blocks select the entries of every planet.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ParameterBlock {
    /// Out-of-transit flux offset
    Mean,
    /// Logits of the Kipping limb-darkening parameters
    LimbDarkening,
    LogStellarMass,
    LogStellarRadius,
    /// Light-curve white noise jitter
    LogSigmaLc,
    /// Amplitude of the Gaussian process
    LogSigmaGp,
    /// Undamped period of the Gaussian process
    LogRhoGp,
    /// RV jitter
    LogSigmaRv,
    /// RV background polynomial, highest power first
    RvTrend,
    LogPeriod,
    Epoch,
    /// Logarithm of the approximate transit depth in flux units
    LogDepth,
    /// Logit of the impact parameter
    ImpactParameter,
    /// Unconstrained pair mapped onto the unit disk of $\sqrt{e} (\cos\omega, \sin\omega)$
    Eccentricity,
    /// Logarithm of the planet mass in Earth masses
    LogPlanetMass,
}

impl ParameterBlock {
    pub fn is_per_planet(self) -> bool {
        matches!(
            self,
            Self::LogPeriod
                | Self::Epoch
                | Self::LogDepth
                | Self::ImpactParameter
                | Self::Eccentricity
                | Self::LogPlanetMass
        )
    }
}

const MEAN: usize = 0;
const LIMB_DARKENING: usize = 1;
const LOG_M_STAR: usize = 3;
const LOG_R_STAR: usize = 4;
const LOG_SIGMA_LC: usize = 5;
const LOG_SIGMA_GP: usize = 6;
const LOG_RHO_GP: usize = 7;
const LOG_SIGMA_RV: usize = 8;
const RV_TREND: usize = 9;

const LOG_PERIOD: usize = 0;
const EPOCH: usize = 1;
const LOG_DEPTH: usize = 2;
const IMPACT_PARAMETER: usize = 3;
const ECCENTRICITY: usize = 4;
const LOG_PLANET_MASS: usize = 6;
const PLANET_SIZE: usize = 7;

/// Positions of named parameters in the flat internal vector
///
/// Global parameters come first, followed by `PLANET_SIZE` entries per planet.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ParameterLayout {
    n_planets: usize,
    trend_degree: usize,
}

impl ParameterLayout {
    pub fn new(n_planets: usize, trend_degree: usize) -> Self {
        assert!(n_planets > 0, "number of planets must be positive");
        Self {
            n_planets,
            trend_degree,
        }
    }

    pub fn n_planets(&self) -> usize {
        self.n_planets
    }

    pub fn trend_degree(&self) -> usize {
        self.trend_degree
    }

    fn planet_offset(&self, planet: usize) -> usize {
        assert!(planet < self.n_planets, "planet index is out of range");
        RV_TREND + self.trend_degree + 1 + planet * PLANET_SIZE
    }

    /// Size of the parameter vector
    pub fn dim(&self) -> usize {
        RV_TREND + self.trend_degree + 1 + self.n_planets * PLANET_SIZE
    }

    /// Indices of a global block, `planet` is ignored for global blocks
    fn block_range(&self, block: ParameterBlock, planet: usize) -> std::ops::Range<usize> {
        let (start, len) = match block {
            ParameterBlock::Mean => (MEAN, 1),
            ParameterBlock::LimbDarkening => (LIMB_DARKENING, 2),
            ParameterBlock::LogStellarMass => (LOG_M_STAR, 1),
            ParameterBlock::LogStellarRadius => (LOG_R_STAR, 1),
            ParameterBlock::LogSigmaLc => (LOG_SIGMA_LC, 1),
            ParameterBlock::LogSigmaGp => (LOG_SIGMA_GP, 1),
            ParameterBlock::LogRhoGp => (LOG_RHO_GP, 1),
            ParameterBlock::LogSigmaRv => (LOG_SIGMA_RV, 1),
            ParameterBlock::RvTrend => (RV_TREND, self.trend_degree + 1),
            ParameterBlock::LogPeriod => (self.planet_offset(planet) + LOG_PERIOD, 1),
            ParameterBlock::Epoch => (self.planet_offset(planet) + EPOCH, 1),
            ParameterBlock::LogDepth => (self.planet_offset(planet) + LOG_DEPTH, 1),
            ParameterBlock::ImpactParameter => {
                (self.planet_offset(planet) + IMPACT_PARAMETER, 1)
            }
            ParameterBlock::Eccentricity => (self.planet_offset(planet) + ECCENTRICITY, 2),
            ParameterBlock::LogPlanetMass => (self.planet_offset(planet) + LOG_PLANET_MASS, 1),
        };
        start..start + len
    }

    /// First index of the block, for per-planet blocks the one of the given planet
    pub fn index(&self, block: ParameterBlock, planet: usize) -> usize {
        self.block_range(block, planet).start
    }

    /// All indices of the block, for per-planet blocks the ones of every planet
    pub fn block_indices(&self, block: ParameterBlock) -> Vec<usize> {
        if block.is_per_planet() {
            (0..self.n_planets)
                .flat_map(|planet| self.block_range(block, planet))
                .collect()
        } else {
            self.block_range(block, 0).collect()
        }
    }

    /// Parameter names in the vector order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            "mean",
            "ld_q1_logit",
            "ld_q2_logit",
            "log_m_star",
            "log_r_star",
            "log_sigma_lc",
            "log_sigma_gp",
            "log_rho_gp",
            "log_sigma_rv",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        names.extend((0..=self.trend_degree).rev().map(|p| format!("rv_trend_{p}")));
        for i in 0..self.n_planets {
            for name in [
                "log_period",
                "t0",
                "log_depth",
                "b_logit",
                "ecs_u",
                "ecs_w",
                "log_m_planet",
            ] {
                names.push(format!("{name}_{i}"));
            }
        }
        names
    }

    pub fn name(&self, index: usize) -> String {
        self.names().swap_remove(index)
    }

    /// Map an internal vector to model quantities
    ///
    /// `flux_scale` converts the depth from flux units to relative flux.
    pub fn decode<T: LikeFloat>(&self, theta: &[T], flux_scale: f64) -> ModelParameters<T> {
        assert_eq!(theta.len(), self.dim(), "parameter vector has wrong size");
        let limb_darkening = QuadraticLimbDarkening::from_kipping(
            T::logistic(theta[LIMB_DARKENING]),
            T::logistic(theta[LIMB_DARKENING + 1]),
        );
        let planets = (0..self.n_planets)
            .map(|i| {
                let p = &theta[self.planet_offset(i)..self.planet_offset(i) + PLANET_SIZE];
                let depth = p[LOG_DEPTH].exp() / T::from_f64(flux_scale);
                let b = T::logistic(p[IMPACT_PARAMETER]);
                let (ecc, cos_w, sin_w) = eccentricity_from_unconstrained(
                    p[ECCENTRICITY],
                    p[ECCENTRICITY + 1],
                );
                PlanetParameters {
                    period: p[LOG_PERIOD].exp(),
                    t0: p[EPOCH],
                    depth,
                    ror: limb_darkening.ror_from_depth(depth, b),
                    b,
                    ecc,
                    cos_w,
                    sin_w,
                    m_planet: p[LOG_PLANET_MASS].exp() * T::from_f64(M_EARTH_IN_M_SUN),
                }
            })
            .collect();
        ModelParameters {
            mean: theta[MEAN],
            limb_darkening,
            m_star: theta[LOG_M_STAR].exp(),
            r_star: theta[LOG_R_STAR].exp(),
            sigma_lc: theta[LOG_SIGMA_LC].exp(),
            sigma_gp: theta[LOG_SIGMA_GP].exp(),
            rho_gp: theta[LOG_RHO_GP].exp(),
            sigma_rv: theta[LOG_SIGMA_RV].exp(),
            rv_trend: theta[RV_TREND..=RV_TREND + self.trend_degree].to_vec(),
            planets,
        }
    }
}

/// Largest eccentricity the unit-disk pair decodes to
///
/// `tanh` rounds to unity for large arguments, which would give a parabolic orbit.
pub const MAX_ECCENTRICITY: f64 = 0.999;

/// Eccentricity and argument of periastron from the unit-disk pair
///
/// The pair maps to $(x, y) = (u, w \sqrt{1 - u^2})$ with $u = \tanh a$ and $w = \tanh b$, and
/// $(x, y) = \sqrt{e} (\cos\omega, \sin\omega)$. The eccentricity is capped at
/// [MAX_ECCENTRICITY].
pub fn eccentricity_from_unconstrained<T: LikeFloat>(a: T, b: T) -> (T, T, T) {
    let u = a.tanh();
    let x = u;
    let y = b.tanh() * T::sqrt_or_zero(T::one() - u * u);
    let r2 = x * x + y * y;
    let ecc = if r2.value() < MAX_ECCENTRICITY {
        r2
    } else {
        T::from_f64(MAX_ECCENTRICITY)
    };
    let norm = T::sqrt_or_zero(r2);
    if norm.value() > 0.0 {
        (ecc, x / norm, y / norm)
    } else {
        (ecc, T::one(), T::zero())
    }
}

/// Model quantities decoded from the internal vector
#[derive(Clone, Debug)]
pub struct ModelParameters<T> {
    pub mean: T,
    pub limb_darkening: QuadraticLimbDarkening<T>,
    /// Solar masses
    pub m_star: T,
    /// Solar radii
    pub r_star: T,
    pub sigma_lc: T,
    pub sigma_gp: T,
    pub rho_gp: T,
    pub sigma_rv: T,
    /// RV background polynomial coefficients, highest power first
    pub rv_trend: Vec<T>,
    pub planets: Vec<PlanetParameters<T>>,
}

impl<T: LikeFloat> ModelParameters<T> {
    /// Orbits and radius ratios of all planets
    pub fn orbits(&self) -> Result<Vec<(KeplerianOrbit<T>, T)>, FitError> {
        self.planets
            .iter()
            .map(|p| Ok((p.orbit(self.m_star, self.r_star)?, p.ror)))
            .collect()
    }

    /// RV background at `x`, the time relative to the reference time
    pub fn rv_background(&self, x: f64) -> T {
        let x = T::from_f64(x);
        self.rv_trend
            .iter()
            .fold(T::zero(), |acc, &coeff| acc * x + coeff)
    }
}

#[derive(Clone, Debug)]
pub struct PlanetParameters<T> {
    pub period: T,
    pub t0: T,
    /// Approximate transit depth as a fraction of the stellar flux
    pub depth: T,
    /// Planet to star radius ratio
    pub ror: T,
    pub b: T,
    pub ecc: T,
    pub cos_w: T,
    pub sin_w: T,
    /// Solar masses
    pub m_planet: T,
}

impl<T: LikeFloat> PlanetParameters<T> {
    pub fn orbit(&self, m_star: T, r_star: T) -> Result<KeplerianOrbit<T>, FitError> {
        KeplerianOrbit::new(OrbitElements {
            period: self.period,
            t0: self.t0,
            b: self.b,
            ecc: self.ecc,
            cos_w: self.cos_w,
            sin_w: self.sin_w,
            m_star,
            r_star,
            m_planet: self.m_planet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::prior::UnitDiskLnPrior;

    use approx::assert_relative_eq;

    #[test]
    fn blocks_cover_vector_once() {
        let layout = ParameterLayout::new(2, 2);
        assert_eq!(layout.dim(), 12 + 14);
        let blocks = [
            ParameterBlock::Mean,
            ParameterBlock::LimbDarkening,
            ParameterBlock::LogStellarMass,
            ParameterBlock::LogStellarRadius,
            ParameterBlock::LogSigmaLc,
            ParameterBlock::LogSigmaGp,
            ParameterBlock::LogRhoGp,
            ParameterBlock::LogSigmaRv,
            ParameterBlock::RvTrend,
            ParameterBlock::LogPeriod,
            ParameterBlock::Epoch,
            ParameterBlock::LogDepth,
            ParameterBlock::ImpactParameter,
            ParameterBlock::Eccentricity,
            ParameterBlock::LogPlanetMass,
        ];
        let mut all: Vec<_> = blocks
            .iter()
            .flat_map(|&b| layout.block_indices(b))
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..layout.dim()).collect::<Vec<_>>());
        assert_eq!(layout.names().len(), layout.dim());
        assert_eq!(layout.name(layout.index(ParameterBlock::Epoch, 1)), "t0_1");
        assert_eq!(layout.block_indices(ParameterBlock::LogPeriod), vec![12, 19]);
    }

    #[test]
    fn decode_maps_to_physical_values() {
        let layout = ParameterLayout::new(1, 1);
        let mut theta = vec![0.0; layout.dim()];
        theta[layout.index(ParameterBlock::LogStellarMass, 0)] = 0.9f64.ln();
        theta[layout.index(ParameterBlock::LogPeriod, 0)] = 10.0f64.ln();
        theta[layout.index(ParameterBlock::Epoch, 0)] = 2.5;
        theta[layout.index(ParameterBlock::LogDepth, 0)] = 1.0f64.ln();
        theta[layout.index(ParameterBlock::LogPlanetMass, 0)] = 10.0f64.ln();
        let trend = layout.index(ParameterBlock::RvTrend, 0);
        theta[trend] = 2.0;
        theta[trend + 1] = 3.0;
        let params = layout.decode(&theta, 1e3);
        assert_relative_eq!(params.m_star, 0.9, max_relative = 1e-12);
        assert_relative_eq!(params.r_star, 1.0);
        assert_relative_eq!(params.rv_background(2.0), 7.0);
        let planet = &params.planets[0];
        assert_relative_eq!(planet.period, 10.0, max_relative = 1e-12);
        assert_relative_eq!(planet.b, 0.5);
        assert_relative_eq!(planet.depth, 1e-3, max_relative = 1e-12);
        assert_relative_eq!(
            params.limb_darkening.depth_from_ror(planet.ror, planet.b),
            1e-3,
            max_relative = 1e-12
        );
        assert_relative_eq!(planet.m_planet, 10.0 * M_EARTH_IN_M_SUN, max_relative = 1e-12);
        assert_eq!(planet.ecc, 0.0);
        assert_eq!((planet.cos_w, planet.sin_w), (1.0, 0.0));
        assert!(params.orbits().is_ok());
    }

    #[test]
    fn eccentricity_matches_unit_disk_point() {
        for &(a, b) in &[(0.3, -0.2), (-1.5, 0.7), (2.0, 1.0)] {
            let (ecc, cos_w, sin_w) = eccentricity_from_unconstrained(a, b);
            let [x, y] = UnitDiskLnPrior::forward(a, b);
            assert_relative_eq!(ecc, x * x + y * y, max_relative = 1e-12);
            assert!(ecc < 1.0);
            assert_relative_eq!(cos_w.hypot(sin_w), 1.0, max_relative = 1e-12);
            assert_relative_eq!(f64::atan2(sin_w, cos_w), f64::atan2(y, x), epsilon = 1e-12);
        }
    }

    #[test]
    fn saturated_pair_stays_below_unit_eccentricity() {
        for &(a, b) in &[(4.0, 4.0), (25.0, 0.0), (0.0, -40.0), (-30.0, 30.0)] {
            let (ecc, cos_w, sin_w) = eccentricity_from_unconstrained(a, b);
            assert_eq!(ecc, MAX_ECCENTRICITY);
            assert_relative_eq!(cos_w.hypot(sin_w), 1.0, max_relative = 1e-12);
        }
        let layout = ParameterLayout::new(1, 0);
        let mut theta = vec![0.0; layout.dim()];
        theta[layout.index(ParameterBlock::LogPeriod, 0)] = 300.0f64.ln();
        // Transit at apoastron, where the orbit is widest
        theta[layout.index(ParameterBlock::Eccentricity, 0) + 1] = -40.0;
        let params = layout.decode(&theta, 1e3);
        assert_eq!(params.planets[0].ecc, MAX_ECCENTRICITY);
        assert_relative_eq!(params.planets[0].sin_w, -1.0);
        assert!(params.orbits().is_ok());
    }
}
