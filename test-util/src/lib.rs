use light_curve_transit::{
    CeleriteFactor, JointModel, LightCurveSettings, LnPrior, ParameterBlock, ParameterLayout,
    ShoTerm, TimeSeries,
};
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Injected planet
#[derive(Clone, Debug)]
pub struct PlanetTruth {
    /// Days
    pub period: f64,
    pub t0: f64,
    /// Approximate depth, ppt
    pub depth: f64,
    pub b: f64,
    /// Earth masses
    pub mass: f64,
}

/// Synthetic light curve and RV series of a known planetary system
#[derive(Clone, Debug)]
pub struct SyntheticSystem {
    /// Raw light curve: trend, red and white noise, transits and outliers, ppt
    pub light_curve: TimeSeries,
    pub rv: TimeSeries,
    /// Indices of the injected outliers in the light curve
    pub outliers: Vec<usize>,
    pub planets: Vec<PlanetTruth>,
    /// Internal parameter vector the data are generated from
    pub layout: ParameterLayout,
    pub theta: Vec<f64>,
    pub settings: LightCurveSettings,
    /// White noise of the light curve, ppt
    pub flux_noise: f64,
    /// White noise of the RVs, m/s
    pub rv_noise: f64,
}

const FLUX_NOISE: f64 = 0.3;
const GP_SIGMA: f64 = 0.2;
const GP_RHO: f64 = 3.0;
const RV_NOISE: f64 = 1.5;
const RV_JITTER: f64 = 1.0;
/// RV background coefficients, highest power first
const RV_TREND: [f64; 3] = [1e-3, 0.02, 1.0];
const OUTLIER_SIGMA: f64 = 20.0;

fn logit(x: f64) -> f64 {
    (x / (1.0 - x)).ln()
}

/// Two planets at 10 and 21 days observed for 50 days at 10 minute cadence, plus 40 RVs
///
/// Five points out of transit are shifted down by 20 standard deviations of the light-curve
/// noise.
pub fn two_planet_system(seed: u64) -> SyntheticSystem {
    let mut rng = StdRng::seed_from_u64(seed);
    let planets = vec![
        PlanetTruth {
            period: 10.0,
            t0: 2.3,
            depth: 1.2,
            b: 0.3,
            mass: 15.0,
        },
        PlanetTruth {
            period: 21.0,
            t0: 7.9,
            depth: 0.8,
            b: 0.5,
            mass: 9.0,
        },
    ];
    let layout = ParameterLayout::new(planets.len(), RV_TREND.len() - 1);
    let cadence = 10.0 / 60.0 / 24.0;
    let settings = LightCurveSettings::new(cadence, 7, 32, 1e3);

    let mut theta = vec![0.0; layout.dim()];
    {
        let mut set = |block, planet, value| theta[layout.index(block, planet)] = value;
        set(ParameterBlock::LogSigmaLc, 0, (0.5 * FLUX_NOISE).ln());
        set(ParameterBlock::LogSigmaGp, 0, GP_SIGMA.ln());
        set(ParameterBlock::LogRhoGp, 0, GP_RHO.ln());
        set(ParameterBlock::LogSigmaRv, 0, RV_JITTER.ln());
        for (i, planet) in planets.iter().enumerate() {
            set(ParameterBlock::LogPeriod, i, planet.period.ln());
            set(ParameterBlock::Epoch, i, planet.t0);
            set(ParameterBlock::LogDepth, i, planet.depth.ln());
            set(ParameterBlock::ImpactParameter, i, logit(planet.b));
            set(ParameterBlock::LogPlanetMass, i, planet.mass.ln());
        }
    }
    let ld = layout.index(ParameterBlock::LimbDarkening, 0);
    theta[ld] = logit(0.36);
    theta[ld + 1] = logit(0.3);
    let trend = layout.index(ParameterBlock::RvTrend, 0);
    theta[trend..trend + RV_TREND.len()].copy_from_slice(&RV_TREND);

    let n = (50.0 / cadence) as usize;
    let t: Vec<f64> = (0..n).map(|i| i as f64 * cadence).collect();
    let mut t_rv: Vec<f64> = (0..40).map(|_| rng.random_range(0.0..60.0)).collect();
    t_rv.sort_unstable_by(f64::total_cmp);

    let noiseless = JointModel::new(
        layout,
        LnPrior::default(),
        TimeSeries::new(t.clone(), vec![0.0; n], vec![FLUX_NOISE; n]),
        TimeSeries::new(t_rv.clone(), vec![0.0; t_rv.len()], vec![RV_NOISE; t_rv.len()]),
        settings.clone(),
    )
    .expect("noiseless model is valid");

    // White noise of the light curve is split between the uncertainties and the jitter
    let white = (FLUX_NOISE.powi(2) + (0.5 * FLUX_NOISE).powi(2)).sqrt();
    let gp = CeleriteFactor::new(&ShoTerm::new(GP_SIGMA, GP_RHO), &t, vec![white.powi(2); n])
        .expect("noise model is valid");
    let noise = gp.sample(&mut rng);
    let transits = noiseless
        .planet_light_curves(&theta, &t)
        .expect("true parameters are valid");
    let mut y: Vec<f64> = t
        .iter()
        .zip(&noise)
        .enumerate()
        .map(|(i, (&t, &noise))| {
            let trend = 2.0 * (std::f64::consts::TAU * t / 37.0).sin() + 0.03 * t;
            let transit: f64 = transits.iter().map(|planet| planet[i]).sum();
            trend + transit + noise
        })
        .collect();

    let out_of_transit = |t: f64| {
        planets.iter().all(|p| {
            let phase = (t - p.t0 + 0.5 * p.period).rem_euclid(p.period) - 0.5 * p.period;
            phase.abs() > 0.5
        })
    };
    let outliers: Vec<usize> = (0..5)
        .map(|k| {
            let mut i = (2 * k + 1) * n / 10;
            while !out_of_transit(t[i]) {
                i += 100;
            }
            i
        })
        .collect();
    let shift = OUTLIER_SIGMA * (white.powi(2) + GP_SIGMA.powi(2)).sqrt();
    for &i in &outliers {
        y[i] -= shift;
    }

    let rv_planets = noiseless
        .planet_radial_velocities(&theta, &t_rv)
        .expect("true parameters are valid");
    let rv_background = noiseless
        .rv_background(&theta, &t_rv)
        .expect("true parameters are valid");
    let rv_scatter = (RV_NOISE.powi(2) + RV_JITTER.powi(2)).sqrt();
    let rv: Vec<f64> = rv_background
        .iter()
        .enumerate()
        .map(|(i, background)| {
            let signal: f64 = rv_planets.iter().map(|planet| planet[i]).sum();
            background + signal + rv_scatter * rng.sample::<f64, _>(StandardNormal)
        })
        .collect();

    SyntheticSystem {
        light_curve: TimeSeries::new(t, y, vec![FLUX_NOISE; n]),
        rv: TimeSeries::new(t_rv, rv, vec![RV_NOISE; 40]),
        outliers,
        planets,
        layout,
        theta,
        settings,
        flux_noise: FLUX_NOISE,
        rv_noise: RV_NOISE,
    }
}
