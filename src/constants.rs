//! Physical constants in the (day, solar radius, solar mass) unit system

/// Gravitational constant, R_sun^3 M_sun^-1 day^-2
pub const G_GRAV: f64 = 2942.2062175044193;

/// Solar radius, m
pub const R_SUN_M: f64 = 6.957e8;

/// Seconds per day
pub const DAY_S: f64 = 86400.0;

/// Velocity conversion from R_sun / day to m / s
pub const RSUN_PER_DAY_TO_M_PER_S: f64 = R_SUN_M / DAY_S;

/// Earth mass in solar masses
pub const M_EARTH_IN_M_SUN: f64 = 3.003_489_614_915_764e-6;

/// Earth radius in solar radii
pub const R_EARTH_IN_R_SUN: f64 = 6.378_1e6 / R_SUN_M;

/// Earth bulk density, g cm^-3
pub const RHO_EARTH_CGS: f64 = 5.513_4;
