//! Two-body orbits

mod kepler;
pub use kepler::{eccentric_anomaly, eccentric_anomaly_generic, eccentric_from_true, true_anomaly};

mod keplerian;
pub use keplerian::{KeplerianOrbit, OrbitElements};

mod rv;
pub use rv::{estimate_minimum_mass, estimate_semi_amplitude};
