//! Gaussian process noise model with linear-time likelihood

mod celerite;
pub use celerite::CeleriteFactor;

mod term;
pub use term::{CeleriteCoefficients, ShoTerm};
