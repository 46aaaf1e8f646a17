#![doc = include_str!("../README.md")]


mod array_stats;

pub mod constants;

mod data;
pub use data::{Mask, SortedArray, TimeSeries};

pub mod detrend;
pub use detrend::{Detrended, Detrender};

mod error;
pub use error::{FitError, SortedArrayError};

mod float_trait;
pub use float_trait::LikeFloat;

pub mod gp;
pub use gp::{CeleriteFactor, ShoTerm};

pub mod model;
pub use model::prior::{LnPrior, LnPrior1D};
pub use model::{JointModel, ParameterBlock, ParameterLayout, PhysicalParameters, PriorSettings};

pub mod optimize;
pub use optimize::{Stage, StagedOptimizer};

pub mod orbit;
pub use orbit::KeplerianOrbit;

pub mod periodogram;
pub use periodogram::{BoxLeastSquares, PeriodGrid, TransitCandidate, TransitSearch};

mod pipeline;
pub use pipeline::{Fit, MapSolution, PipelineConfig, PlanetCurves};

pub mod prelude;

mod refine;
pub use refine::{OutlierRefinement, RefinementResult, robust_scale};

pub mod sampler;
pub use sampler::{EnsembleSampler, LogDensity, PosteriorDraws, PosteriorSampler};

pub mod transit;
pub use transit::{LightCurveSettings, QuadraticLimbDarkening};

pub use ndarray;
