//! Parameterisation, priors and the joint log-posterior

mod init;
pub use init::{InitialModel, Measurement, PriorSettings};

mod joint;
pub use joint::{JointModel, LightCurvePrediction};

mod laplace;
pub use laplace::LaplaceApproximation;

mod layout;
pub use layout::{
    MAX_ECCENTRICITY, ModelParameters, ParameterBlock, ParameterLayout, PlanetParameters,
    eccentricity_from_unconstrained,
};

pub mod prior;

mod summary;
pub use summary::{PhysicalParameters, PlanetSummary};
