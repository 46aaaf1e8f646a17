mod ln_prior;
pub use ln_prior::{
    LnPrior, LnPriorComponent, LnPriorComponentTrait, SingleLnPrior, Transform, UnitDiskLnPrior,
    softplus,
};

mod ln_prior_1d;
pub use ln_prior_1d::{LnPrior1D, LnPrior1DTrait, NormalLnPrior1D, UniformLnPrior1D};
