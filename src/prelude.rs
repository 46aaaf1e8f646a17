pub use crate::float_trait::LikeFloat;
pub use crate::gp::CeleriteFactor;
pub use crate::model::prior::{LnPrior1DTrait, LnPriorComponentTrait};
pub use crate::periodogram::PeriodGridTrait;
pub use crate::sampler::{LogDensity, PosteriorSampler};
