//! Staged maximum a posteriori optimisation

mod adapter;
pub use adapter::{BestPoint, SubsetProblem};

mod schedule;
pub use schedule::{ParameterSelector, Stage, default_schedule};

mod staged;
pub use staged::{OptimizationResult, StageReport, StagedOptimizer};
