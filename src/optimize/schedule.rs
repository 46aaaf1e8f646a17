use crate::model::{ParameterBlock, ParameterLayout};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters released in an optimisation stage
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ParameterSelector {
    All,
    Blocks(Vec<ParameterBlock>),
}

impl ParameterSelector {
    /// Sorted, unique indices of the selected parameters
    pub fn indices(&self, layout: &ParameterLayout) -> Vec<usize> {
        match self {
            Self::All => (0..layout.dim()).collect(),
            Self::Blocks(blocks) => {
                let mut indices: Vec<_> = blocks
                    .iter()
                    .flat_map(|&block| layout.block_indices(block))
                    .collect();
                indices.sort_unstable();
                indices.dedup();
                indices
            }
        }
    }
}

/// Named optimisation stage
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub parameters: ParameterSelector,
}

impl Stage {
    pub fn new(name: impl Into<String>, parameters: ParameterSelector) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    pub fn blocks(name: impl Into<String>, blocks: &[ParameterBlock]) -> Self {
        Self::new(name, ParameterSelector::Blocks(blocks.to_vec()))
    }
}

/// Stage order used by default
///
/// Nuisance blocks are settled first, then the transit shape, the ephemeris and the noise model,
/// and finally everything is released together.
pub fn default_schedule() -> Vec<Stage> {
    use ParameterBlock::*;

    vec![
        Stage::blocks("rv_trend", &[RvTrend]),
        Stage::blocks("light_curve_jitter", &[LogSigmaLc]),
        Stage::blocks("depth_and_impact", &[LogDepth, ImpactParameter]),
        Stage::blocks("ephemeris", &[LogPeriod, Epoch]),
        Stage::blocks("noise_amplitude", &[LogSigmaLc, LogSigmaGp]),
        Stage::blocks("noise_timescale", &[LogRhoGp]),
        Stage::new("all", ParameterSelector::All),
    ]
}
