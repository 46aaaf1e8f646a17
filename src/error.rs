/// Error returned from the fitting pipeline
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FitError {
    #[error("{context}: {actual} points is smaller than the minimum required {minimum}")]
    InsufficientData {
        actual: usize,
        minimum: usize,
        context: &'static str,
    },

    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    #[error("stage {stage:?} over {parameters:?} did not converge: {reason}")]
    OptimizationStalled {
        stage: String,
        parameters: Vec<String>,
        last_point: Vec<f64>,
        reason: String,
    },

    #[error("parameter {parameter} = {value} is outside of its support")]
    ParameterOutOfSupport { parameter: &'static str, value: f64 },

    #[error("stage {stage:?} over {parameters:?} failed: {source}")]
    Stage {
        stage: String,
        parameters: Vec<String>,
        last_point: Vec<f64>,
        #[source]
        source: Box<FitError>,
    },

    #[error("posterior sampler error: {0}")]
    Sampler(String),

    #[error(transparent)]
    SortedArray(#[from] SortedArrayError),
}

impl FitError {
    /// Last valid parameter vector carried by stage-level errors
    pub fn last_point(&self) -> Option<&[f64]> {
        match self {
            Self::OptimizationStalled { last_point, .. } | Self::Stage { last_point, .. } => {
                Some(last_point)
            }
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SortedArrayError {
    #[error("SortedArray constructors accept sorted arrays only")]
    Unsorted,

    #[error("SortedArray constructors accept contiguous arrays only")]
    NonContiguous,
}
