use crate::error::FitError;
use crate::model::JointModel;
use crate::optimize::adapter::{BestPoint, SubsetProblem};
use crate::optimize::schedule::{Stage, default_schedule};

use argmin::core::{Error, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

type LineSearch = MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64>;
type Lbfgs = LBFGS<LineSearch, Vec<f64>, Vec<f64>, f64>;

/// Maximum a posteriori search over an ordered schedule of parameter subsets
///
/// Every stage runs L-BFGS with a More-Thuente line search over its free parameters, all other
/// parameters stay at the values left by the previous stage. The cost of a stage is the negative
/// log-posterior divided by the norm of its gradient at the stage start, clamped from below by
/// unity. A stage never ends at a point worse than its start.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct StagedOptimizer {
    pub schedule: Vec<Stage>,
    /// Number of L-BFGS correction pairs
    pub lbfgs_memory: usize,
    /// Stage converges when the scaled gradient norm drops below this value
    pub tolerance_grad: f64,
    /// Stage converges when the scaled cost changes by less than this value
    pub tolerance_cost: f64,
    /// Iteration budget of a single stage
    pub max_iters: u64,
    /// Largest line search step along the L-BFGS direction
    pub max_step: f64,
}

impl StagedOptimizer {
    pub fn new(
        schedule: Vec<Stage>,
        lbfgs_memory: usize,
        tolerance_grad: f64,
        tolerance_cost: f64,
        max_iters: u64,
        max_step: f64,
    ) -> Self {
        assert!(lbfgs_memory > 0, "L-BFGS memory must be positive");
        assert!(tolerance_grad >= 0.0, "gradient tolerance must be non-negative");
        assert!(tolerance_cost >= 0.0, "cost tolerance must be non-negative");
        assert!(max_iters > 0, "iteration budget must be positive");
        assert!(max_step > 0.0, "maximum step must be positive");
        Self {
            schedule,
            lbfgs_memory,
            tolerance_grad,
            tolerance_cost,
            max_iters,
            max_step,
        }
    }

    #[inline]
    pub fn default_schedule() -> Vec<Stage> {
        default_schedule()
    }

    #[inline]
    pub fn default_lbfgs_memory() -> usize {
        7
    }

    #[inline]
    pub fn default_tolerance_grad() -> f64 {
        1e-5
    }

    #[inline]
    pub fn default_tolerance_cost() -> f64 {
        1e-12
    }

    #[inline]
    pub fn default_max_iters() -> u64 {
        1000
    }

    #[inline]
    pub fn default_max_step() -> f64 {
        4.0
    }

    fn solver(&self) -> Result<Lbfgs, Error> {
        let line_search = LineSearch::new().with_bounds(f64::EPSILON.sqrt(), self.max_step)?;
        LBFGS::new(line_search, self.lbfgs_memory)
            .with_tolerance_grad(self.tolerance_grad)?
            .with_tolerance_cost(self.tolerance_cost)
    }

    /// Run every stage of the schedule starting from `theta0`
    pub fn run(&self, model: &JointModel, theta0: &[f64]) -> Result<OptimizationResult, FitError> {
        let mut theta = theta0.to_vec();
        let mut stages = Vec::with_capacity(self.schedule.len());
        for stage in &self.schedule {
            let (next, report) = self.run_stage(model, stage, &theta)?;
            theta = next;
            stages.push(report);
        }
        let ln_posterior = model.ln_posterior(&theta)?;
        Ok(OptimizationResult {
            theta,
            ln_posterior,
            stages,
        })
    }

    /// Optimise the free parameters of a single stage
    pub fn run_stage(
        &self,
        model: &JointModel,
        stage: &Stage,
        theta: &[f64],
    ) -> Result<(Vec<f64>, StageReport), FitError> {
        let layout = model.layout();
        let free = stage.parameters.indices(layout);
        let all_names = layout.names();
        let names: Vec<String> = free.iter().map(|&i| all_names[i].clone()).collect();
        let wrap = |source: FitError| FitError::Stage {
            stage: stage.name.clone(),
            parameters: names.clone(),
            last_point: theta.to_vec(),
            source: Box::new(source),
        };
        let stalled = |last_point: Vec<f64>, reason: String| FitError::OptimizationStalled {
            stage: stage.name.clone(),
            parameters: names.clone(),
            last_point,
            reason,
        };

        let (ln_post0, grad0) = model.ln_posterior_grad(theta, &free).map_err(wrap)?;
        let start = -ln_post0;
        let grad_norm = grad0.iter().map(|g| g * g).sum::<f64>().sqrt();
        tracing::info!(
            stage = stage.name.as_str(),
            n_free = free.len(),
            cost = start,
            grad_norm,
            "optimization stage started"
        );
        if free.is_empty() || grad_norm <= self.tolerance_grad {
            let report = StageReport {
                name: stage.name.clone(),
                parameters: names,
                start,
                end: start,
                iterations: 0,
                termination: "gradient is already below tolerance".to_owned(),
            };
            return Ok((theta.to_vec(), report));
        }

        let scale = grad_norm.max(1.0);
        let best = Mutex::new(BestPoint::default());
        let problem = SubsetProblem::new(model, theta, &free, scale, &best);
        let x0 = problem.project(theta);
        let solver = self
            .solver()
            .map_err(|err| stalled(theta.to_vec(), err.to_string()))?;

        let outcome = Executor::new(problem.clone(), solver)
            .configure(|state| state.param(x0.clone()).max_iters(self.max_iters))
            .run();
        let (x_best, iterations, termination) = match outcome {
            Ok(result) => {
                let mut state = result.state().clone();
                let status = state.get_termination_status().clone();
                let iterations = state.get_iter();
                let x_best = state.take_best_param().unwrap_or_else(|| x0.clone());
                if let TerminationStatus::Terminated(TerminationReason::MaxItersReached) = status {
                    return Err(stalled(
                        problem.embed(&x_best),
                        format!("no convergence in {iterations} iterations"),
                    ));
                }
                (x_best, iterations, format!("{status:?}"))
            }
            Err(err) => match err.downcast::<FitError>() {
                Ok(source) => return Err(wrap(source)),
                Err(err) => {
                    // The solver gave up, e.g. no acceptable step along the search direction
                    let best = best
                        .lock()
                        .ok()
                        .and_then(|b| b.cost.map(|cost| (cost, b.x.clone())));
                    match best {
                        Some((cost, x)) if cost * scale <= start => {
                            tracing::warn!(
                                stage = stage.name.as_str(),
                                error = %err,
                                "solver stopped early, keeping the best evaluated point"
                            );
                            (x, 0, format!("solver stopped: {err}"))
                        }
                        _ => return Err(stalled(theta.to_vec(), err.to_string())),
                    }
                }
            },
        };

        let candidate = problem.embed(&x_best);
        let end = -model.ln_posterior(&candidate).map_err(wrap)?;
        let (next, end) = if end <= start {
            (candidate, end)
        } else {
            tracing::warn!(
                stage = stage.name.as_str(),
                start,
                end,
                "stage did not improve the cost, keeping the starting point"
            );
            (theta.to_vec(), start)
        };
        tracing::info!(
            stage = stage.name.as_str(),
            iterations,
            cost = end,
            termination = termination.as_str(),
            "optimization stage finished"
        );
        let report = StageReport {
            name: stage.name.clone(),
            parameters: names,
            start,
            end,
            iterations,
            termination,
        };
        Ok((next, report))
    }
}

impl Default for StagedOptimizer {
    fn default() -> Self {
        Self::new(
            Self::default_schedule(),
            Self::default_lbfgs_memory(),
            Self::default_tolerance_grad(),
            Self::default_tolerance_cost(),
            Self::default_max_iters(),
            Self::default_max_step(),
        )
    }
}

/// Negative log-posterior before and after a stage
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct StageReport {
    pub name: String,
    pub parameters: Vec<String>,
    pub start: f64,
    pub end: f64,
    pub iterations: u64,
    pub termination: String,
}

#[derive(Clone, Debug)]
pub struct OptimizationResult {
    pub theta: Vec<f64>,
    pub ln_posterior: f64,
    pub stages: Vec<StageReport>,
}
