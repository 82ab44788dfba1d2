use crate::algorithms::mutual_information::{MattesMutualInformation, MetricEvaluator};
use crate::algorithms::{BackendEstimate, RegistrationBackend};
use crate::config::{OptimizerConfig, RegistrationConfig};
use crate::data::ImageData;
use crate::error::{Error, Result};
use crate::transform::{AffineTransform, TransformClass};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopCondition {
    GradientTolerance,
    StepTolerance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerState {
    Initialized,
    Iterating,
    Converged(StopCondition),
    MaxIterationsReached,
    Failed,
}

/// How an in-process optimization ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub state: OptimizerState,
    pub iterations: usize,
    /// Mutual information at the returned parameters
    pub final_value: f64,
    pub final_step: f64,
}

/// Smallest cost decrease that counts as an improvement
const STALL_EPSILON: f64 = 1e-9;

/// Regular step gradient descent on the negative Mattes mutual information
#[derive(Debug, Clone)]
pub struct StepDescentBackend {
    max_step: f64,
    min_step: f64,
    relaxation: f64,
    max_iterations: usize,
    gradient_tolerance: f64,
    finite_difference_step: f64,
    metric: MattesMutualInformation,
}

impl Default for StepDescentBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StepDescentBackend {
    pub fn new() -> Self {
        Self::from_config(&OptimizerConfig::default(), MattesMutualInformation::default())
    }

    pub fn from_config(optimizer: &OptimizerConfig, metric: MattesMutualInformation) -> Self {
        Self {
            max_step: optimizer.max_step,
            min_step: optimizer.min_step,
            relaxation: optimizer.relaxation,
            max_iterations: optimizer.max_iterations,
            gradient_tolerance: optimizer.gradient_tolerance,
            finite_difference_step: optimizer.finite_difference_step,
            metric,
        }
    }

    pub fn with_max_step(mut self, step: f64) -> Self {
        self.max_step = step;
        self
    }

    pub fn with_min_step(mut self, step: f64) -> Self {
        self.min_step = step;
        self
    }

    pub fn with_relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = tolerance;
        self
    }

    pub fn with_metric(mut self, metric: MattesMutualInformation) -> Self {
        self.metric = metric;
        self
    }

    fn check(&self) -> Result<()> {
        if !(self.min_step > 0.0 && self.max_step >= self.min_step) {
            return Err(Error::InvalidArgument(format!(
                "step bounds must satisfy 0 < min_step <= max_step, got {} and {}",
                self.min_step, self.max_step
            )));
        }
        if !(self.relaxation > 0.0 && self.relaxation < 1.0) {
            return Err(Error::InvalidArgument("relaxation must lie in (0, 1)".into()));
        }
        if self.finite_difference_step <= 0.0 {
            return Err(Error::InvalidArgument("finite_difference_step must be positive".into()));
        }
        Ok(())
    }

    /// Optimize the fixed-to-moving sampling map, starting from identity about `center`
    pub fn optimize(
        &self,
        evaluator: &MetricEvaluator,
        class: TransformClass,
        center: [f64; 2],
        radius: f64,
    ) -> Result<(Vec<f64>, OptimizationReport)> {
        self.check()?;
        let space = ScaledSpace::new(class, center, radius);
        let cost = |q: &[f64]| -> Result<f64> {
            let value = -evaluator.value(&space.transform(q))?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(Error::registration("metric evaluated to a non-finite value"))
            }
        };

        tracing::debug!(?class, "Starting step gradient descent");
        let (q, mut report) = self.descend(&cost, space.dimension())?;
        report.final_value = -report.final_value;

        match report.state {
            OptimizerState::MaxIterationsReached => tracing::warn!(
                iterations = report.iterations,
                max_iterations = self.max_iterations,
                "Optimizer stopped at the iteration limit"
            ),
            state => tracing::debug!(
                ?state,
                iterations = report.iterations,
                mutual_information = report.final_value,
                "Optimizer converged"
            ),
        }
        Ok((space.native(&q), report))
    }

    /// Minimize `cost` from the origin of a `dimension`-dimensional space.
    ///
    /// A trial step that does not lower the cost by at least [`STALL_EPSILON`]
    /// is rejected: the position stays put and the step is relaxed. An accepted
    /// step whose new gradient points against the previous one also relaxes the
    /// step. The reported `final_value` is the cost at the returned position.
    fn descend<F>(&self, cost: &F, dimension: usize) -> Result<(Vec<f64>, OptimizationReport)>
    where
        F: Fn(&[f64]) -> Result<f64> + Sync,
    {
        let failed = |iteration: usize, e: Error| {
            tracing::warn!(iteration, state = ?OptimizerState::Failed, error = %e, "Optimizer failed");
            e
        };

        let mut state = OptimizerState::Initialized;
        let mut q = vec![0.0; dimension];
        let mut step = self.max_step;
        let mut iterations = 0;
        let mut value = cost(&q).map_err(|e| failed(iterations, e))?;
        let mut gradient = self.gradient(cost, &q).map_err(|e| failed(iterations, e))?;
        tracing::trace!(?state, value, step, "Descent initialized");

        loop {
            let magnitude = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
            if magnitude < self.gradient_tolerance {
                state = OptimizerState::Converged(StopCondition::GradientTolerance);
                break;
            }
            if step < self.min_step {
                state = OptimizerState::Converged(StopCondition::StepTolerance);
                break;
            }
            if iterations >= self.max_iterations {
                state = OptimizerState::MaxIterationsReached;
                break;
            }

            state = OptimizerState::Iterating;
            let candidate: Vec<f64> = q
                .iter()
                .zip(&gradient)
                .map(|(qi, gi)| qi - step * gi / magnitude)
                .collect();
            let candidate_value = cost(&candidate).map_err(|e| failed(iterations, e))?;
            iterations += 1;

            if candidate_value >= value - STALL_EPSILON {
                step *= self.relaxation;
                tracing::trace!(iteration = iterations, value, rejected = candidate_value, step, "Step rejected");
                continue;
            }

            let next = self.gradient(cost, &candidate).map_err(|e| failed(iterations, e))?;
            let dot: f64 = gradient.iter().zip(&next).map(|(a, b)| a * b).sum();
            if dot < 0.0 {
                step *= self.relaxation;
            }
            q = candidate;
            value = candidate_value;
            gradient = next;

            tracing::trace!(iteration = iterations, ?state, value, step, "Step descent iteration");
        }

        let report = OptimizationReport {
            state,
            iterations,
            final_value: value,
            final_step: step,
        };
        Ok((q, report))
    }

    /// Central differences, all probes evaluated in parallel
    fn gradient<F>(&self, cost: &F, q: &[f64]) -> Result<Vec<f64>>
    where
        F: Fn(&[f64]) -> Result<f64> + Sync,
    {
        let h = self.finite_difference_step;
        let probes: Vec<f64> = (0..2 * q.len())
            .into_par_iter()
            .map(|k| {
                let mut probe = q.to_vec();
                probe[k / 2] += if k % 2 == 0 { h } else { -h };
                cost(&probe)
            })
            .collect::<Result<_>>()?;
        Ok(probes.chunks_exact(2).map(|pair| (pair[0] - pair[1]) / (2.0 * h)).collect())
    }
}

/// Optimizer coordinates: parameter offsets from identity, with the linear part
/// scaled by the image radius so one unit moves a corner by about one pixel
struct ScaledSpace {
    class: TransformClass,
    center: [f64; 2],
    radius: f64,
}

impl ScaledSpace {
    fn new(class: TransformClass, center: [f64; 2], radius: f64) -> Self {
        Self {
            class,
            center,
            radius: radius.max(1.0),
        }
    }

    fn dimension(&self) -> usize {
        self.class.parameter_count()
    }

    fn native(&self, q: &[f64]) -> Vec<f64> {
        match self.class {
            TransformClass::Translation => q.to_vec(),
            TransformClass::Affine => vec![
                1.0 + q[0] / self.radius,
                q[1] / self.radius,
                q[2] / self.radius,
                1.0 + q[3] / self.radius,
                q[4],
                q[5],
            ],
        }
    }

    fn transform(&self, q: &[f64]) -> AffineTransform {
        let p = self.native(q);
        match self.class {
            TransformClass::Translation => AffineTransform::translation([p[0], p[1]], self.center),
            TransformClass::Affine => AffineTransform {
                linear: [p[0], p[1], p[2], p[3]],
                translation: [p[4], p[5]],
                origin: self.center,
            },
        }
    }
}

impl RegistrationBackend for StepDescentBackend {
    fn name(&self) -> &str {
        "step-descent"
    }

    fn configure(&mut self, config: &RegistrationConfig) -> Result<()> {
        *self = Self::from_config(&config.optimizer, config.metric);
        self.check()
    }

    fn estimate(&self, fixed: &dyn ImageData, moving: &dyn ImageData, class: TransformClass) -> Result<BackendEstimate> {
        let fixed = fixed.to_f64();
        let moving = moving.to_f64();
        let evaluator = self.metric.prepare(&fixed, &moving)?;

        let center = fixed.center();
        let radius = center[0].hypot(center[1]);
        let (parameters, report) = self.optimize(&evaluator, class, center, radius)?;

        Ok(BackendEstimate {
            class,
            parameters,
            center,
            report: Some(report),
        })
    }
}
