//! Derivative-free coordinate descent IK.
//!
//! Each sweep visits the DOFs from the end effector back to the base. For
//! every DOF the error is sampled one step either side of the current value;
//! a forward difference gives the slope, and the value is moved against it
//! straight away so later DOFs in the same sweep see the update.
//!
//! The solver works on a copy of the joint vector and commits it to the
//! chain once, on the way out. A solve that runs out of iterations still
//! commits wherever it got to.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};

use crate::ForwardKinematics;
use crate::chain::Chain;
use crate::error::Result;
use crate::link::JointRange;
use crate::metric::distance_to_target;

/// Smallest trial step a valley can shrink a DOF's step to.
pub const MIN_STEP: f64 = 1e-9;

/// What happens when a step lands outside a joint's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Clamp every committed step into `[min, max]`. Trial steps are not clamped.
    #[default]
    Clamp,
    /// Ranges are left to the caller.
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum number of sweeps over all DOFs.
    pub max_iterations: u32,
    /// Stop as soon as the error drops below this.
    pub convergence_threshold: f64,
    /// Fraction of the measured slope applied per step.
    pub learning_rate: f64,
    /// Initial trial step for every DOF.
    pub initial_step_size: f64,
    pub range_policy: RangePolicy,
    /// Wall-clock budget for one solve, checked before every DOF visit.
    pub time_budget_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_threshold: 0.001,
            learning_rate: 0.125,
            initial_step_size: 0.005,
            range_policy: RangePolicy::Clamp,
            time_budget_ms: None,
        }
    }
}

/// Cooperative cancellation flag shared between a solve and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Error was under threshold on entry; nothing was changed.
    AlreadyAtTarget,
    Converged,
    /// Ran out of sweeps.
    Exhausted,
    DeadlineElapsed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IkReport {
    pub converged: bool,
    pub final_error: f64,
    /// Sweeps in which at least one DOF was updated.
    pub iterations: u32,
    /// Forward-kinematics evaluations performed.
    pub evaluations: usize,
    pub stop: StopReason,
    /// Global error after every per-DOF update, in order.
    pub error_history: Vec<f64>,
}

/// Gradient-descent IK solver.
#[derive(Debug, Clone, Default)]
pub struct GradientDescent {
    config: SolverConfig,
}

impl GradientDescent {
    pub const fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Drives `chain` toward `target` and commits the result.
    pub fn solve(&self, chain: &mut Chain, target: &Isometry3<f64>) -> Result<IkReport> {
        self.solve_with(chain, target, &CancelToken::default())
    }

    /// Like [`GradientDescent::solve`], stopping early once `cancel` fires.
    pub fn solve_with(
        &self,
        chain: &mut Chain,
        target: &Isometry3<f64>,
        cancel: &CancelToken,
    ) -> Result<IkReport> {
        let start = chain.joint_vector().into_inner();
        let (joints, report) = self.descend(chain, target, start, cancel)?;

        if report.stop != StopReason::AlreadyAtTarget {
            chain.set_joint_vector(&joints)?;
            chain.compute_end_effector();
        }

        match report.stop {
            StopReason::AlreadyAtTarget | StopReason::Converged => debug!(
                "ik converged after {} sweeps, error {:.6}",
                report.iterations, report.final_error
            ),
            StopReason::Exhausted => warn!(
                "ik did not reach target within {} sweeps, error {:.6}",
                self.config.max_iterations, report.final_error
            ),
            StopReason::DeadlineElapsed | StopReason::Cancelled => debug!(
                "ik stopped early ({:?}) after {} sweeps, error {:.6}",
                report.stop, report.iterations, report.final_error
            ),
        }
        Ok(report)
    }

    fn descend(
        &self,
        chain: &Chain,
        target: &Isometry3<f64>,
        mut joints: Vec<f64>,
        cancel: &CancelToken,
    ) -> Result<(Vec<f64>, IkReport)> {
        let config = &self.config;
        let deadline = config
            .time_budget_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let mut evaluator = Evaluator { chain, target, evaluations: 0 };

        let mut error = evaluator.error(&joints)?;
        let mut report = IkReport {
            converged: false,
            final_error: error,
            iterations: 0,
            evaluations: 0,
            stop: StopReason::Exhausted,
            error_history: Vec::new(),
        };
        if error < config.convergence_threshold {
            report.converged = true;
            report.stop = StopReason::AlreadyAtTarget;
            report.evaluations = evaluator.evaluations;
            return Ok((joints, report));
        }

        debug!("ik start: {} joints, error {:.6}", joints.len(), error);

        let ranges: Vec<JointRange> = chain.ranges();
        let mut steps = vec![config.initial_step_size; joints.len()];

        'sweeps: for sweep in 0..config.max_iterations {
            // end effector first: converges faster than base first
            for i in (0..joints.len()).rev() {
                if cancel.is_cancelled() {
                    report.stop = StopReason::Cancelled;
                    break 'sweeps;
                }
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    report.stop = StopReason::DeadlineElapsed;
                    break 'sweeps;
                }

                let gradient = partial_gradient(&mut evaluator, &mut joints, &mut steps, i, error)?;
                let mut value = joints[i] - gradient * config.learning_rate;
                if config.range_policy == RangePolicy::Clamp {
                    value = ranges[i].clamp(value);
                }
                if value.is_finite() {
                    joints[i] = value;
                }

                error = evaluator.error(&joints)?;
                report.error_history.push(error);
                report.iterations = sweep + 1;

                if error < config.convergence_threshold {
                    report.converged = true;
                    report.stop = StopReason::Converged;
                    break 'sweeps;
                }
            }
            trace!("ik sweep {sweep}: error {error:.6}");
        }

        report.final_error = error;
        report.evaluations = evaluator.evaluations;
        Ok((joints, report))
    }
}

/// Error evaluation against a fixed chain and target.
struct Evaluator<'a> {
    chain: &'a Chain,
    target: &'a Isometry3<f64>,
    evaluations: usize,
}

impl Evaluator<'_> {
    fn error(&mut self, joints: &[f64]) -> Result<f64> {
        self.evaluations += 1;
        let pose = self.chain.forward_kinematics(joints)?;
        Ok(distance_to_target(&pose, self.target))
    }
}

/// Slope of the error along DOF `i`, with `error` the error at `joints`.
///
/// If stepping either way makes things worse the DOF sits in a valley at the
/// current step scale: its step shrinks by `error / min(plus, minus)` and the
/// slope is reported as zero. Steps never grow and never drop below
/// [`MIN_STEP`].
fn partial_gradient(
    evaluator: &mut Evaluator<'_>,
    joints: &mut [f64],
    steps: &mut [f64],
    i: usize,
    error: f64,
) -> Result<f64> {
    let value = joints[i];

    joints[i] = value + steps[i];
    let plus = evaluator.error(joints);
    joints[i] = value - steps[i];
    let minus = evaluator.error(joints);
    joints[i] = value;
    let (plus, minus) = (plus?, minus?);

    if plus > error && minus > error {
        let shrunk = steps[i] * (error / plus.min(minus));
        if shrunk.is_finite() {
            steps[i] = shrunk.max(MIN_STEP);
        }
        return Ok(0.0);
    }

    let slope = (plus - error) / steps[i];
    Ok(if slope.is_finite() { slope } else { 0.0 })
}
