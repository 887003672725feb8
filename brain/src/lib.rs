use kinematics::{CancelToken, Chain, GradientDescent, IkReport, JointState, Pose, SolverConfig};
use log::{debug, info, warn};

/// Holds the most recent target; a newer target replaces an unsolved one.
#[derive(Debug, Default)]
pub struct TargetSlot {
    pending: Option<Pose>,
}

impl TargetSlot {
    pub fn new() -> Self {
        Self { pending: None }
    }

    pub fn post(&mut self, target: Pose) -> bool {
        self.pending.replace(target).is_some()
    }

    pub fn take(&mut self) -> Option<Pose> {
        self.pending.take()
    }
}

/// Keeps an arm's chain on its target pose.
///
/// Targets arrive through [`RobotBrain::set_target`]; nothing is solved
/// until [`RobotBrain::update`] runs, so bursts of targets collapse into
/// one solve toward the last of them.
pub struct RobotBrain {
    chain: Chain,
    solver: GradientDescent,
    target: Pose,
    incoming: TargetSlot,
    cancel: CancelToken,
}

impl RobotBrain {
    /// The initial target is wherever the end effector already is.
    pub fn new(mut chain: Chain, config: SolverConfig) -> Self {
        let target = chain.compute_end_effector();
        Self {
            chain,
            solver: GradientDescent::new(config),
            target,
            incoming: TargetSlot::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn set_target(&mut self, target: Pose) {
        if self.incoming.post(target) {
            debug!("target replaced before it was solved");
        }
    }

    /// Moves the target onto the current end effector.
    pub fn reset_target(&mut self) {
        self.incoming.take();
        self.target = self.chain.compute_end_effector();
    }

    pub fn target(&self) -> &Pose {
        &self.target
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn joint_states(&self) -> Vec<JointState> {
        self.chain.joint_states()
    }

    pub fn end_effector(&self) -> &Pose {
        self.chain.end_effector()
    }

    pub fn distance_to_target(&self) -> f64 {
        kinematics::distance_to_target(self.chain.end_effector(), &self.target)
    }

    /// Token observed by the running solve. Cancelling it stops that solve
    /// at the next joint visit; the next [`RobotBrain::update`] clears it.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Solves toward the latest target if the arm is not already there.
    /// Repeated calls keep refining a target that was not reached.
    pub fn update(&mut self) -> kinematics::Result<Option<IkReport>> {
        if let Some(target) = self.incoming.take() {
            self.target = target;
        }
        if self.distance_to_target() < self.solver.config().convergence_threshold {
            return Ok(None);
        }

        self.cancel.reset();
        let report = self.solver.solve_with(&mut self.chain, &self.target, &self.cancel)?;
        if report.converged {
            info!(
                "reached target in {} sweeps, error {:.6}",
                report.iterations, report.final_error
            );
        } else {
            warn!("target not reached ({:?}), error {:.6}", report.stop, report.final_error);
        }
        Ok(Some(report))
    }
}
