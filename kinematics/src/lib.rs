//! Denavit-Hartenberg chain kinematics: forward kinematics, a
//! derivative-free gradient-descent IK solver and a finite-difference
//! Jacobian for diagnostics.

use nalgebra::Isometry3;

pub mod chain;
pub mod error;
pub mod jacobian;
pub mod link;
pub mod metric;
pub mod presets;
pub mod solver;

pub use chain::{Chain, JointVector};
pub use error::{KinematicsError, Result};
pub use jacobian::approximate_jacobian;
pub use link::{Axis, DhParam, DhParameters, Joint, JointRange, Link};
pub use metric::distance_to_target;
pub use solver::{CancelToken, GradientDescent, IkReport, RangePolicy, SolverConfig, StopReason};

/// World-frame rigid transform of a link or end effector.
pub type Pose = Isometry3<f64>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointState {
    /// Degrees for rotational joints, length units for prismatic ones.
    pub position: f64,
    pub velocity: f64,
    pub effort: f64,
}

impl Default for JointState {
    fn default() -> Self {
        Self {
            position: 0.0,
            velocity: 0.0,
            effort: 0.0,
        }
    }
}

pub trait ForwardKinematics {
    /// Number of joint values [`ForwardKinematics::forward_kinematics`] expects.
    fn dof(&self) -> usize;

    fn forward_kinematics(&self, joints: &[f64]) -> Result<Pose>;
}
