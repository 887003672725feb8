use thiserror::Error;

/// Errors raised by chain construction and joint-vector access.
///
/// An unreachable target is not an error: the solver reports it through
/// [`crate::solver::IkReport::converged`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// A joint vector did not match the chain's adjustable DOF count.
    #[error("joint vector has {actual} values but the chain has {expected} adjustable joints")]
    JointVectorLength { expected: usize, actual: usize },

    /// A joint value, pose or DH parameter was NaN or infinite.
    #[error("non-finite value in {0}")]
    NonFinite(String),

    /// A link definition is inconsistent (bad range, value outside range, ...).
    #[error("invalid link {index}: {reason}")]
    InvalidLink { index: usize, reason: String },

    /// Attempted to write the variable parameter of a fixed link.
    #[error("link {0} has no adjustable parameter")]
    FixedLink(usize),

    /// The finite-difference Jacobian produced NaN or infinite entries.
    #[error("degenerate parameterization: jacobian entry ({row}, {col}) is {value}")]
    Degenerate { row: usize, col: usize, value: f64 },
}

pub type Result<T> = std::result::Result<T, KinematicsError>;
