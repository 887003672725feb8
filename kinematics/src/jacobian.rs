//! Finite-difference Jacobian, for diagnostics only.
//!
//! Each column is the pose change per unit of one DOF. Rows 0..3 hold the
//! translation delta; rows 3..6 the angular rate recovered from how the
//! X and Y orientation handles moved, the same handles the error metric
//! compares.

use nalgebra::{Isometry3, Matrix6xX, Vector3};

use crate::ForwardKinematics;
use crate::error::{KinematicsError, Result};
use crate::metric::{Handles, ROTATION_SCALE};

/// Perturbation applied to each DOF, in the DOF's own unit.
pub const JACOBIAN_EPSILON: f64 = 1e-6;

pub fn approximate_jacobian<K>(kinematics: &K, joints: &[f64]) -> Result<Matrix6xX<f64>>
where
    K: ForwardKinematics + ?Sized,
{
    let base = kinematics.forward_kinematics(joints)?;
    let mut jacobian = Matrix6xX::zeros(joints.len());
    let mut perturbed = joints.to_vec();

    for col in 0..joints.len() {
        perturbed[col] = joints[col] + JACOBIAN_EPSILON;
        let moved = kinematics.forward_kinematics(&perturbed)?;
        perturbed[col] = joints[col];

        let (linear, angular) = pose_delta(&base, &moved);
        jacobian
            .fixed_view_mut::<3, 1>(0, col)
            .copy_from(&(linear / JACOBIAN_EPSILON));
        jacobian
            .fixed_view_mut::<3, 1>(3, col)
            .copy_from(&(angular / JACOBIAN_EPSILON));
    }

    if let Some((index, value)) = jacobian.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        // column-major storage
        return Err(KinematicsError::Degenerate {
            row: index % 6,
            col: index / 6,
            value: *value,
        });
    }
    Ok(jacobian)
}

/// Translation and small-angle rotation taking `from` to `to`.
///
/// For a small rotation `w`, each unit axis moves by `w x axis`. Crossing
/// the X and Y handle deltas with their axes gives `w + z (w . z)`, and
/// `dx . y` is exactly `w . z`.
fn pose_delta(from: &Isometry3<f64>, to: &Isometry3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let h0 = Handles::of(from);
    let h1 = Handles::of(to);

    let x = h0.x / ROTATION_SCALE;
    let y = h0.y / ROTATION_SCALE;
    let z = x.cross(&y);
    let dx = (h1.x - h0.x) / ROTATION_SCALE;
    let dy = (h1.y - h0.y) / ROTATION_SCALE;

    let angular = x.cross(&dx) + y.cross(&dy) - z * dx.dot(&y);
    (h1.center - h0.center, angular)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::link::{DhParameters, Joint, Link};
    use crate::presets;
    use approx::assert_relative_eq;

    const DEG: f64 = std::f64::consts::PI / 180.0;

    #[test]
    fn mantis_home_has_no_nan() {
        let chain = presets::mantis().unwrap();
        let jacobian = approximate_jacobian(&chain, &chain.joint_vector()).unwrap();
        assert_eq!(jacobian.shape(), (6, 6));
        assert!(jacobian.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn demo_arm_home_columns() {
        let chain = presets::demo_arm().unwrap();
        let jacobian = approximate_jacobian(&chain, &chain.joint_vector()).unwrap();
        assert!(jacobian.iter().all(|v| v.is_finite()));

        // base yaw: end effector 40 units out swings along +y
        assert_relative_eq!(jacobian[(1, 0)], 40.0 * DEG, epsilon = 1e-4);
        assert_relative_eq!(jacobian[(5, 0)], DEG, epsilon = 1e-6);
        assert_relative_eq!(jacobian[(0, 0)], 0.0, epsilon = 1e-4);

        // forearm twist spins about x without moving the tip
        assert_relative_eq!(jacobian[(3, 3)], DEG, epsilon = 1e-6);
        assert_relative_eq!(jacobian[(1, 3)], 0.0, epsilon = 1e-4);

        // extender slides along x
        assert_relative_eq!(jacobian[(0, 5)], 1.0, epsilon = 1e-4);
        for row in 1..6 {
            assert_relative_eq!(jacobian[(row, 5)], 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn zero_offsets_do_not_degenerate() {
        let chain = Chain::new(
            vec![
                Link::new("a", DhParameters::default(), Joint::revolute(-180.0, 180.0)),
                Link::new("b", DhParameters::default(), Joint::twist(-180.0, 180.0)),
                Link::new("c", DhParameters::default(), Joint::revolute(-180.0, 180.0)),
            ],
            Isometry3::identity(),
        )
        .unwrap();
        let jacobian = approximate_jacobian(&chain, &[0.0, 0.0, 0.0]).unwrap();
        assert!(jacobian.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let chain = presets::demo_arm().unwrap();
        assert!(matches!(
            approximate_jacobian(&chain, &[0.0; 3]),
            Err(KinematicsError::JointVectorLength { expected: 6, actual: 3 })
        ));
    }
}
