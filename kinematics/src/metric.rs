//! Pose distance used as the solver objective.
//!
//! Orientation is folded into the positional metric by comparing "handle"
//! points: the frame's X and Y axes scaled by [`ROTATION_SCALE`]. A small
//! rotation turns into a proportionally large displacement of the handles.

use nalgebra::{Isometry3, Vector3};

/// Length of the orientation handles. Bigger values weigh rotation error
/// more heavily against position error.
pub const ROTATION_SCALE: f64 = 100.0;

/// The three points of a pose compared by [`distance_to_target`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handles {
    pub center: Vector3<f64>,
    pub x: Vector3<f64>,
    pub y: Vector3<f64>,
}

impl Handles {
    pub fn of(pose: &Isometry3<f64>) -> Self {
        Self {
            center: pose.translation.vector,
            x: pose.rotation * Vector3::x() * ROTATION_SCALE,
            y: pose.rotation * Vector3::y() * ROTATION_SCALE,
        }
    }
}

/// Sum of squared handle displacements between `current` and `target`.
///
/// Zero only when position and orientation match exactly; never negative.
pub fn distance_to_target(current: &Isometry3<f64>, target: &Isometry3<f64>) -> f64 {
    let c0 = Handles::of(current);
    let c1 = Handles::of(target);

    let d_center = (c1.center - c0.center).norm_squared();
    let d_x = (c1.x - c0.x).norm_squared();
    let d_y = (c1.y - c0.y).norm_squared();
    d_center + d_x + d_y
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    #[test]
    fn identical_poses_have_zero_error() {
        let pose = Isometry3::from_parts(
            Translation3::new(3.0, -4.0, 5.0),
            UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
        );
        assert_eq!(distance_to_target(&pose, &pose), 0.0);
    }

    #[test]
    fn pure_translation_is_squared_distance() {
        let a = Isometry3::translation(1.0, 2.0, 3.0);
        let b = Isometry3::translation(4.0, 6.0, 3.0);
        assert_relative_eq!(distance_to_target(&a, &b), 25.0, epsilon = 1e-12);
    }

    #[test]
    fn rotation_is_weighted_by_handle_length() {
        let angle = 0.01_f64;
        let a = Isometry3::identity();
        let b = Isometry3::rotation(Vector3::z() * angle);
        // both X and Y handles sweep a chord of 2 * sin(angle / 2) * SCALE
        let chord = 2.0 * (angle / 2.0).sin() * ROTATION_SCALE;
        assert_relative_eq!(distance_to_target(&a, &b), 2.0 * chord * chord, epsilon = 1e-9);
    }

    #[test]
    fn half_turn_about_z_is_large() {
        let a = Isometry3::identity();
        let b = Isometry3::rotation(Vector3::z() * std::f64::consts::PI);
        // each handle flips: |2 * SCALE|^2
        let expected = 2.0 * (2.0 * ROTATION_SCALE).powi(2);
        assert_relative_eq!(distance_to_target(&a, &b), expected, epsilon = 1e-6);
    }

    #[test]
    fn symmetric_and_non_negative() {
        let a = Isometry3::from_parts(
            Translation3::new(0.5, 0.0, -1.0),
            UnitQuaternion::from_euler_angles(0.3, 0.0, 0.0),
        );
        let b = Isometry3::translation(2.0, 1.0, 0.0);
        let ab = distance_to_target(&a, &b);
        assert!(ab > 0.0);
        assert_relative_eq!(ab, distance_to_target(&b, &a), epsilon = 1e-9);
    }
}
