//! Serial chain of DH links.
//!
//! The chain owns its links, a base pose (world placement of link 0) and a
//! cached end-effector pose. The cache is only refreshed by
//! [`Chain::compute_end_effector`]; after [`Chain::set_joint_vector`] it is
//! stale until recomputed.

use std::ops::Deref;

use nalgebra::Isometry3;

use crate::error::{KinematicsError, Result};
use crate::link::{DhParam, JointRange, Link};
use crate::{ForwardKinematics, JointState};

/// One value per adjustable link, in chain order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointVector(Vec<f64>);

impl JointVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Element-wise equality within `epsilon`. Vectors of different length
    /// are never equal.
    pub fn approx_eq(&self, other: &[f64], epsilon: f64) -> bool {
        self.0.len() == other.len()
            && self.0.iter().zip(other).all(|(a, b)| (a - b).abs() <= epsilon)
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl Deref for JointVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for JointVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Clone)]
pub struct Chain {
    links: Vec<Link>,
    base: Isometry3<f64>,
    end_effector: Isometry3<f64>,
    /// Indices into `links` of the adjustable links.
    adjustable: Vec<usize>,
}

impl Chain {
    pub fn new(links: Vec<Link>, base: Isometry3<f64>) -> Result<Self> {
        check_pose(&base, "base pose")?;
        for (index, link) in links.iter().enumerate() {
            link.validate(index)?;
        }

        let adjustable = links
            .iter()
            .enumerate()
            .filter(|(_, link)| link.adjustable().is_some())
            .map(|(index, _)| index)
            .collect();

        let mut chain = Self {
            links,
            base,
            end_effector: Isometry3::identity(),
            adjustable,
        };
        chain.compute_end_effector();
        check_pose(&chain.end_effector, "end effector pose")?;
        Ok(chain)
    }

    /// Number of adjustable links.
    pub fn dof(&self) -> usize {
        self.adjustable.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn base(&self) -> &Isometry3<f64> {
        &self.base
    }

    /// Moves the chain in the world. The cached end effector is stale until
    /// [`Chain::compute_end_effector`] runs.
    pub fn set_base(&mut self, base: Isometry3<f64>) -> Result<()> {
        check_pose(&base, "base pose")?;
        self.base = base;
        Ok(())
    }

    /// Last computed end-effector pose.
    pub fn end_effector(&self) -> &Isometry3<f64> {
        &self.end_effector
    }

    /// Recomputes and caches the end-effector pose from the current link values.
    pub fn compute_end_effector(&mut self) -> Isometry3<f64> {
        let joints = self.joint_vector();
        self.end_effector = self.compose(&joints, |_| {});
        self.end_effector
    }

    /// World pose of every link frame, in chain order.
    pub fn link_poses(&self) -> Vec<Isometry3<f64>> {
        let mut poses = Vec::with_capacity(self.links.len());
        self.compose(&self.joint_vector(), |pose| poses.push(*pose));
        poses
    }

    pub fn joint_vector(&self) -> JointVector {
        self.adjustable
            .iter()
            .filter_map(|&index| self.links[index].value())
            .collect::<Vec<_>>()
            .into()
    }

    /// Writes one value per adjustable link. Fails without touching the
    /// chain if the length or any value is wrong.
    pub fn set_joint_vector(&mut self, joints: &[f64]) -> Result<()> {
        self.check_joints(joints)?;
        if let Some(value) = joints.iter().find(|value| !value.is_finite()) {
            return Err(KinematicsError::NonFinite(format!("joint vector value {value}")));
        }
        for (&index, &value) in self.adjustable.iter().zip(joints) {
            self.links[index].set_value(value);
        }
        Ok(())
    }

    /// Writes the adjustable parameter of a single link.
    pub fn set_link_value(&mut self, index: usize, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(KinematicsError::NonFinite(format!("link {index} value {value}")));
        }
        let link = self.links.get_mut(index).ok_or_else(|| KinematicsError::InvalidLink {
            index,
            reason: "no such link".to_string(),
        })?;
        if link.set_value(value) {
            Ok(())
        } else {
            Err(KinematicsError::FixedLink(index))
        }
    }

    /// Range of each adjustable link, in joint-vector order.
    pub fn ranges(&self) -> Vec<JointRange> {
        self.adjustable
            .iter()
            .filter_map(|&index| self.links[index].range())
            .collect()
    }

    pub fn clamp_to_limits(&self, joints: &mut [f64]) {
        for (value, range) in joints.iter_mut().zip(self.ranges()) {
            *value = range.clamp(*value);
        }
    }

    /// Joint vector as publishable joint states. Velocity and effort are not
    /// modelled here and stay zero.
    pub fn joint_states(&self) -> Vec<JointState> {
        self.joint_vector()
            .iter()
            .map(|&position| JointState { position, ..Default::default() })
            .collect()
    }

    /// Which DH parameter each DOF drives, in joint-vector order.
    pub fn joint_params(&self) -> Vec<DhParam> {
        self.adjustable
            .iter()
            .filter_map(|&index| self.links[index].adjustable())
            .collect()
    }

    /// Names of the adjustable links, in joint-vector order.
    pub fn joint_names(&self) -> Vec<&str> {
        self.adjustable
            .iter()
            .map(|&index| self.links[index].name())
            .collect()
    }

    /// Left-multiplies the link transforms onto the base pose, taking the
    /// adjustable values from `joints`. `visit` sees every intermediate frame.
    fn compose(&self, joints: &[f64], mut visit: impl FnMut(&Isometry3<f64>)) -> Isometry3<f64> {
        let mut values = joints.iter();
        let mut pose = self.base;
        for link in &self.links {
            let transform = match link.adjustable() {
                Some(_) => values
                    .next()
                    .map_or_else(|| link.transform(), |&value| link.transform_at(value)),
                None => link.transform(),
            };
            pose *= transform;
            visit(&pose);
        }
        pose
    }

    fn check_joints(&self, joints: &[f64]) -> Result<()> {
        if joints.len() != self.dof() {
            return Err(KinematicsError::JointVectorLength {
                expected: self.dof(),
                actual: joints.len(),
            });
        }
        Ok(())
    }
}

impl ForwardKinematics for Chain {
    fn dof(&self) -> usize {
        Chain::dof(self)
    }

    /// Pure FK for `joints`; the chain's own values and cache are untouched.
    fn forward_kinematics(&self, joints: &[f64]) -> Result<Isometry3<f64>> {
        self.check_joints(joints)?;
        Ok(self.compose(joints, |_| {}))
    }
}

fn check_pose(pose: &Isometry3<f64>, what: &str) -> Result<()> {
    let finite = pose.translation.vector.iter().all(|v| v.is_finite())
        && pose.rotation.coords.iter().all(|v| v.is_finite());
    if finite {
        Ok(())
    } else {
        Err(KinematicsError::NonFinite(what.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DhParameters, Joint};
    use crate::presets;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    fn planar_two_link() -> Chain {
        Chain::new(
            vec![
                Link::new("shoulder", DhParameters::new(0.0, 0.0, 10.0, 0.0), Joint::revolute(-180.0, 180.0)),
                Link::new("elbow", DhParameters::new(0.0, 0.0, 5.0, 0.0), Joint::revolute(-180.0, 180.0)),
            ],
            Isometry3::identity(),
        )
        .unwrap()
    }

    #[test]
    fn fk_home_is_straight_along_x() {
        let mut chain = planar_two_link();
        let ee = chain.compute_end_effector();
        assert_relative_eq!(ee.translation.x, 15.0, epsilon = 1e-9);
        assert_relative_eq!(ee.translation.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn fk_folded_elbow() {
        let mut chain = planar_two_link();
        chain.set_joint_vector(&[90.0, 90.0]).unwrap();
        let ee = chain.compute_end_effector();
        // shoulder points along +y, forearm folds back along -x
        assert_relative_eq!(ee.translation.x, -5.0, epsilon = 1e-9);
        assert_relative_eq!(ee.translation.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn base_pose_is_applied_first() {
        let mut chain = planar_two_link();
        let base = Isometry3::from_parts(
            Translation3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
        );
        chain.set_base(base).unwrap();
        let ee = chain.compute_end_effector();
        assert_relative_eq!(ee.translation.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(ee.translation.y, 17.0, epsilon = 1e-9);
        assert_relative_eq!(ee.translation.z, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn cache_is_stale_until_recomputed() {
        let mut chain = planar_two_link();
        let before = *chain.end_effector();
        chain.set_joint_vector(&[45.0, 0.0]).unwrap();
        assert_eq!(*chain.end_effector(), before);
        let after = chain.compute_end_effector();
        assert_ne!(after, before);
        assert_eq!(*chain.end_effector(), after);
    }

    #[test]
    fn fk_is_bit_identical_for_identical_inputs() {
        let chain = presets::mantis().unwrap();
        let q = [10.0, -20.0, 30.0, 15.0, -5.0, 60.0];
        let a = chain.forward_kinematics(&q).unwrap();
        let b = chain.forward_kinematics(&q).unwrap();
        assert_eq!(a.translation.vector, b.translation.vector);
        assert_eq!(a.rotation, b.rotation);
    }

    #[test]
    fn pure_fk_matches_committed_fk() {
        let mut chain = presets::mantis().unwrap();
        let q = [12.0, -30.0, 40.0, 5.0, 25.0, -70.0];
        let pure = chain.forward_kinematics(&q).unwrap();
        chain.set_joint_vector(&q).unwrap();
        assert_eq!(chain.compute_end_effector(), pure);
    }

    #[test]
    fn joint_vector_round_trips_in_chain_order() {
        let mut chain = presets::mantis().unwrap();
        assert_eq!(chain.dof(), 6);
        let q = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        chain.set_joint_vector(&q).unwrap();
        assert_eq!(chain.joint_vector().into_inner(), q);
    }

    #[test]
    fn wrong_length_is_rejected_without_resizing() {
        let mut chain = planar_two_link();
        let err = chain.set_joint_vector(&[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, KinematicsError::JointVectorLength { expected: 2, actual: 3 });
        assert!(err.to_string().contains("3 values"));
        assert_eq!(chain.joint_vector().into_inner(), vec![0.0, 0.0]);

        assert!(chain.set_joint_vector(&[1.0]).is_err());
        assert!(chain.forward_kinematics(&[]).is_err());
    }

    #[test]
    fn non_finite_joint_values_are_rejected() {
        let mut chain = planar_two_link();
        assert!(matches!(
            chain.set_joint_vector(&[f64::NAN, 0.0]),
            Err(KinematicsError::NonFinite(_))
        ));
    }

    #[test]
    fn fixed_links_cannot_be_written() {
        let mut chain = presets::mantis().unwrap();
        assert_eq!(chain.set_link_value(3, 1.0), Err(KinematicsError::FixedLink(3)));
        chain.set_link_value(0, 15.0).unwrap();
        assert_eq!(chain.joint_vector()[0], 15.0);
    }

    #[test]
    fn link_poses_end_at_the_end_effector() {
        let mut chain = presets::mantis().unwrap();
        let poses = chain.link_poses();
        assert_eq!(poses.len(), chain.links().len());
        assert_eq!(poses.last().copied(), Some(chain.compute_end_effector()));
    }

    #[test]
    fn clamp_to_limits() {
        let chain = planar_two_link();
        let mut q = [400.0, -400.0];
        chain.clamp_to_limits(&mut q);
        assert_eq!(q, [180.0, -180.0]);
    }

    #[test]
    fn approx_eq_uses_epsilon() {
        let a = JointVector::new(vec![1.0, 2.0]);
        assert!(a.approx_eq(&[1.0005, 1.9995], 1e-3));
        assert!(!a.approx_eq(&[1.01, 2.0], 1e-3));
        assert!(!a.approx_eq(&[1.0], 1e-3));
    }

    #[test]
    fn joint_states_carry_positions() {
        let mut chain = planar_two_link();
        chain.set_joint_vector(&[10.0, -20.0]).unwrap();
        let states = chain.joint_states();
        assert_eq!(states.len(), 2);
        assert_eq!(states[1].position, -20.0);
        assert_eq!(chain.joint_names(), vec!["shoulder", "elbow"]);
    }

    #[test]
    fn joint_params_follow_joint_vector_order() {
        let chain = presets::demo_arm().unwrap();
        let params = chain.joint_params();
        assert_eq!(
            params,
            vec![DhParam::Theta, DhParam::Theta, DhParam::Theta, DhParam::Alpha, DhParam::Theta, DhParam::R]
        );
        assert_eq!(params.iter().filter(|param| param.is_angular()).count(), 5);
    }
}
