use std::fmt;
use std::path::Path;

use kinematics::{Chain, Pose, SolverConfig, presets};
use nalgebra::{Translation3, UnitQuaternion};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotModel {
    #[default]
    DemoArm,
    Mantis,
}

impl RobotModel {
    pub fn build(self) -> kinematics::Result<Chain> {
        match self {
            RobotModel::DemoArm => presets::demo_arm(),
            RobotModel::Mantis => presets::mantis(),
        }
    }
}

impl fmt::Display for RobotModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotModel::DemoArm => write!(f, "demo_arm"),
            RobotModel::Mantis => write!(f, "mantis"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub enabled: bool,
    pub joint_command_key: String,
    pub target_key: String,
    pub frame_id: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            joint_command_key: "rt/robot/joint_commands".to_string(),
            target_key: "rt/robot/target_pose".to_string(),
            frame_id: "robot_base".to_string(),
        }
    }
}

/// A target pose as written in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TargetSetting {
    pub position: [f64; 3],
    /// Roll, pitch, yaw in degrees.
    #[serde(default)]
    pub rotation: [f64; 3],
}

impl TargetSetting {
    pub fn to_pose(&self) -> Pose {
        let [x, y, z] = self.position;
        let [roll, pitch, yaw] = self.rotation.map(f64::to_radians);
        Pose::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub robot: RobotModel,
    pub solver: SolverConfig,
    pub transport: TransportSettings,
    /// Targets fed to the arm when no transport is running.
    pub demo_targets: Vec<TargetSetting>,
    pub demo_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            robot: RobotModel::default(),
            solver: SolverConfig::default(),
            transport: TransportSettings::default(),
            demo_targets: vec![
                TargetSetting { position: [50.0, 0.0, 0.0], rotation: [0.0; 3] },
                TargetSetting { position: [45.0, 0.0, 0.0], rotation: [0.0; 3] },
            ],
            demo_interval_ms: 100,
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinematics::RangePolicy;

    #[test]
    fn empty_file_gives_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_solver_section_keeps_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            robot = "mantis"

            [solver]
            max_iterations = 200
            range_policy = "advisory"
            time_budget_ms = 20

            [transport]
            enabled = true
            target_key = "rt/arm/goal"

            [[demo_targets]]
            position = [10.0, 20.0, 30.0]
            rotation = [0.0, 0.0, 90.0]
            "#,
        )
        .unwrap();

        assert_eq!(settings.robot, RobotModel::Mantis);
        assert_eq!(settings.solver.max_iterations, 200);
        assert_eq!(settings.solver.learning_rate, 0.125);
        assert_eq!(settings.solver.range_policy, RangePolicy::Advisory);
        assert_eq!(settings.solver.time_budget_ms, Some(20));
        assert!(settings.transport.enabled);
        assert_eq!(settings.transport.target_key, "rt/arm/goal");
        assert_eq!(settings.transport.joint_command_key, "rt/robot/joint_commands");
        assert_eq!(settings.demo_targets.len(), 1);
    }

    #[test]
    fn target_setting_rotation_is_in_degrees() {
        let target = TargetSetting { position: [1.0, 2.0, 3.0], rotation: [0.0, 0.0, 90.0] };
        let pose = target.to_pose();
        let x_axis = pose.rotation * nalgebra::Vector3::x();
        assert!((x_axis.y - 1.0).abs() < 1e-12);
        assert_eq!(pose.translation.vector, nalgebra::Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn every_model_builds() {
        assert_eq!(RobotModel::DemoArm.build().unwrap().dof(), 6);
        assert_eq!(RobotModel::Mantis.build().unwrap().dof(), 6);
    }
}
