use zenoh::Session;
use edgefirst_schemas::std_msgs::Header;
use edgefirst_schemas::builtin_interfaces::Time;
use kinematics::{DhParam, JointState as KinematicsJointState, Pose};
use log::warn;
use nalgebra::{Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::settings::TransportSettings;

/// ROS 2 CDR encapsulation header (little endian).
const CDR_LE_HEADER: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JointState {
    pub header: Header,
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub effort: Vec<f64>,
}

impl Default for JointState {
    fn default() -> Self {
        Self {
            header: empty_header(),
            name: Vec::new(),
            position: Vec::new(),
            velocity: Vec::new(),
            effort: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Same layout as `geometry_msgs/PoseStamped`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PoseStamped {
    pub header: Header,
    pub position: Point,
    pub orientation: Orientation,
}

pub struct CommunicationLayer {
    session: Session,
    joint_command_key: String,
    target_key: String,
    frame_id: String,
}

impl CommunicationLayer {
    pub async fn new(settings: &TransportSettings) -> Result<Self, Box<dyn std::error::Error>> {
        let config = zenoh::config::Config::default();
        let session = zenoh::open(config).await.map_err(|e| e.to_string())?;

        Ok(Self {
            session,
            joint_command_key: settings.joint_command_key.clone(),
            target_key: settings.target_key.clone(),
            frame_id: settings.frame_id.clone(),
        })
    }

    /// `params` tells angular joints apart: their degrees go out as radians.
    pub async fn publish_joint_command(
        &self,
        names: &[&str],
        params: &[DhParam],
        joints: &[KinematicsJointState],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut msg = convert_to_ros_joint_state(names, params, joints);
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        msg.header.stamp = Time::new(now.as_secs() as i32, now.subsec_nanos());
        msg.header.frame_id = self.frame_id.clone();
        let payload = encode(&msg)?;
        self.session.put(&self.joint_command_key, payload).await.map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Calls `callback` with every well-formed target pose received.
    pub async fn subscribe_target<F>(&self, callback: F) -> Result<(), Box<dyn std::error::Error>>
    where F: Fn(Pose) + Send + Sync + 'static
    {
        let subscriber = self.session.declare_subscriber(&self.target_key).await.map_err(|e| e.to_string())?;

        tokio::spawn(async move {
            while let Ok(sample) = subscriber.recv_async().await {
                let payload = sample.payload().to_bytes();
                match decode::<PoseStamped>(&payload) {
                    Some(msg) => match convert_from_ros_pose(&msg) {
                        Some(pose) => callback(pose),
                        None => warn!("Dropping target pose with non-finite or zero orientation"),
                    },
                    None => warn!("Failed to deserialize target PoseStamped"),
                }
            }
        });
        Ok(())
    }
}

/// ROS joint states are SI: radians for angular joints, prismatic values
/// pass through unchanged.
fn convert_to_ros_joint_state(names: &[&str], params: &[DhParam], joints: &[KinematicsJointState]) -> JointState {
    let mut msg = JointState::default();
    for (i, joint) in joints.iter().enumerate() {
        let name = names.get(i).map_or_else(|| format!("joint_{}", i + 1), |name| name.to_string());
        let angular = params.get(i).is_some_and(|param| param.is_angular());
        let to_ros = |value: f64| if angular { value.to_radians() } else { value };
        msg.name.push(name);
        msg.position.push(to_ros(joint.position));
        msg.velocity.push(to_ros(joint.velocity));
        msg.effort.push(joint.effort);
    }
    msg
}

fn empty_header() -> Header {
    Header {
        stamp: Time::new(0, 0),
        frame_id: String::new(),
    }
}

fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut payload = CDR_LE_HEADER.to_vec();
    let data = cdr::ser::serialize_data::<_, _, cdr::LittleEndian>(msg, cdr::Infinite)?;
    payload.extend(data);
    Ok(payload)
}

/// Skips the 4 byte encapsulation header; little endian is assumed.
fn decode<T: DeserializeOwned>(payload: &[u8]) -> Option<T> {
    if payload.len() <= CDR_LE_HEADER.len() {
        warn!("Received payload too short for ROS 2 message");
        return None;
    }
    let mut deserializer = cdr::Deserializer::<_, _, cdr::LittleEndian>::new(&payload[CDR_LE_HEADER.len()..], cdr::Infinite);
    T::deserialize(&mut deserializer).ok()
}

fn convert_from_ros_pose(msg: &PoseStamped) -> Option<Pose> {
    let Point { x, y, z } = msg.position;
    let o = msg.orientation;
    let quaternion = Quaternion::new(o.w, o.x, o.y, o.z);
    let finite = [x, y, z, o.x, o.y, o.z, o.w].iter().all(|v| v.is_finite());
    if !finite || quaternion.norm() == 0.0 {
        return None;
    }
    Some(Pose::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_quaternion(quaternion),
    ))
}
