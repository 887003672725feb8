//! Ready-made robot models. Lengths in centimetres, angles in degrees.

use nalgebra::Isometry3;

use crate::chain::Chain;
use crate::error::Result;
use crate::link::{DhParameters, Joint, Link};

/// Andreas Hoelldorfer's MANTIS, a 3D printable 6 DOF arm.
/// See <https://hackaday.io/project/3800-3d-printable-robot-arm>.
pub fn mantis() -> Result<Chain> {
    let links = vec![
        Link::new("base_roll", DhParameters::new(24.5 + 2.7, 0.0, 0.0, 0.0), Joint::revolute(-120.0, 120.0)),
        Link::new("shoulder_tilt", DhParameters::default(), Joint::twist(-72.0, 90.0)),
        Link::new(
            "elbow_tilt",
            DhParameters::new(13.9744 + 8.547, 0.0, 0.0, 0.0),
            Joint::twist(-83.369, 86.0),
        ),
        Link::fixed("interim", DhParameters::new(0.001, 0.0, 0.0, 90.0)),
        Link::new("forearm_roll", DhParameters::new(8.547, 0.0, 0.0, 0.0), Joint::revolute(-90.0, 90.0)),
        Link::new("wrist_tilt", DhParameters::new(14.6855, 0.0, 0.0, 0.0), Joint::twist(-90.0, 90.0)),
        Link::new("wrist_roll", DhParameters::new(5.0, 0.0, 0.0, 0.0), Joint::revolute(-90.0, 90.0)),
        Link::fixed("tool", DhParameters::default()),
    ];
    Chain::new(links, Isometry3::identity())
}

/// Five rotary joints on 10 cm links and a telescoping tool. At home the
/// tool frame has identity orientation at `(40, 0, 0)`.
pub fn demo_arm() -> Result<Chain> {
    let segment = DhParameters::new(0.0, 0.0, 10.0, 0.0);
    let links = vec![
        Link::new("base_yaw", segment, Joint::revolute(-180.0, 180.0)),
        Link::new("shoulder", segment, Joint::revolute(-150.0, 150.0)),
        Link::new("elbow", segment, Joint::revolute(-150.0, 150.0)),
        Link::new("forearm_roll", segment, Joint::twist(-180.0, 180.0)),
        Link::new("wrist", DhParameters::default(), Joint::revolute(-120.0, 120.0)),
        Link::new("extend", DhParameters::default(), Joint::extender(0.0, 30.0)),
    ];
    Chain::new(links, Isometry3::identity())
}
