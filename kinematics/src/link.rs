//! A single Denavit-Hartenberg link.
//!
//! Angles (`theta`, `alpha`) are stored in degrees and converted to radians
//! only when the link transform is built. Lengths (`d`, `r`) use whatever
//! unit the robot model is written in.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use crate::error::{KinematicsError, Result};

/// Floor substituted for a fixed `d` or `r` that is exactly zero.
///
/// A zero offset collapses two consecutive frame origins onto each other,
/// which makes orientation handles coincide in downstream consumers.
pub const MIN_OFFSET: f64 = 1e-6;

/// The four DH parameters of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DhParam {
    D,
    Theta,
    R,
    Alpha,
}

impl DhParam {
    pub fn is_angular(self) -> bool {
        matches!(self, DhParam::Theta | DhParam::Alpha)
    }
}

/// Local axis a joint acts along (prismatic) or about (rotational).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Z,
    X,
}

/// Inclusive bound on an adjustable parameter, in the parameter's own unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointRange {
    pub min: f64,
    pub max: f64,
}

impl JointRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Which parameter of a link, if any, is its degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Joint {
    Fixed,
    /// Rotates about local Z (`theta`) or local X (`alpha`).
    Rotational { axis: Axis, range: JointRange },
    /// Slides along local Z (`d`) or local X (`r`).
    Prismatic { axis: Axis, range: JointRange },
}

impl Joint {
    /// Revolute joint driving `theta`.
    pub const fn revolute(min: f64, max: f64) -> Self {
        Joint::Rotational { axis: Axis::Z, range: JointRange::new(min, max) }
    }

    /// Revolute joint driving `alpha`.
    pub const fn twist(min: f64, max: f64) -> Self {
        Joint::Rotational { axis: Axis::X, range: JointRange::new(min, max) }
    }

    /// Prismatic joint driving `d`.
    pub const fn slider(min: f64, max: f64) -> Self {
        Joint::Prismatic { axis: Axis::Z, range: JointRange::new(min, max) }
    }

    /// Prismatic joint driving `r`.
    pub const fn extender(min: f64, max: f64) -> Self {
        Joint::Prismatic { axis: Axis::X, range: JointRange::new(min, max) }
    }

    pub fn adjustable(&self) -> Option<DhParam> {
        match self {
            Joint::Fixed => None,
            Joint::Rotational { axis: Axis::Z, .. } => Some(DhParam::Theta),
            Joint::Rotational { axis: Axis::X, .. } => Some(DhParam::Alpha),
            Joint::Prismatic { axis: Axis::Z, .. } => Some(DhParam::D),
            Joint::Prismatic { axis: Axis::X, .. } => Some(DhParam::R),
        }
    }

    pub fn range(&self) -> Option<JointRange> {
        match self {
            Joint::Fixed => None,
            Joint::Rotational { range, .. } | Joint::Prismatic { range, .. } => Some(*range),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DhParameters {
    pub d: f64,
    pub theta: f64,
    pub r: f64,
    pub alpha: f64,
}

impl DhParameters {
    pub const fn new(d: f64, theta: f64, r: f64, alpha: f64) -> Self {
        Self { d, theta, r, alpha }
    }

    pub fn get(&self, param: DhParam) -> f64 {
        match param {
            DhParam::D => self.d,
            DhParam::Theta => self.theta,
            DhParam::R => self.r,
            DhParam::Alpha => self.alpha,
        }
    }

    fn slot(&mut self, param: DhParam) -> &mut f64 {
        match param {
            DhParam::D => &mut self.d,
            DhParam::Theta => &mut self.theta,
            DhParam::R => &mut self.r,
            DhParam::Alpha => &mut self.alpha,
        }
    }

    fn is_finite(&self) -> bool {
        self.d.is_finite() && self.theta.is_finite() && self.r.is_finite() && self.alpha.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    name: String,
    params: DhParameters,
    joint: Joint,
}

impl Link {
    /// Builds a link, flooring any fixed zero `d` or `r` to [`MIN_OFFSET`].
    pub fn new(name: impl Into<String>, mut params: DhParameters, joint: Joint) -> Self {
        let adjustable = joint.adjustable();
        for param in [DhParam::D, DhParam::R] {
            if adjustable != Some(param) && params.get(param) == 0.0 {
                *params.slot(param) = MIN_OFFSET;
            }
        }
        Self { name: name.into(), params, joint }
    }

    pub fn fixed(name: impl Into<String>, params: DhParameters) -> Self {
        Self::new(name, params, Joint::Fixed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &DhParameters {
        &self.params
    }

    pub fn joint(&self) -> &Joint {
        &self.joint
    }

    pub fn adjustable(&self) -> Option<DhParam> {
        self.joint.adjustable()
    }

    pub fn range(&self) -> Option<JointRange> {
        self.joint.range()
    }

    /// Current value of the adjustable parameter.
    pub fn value(&self) -> Option<f64> {
        self.adjustable().map(|param| self.params.get(param))
    }

    /// Writes the adjustable parameter. Returns `false` for fixed links,
    /// whose parameters are never written after construction.
    pub(crate) fn set_value(&mut self, value: f64) -> bool {
        match self.adjustable() {
            Some(param) => {
                *self.params.slot(param) = value;
                true
            }
            None => false,
        }
    }

    /// `Rz(theta) * Tz(d) * Tx(r) * Rx(alpha)`.
    pub fn transform(&self) -> Isometry3<f64> {
        Self::transform_with(&self.params, self.adjustable(), None)
    }

    /// Transform with the adjustable parameter replaced by `value`.
    pub(crate) fn transform_at(&self, value: f64) -> Isometry3<f64> {
        Self::transform_with(&self.params, self.adjustable(), Some(value))
    }

    fn transform_with(
        params: &DhParameters,
        adjustable: Option<DhParam>,
        value: Option<f64>,
    ) -> Isometry3<f64> {
        let mut p = *params;
        if let (Some(param), Some(value)) = (adjustable, value) {
            *p.slot(param) = value;
        }

        let theta = p.theta.to_radians();
        let alpha = p.alpha.to_radians();
        let (sin, cos) = theta.sin_cos();

        let translation = Translation3::new(p.r * cos, p.r * sin, p.d);
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), theta)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), alpha);
        Isometry3::from_parts(translation, rotation)
    }

    pub(crate) fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason: String| KinematicsError::InvalidLink { index, reason };

        if !self.params.is_finite() {
            return Err(invalid(format!("non-finite DH parameters {:?}", self.params)));
        }
        if let (Some(range), Some(value)) = (self.range(), self.value()) {
            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(invalid(format!("non-finite range [{}, {}]", range.min, range.max)));
            }
            if range.min > range.max {
                return Err(invalid(format!("range min {} exceeds max {}", range.min, range.max)));
            }
            if !range.contains(value) {
                return Err(invalid(format!(
                    "value {value} outside range [{}, {}]",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }
}
