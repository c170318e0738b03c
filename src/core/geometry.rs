//! Geometric primitives over keypoint coordinates.
//!
//! Every measurement carries a validity flag instead of failing: low
//! confidence inputs and degenerate rays produce an invalid value that rules
//! treat as "not evaluated".

use crate::pose::types::{Keypoint, KeypointFrame, Landmark};
use serde::Serialize;

/// Default minimum confidence for a keypoint to take part in a measurement.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Rays shorter than this are considered degenerate.
pub const EPSILON: f64 = 1e-6;

/// Landmarks an angle was measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Joints {
    /// Angle at the middle landmark between the outer two
    Triple([Landmark; 3]),
    /// Inclination of `base`→`top` away from image up
    FromVertical { top: Landmark, base: Landmark },
}

/// A joint angle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Angle {
    /// Set when the angle was measured on a frame by landmark
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joints: Option<Joints>,
    /// Angle in [0, 180]; 0.0 when invalid
    pub degrees: f64,
    pub valid: bool,
}

impl Angle {
    fn invalid() -> Self {
        Self {
            joints: None,
            degrees: 0.0,
            valid: false,
        }
    }

    fn over(mut self, joints: Joints) -> Self {
        self.joints = Some(joints);
        self
    }

    /// The angle value, if it could be computed.
    pub fn value(&self) -> Option<f64> {
        self.valid.then_some(self.degrees)
    }
}

/// A signed displacement along one image axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Offset {
    /// Normalized displacement; 0.0 when invalid
    pub delta: f64,
    pub valid: bool,
}

impl Offset {
    fn invalid() -> Self {
        Self {
            delta: 0.0,
            valid: false,
        }
    }

    /// The offset value, if it could be computed.
    pub fn value(&self) -> Option<f64> {
        self.valid.then_some(self.delta)
    }
}

fn confident(points: &[&Keypoint], min_confidence: f64) -> bool {
    points
        .iter()
        .all(|p| p.confidence >= min_confidence && p.x.is_finite() && p.y.is_finite())
}

/// Angle at vertex `b` between rays b→a and b→c.
pub fn angle_between(a: &Keypoint, b: &Keypoint, c: &Keypoint, min_confidence: f64) -> Angle {
    if !confident(&[a, b, c], min_confidence) {
        return Angle::invalid();
    }

    let (bax, bay) = (a.x - b.x, a.y - b.y);
    let (bcx, bcy) = (c.x - b.x, c.y - b.y);
    let norm_ba = (bax * bax + bay * bay).sqrt();
    let norm_bc = (bcx * bcx + bcy * bcy).sqrt();

    if norm_ba < EPSILON || norm_bc < EPSILON {
        return Angle::invalid();
    }

    let cosine = ((bax * bcx + bay * bcy) / (norm_ba * norm_bc)).clamp(-1.0, 1.0);
    Angle {
        joints: None,
        degrees: cosine.acos().to_degrees(),
        valid: true,
    }
}

/// Inclination of the segment base→top away from image "up".
///
/// 0° means `top` sits directly above `base`.
pub fn angle_from_vertical(top: &Keypoint, base: &Keypoint, min_confidence: f64) -> Angle {
    // y grows downward, so "up" is a smaller y
    let above = Keypoint {
        y: base.y - 1.0,
        ..*base
    };
    angle_between(top, base, &above, min_confidence)
}

/// Angle at `joints[1]` measured on the frame's keypoints.
///
/// Missing landmarks give an invalid angle that still names its joints.
pub fn angle_at(frame: &KeypointFrame, joints: [Landmark; 3], min_confidence: f64) -> Angle {
    let [a, b, c] = joints;
    let angle = match (frame.get(a), frame.get(b), frame.get(c)) {
        (Some(a), Some(b), Some(c)) => angle_between(a, b, c, min_confidence),
        _ => Angle::invalid(),
    };
    angle.over(Joints::Triple(joints))
}

/// [`angle_from_vertical`] measured on the frame's keypoints.
pub fn inclination_at(
    frame: &KeypointFrame,
    top: Landmark,
    base: Landmark,
    min_confidence: f64,
) -> Angle {
    let angle = match (frame.get(top), frame.get(base)) {
        (Some(t), Some(b)) => angle_from_vertical(t, b, min_confidence),
        _ => Angle::invalid(),
    };
    angle.over(Joints::FromVertical { top, base })
}

/// Horizontal displacement `b.x - a.x`.
pub fn horizontal_offset(a: &Keypoint, b: &Keypoint, min_confidence: f64) -> Offset {
    if !confident(&[a, b], min_confidence) {
        return Offset::invalid();
    }
    Offset {
        delta: b.x - a.x,
        valid: true,
    }
}

/// Vertical displacement `b.y - a.y` (positive means `b` is lower in the image).
pub fn vertical_offset(a: &Keypoint, b: &Keypoint, min_confidence: f64) -> Offset {
    if !confident(&[a, b], min_confidence) {
        return Offset::invalid();
    }
    Offset {
        delta: b.y - a.y,
        valid: true,
    }
}
