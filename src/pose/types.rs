//! Keypoint types produced by an external pose estimator.
//!
//! Coordinates are normalized image coordinates in [0, 1] with y growing
//! downward. A landmark that was never detected is still present in its frame,
//! with confidence 0.

use serde::{Deserialize, Serialize};

/// Number of landmarks in a well-formed frame.
pub const LANDMARK_COUNT: usize = 33;

/// Body landmarks in estimator output order (BlazePose topology).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Landmark {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl Landmark {
    /// Every landmark, in index order.
    pub const ALL: [Landmark; LANDMARK_COUNT] = [
        Landmark::Nose,
        Landmark::LeftEyeInner,
        Landmark::LeftEye,
        Landmark::LeftEyeOuter,
        Landmark::RightEyeInner,
        Landmark::RightEye,
        Landmark::RightEyeOuter,
        Landmark::LeftEar,
        Landmark::RightEar,
        Landmark::MouthLeft,
        Landmark::MouthRight,
        Landmark::LeftShoulder,
        Landmark::RightShoulder,
        Landmark::LeftElbow,
        Landmark::RightElbow,
        Landmark::LeftWrist,
        Landmark::RightWrist,
        Landmark::LeftPinky,
        Landmark::RightPinky,
        Landmark::LeftIndex,
        Landmark::RightIndex,
        Landmark::LeftThumb,
        Landmark::RightThumb,
        Landmark::LeftHip,
        Landmark::RightHip,
        Landmark::LeftKnee,
        Landmark::RightKnee,
        Landmark::LeftAnkle,
        Landmark::RightAnkle,
        Landmark::LeftHeel,
        Landmark::RightHeel,
        Landmark::LeftFootIndex,
        Landmark::RightFootIndex,
    ];

    /// Position of this landmark within a frame.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a landmark by its frame position.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// A single estimated landmark position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Normalized horizontal position
    pub x: f64,
    /// Normalized vertical position (grows downward)
    pub y: f64,
    /// Relative depth, when the estimator provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Estimator certainty in [0, 1]
    #[serde(alias = "visibility", default)]
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            confidence,
        }
    }

    /// A landmark the estimator did not find.
    pub fn undetected() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Whether the estimator reported this landmark at all.
    pub fn is_detected(&self) -> bool {
        self.confidence > 0.0
    }
}

/// One sampled frame of estimator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointFrame {
    /// Decoded-video frame number
    #[serde(default)]
    pub frame_index: u64,
    /// Presentation time in seconds, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// Keypoints ordered by landmark index
    pub keypoints: Vec<Keypoint>,
}

impl KeypointFrame {
    /// Create a frame from keypoints in landmark order.
    pub fn new(frame_index: u64, keypoints: Vec<Keypoint>) -> Self {
        Self {
            frame_index,
            timestamp: None,
            keypoints,
        }
    }

    /// A well-formed frame in which no landmark was detected.
    pub fn undetected(frame_index: u64) -> Self {
        Self::new(frame_index, vec![Keypoint::undetected(); LANDMARK_COUNT])
    }

    /// Attach a presentation timestamp.
    pub fn with_timestamp(mut self, seconds: f64) -> Self {
        self.timestamp = Some(seconds);
        self
    }

    /// Set one landmark's keypoint, returning the frame for chaining.
    ///
    /// Has no effect on malformed frames that are too short to hold it.
    pub fn with_keypoint(mut self, landmark: Landmark, keypoint: Keypoint) -> Self {
        if let Some(slot) = self.keypoints.get_mut(landmark.index()) {
            *slot = keypoint;
        }
        self
    }

    /// Whether the frame carries exactly one keypoint per landmark.
    pub fn is_well_formed(&self) -> bool {
        self.keypoints.len() == LANDMARK_COUNT
    }

    /// Keypoint for a landmark, if the frame holds it.
    pub fn get(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.keypoints.get(landmark.index())
    }

    /// Number of landmarks with non-zero confidence.
    pub fn detected_count(&self) -> usize {
        self.keypoints.iter().filter(|k| k.is_detected()).count()
    }
}
