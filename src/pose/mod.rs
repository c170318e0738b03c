//! Pose data consumed by the classifier.
//!
//! Pose estimation itself happens outside this crate. Estimators plug in
//! through [`PoseEstimator`]; pre-recorded estimator output can be loaded with
//! [`recorded::load_frames`].

pub mod recorded;
pub mod types;

// Re-export commonly used types
pub use recorded::{load_frames, parse_frames, FrameFormat};
pub use types::{Keypoint, KeypointFrame, Landmark, LANDMARK_COUNT};

/// An external pose estimator.
///
/// Implementations report an undetected pose as a frame whose confidences are
/// all zero, never as an error.
pub trait PoseEstimator<I> {
    /// Estimate keypoints for one image.
    fn estimate(&self, image: &I, frame_index: u64) -> KeypointFrame;
}

impl<I, F> PoseEstimator<I> for F
where
    F: Fn(&I, u64) -> KeypointFrame,
{
    fn estimate(&self, image: &I, frame_index: u64) -> KeypointFrame {
        self(image, frame_index)
    }
}
