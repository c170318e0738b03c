//! Serializable analysis results.

use crate::core::rules::IssueSet;
use crate::core::segmenter::{Interval, SegmentSummary};
use crate::pose::recorded::FrameLoadError;
use crate::pose::types::{Keypoint, KeypointFrame};
use serde::Serialize;

/// Keypoint as echoed back to callers for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeypointSummary {
    pub x: f64,
    pub y: f64,
    pub visibility: f64,
}

impl From<&Keypoint> for KeypointSummary {
    fn from(k: &Keypoint) -> Self {
        Self {
            x: k.x,
            y: k.y,
            visibility: k.confidence,
        }
    }
}

/// Keypoints to report for a frame; empty when no pose was found.
pub fn keypoint_summaries(frame: &KeypointFrame, pose_found: bool) -> Vec<KeypointSummary> {
    if !pose_found {
        return Vec::new();
    }
    frame.keypoints.iter().map(KeypointSummary::from).collect()
}

/// Result for one frame of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    /// Decoded-video frame number
    pub frame: u64,
    pub issues: IssueSet,
    pub keypoints: Vec<KeypointSummary>,
}

/// Result of a single live call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveReport {
    pub issues: IssueSet,
    pub keypoints: Vec<KeypointSummary>,
}

impl From<FrameResult> for LiveReport {
    fn from(result: FrameResult) -> Self {
        Self {
            issues: result.issues,
            keypoints: result.keypoints,
        }
    }
}

/// Live output record standing in for an input record that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadableRecord {
    pub error: String,
    /// 1-based input line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl From<&FrameLoadError> for UnreadableRecord {
    fn from(e: &FrameLoadError) -> Self {
        Self {
            error: e.to_string(),
            line: e.line(),
        }
    }
}

/// Result of a batch analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub frames: Vec<FrameResult>,
    #[serde(flatten)]
    pub summary: SegmentSummary,
    /// Raw runs in sampled-frame indices
    #[serde(skip)]
    pub intervals: Vec<Interval>,
    /// Set when the batch was stopped before every frame was classified
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl BatchReport {
    /// Number of frames with at least one issue.
    pub fn bad_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| !f.issues.is_good()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rules::IssueCode;
    use crate::core::segmenter::{BadSpan, GoodSpan};

    #[test]
    fn test_unreadable_record_names_line() {
        let err = crate::pose::recorded::parse_frame_line("{\"frame_index\": ", 4).unwrap_err();
        let value = serde_json::to_value(UnreadableRecord::from(&err)).unwrap();
        assert_eq!(value["line"], 4);
        assert!(value["error"].as_str().unwrap().contains("line 4"));
    }

    #[test]
    fn test_batch_report_shape() {
        let report = BatchReport {
            frames: vec![FrameResult {
                frame: 0,
                issues: IssueSet::pose_undetected(),
                keypoints: Vec::new(),
            }],
            summary: SegmentSummary {
                good: vec![GoodSpan {
                    from: "0.00".to_string(),
                    to: "0.17".to_string(),
                }],
                bad: vec![BadSpan {
                    from: "0.33".to_string(),
                    to: "0.33".to_string(),
                    issues: vec![IssueCode::KNEE_OVER_TOE],
                }],
            },
            intervals: Vec::new(),
            cancelled: false,
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["frames"][0]["issues"][0], "pose_undetected");
        assert_eq!(value["good"][0]["to"], "0.17");
        assert_eq!(value["bad"][0]["issues"][0], "knee_over_toe");
        assert!(value.get("cancelled").is_none());
        assert!(value.get("intervals").is_none());
    }

    #[test]
    fn test_keypoints_hidden_without_pose() {
        let frame = KeypointFrame::undetected(0);
        assert!(keypoint_summaries(&frame, false).is_empty());
        let shown = keypoint_summaries(&frame, true);
        assert_eq!(shown.len(), crate::pose::LANDMARK_COUNT);
        assert_eq!(shown[0].visibility, 0.0);
    }
}
