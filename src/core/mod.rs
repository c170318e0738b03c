//! Core posture classification.
//!
//! This module contains:
//! - Geometry primitives over keypoints
//! - Activity rule sets and their registry
//! - Per-frame classification
//! - Temporal segmentation into good/bad intervals
//! - Batch and live analysis sessions

pub mod activities;
pub mod classifier;
pub mod geometry;
pub mod report;
pub mod rules;
pub mod segmenter;
pub mod session;

// Re-export commonly used types
pub use classifier::{classify, classify_detailed, declared_codes, FrameVerdict};
pub use geometry::{
    angle_at, angle_between, angle_from_vertical, horizontal_offset, inclination_at,
    vertical_offset, Angle, Joints, Offset, MIN_CONFIDENCE,
};
pub use report::{BatchReport, FrameResult, KeypointSummary, LiveReport, UnreadableRecord};
pub use rules::{
    ActivityRegistry, IssueCode, IssueSet, Rule, RuleInput, RuleOutcome, RuleSet, Thresholds,
};
pub use segmenter::{
    expand, segment, summarize, BadSpan, FrameTiming, GoodSpan, Interval, SegmentSummary,
    TemporalSegmenter,
};
pub use session::{AnalysisSession, BatchRun, SessionSettings};
