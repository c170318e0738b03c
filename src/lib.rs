//! Posture Rules - rule-based posture classification over body keypoints.
//!
//! This library turns per-frame keypoints from an external pose estimator
//! into named posture issues, and summarizes a sampled video into good and
//! bad time intervals.
//!
//! # Guarantees
//!
//! - **Deterministic**: classification is a pure function of the frame,
//!   the activity's rule set and the confidence floor
//! - **Occlusion tolerant**: rules whose landmarks are not confidently
//!   detected are skipped, never flagged
//! - **Same answer live or batch**: both paths share one classifier
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Posture Rules                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────┐        │
//! │  │  Keypoint   │──▶│ Classifier  │──▶│  Segmenter   │        │
//! │  │   Frames    │   │ (rule sets) │   │ (good / bad) │        │
//! │  └─────────────┘   └─────────────┘   └──────────────┘        │
//! │                           │                  │               │
//! │                           ▼                  ▼               │
//! │                    ┌─────────────┐   ┌──────────────┐        │
//! │                    │ Live Report │   │ Batch Report │        │
//! │                    └─────────────┘   └──────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use posture_rules::{ActivityRegistry, AnalysisSession, KeypointFrame, SessionSettings};
//!
//! let registry = ActivityRegistry::with_builtins();
//! let session = AnalysisSession::new(&registry, "squat", SessionSettings::default())
//!     .expect("squat is a built-in activity");
//!
//! let report = session.analyze_live(&KeypointFrame::undetected(0));
//! assert_eq!(report.issues.codes()[0].as_str(), "pose_undetected");
//! ```

pub mod config;
pub mod core;
pub mod pose;
pub mod stats;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use crate::core::{
    classify, segment, summarize, ActivityRegistry, AnalysisSession, BatchReport, FrameTiming,
    Interval, IssueCode, IssueSet, LiveReport, RuleSet, SessionSettings, TemporalSegmenter,
    Thresholds,
};
pub use config::{Config, ConfigError};
pub use pose::{Keypoint, KeypointFrame, Landmark, PoseEstimator, LANDMARK_COUNT};
pub use stats::{AnalysisStats, SharedStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
