//! Temporal segmentation of per-frame issue sets.
//!
//! Consecutive sampled frames with the same good/bad status are merged into
//! one [`Interval`]. The segmenter works in a single forward pass and only
//! looks at the status of the previous frame, so frames can be pushed as they
//! are classified.

use crate::config::ConfigError;
use crate::core::rules::{IssueCode, IssueSet};
use serde::Serialize;

/// A maximal run of sampled frames sharing one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interval {
    /// First sampled-frame index of the run
    pub start: usize,
    /// Last sampled-frame index of the run (inclusive)
    pub end: usize,
    pub good: bool,
    /// Issues of the first bad frame in the run; empty for good runs
    pub issues: Vec<IssueCode>,
}

impl Interval {
    /// Number of sampled frames covered.
    pub fn frame_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// How sampled frames map onto source-video time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    fps: f64,
    stride: u32,
}

impl FrameTiming {
    /// `fps` of the decoded video and the sampling stride used to pick frames.
    pub fn new(fps: f64, stride: u32) -> Result<Self, ConfigError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ConfigError::InvalidTiming(format!(
                "fps must be positive, got {fps}"
            )));
        }
        if stride == 0 {
            return Err(ConfigError::InvalidTiming(
                "stride must be at least 1".to_string(),
            ));
        }
        Ok(Self { fps, stride })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Decoded-video frame number of a sampled frame.
    pub fn source_frame(&self, sample_index: usize) -> u64 {
        sample_index as u64 * u64::from(self.stride)
    }

    /// Seconds from the start of the video to a sampled frame.
    pub fn seconds(&self, sample_index: usize) -> f64 {
        self.source_frame(sample_index) as f64 / self.fps
    }
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self { fps: 30.0, stride: 5 }
    }
}

/// Incremental run-length encoder over frame statuses.
#[derive(Debug, Default)]
pub struct TemporalSegmenter {
    current: Option<Interval>,
    completed: Vec<Interval>,
    next_index: usize,
}

impl TemporalSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next frame's issue set.
    pub fn push(&mut self, issues: &IssueSet) {
        let index = self.next_index;
        self.next_index += 1;
        let good = issues.is_good();

        if let Some(ref mut run) = self.current {
            if run.good == good {
                run.end = index;
                return;
            }
        }

        self.complete_current();
        self.current = Some(Interval {
            start: index,
            end: index,
            good,
            issues: issues.codes(),
        });
    }

    /// Number of frames pushed so far.
    pub fn frame_count(&self) -> usize {
        self.next_index
    }

    /// Close the open run and return every interval in order.
    pub fn finish(mut self) -> Vec<Interval> {
        self.complete_current();
        self.completed
    }

    fn complete_current(&mut self) {
        if let Some(run) = self.current.take() {
            self.completed.push(run);
        }
    }
}

/// Segment a whole sequence of issue sets.
pub fn segment(frames: &[IssueSet]) -> Vec<Interval> {
    let mut segmenter = TemporalSegmenter::new();
    for issues in frames {
        segmenter.push(issues);
    }
    segmenter.finish()
}

/// Per-frame good flags covered by the intervals.
pub fn expand(intervals: &[Interval]) -> Vec<bool> {
    intervals
        .iter()
        .flat_map(|run| std::iter::repeat(run.good).take(run.frame_count()))
        .collect()
}

/// A good run expressed in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoodSpan {
    pub from: String,
    pub to: String,
}

/// A bad run expressed in seconds with its representative issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadSpan {
    pub from: String,
    pub to: String,
    pub issues: Vec<IssueCode>,
}

/// Good and bad runs of one batch analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentSummary {
    pub good: Vec<GoodSpan>,
    pub bad: Vec<BadSpan>,
}

/// Convert intervals to second-based spans.
pub fn summarize(intervals: &[Interval], timing: FrameTiming) -> SegmentSummary {
    let stamp = |index: usize| format!("{:.2}", timing.seconds(index));
    let mut summary = SegmentSummary::default();

    for run in intervals {
        if run.good {
            summary.good.push(GoodSpan {
                from: stamp(run.start),
                to: stamp(run.end),
            });
        } else {
            summary.bad.push(BadSpan {
                from: stamp(run.start),
                to: stamp(run.end),
                issues: run.issues.clone(),
            });
        }
    }

    summary
}
