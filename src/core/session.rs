//! Batch and live analysis sessions.
//!
//! A session resolves its activity's rule set once. Batch analysis classifies
//! every sampled frame and segments the resulting issue sets; live analysis
//! classifies one frame per call and keeps nothing between calls.

use crate::config::ConfigError;
use crate::core::classifier::classify_detailed;
use crate::core::geometry::MIN_CONFIDENCE;
use crate::core::report::{keypoint_summaries, BatchReport, FrameResult, LiveReport};
use crate::core::rules::{ActivityRegistry, RuleSet};
use crate::core::segmenter::{summarize, FrameTiming, TemporalSegmenter};
use crate::pose::types::KeypointFrame;
use crate::pose::PoseEstimator;
use crate::stats::{create_shared_stats, SharedStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Parameters fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Confidence floor for keypoints used by rules
    pub min_confidence: f64,
    /// Source fps and sampling stride
    pub timing: FrameTiming,
}

impl SessionSettings {
    pub fn new(min_confidence: f64, timing: FrameTiming) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::InvalidConfidence(min_confidence));
        }
        Ok(Self {
            min_confidence,
            timing,
        })
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            min_confidence: MIN_CONFIDENCE,
            timing: FrameTiming::default(),
        }
    }
}

/// Classification context for one activity.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    rule_set: Arc<RuleSet>,
    settings: SessionSettings,
    stats: SharedStats,
}

impl AnalysisSession {
    /// Resolve `activity` and build a session. Unknown activities fail here.
    pub fn new(
        registry: &ActivityRegistry,
        activity: &str,
        settings: SessionSettings,
    ) -> Result<Self, ConfigError> {
        let rule_set = registry.resolve(activity)?;
        tracing::debug!(
            activity = rule_set.activity(),
            rules = rule_set.rules().len(),
            fps = settings.timing.fps(),
            stride = settings.timing.stride(),
            "analysis session created"
        );
        Ok(Self::from_rule_set(rule_set, settings))
    }

    pub fn from_rule_set(rule_set: Arc<RuleSet>, settings: SessionSettings) -> Self {
        Self {
            rule_set,
            settings,
            stats: create_shared_stats(),
        }
    }

    /// Report counters into a shared statistics object.
    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    fn classify_frame(&self, frame: &KeypointFrame) -> FrameResult {
        let verdict = classify_detailed(frame, &self.rule_set, self.settings.min_confidence);
        self.stats.record_frame(
            !verdict.issues.is_good(),
            verdict.undetected,
            verdict.skipped.len(),
        );
        FrameResult {
            frame: frame.frame_index,
            keypoints: keypoint_summaries(frame, !verdict.undetected),
            issues: verdict.issues,
        }
    }

    /// Classify a single live frame.
    pub fn analyze_live(&self, frame: &KeypointFrame) -> LiveReport {
        self.classify_frame(frame).into()
    }

    /// Start an incremental batch. Frames must be pushed in sampling order.
    pub fn begin_batch(&self) -> BatchRun<'_> {
        BatchRun {
            session: self,
            frames: Vec::new(),
            segmenter: TemporalSegmenter::new(),
        }
    }

    /// Classify and segment an ordered sequence of sampled frames.
    pub fn analyze_batch(&self, frames: &[KeypointFrame]) -> BatchReport {
        let mut run = self.begin_batch();
        for frame in frames {
            run.push(frame);
        }
        run.finish()
    }

    /// Like [`analyze_batch`](Self::analyze_batch), stopping between frames
    /// once `cancel` is set. The report then covers the frames seen so far.
    pub fn analyze_batch_cancellable(
        &self,
        frames: &[KeypointFrame],
        cancel: &AtomicBool,
    ) -> BatchReport {
        let mut run = self.begin_batch();
        for frame in frames {
            if cancel.load(Ordering::SeqCst) {
                tracing::info!(classified = run.len(), total = frames.len(), "batch cancelled");
                return run.cancel();
            }
            run.push(frame);
        }
        run.finish()
    }

    /// Classify frames on up to `workers` threads, then segment in order.
    pub fn analyze_batch_parallel(&self, frames: &[KeypointFrame], workers: usize) -> BatchReport {
        if workers <= 1 || frames.len() < 2 {
            return self.analyze_batch(frames);
        }

        let workers = workers.min(frames.len());
        let chunk_size = (frames.len() + workers - 1) / workers;
        let results: Vec<FrameResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = frames
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|f| self.classify_frame(f))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| match h.join() {
                    Ok(chunk) => chunk,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        let mut run = self.begin_batch();
        for result in results {
            run.push_result(result);
        }
        run.finish()
    }

    /// Run `estimator` over sampled images and analyze the resulting frames.
    ///
    /// The i-th image is taken to be decoded frame `i * stride`.
    pub fn analyze_images<I, E>(&self, estimator: &E, images: &[I]) -> BatchReport
    where
        E: PoseEstimator<I>,
    {
        let timing = self.settings.timing;
        let mut run = self.begin_batch();
        for (i, image) in images.iter().enumerate() {
            let frame = estimator.estimate(image, timing.source_frame(i));
            run.push(&frame);
        }
        run.finish()
    }
}

/// An in-progress batch analysis.
pub struct BatchRun<'a> {
    session: &'a AnalysisSession,
    frames: Vec<FrameResult>,
    segmenter: TemporalSegmenter,
}

impl BatchRun<'_> {
    /// Classify the next sampled frame.
    pub fn push(&mut self, frame: &KeypointFrame) -> &FrameResult {
        let result = self.session.classify_frame(frame);
        self.push_result(result)
    }

    fn push_result(&mut self, result: FrameResult) -> &FrameResult {
        self.segmenter.push(&result.issues);
        self.frames.push(result);
        &self.frames[self.frames.len() - 1]
    }

    /// Frames classified so far.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Segment everything pushed and produce the report.
    pub fn finish(self) -> BatchReport {
        self.into_report(false)
    }

    /// Stop early; the report covers the frames pushed so far.
    pub fn cancel(self) -> BatchReport {
        self.into_report(true)
    }

    fn into_report(self, cancelled: bool) -> BatchReport {
        let intervals = self.segmenter.finish();
        let summary = summarize(&intervals, self.session.settings.timing);
        self.session.stats.record_batch();
        BatchReport {
            frames: self.frames,
            summary,
            intervals,
            cancelled,
        }
    }
}
