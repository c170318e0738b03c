//! Per-frame classification.
//!
//! Classification is a pure function of the frame, the rule set and the
//! confidence floor, so batch and live paths produce identical results.

use crate::core::rules::{IssueCode, IssueSet, RuleInput, RuleOutcome, RuleSet};
use crate::pose::types::KeypointFrame;
use std::collections::{BTreeMap, BTreeSet};

/// Detailed classification of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameVerdict {
    pub issues: IssueSet,
    /// Measured value behind each triggered issue (degrees or normalized units)
    pub measurements: BTreeMap<IssueCode, f64>,
    /// Rules that could not be evaluated on this frame
    pub skipped: Vec<IssueCode>,
    /// Whether the frame was rejected as having no usable pose
    pub undetected: bool,
}

/// Classify a frame, returning only its issue set.
pub fn classify(frame: &KeypointFrame, rule_set: &RuleSet, min_confidence: f64) -> IssueSet {
    classify_detailed(frame, rule_set, min_confidence).issues
}

/// Classify a frame and report which rules were skipped.
pub fn classify_detailed(
    frame: &KeypointFrame,
    rule_set: &RuleSet,
    min_confidence: f64,
) -> FrameVerdict {
    if !has_pose(frame, rule_set) {
        return FrameVerdict {
            issues: IssueSet::pose_undetected(),
            measurements: BTreeMap::new(),
            skipped: Vec::new(),
            undetected: true,
        };
    }

    let input = RuleInput {
        frame,
        thresholds: rule_set.thresholds(),
        min_confidence,
    };

    let mut issues = IssueSet::new();
    let mut measurements = BTreeMap::new();
    let mut skipped = Vec::new();
    for rule in rule_set.rules() {
        match (rule.evaluate)(&input) {
            RuleOutcome::Triggered(value) => {
                issues.insert(rule.code);
                measurements.entry(rule.code).or_insert(value);
            }
            RuleOutcome::Clear => {}
            RuleOutcome::Skipped => {
                tracing::trace!(
                    frame = frame.frame_index,
                    rule = %rule.code,
                    "rule skipped on low confidence"
                );
                skipped.push(rule.code);
            }
        }
    }

    FrameVerdict {
        issues,
        measurements,
        skipped,
        undetected: false,
    }
}

/// Every code `classify` may emit for this rule set.
pub fn declared_codes(rule_set: &RuleSet) -> BTreeSet<IssueCode> {
    let mut codes = rule_set.codes();
    codes.insert(IssueCode::POSE_UNDETECTED);
    codes
}

/// A frame carries a pose if it is well formed and at least one landmark the
/// activity reads was detected.
fn has_pose(frame: &KeypointFrame, rule_set: &RuleSet) -> bool {
    if !frame.is_well_formed() {
        tracing::warn!(
            frame = frame.frame_index,
            landmarks = frame.keypoints.len(),
            "malformed keypoint frame"
        );
        return false;
    }
    rule_set
        .required_landmarks()
        .iter()
        .any(|l| frame.get(*l).is_some_and(|k| k.is_detected()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::activities;
    use crate::core::geometry::MIN_CONFIDENCE;
    use crate::pose::types::{Keypoint, Landmark};

    /// Upright side-on pose with every landmark fully confident.
    fn standing() -> KeypointFrame {
        KeypointFrame::new(0, vec![Keypoint::new(0.5, 0.5, 1.0); crate::pose::LANDMARK_COUNT])
            .with_keypoint(Landmark::LeftEar, Keypoint::new(0.50, 0.15, 1.0))
            .with_keypoint(Landmark::LeftShoulder, Keypoint::new(0.50, 0.30, 1.0))
            .with_keypoint(Landmark::LeftHip, Keypoint::new(0.50, 0.60, 1.0))
            .with_keypoint(Landmark::LeftKnee, Keypoint::new(0.50, 0.80, 1.0))
            .with_keypoint(Landmark::LeftFootIndex, Keypoint::new(0.55, 0.95, 1.0))
    }

    #[test]
    fn test_squat_knee_over_toe_example() {
        let frame = standing()
            .with_keypoint(Landmark::LeftFootIndex, Keypoint::new(0.50, 0.95, 1.0))
            .with_keypoint(Landmark::LeftKnee, Keypoint::new(0.58, 0.80, 1.0));
        let verdict = classify_detailed(&frame, &activities::squat(), MIN_CONFIDENCE);
        assert_eq!(verdict.issues.codes(), vec![IssueCode::KNEE_OVER_TOE]);
        let offset = verdict.measurements[&IssueCode::KNEE_OVER_TOE];
        assert!((offset - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_desk_neck_bend_example() {
        // Ear 35° forward of vertical above the shoulder
        let angle = 35.0_f64.to_radians();
        let shoulder = Keypoint::new(0.50, 0.30, 1.0);
        let ear = Keypoint::new(0.50 + 0.15 * angle.sin(), 0.30 - 0.15 * angle.cos(), 1.0);
        let frame = standing()
            .with_keypoint(Landmark::LeftShoulder, shoulder)
            .with_keypoint(Landmark::LeftEar, ear)
            .with_keypoint(Landmark::LeftKnee, Keypoint::new(0.70, 0.60, 1.0));
        let verdict = classify_detailed(&frame, &activities::desk_sitting(), MIN_CONFIDENCE);
        assert_eq!(verdict.issues.codes(), vec![IssueCode::NECK_BEND]);
        assert!((verdict.measurements[&IssueCode::NECK_BEND] - 35.0).abs() < 1e-6);
    }

    #[test]
    fn test_all_zero_confidence_is_undetected() {
        let frame = KeypointFrame::undetected(3);
        for rule_set in [activities::squat(), activities::desk_sitting()] {
            let verdict = classify_detailed(&frame, &rule_set, MIN_CONFIDENCE);
            assert!(verdict.undetected);
            assert_eq!(verdict.issues, IssueSet::pose_undetected());
            assert!(verdict.measurements.is_empty());
            assert!(!verdict.issues.is_good());
        }
    }

    #[test]
    fn test_wrong_landmark_count_is_undetected() {
        let frame = KeypointFrame::new(0, vec![Keypoint::new(0.5, 0.5, 1.0); 17]);
        let issues = classify(&frame, &activities::squat(), MIN_CONFIDENCE);
        assert_eq!(issues, IssueSet::pose_undetected());
    }

    #[test]
    fn test_occluded_landmark_skips_rule_only() {
        let frame = standing()
            .with_keypoint(Landmark::LeftFootIndex, Keypoint::new(0.10, 0.95, 0.2))
            .with_keypoint(Landmark::LeftShoulder, Keypoint::new(0.90, 0.60, 1.0));
        let verdict = classify_detailed(&frame, &activities::squat(), MIN_CONFIDENCE);
        assert!(!verdict.undetected);
        assert_eq!(verdict.skipped, vec![IssueCode::KNEE_OVER_TOE]);
        assert_eq!(verdict.issues.codes(), vec![IssueCode::HUNCHED_BACK]);
    }

    #[test]
    fn test_upright_pose_is_good_for_both_activities() {
        let frame = standing();
        assert!(classify(&frame, &activities::squat(), MIN_CONFIDENCE).is_good());
        assert!(classify(&frame, &activities::desk_sitting(), MIN_CONFIDENCE).is_good());
    }

    #[test]
    fn test_issues_are_declared_codes() {
        let rule_set = activities::desk_sitting();
        let declared = declared_codes(&rule_set);
        let frame = standing()
            .with_keypoint(Landmark::LeftEar, Keypoint::new(0.80, 0.30, 1.0))
            .with_keypoint(Landmark::LeftShoulder, Keypoint::new(0.70, 0.40, 1.0))
            .with_keypoint(Landmark::LeftHip, Keypoint::new(0.40, 0.80, 1.0));
        let issues = classify(&frame, &rule_set, MIN_CONFIDENCE);
        assert!(!issues.is_empty());
        assert!(issues.iter().all(|c| declared.contains(&c)));
    }
}
