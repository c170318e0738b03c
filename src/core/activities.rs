//! Built-in activities.
//!
//! Rules read the left side of the body and assume a side-on camera with the
//! subject facing +x.

use crate::core::geometry::{horizontal_offset, vertical_offset};
use crate::core::rules::{IssueCode, Rule, RuleInput, RuleOutcome, RuleSet, Thresholds};
use crate::pose::types::Landmark;

pub const SQUAT: &str = "squat";
pub const DESK_SITTING: &str = "desk_sitting";

/// Max knee-past-toe horizontal offset (normalized units)
pub const KNEE_TOE_OFFSET_MAX: &str = "knee_toe_offset_max";
/// Max torso lean from vertical during a squat (degrees)
pub const TORSO_LEAN_MAX_DEG: &str = "torso_lean_max_deg";
/// Resting ear-over-shoulder inclination (degrees)
pub const NECK_NEUTRAL_DEG: &str = "neck_neutral_deg";
/// Allowed deviation from the neutral neck inclination (degrees)
pub const NECK_BEND_MAX_DEG: &str = "neck_bend_max_deg";
/// Max seated torso lean from vertical (degrees)
pub const BACK_LEAN_MAX_DEG: &str = "back_lean_max_deg";
/// Max distance the hip may sit below the knee (normalized units)
pub const HIP_DROP_MAX: &str = "hip_drop_max";

/// Squat: knees tracking past the toes, torso folding forward.
pub fn squat() -> RuleSet {
    let thresholds = Thresholds::new()
        .with(KNEE_TOE_OFFSET_MAX, 0.05)
        .with(TORSO_LEAN_MAX_DEG, 45.0);

    RuleSet::new(
        SQUAT,
        vec![
            Rule {
                code: IssueCode::KNEE_OVER_TOE,
                landmarks: &[Landmark::LeftKnee, Landmark::LeftFootIndex],
                thresholds: &[KNEE_TOE_OFFSET_MAX],
                evaluate: knee_over_toe,
            },
            Rule {
                code: IssueCode::HUNCHED_BACK,
                landmarks: &[Landmark::LeftShoulder, Landmark::LeftHip],
                thresholds: &[TORSO_LEAN_MAX_DEG],
                evaluate: squat_torso_lean,
            },
        ],
        thresholds,
    )
    .unwrap_or_else(|e| unreachable!("built-in squat rules are consistent: {e}"))
}

/// Desk sitting: forward head, rounded back, sliding out of the seat.
pub fn desk_sitting() -> RuleSet {
    let thresholds = Thresholds::new()
        .with(NECK_NEUTRAL_DEG, 10.0)
        .with(NECK_BEND_MAX_DEG, 20.0)
        .with(BACK_LEAN_MAX_DEG, 20.0)
        .with(HIP_DROP_MAX, 0.05);

    RuleSet::new(
        DESK_SITTING,
        vec![
            Rule {
                code: IssueCode::NECK_BEND,
                landmarks: &[Landmark::LeftEar, Landmark::LeftShoulder],
                thresholds: &[NECK_NEUTRAL_DEG, NECK_BEND_MAX_DEG],
                evaluate: neck_bend,
            },
            Rule {
                code: IssueCode::HUNCHED_BACK,
                landmarks: &[Landmark::LeftShoulder, Landmark::LeftHip],
                thresholds: &[BACK_LEAN_MAX_DEG],
                evaluate: seated_back_lean,
            },
            Rule {
                code: IssueCode::SLOUCHED_SEAT,
                landmarks: &[Landmark::LeftHip, Landmark::LeftKnee],
                thresholds: &[HIP_DROP_MAX],
                evaluate: slouched_seat,
            },
        ],
        thresholds,
    )
    .unwrap_or_else(|e| unreachable!("built-in desk rules are consistent: {e}"))
}

fn knee_over_toe(input: &RuleInput<'_>) -> RuleOutcome {
    let (Some(toe), Some(knee), Some(limit)) = (
        input.point(Landmark::LeftFootIndex),
        input.point(Landmark::LeftKnee),
        input.threshold(KNEE_TOE_OFFSET_MAX),
    ) else {
        return RuleOutcome::Skipped;
    };
    let offset = horizontal_offset(toe, knee, input.min_confidence);
    RuleOutcome::check(offset.value(), |dx| dx > limit)
}

fn torso_lean(input: &RuleInput<'_>, limit_name: &str) -> RuleOutcome {
    let Some(limit) = input.threshold(limit_name) else {
        return RuleOutcome::Skipped;
    };
    let lean = input.inclination(Landmark::LeftShoulder, Landmark::LeftHip);
    RuleOutcome::check(lean.value(), |deg| deg > limit)
}

fn squat_torso_lean(input: &RuleInput<'_>) -> RuleOutcome {
    torso_lean(input, TORSO_LEAN_MAX_DEG)
}

fn seated_back_lean(input: &RuleInput<'_>) -> RuleOutcome {
    torso_lean(input, BACK_LEAN_MAX_DEG)
}

fn neck_bend(input: &RuleInput<'_>) -> RuleOutcome {
    let (Some(neutral), Some(limit)) = (
        input.threshold(NECK_NEUTRAL_DEG),
        input.threshold(NECK_BEND_MAX_DEG),
    ) else {
        return RuleOutcome::Skipped;
    };
    let inclination = input.inclination(Landmark::LeftEar, Landmark::LeftShoulder);
    RuleOutcome::check(inclination.value(), |deg| (deg - neutral).abs() > limit)
}

fn slouched_seat(input: &RuleInput<'_>) -> RuleOutcome {
    let (Some(knee), Some(hip), Some(limit)) = (
        input.point(Landmark::LeftKnee),
        input.point(Landmark::LeftHip),
        input.threshold(HIP_DROP_MAX),
    ) else {
        return RuleOutcome::Skipped;
    };
    let drop = vertical_offset(knee, hip, input.min_confidence);
    RuleOutcome::check(drop.value(), |dy| dy > limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::MIN_CONFIDENCE;
    use crate::pose::types::{Keypoint, KeypointFrame};

    fn input<'a>(frame: &'a KeypointFrame, thresholds: &'a Thresholds) -> RuleInput<'a> {
        RuleInput {
            frame,
            thresholds,
            min_confidence: MIN_CONFIDENCE,
        }
    }

    #[test]
    fn test_builtin_thresholds_present() {
        let squat = squat();
        assert_eq!(squat.thresholds().get(KNEE_TOE_OFFSET_MAX), Some(0.05));
        let desk = desk_sitting();
        assert_eq!(desk.thresholds().get(NECK_NEUTRAL_DEG), Some(10.0));
        assert_eq!(desk.rules().len(), 3);
    }

    #[test]
    fn test_knee_over_toe_outcomes() {
        let thresholds = squat().thresholds().clone();
        let frame = KeypointFrame::undetected(0)
            .with_keypoint(Landmark::LeftFootIndex, Keypoint::new(0.50, 0.90, 1.0))
            .with_keypoint(Landmark::LeftKnee, Keypoint::new(0.58, 0.70, 1.0));
        match knee_over_toe(&input(&frame, &thresholds)) {
            RuleOutcome::Triggered(dx) => assert!((dx - 0.08).abs() < 1e-9),
            other => panic!("expected trigger, got {other:?}"),
        }

        let frame = frame.with_keypoint(Landmark::LeftKnee, Keypoint::new(0.53, 0.70, 1.0));
        assert_eq!(knee_over_toe(&input(&frame, &thresholds)), RuleOutcome::Clear);

        let frame = frame.with_keypoint(Landmark::LeftKnee, Keypoint::new(0.70, 0.70, 0.3));
        assert_eq!(knee_over_toe(&input(&frame, &thresholds)), RuleOutcome::Skipped);
    }

    #[test]
    fn test_slouched_seat_detects_hip_below_knee() {
        let thresholds = desk_sitting().thresholds().clone();
        let frame = KeypointFrame::undetected(0)
            .with_keypoint(Landmark::LeftKnee, Keypoint::new(0.6, 0.60, 0.9))
            .with_keypoint(Landmark::LeftHip, Keypoint::new(0.4, 0.70, 0.9));
        assert!(matches!(
            slouched_seat(&input(&frame, &thresholds)),
            RuleOutcome::Triggered(_)
        ));

        let level = frame.with_keypoint(Landmark::LeftHip, Keypoint::new(0.4, 0.61, 0.9));
        assert_eq!(slouched_seat(&input(&level, &thresholds)), RuleOutcome::Clear);
    }

    #[test]
    fn test_neck_bend_reports_inclination() {
        let thresholds = desk_sitting().thresholds().clone();
        let frame = KeypointFrame::undetected(0)
            .with_keypoint(Landmark::LeftShoulder, Keypoint::new(0.5, 0.5, 1.0))
            .with_keypoint(Landmark::LeftEar, Keypoint::new(0.6, 0.4, 1.0));
        match neck_bend(&input(&frame, &thresholds)) {
            RuleOutcome::Triggered(deg) => assert!((deg - 45.0).abs() < 1e-9),
            other => panic!("expected trigger, got {other:?}"),
        }

        let hidden = frame.with_keypoint(Landmark::LeftEar, Keypoint::new(0.6, 0.4, 0.1));
        assert_eq!(neck_bend(&input(&hidden, &thresholds)), RuleOutcome::Skipped);
    }

    #[test]
    fn test_missing_threshold_skips_rule() {
        let frame = KeypointFrame::undetected(0)
            .with_keypoint(Landmark::LeftShoulder, Keypoint::new(0.9, 0.5, 1.0))
            .with_keypoint(Landmark::LeftHip, Keypoint::new(0.5, 0.5, 1.0));
        let empty = Thresholds::new();
        assert_eq!(seated_back_lean(&input(&frame, &empty)), RuleOutcome::Skipped);
    }
}
