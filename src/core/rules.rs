//! Activity rule sets and the registry that resolves them.
//!
//! A [`RuleSet`] is an immutable value: the activity key, its rules and the
//! thresholds those rules read. Sessions resolve one from the
//! [`ActivityRegistry`] once and share it through an `Arc`.

use crate::config::ConfigError;
use crate::core::activities;
use crate::core::geometry::{angle_at, inclination_at, Angle};
use crate::pose::types::{Keypoint, KeypointFrame, Landmark};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Stable identifier of a posture issue.
///
/// Codes are only ever added, never renamed or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueCode(&'static str);

impl IssueCode {
    pub const KNEE_OVER_TOE: IssueCode = IssueCode("knee_over_toe");
    pub const HUNCHED_BACK: IssueCode = IssueCode("hunched_back");
    pub const NECK_BEND: IssueCode = IssueCode("neck_bend");
    pub const SLOUCHED_SEAT: IssueCode = IssueCode("slouched_seat");
    pub const POSE_UNDETECTED: IssueCode = IssueCode("pose_undetected");

    /// Define a code for a custom rule.
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for IssueCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Issues detected in one frame. Empty means good posture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IssueSet(BTreeSet<IssueCode>);

impl IssueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set reported when no usable pose is present.
    pub fn pose_undetected() -> Self {
        let mut set = Self::new();
        set.insert(IssueCode::POSE_UNDETECTED);
        set
    }

    pub fn insert(&mut self, code: IssueCode) -> bool {
        self.0.insert(code)
    }

    pub fn contains(&self, code: IssueCode) -> bool {
        self.0.contains(&code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this frame counts as good posture.
    pub fn is_good(&self) -> bool {
        self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = IssueCode> + '_ {
        self.0.iter().copied()
    }

    /// Codes in a stable order.
    pub fn codes(&self) -> Vec<IssueCode> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<IssueCode> for IssueSet {
    fn from_iter<T: IntoIterator<Item = IssueCode>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Named numeric thresholds for one activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thresholds(BTreeMap<String, f64>);

impl Thresholds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Result of evaluating a single rule on a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleOutcome {
    /// The measurement crossed its threshold
    Triggered(f64),
    Clear,
    /// An input was missing or below the confidence floor
    Skipped,
}

impl RuleOutcome {
    /// Apply `exceeds` to a measurement that may not have been computable.
    pub fn check(measurement: Option<f64>, exceeds: impl FnOnce(f64) -> bool) -> Self {
        match measurement {
            None => RuleOutcome::Skipped,
            Some(value) if exceeds(value) => RuleOutcome::Triggered(value),
            Some(_) => RuleOutcome::Clear,
        }
    }
}

/// Everything a rule may read while evaluating one frame.
pub struct RuleInput<'a> {
    pub frame: &'a KeypointFrame,
    pub thresholds: &'a Thresholds,
    pub min_confidence: f64,
}

impl<'a> RuleInput<'a> {
    pub fn point(&self, landmark: Landmark) -> Option<&'a Keypoint> {
        self.frame.get(landmark)
    }

    pub fn threshold(&self, name: &str) -> Option<f64> {
        self.thresholds.get(name)
    }

    /// Angle at `joints[1]` on this frame.
    pub fn angle(&self, joints: [Landmark; 3]) -> Angle {
        angle_at(self.frame, joints, self.min_confidence)
    }

    /// Inclination of `base`→`top` from vertical on this frame.
    pub fn inclination(&self, top: Landmark, base: Landmark) -> Angle {
        inclination_at(self.frame, top, base, self.min_confidence)
    }
}

/// A pure posture rule producing at most one issue code.
#[derive(Clone, Copy)]
pub struct Rule {
    pub code: IssueCode,
    /// Landmarks the rule reads
    pub landmarks: &'static [Landmark],
    /// Threshold names the rule reads
    pub thresholds: &'static [&'static str],
    pub evaluate: fn(&RuleInput<'_>) -> RuleOutcome,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("code", &self.code)
            .field("landmarks", &self.landmarks)
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

/// The rules and thresholds for one activity.
#[derive(Debug, Clone)]
pub struct RuleSet {
    activity: String,
    rules: Vec<Rule>,
    thresholds: Thresholds,
}

impl RuleSet {
    /// Build a rule set, checking that every threshold a rule reads is defined.
    pub fn new(
        activity: impl Into<String>,
        rules: Vec<Rule>,
        thresholds: Thresholds,
    ) -> Result<Self, ConfigError> {
        let activity = activity.into();
        for rule in &rules {
            if let Some(missing) = rule.thresholds.iter().find(|t| !thresholds.contains(t)) {
                return Err(ConfigError::MissingThreshold {
                    activity,
                    threshold: (*missing).to_string(),
                });
            }
        }
        Ok(Self {
            activity,
            rules,
            thresholds,
        })
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Replace one threshold value. Only names the set already defines are accepted.
    pub fn with_threshold(mut self, name: &str, value: f64) -> Result<Self, ConfigError> {
        if !self.thresholds.contains(name) {
            return Err(ConfigError::UnknownThreshold {
                activity: self.activity,
                threshold: name.to_string(),
            });
        }
        self.thresholds = self.thresholds.with(name, value);
        Ok(self)
    }

    /// Union of the landmarks read by all rules.
    pub fn required_landmarks(&self) -> BTreeSet<Landmark> {
        self.rules
            .iter()
            .flat_map(|r| r.landmarks.iter().copied())
            .collect()
    }

    /// Issue codes the rules can emit.
    pub fn codes(&self) -> BTreeSet<IssueCode> {
        self.rules.iter().map(|r| r.code).collect()
    }
}

/// Maps activity keys to rule sets.
#[derive(Debug, Clone, Default)]
pub struct ActivityRegistry {
    rule_sets: BTreeMap<String, Arc<RuleSet>>,
    aliases: BTreeMap<String, String>,
}

impl ActivityRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in activities.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(activities::squat());
        registry.register(activities::desk_sitting());
        registry.alias("sitting", activities::DESK_SITTING);
        registry
    }

    /// Add or replace a rule set under its activity key.
    pub fn register(&mut self, rule_set: RuleSet) {
        let key = rule_set.activity().to_string();
        if self.rule_sets.contains_key(&key) {
            tracing::debug!(activity = %key, "replacing registered rule set");
        }
        self.rule_sets.insert(key, Arc::new(rule_set));
    }

    /// Make `alias` resolve to the activity registered as `activity`.
    pub fn alias(&mut self, alias: impl Into<String>, activity: impl Into<String>) {
        self.aliases.insert(alias.into(), activity.into());
    }

    /// Look up a rule set by activity key or alias.
    pub fn resolve(&self, activity: &str) -> Result<Arc<RuleSet>, ConfigError> {
        let key = self
            .aliases
            .get(activity)
            .map(String::as_str)
            .unwrap_or(activity);
        self.rule_sets
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownActivity {
                activity: activity.to_string(),
                known: self.activities().join(", "),
            })
    }

    /// Registered activity keys, sorted.
    pub fn activities(&self) -> Vec<String> {
        self.rule_sets.keys().cloned().collect()
    }

    /// Apply per-activity threshold overrides from configuration.
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, Thresholds>,
    ) -> Result<(), ConfigError> {
        for (activity, values) in overrides {
            let current = self.resolve(activity)?;
            let mut updated = (*current).clone();
            for (name, value) in values.iter() {
                updated = updated.with_threshold(name, value)?;
            }
            self.register(updated);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always(_: &RuleInput<'_>) -> RuleOutcome {
        RuleOutcome::Triggered(1.0)
    }

    const LEAN: Rule = Rule {
        code: IssueCode::new("lean"),
        landmarks: &[Landmark::Nose],
        thresholds: &["lean_max"],
        evaluate: always,
    };

    #[test]
    fn test_issue_code_serializes_as_string() {
        let set: IssueSet = [IssueCode::NECK_BEND, IssueCode::HUNCHED_BACK]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["hunched_back","neck_bend"]"#);
    }

    #[test]
    fn test_rule_set_requires_declared_thresholds() {
        let err = RuleSet::new("plank", vec![LEAN], Thresholds::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingThreshold { .. }));

        let ok = RuleSet::new("plank", vec![LEAN], Thresholds::new().with("lean_max", 3.0));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_unknown_activity_is_an_error() {
        let registry = ActivityRegistry::with_builtins();
        match registry.resolve("yoga") {
            Err(ConfigError::UnknownActivity { activity, known }) => {
                assert_eq!(activity, "yoga");
                assert!(known.contains("squat"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_alias_resolves_to_builtin() {
        let registry = ActivityRegistry::with_builtins();
        let rule_set = registry.resolve("sitting").unwrap();
        assert_eq!(rule_set.activity(), "desk_sitting");
    }

    #[test]
    fn test_register_custom_activity() {
        let mut registry = ActivityRegistry::with_builtins();
        let plank =
            RuleSet::new("plank", vec![LEAN], Thresholds::new().with("lean_max", 3.0)).unwrap();
        registry.register(plank);
        assert_eq!(registry.activities(), vec!["desk_sitting", "plank", "squat"]);
        assert!(registry.resolve("plank").unwrap().codes().contains(&IssueCode::new("lean")));
    }

    #[test]
    fn test_overrides_replace_thresholds() {
        let mut registry = ActivityRegistry::with_builtins();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "squat".to_string(),
            Thresholds::new().with(activities::KNEE_TOE_OFFSET_MAX, 0.1),
        );
        registry.apply_overrides(&overrides).unwrap();
        let squat = registry.resolve("squat").unwrap();
        assert_eq!(squat.thresholds().get(activities::KNEE_TOE_OFFSET_MAX), Some(0.1));
    }

    #[test]
    fn test_overrides_reject_unknown_names() {
        let mut registry = ActivityRegistry::with_builtins();
        let mut overrides = BTreeMap::new();
        overrides.insert("squat".to_string(), Thresholds::new().with("bogus", 1.0));
        assert!(matches!(
            registry.apply_overrides(&overrides),
            Err(ConfigError::UnknownThreshold { .. })
        ));

        let mut overrides = BTreeMap::new();
        overrides.insert("yoga".to_string(), Thresholds::new());
        assert!(matches!(
            registry.apply_overrides(&overrides),
            Err(ConfigError::UnknownActivity { .. })
        ));
    }
}
