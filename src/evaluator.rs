use crate::{
    checks::{self, Verdict},
    error::Error,
    gate::{self, ConfidenceMask, DETECTION_CONFIDENCE},
    pose::Detection,
    provider::KeypointProvider,
};
use num_traits::{FromPrimitive, ToPrimitive};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::{fmt, path::Path};
use tracing::{debug, info, warn};

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, num_derive::FromPrimitive, num_derive::ToPrimitive,
)]
pub enum CheckKind {
    LimbPresence,
    Proportions,
    JointAngles,
    NoSelfIntersection,
    Symmetry,
    HandIntegrity,
}

pub const NUM_CHECKS: usize = 6;

impl CheckKind {
    pub const ALL: [CheckKind; NUM_CHECKS] = [
        CheckKind::LimbPresence,
        CheckKind::Proportions,
        CheckKind::JointAngles,
        CheckKind::NoSelfIntersection,
        CheckKind::Symmetry,
        CheckKind::HandIntegrity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LimbPresence => "limb_presence",
            Self::Proportions => "proportions",
            Self::JointAngles => "joint_angles",
            Self::NoSelfIntersection => "no_self_intersection",
            Self::Symmetry => "symmetry",
            Self::HandIntegrity => "hand_integrity",
        }
    }

    fn idx(self) -> usize {
        // discriminants are 0..NUM_CHECKS
        self.to_usize().unwrap_or_default()
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-check outcome. `NotApplicable` checks were never run and do not
/// contribute to the score.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Pass,
    Fail,
    Indeterminate,
    NotApplicable,
}

impl CheckOutcome {
    pub fn score(self) -> i32 {
        match self {
            Self::Pass | Self::Indeterminate => 1,
            Self::Fail => -1,
            Self::NotApplicable => 0,
        }
    }
}

impl Default for CheckOutcome {
    fn default() -> Self {
        Self::NotApplicable
    }
}

impl From<Verdict> for CheckOutcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => Self::Pass,
            Verdict::Fail => Self::Fail,
            Verdict::Indeterminate => Self::Indeterminate,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CheckResults([CheckOutcome; NUM_CHECKS]);

impl CheckResults {
    pub fn get(&self, check: CheckKind) -> CheckOutcome {
        self.0[check.idx()]
    }

    pub fn set(&mut self, check: CheckKind, outcome: CheckOutcome) {
        self.0[check.idx()] = outcome;
    }

    pub fn iter(&self) -> impl Iterator<Item = (CheckKind, CheckOutcome)> + '_ {
        self.0.iter().enumerate().filter_map(|(i, &outcome)| {
            CheckKind::from_usize(i).map(|check| (check, outcome))
        })
    }

    /// +1 per pass, -1 per fail, 0 per not-applicable check.
    pub fn score(&self) -> i32 {
        self.0.iter().map(|outcome| outcome.score()).sum()
    }

    pub fn failed(&self) -> Vec<CheckKind> {
        self.iter()
            .filter(|&(_, outcome)| outcome == CheckOutcome::Fail)
            .map(|(check, _)| check)
            .collect()
    }
}

impl Serialize for CheckResults {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(NUM_CHECKS))?;
        for (check, outcome) in self.iter() {
            map.serialize_entry(check.name(), &outcome)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Assessment {
    pub score: i32,
    pub checks: CheckResults,
    pub reason: String,
}

/// Result of evaluating one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Checks ran against the primary person.
    Evaluated(Assessment),
    /// No person was detected in the image.
    NoSubject,
    /// The image could not be evaluated at all.
    InputError(String),
}

pub const ALL_PASSED: &str = "all checks passed";

fn reason_for(checks: &CheckResults) -> String {
    let failed = checks.failed();
    if failed.is_empty() {
        return ALL_PASSED.to_owned();
    }
    let names: Vec<_> = failed.iter().map(|check| check.name()).collect();
    format!("failed checks: {}", names.join(", "))
}

/// Render an error with its chain of sources.
pub(crate) fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Runs every applicable check over the primary person of an image.
///
/// Only the first body detection is evaluated; additional people in the
/// frame are ignored.
pub struct PoseEvaluator<P> {
    provider: P,
}

impl<P> PoseEvaluator<P>
where
    P: KeypointProvider,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn evaluate(&self, image: &Path) -> Evaluation {
        info!(?image, "evaluating pose");
        match self.try_evaluate(image) {
            Ok(evaluation) => evaluation,
            Err(error) => {
                let reason = format!("evaluation failed: {}", describe(&error));
                warn!(%reason);
                Evaluation::InputError(reason)
            }
        }
    }

    fn try_evaluate(&self, image: &Path) -> Result<Evaluation, Error> {
        if !image.exists() {
            return Err(Error::ImageNotFound(image.to_path_buf()));
        }

        let people = self.provider.detect_body(image)?;
        let hands = self.provider.detect_hands(image)?;
        info!(people = people.len(), hands = hands.len(), "detections");

        let person = match people.first() {
            Some(person) => person,
            None => return Ok(Evaluation::NoSubject),
        };

        let checks = run_checks(person, &hands)?;
        let score = checks.score();
        let reason = reason_for(&checks);
        info!(score, %reason, "evaluation finished");

        Ok(Evaluation::Evaluated(Assessment {
            score,
            checks,
            reason,
        }))
    }
}

/// Gate and run all checks for one person.
pub fn run_checks(person: &Detection, hands: &[Detection]) -> Result<CheckResults, Error> {
    let mask = ConfidenceMask::new(person, DETECTION_CONFIDENCE);
    debug!(detected = ?mask.indices(), "confident keypoints");

    let mut results = CheckResults::default();
    for check in CheckKind::ALL {
        if !gate::applicable(check, &mask, hands.len())? {
            continue;
        }
        let verdict = match check {
            CheckKind::LimbPresence => checks::limb_presence(person)?,
            CheckKind::Proportions => checks::proportions(person)?,
            CheckKind::JointAngles => checks::elbow_angles(person)?,
            CheckKind::NoSelfIntersection => checks::no_self_intersection(person)?,
            CheckKind::Symmetry => checks::symmetry(person)?,
            CheckKind::HandIntegrity => checks::hand_integrity(hands),
        };
        debug!(%check, ?verdict);
        results.set(check, verdict.into());
    }
    Ok(results)
}
