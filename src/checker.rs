use crate::{
    config::CheckerConfig,
    error::Error,
    evaluator::{describe, CheckResults, Evaluation, PoseEvaluator},
    provider::KeypointProvider,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use std::io::Write;
use tracing::{debug, info, warn};

pub const NO_SUBJECT_REASON: &str = "no people detected (acceptable)";

/// Outcome of checking one encoded image against the score threshold.
///
/// `score` is `None` when the image could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CheckReport {
    pub accepted: bool,
    pub score: Option<i32>,
    pub checks: CheckResults,
    pub reason: String,
}

impl CheckReport {
    fn rejected(reason: String) -> Self {
        Self {
            accepted: false,
            score: None,
            checks: CheckResults::default(),
            reason,
        }
    }
}

/// Decode a base64 image payload, stripping an optional data-URI header.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, Error> {
    let payload = match encoded.split_once("base64,") {
        Some((_, payload)) => payload,
        None => encoded,
    };
    let payload: String = payload.split_whitespace().collect();
    BASE64_STANDARD
        .decode(payload)
        .map_err(Error::DecodeBase64)
}

pub struct PhotoChecker<P> {
    evaluator: PoseEvaluator<P>,
    config: CheckerConfig,
}

impl<P> PhotoChecker<P>
where
    P: KeypointProvider,
{
    pub fn new(provider: P, config: CheckerConfig) -> Self {
        Self {
            evaluator: PoseEvaluator::new(provider),
            config,
        }
    }

    pub fn evaluator(&self) -> &PoseEvaluator<P> {
        &self.evaluator
    }

    /// Check an encoded image against the configured minimum score.
    pub fn check(&self, encoded: &str) -> CheckReport {
        self.check_with_threshold(encoded, self.config.min_score)
    }

    pub fn check_with_threshold(&self, encoded: &str, min_score: i32) -> CheckReport {
        let evaluation = match decode_image(encoded).and_then(|image| self.evaluate_bytes(&image)) {
            Ok(evaluation) => evaluation,
            Err(error) => {
                let reason = describe(&error);
                warn!(%reason, "photo check failed");
                return CheckReport::rejected(reason);
            }
        };

        match evaluation {
            Evaluation::NoSubject => {
                info!("no people detected, accepting");
                CheckReport {
                    accepted: true,
                    score: Some(0),
                    checks: CheckResults::default(),
                    reason: NO_SUBJECT_REASON.to_owned(),
                }
            }
            Evaluation::InputError(reason) => CheckReport::rejected(reason),
            Evaluation::Evaluated(assessment) => {
                let accepted = assessment.score >= min_score;
                info!(score = assessment.score, min_score, accepted, "photo checked");
                CheckReport {
                    accepted,
                    score: Some(assessment.score),
                    checks: assessment.checks,
                    reason: assessment.reason,
                }
            }
        }
    }

    /// Write raw image bytes to a scoped temporary file and evaluate it. The
    /// file is removed when this returns, whatever the outcome.
    pub fn evaluate_bytes(&self, image: &[u8]) -> Result<Evaluation, Error> {
        let mut file = tempfile::Builder::new()
            .prefix("posecheck-")
            .suffix(".jpg")
            .tempfile()
            .map_err(Error::CreateTempFile)?;
        file.write_all(image).map_err(Error::WriteTempFile)?;
        file.flush().map_err(Error::WriteTempFile)?;
        debug!(path = ?file.path(), bytes = image.len(), "wrote temporary image");

        Ok(self.evaluator.evaluate(file.path()))
    }
}
