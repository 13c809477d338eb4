//! Bounded generate, check, repair loop.
//!
//! Each run moves `Pending -> (Generating -> Evaluating) x N -> Accepted | Exhausted`.
//! Attempts are strictly sequential: the outcome of one decides whether the
//! next runs, and with which prompt.

use crate::{
    backend::{generate, GeneratedImage, GenerationBackend, GenerationRequest},
    checker::{CheckReport, PhotoChecker},
    config::{PollConfig, RetryConfig},
    error::Error,
    evaluator::describe,
    provider::KeypointProvider,
    repair::repair_prompt,
    store::{AcceptedResult, ResultStore},
};
use indicatif::ProgressBar;
use tracing::{info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Generating,
    Evaluating,
    Accepted,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttemptOutcome {
    /// The backend produced no image; the attempt still counts.
    GenerationFailed { error: String },
    Rejected { report: CheckReport },
    Accepted { report: CheckReport },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Attempt {
    pub number: usize,
    pub prompt: String,
    pub outcome: AttemptOutcome,
    /// Prompt carried into the next attempt after a rejection.
    pub repaired_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RunOutcome {
    pub state: RunState,
    pub accepted: bool,
    pub final_image: Option<GeneratedImage>,
    pub attempts_used: usize,
    /// One entry per failed attempt, `attempt N: <summary>`.
    pub problems: Vec<String>,
    pub attempts: Vec<Attempt>,
}

pub struct RetryController<B, P, S> {
    backend: B,
    checker: PhotoChecker<P>,
    store: S,
    retry: RetryConfig,
    poll: PollConfig,
    progress: Option<ProgressBar>,
}

impl<B, P, S> RetryController<B, P, S>
where
    B: GenerationBackend,
    P: KeypointProvider,
    S: ResultStore,
{
    pub fn new(
        backend: B,
        checker: PhotoChecker<P>,
        store: S,
        retry: RetryConfig,
        poll: PollConfig,
    ) -> Self {
        Self {
            backend,
            checker,
            store,
            retry,
            poll,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run with the configured dimensions and attempt budget.
    pub fn run(&self, prompt: &str) -> Result<RunOutcome, Error> {
        self.run_with_retry(
            prompt,
            self.retry.width,
            self.retry.height,
            self.retry.max_attempts,
        )
    }

    /// Generate until an image passes the photo check or `max_attempts` are
    /// used up. Only an accepted image is persisted; the only error returned
    /// is a failure to persist it.
    pub fn run_with_retry(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        max_attempts: usize,
    ) -> Result<RunOutcome, Error> {
        let mut state = RunState::Pending;
        let mut prompt = prompt.to_owned();
        let mut attempts = Vec::with_capacity(max_attempts);
        let mut problems = Vec::new();

        for number in 1..=max_attempts {
            self.transition(&mut state, RunState::Generating, number, max_attempts);
            let request = GenerationRequest {
                prompt: prompt.clone(),
                width,
                height,
                style: self.retry.style.clone(),
                negative_prompt: self.retry.negative_prompt.clone(),
            };

            let image = match generate(&self.backend, &request, &self.poll) {
                Ok(image) => image,
                Err(error) => {
                    let error = describe(&error);
                    warn!(attempt = number, %error, "generation failed");
                    problems.push(format!("attempt {}: generation failed: {}", number, error));
                    attempts.push(Attempt {
                        number,
                        prompt: prompt.clone(),
                        outcome: AttemptOutcome::GenerationFailed { error },
                        repaired_prompt: None,
                    });
                    continue;
                }
            };
            if image.censored {
                warn!(attempt = number, job = %image.job, "backend flagged image as censored");
            }

            self.transition(&mut state, RunState::Evaluating, number, max_attempts);
            let report = self.checker.check(&image.data);

            if report.accepted {
                self.transition(&mut state, RunState::Accepted, number, max_attempts);
                self.store.persist(&AcceptedResult {
                    prompt: prompt.clone(),
                    attempts_used: number,
                    image: image.clone(),
                    report: report.clone(),
                })?;
                attempts.push(Attempt {
                    number,
                    prompt,
                    outcome: AttemptOutcome::Accepted { report },
                    repaired_prompt: None,
                });
                self.finish(&format!("accepted on attempt {}", number));
                return Ok(RunOutcome {
                    state,
                    accepted: true,
                    final_image: Some(image),
                    attempts_used: number,
                    problems,
                    attempts,
                });
            }

            let repair = repair_prompt(&prompt, &report.checks);
            let summary = match report.score {
                Some(_) => repair.summary(),
                None => report.reason.clone(),
            };
            info!(attempt = number, score = ?report.score, %summary, "image rejected");
            problems.push(format!("attempt {}: {}", number, summary));
            attempts.push(Attempt {
                number,
                prompt: std::mem::replace(&mut prompt, repair.prompt.clone()),
                outcome: AttemptOutcome::Rejected { report },
                repaired_prompt: Some(repair.prompt),
            });
        }

        self.transition(&mut state, RunState::Exhausted, max_attempts, max_attempts);
        self.finish(&format!("no acceptable image after {} attempts", max_attempts));
        Ok(RunOutcome {
            state,
            accepted: false,
            final_image: None,
            attempts_used: attempts.len(),
            problems,
            attempts,
        })
    }

    fn transition(&self, state: &mut RunState, next: RunState, attempt: usize, max: usize) {
        let from = *state;
        info!(attempt, max_attempts = max, ?from, to = ?next, "retry state");
        *state = next;
        if let Some(progress) = &self.progress {
            progress.set_message(format!("attempt {}/{}: {:?}", attempt, max, next));
        }
    }

    fn finish(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress.finish_with_message(message.to_owned());
        }
    }
}
