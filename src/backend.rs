use crate::{config::PollConfig, error::Error, evaluator::describe};
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub style: Option<String>,
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    /// `images` holds base64 encoded image payloads.
    Done { images: Vec<String>, censored: bool },
    Failed(String),
}

/// An image-generation service with asynchronous jobs.
pub trait GenerationBackend {
    fn submit(&self, request: &GenerationRequest) -> Result<JobHandle, Error>;

    fn poll(&self, job: &JobHandle) -> Result<JobStatus, Error>;
}

impl<B> GenerationBackend for &B
where
    B: GenerationBackend + ?Sized,
{
    fn submit(&self, request: &GenerationRequest) -> Result<JobHandle, Error> {
        (**self).submit(request)
    }

    fn poll(&self, job: &JobHandle) -> Result<JobStatus, Error> {
        (**self).poll(job)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GeneratedImage {
    /// Base64 encoded image payload.
    #[serde(skip)]
    pub data: String,
    pub job: String,
    pub censored: bool,
}

/// Submit a job and poll it until it finishes, fails, or the poll budget
/// runs out. Only the first returned image is kept.
pub fn generate<B>(
    backend: &B,
    request: &GenerationRequest,
    poll: &PollConfig,
) -> Result<GeneratedImage, Error>
where
    B: GenerationBackend + ?Sized,
{
    let job = backend.submit(request)?;
    info!(job = %job.0, "submitted generation job");

    for attempt in 1..=poll.poll_attempts {
        match backend.poll(&job) {
            Ok(JobStatus::Done { images, censored }) => {
                debug!(job = %job.0, images = images.len(), censored, "generation done");
                let data = images.into_iter().next().ok_or(Error::NoImages)?;
                return Ok(GeneratedImage {
                    data,
                    job: job.0,
                    censored,
                });
            }
            Ok(JobStatus::Failed(description)) => return Err(Error::JobFailed(description)),
            Ok(status) => {
                debug!(job = %job.0, attempt, ?status, "generation in progress");
            }
            Err(error) => {
                warn!(job = %job.0, attempt, error = %describe(&error), "status poll failed");
            }
        }
        thread::sleep(poll.delay());
    }

    Err(Error::PollTimeout(poll.timeout()))
}
