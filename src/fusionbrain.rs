//! HTTP client for the FusionBrain text-to-image pipeline API.

use crate::{
    backend::{GenerationBackend, GenerationRequest, JobHandle, JobStatus},
    error::Error,
};
use reqwest::{
    blocking::{
        multipart::{Form, Part},
        Client, RequestBuilder, Response,
    },
    Method,
};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api-key.fusionbrain.ai/";

#[derive(Debug, Clone, structopt::StructOpt)]
pub struct Credentials {
    /// Generation service API key.
    #[structopt(long, env = "FUSIONBRAIN_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Generation service secret key.
    #[structopt(long, env = "FUSIONBRAIN_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Generation service base URL.
    #[structopt(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

#[derive(Debug, serde::Deserialize)]
struct Pipeline {
    id: String,
}

#[derive(Debug, serde::Deserialize)]
struct RunResponse {
    uuid: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct StatusResult {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    censored: bool,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: String,
    #[serde(default)]
    result: Option<StatusResult>,
    #[serde(default)]
    error_description: Option<String>,
}

impl StatusResponse {
    fn into_status(self) -> JobStatus {
        match self.status.as_str() {
            "DONE" => {
                let result = self.result.unwrap_or_default();
                JobStatus::Done {
                    images: result.files,
                    censored: result.censored,
                }
            }
            "FAIL" => JobStatus::Failed(
                self.error_description
                    .unwrap_or_else(|| "unknown error".to_owned()),
            ),
            "PROCESSING" => JobStatus::Running,
            // INITIAL and anything unrecognised keep the job waiting
            _ => JobStatus::Pending,
        }
    }
}

fn generation_params(request: &GenerationRequest) -> serde_json::Value {
    let mut params = json!({
        "type": "GENERATE",
        "numImages": 1,
        "width": request.width,
        "height": request.height,
        "generateParams": {
            "query": request.prompt,
        },
    });
    if let Some(style) = request.style.as_deref().filter(|style| !style.is_empty()) {
        params["style"] = json!(style);
    }
    if let Some(negative_prompt) = request
        .negative_prompt
        .as_deref()
        .filter(|negative_prompt| !negative_prompt.is_empty())
    {
        params["negativePromptDecoder"] = json!(negative_prompt);
    }
    params
}

/// The `multipart/form-data` run request: the pipeline id and the JSON params.
fn run_form(pipeline_id: &str, request: &GenerationRequest) -> Result<Form, Error> {
    let params =
        serde_json::to_string(&generation_params(request)).map_err(Error::SerializeParams)?;
    let params = Part::text(params)
        .mime_str("application/json")
        .map_err(Error::SubmitJob)?;
    Ok(Form::new()
        .text("pipeline_id", pipeline_id.to_owned())
        .part("params", params))
}

#[derive(Debug, Clone)]
pub struct FusionBrainBackend {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    timeout: Duration,
}

impl FusionBrainBackend {
    pub fn new(credentials: Credentials) -> Result<Self, Error> {
        let mut base_url = credentials.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client: Client::builder().build().map_err(Error::BuildHttpClient)?,
            base_url,
            api_key: credentials.api_key,
            secret_key: credentials.secret_key,
            timeout: Duration::from_secs(30),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
            .header("X-Key", format!("Key {}", self.api_key))
            .header("X-Secret", format!("Secret {}", self.secret_key))
    }

    /// Id of the first available pipeline.
    fn pipeline(&self) -> Result<String, Error> {
        let pipelines: Vec<Pipeline> = self
            .request(Method::GET, "key/api/v1/pipelines")
            .send()
            .and_then(Response::error_for_status)
            .map_err(Error::PipelineRequest)?
            .json()
            .map_err(Error::ParseBackendResponse)?;
        pipelines
            .into_iter()
            .next()
            .map(|pipeline| pipeline.id)
            .ok_or(Error::NoPipeline)
    }
}

impl GenerationBackend for FusionBrainBackend {
    fn submit(&self, request: &GenerationRequest) -> Result<JobHandle, Error> {
        let pipeline_id = self.pipeline()?;
        let form = run_form(&pipeline_id, request)?;
        debug!(%pipeline_id, prompt_chars = request.prompt.chars().count(), "submitting job");

        let response: RunResponse = self
            .request(Method::POST, "key/api/v1/pipeline/run")
            .multipart(form)
            .send()
            .and_then(Response::error_for_status)
            .map_err(Error::SubmitJob)?
            .json()
            .map_err(Error::ParseBackendResponse)?;

        response.uuid.map(JobHandle).ok_or(Error::MissingJobId)
    }

    fn poll(&self, job: &JobHandle) -> Result<JobStatus, Error> {
        let response: StatusResponse = self
            .request(Method::GET, &format!("key/api/v1/pipeline/status/{}", job.0))
            .send()
            .and_then(Response::error_for_status)
            .map_err(|e| Error::PollJob(e, job.0.clone()))?
            .json()
            .map_err(Error::ParseBackendResponse)?;
        Ok(response.into_status())
    }
}
