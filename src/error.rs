use std::{path::PathBuf, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to construct NotNan from f32: {1}")]
    ConstructNotNan(#[source] ordered_float::FloatIsNan, f32),

    #[error("failed to convert keypoint variant to usize: {0:?}")]
    KeypointVariantToUSize(crate::pose::KeypointKind),

    #[error("keypoint index {0} is out of bounds for detection with {1} keypoints")]
    MissingKeypoint(usize, usize),

    #[error("expected keypoint array of shape (n, 2), got {0:?}")]
    KeypointArrayShape(Vec<usize>),

    #[error("failed to construct keypoint array")]
    ConstructKeypointArray(#[source] ndarray::ShapeError),

    #[error("got {0} keypoints but {1} confidences")]
    ConfidenceCount(usize, usize),

    #[error("failed to convert value to f32")]
    ConvertToF32,

    #[error("image file not found: {0:?}")]
    ImageNotFound(PathBuf),

    #[error("failed to read image file: {1:?}")]
    ReadImage(#[source] std::io::Error, PathBuf),

    #[error("failed to decode base64 image payload")]
    DecodeBase64(#[source] base64::DecodeError),

    #[error("failed to create temporary image file")]
    CreateTempFile(#[source] std::io::Error),

    #[error("failed to write temporary image file")]
    WriteTempFile(#[source] std::io::Error),

    #[error("failed to build HTTP client")]
    BuildHttpClient(#[source] reqwest::Error),

    #[error("keypoint service request failed")]
    KeypointRequest(#[source] reqwest::Error),

    #[error("failed to parse keypoint service response")]
    ParseKeypointResponse(#[source] reqwest::Error),

    #[error("pipeline request failed")]
    PipelineRequest(#[source] reqwest::Error),

    #[error("no available generation pipelines")]
    NoPipeline,

    #[error("failed to submit generation job")]
    SubmitJob(#[source] reqwest::Error),

    #[error("generation service did not return a job id")]
    MissingJobId,

    #[error("failed to poll generation job {1}")]
    PollJob(#[source] reqwest::Error, String),

    #[error("failed to parse generation service response")]
    ParseBackendResponse(#[source] reqwest::Error),

    #[error("failed to serialize generation parameters")]
    SerializeParams(#[source] serde_json::Error),

    #[error("generation job failed: {0}")]
    JobFailed(String),

    #[error("generation job did not finish within {0:?}")]
    PollTimeout(Duration),

    #[error("generation job finished without image data")]
    NoImages,

    #[error("failed to create result directory: {1:?}")]
    CreateResultDir(#[source] std::io::Error, PathBuf),

    #[error("failed to write result file: {1:?}")]
    WriteResult(#[source] std::io::Error, PathBuf),

    #[error("failed to serialize result metadata")]
    SerializeResult(#[source] serde_json::Error),
}
