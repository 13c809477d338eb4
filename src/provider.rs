use crate::{error::Error, pose::Detection};
use ndarray::{Array1, Array2};
use reqwest::{
    blocking::{Client, Response},
    header::CONTENT_TYPE,
};
use std::{path::Path, time::Duration};
use tracing::debug;

/// Source of body and hand keypoints for an image on disk.
///
/// Body detections carry 17 COCO keypoints, hand detections 21. Index order
/// is part of the contract: every check relies on it.
pub trait KeypointProvider {
    fn detect_body(&self, image: &Path) -> Result<Vec<Detection>, Error>;

    fn detect_hands(&self, image: &Path) -> Result<Vec<Detection>, Error>;
}

impl<P> KeypointProvider for &P
where
    P: KeypointProvider + ?Sized,
{
    fn detect_body(&self, image: &Path) -> Result<Vec<Detection>, Error> {
        (**self).detect_body(image)
    }

    fn detect_hands(&self, image: &Path) -> Result<Vec<Detection>, Error> {
        (**self).detect_hands(image)
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawDetection {
    keypoints: Vec<Vec<f32>>,
    confidences: Vec<f32>,
}

impl RawDetection {
    fn into_detection(self) -> Result<Detection, Error> {
        let rows = self.keypoints.len();
        let cols = self.keypoints.first().map_or(2, Vec::len);
        if let Some(row) = self.keypoints.iter().find(|row| row.len() != cols) {
            return Err(Error::KeypointArrayShape(vec![rows, row.len()]));
        }

        let flat = self.keypoints.into_iter().flatten().collect();
        let points =
            Array2::from_shape_vec((rows, cols), flat).map_err(Error::ConstructKeypointArray)?;
        let scores = Array1::from(self.confidences);
        Detection::from_arrays(points.view(), scores.view())
    }
}

/// Keypoint provider backed by an HTTP inference service.
///
/// The raw image bytes are posted to `<base>/body` and `<base>/hands`; each
/// responds with a JSON array of `{"keypoints": [[x, y], ...], "confidences": [...]}`.
#[derive(Debug, Clone)]
pub struct HttpKeypointProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpKeypointProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            client: Client::builder().build().map_err(Error::BuildHttpClient)?,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(60),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn detect(&self, endpoint: &str, image: &Path) -> Result<Vec<Detection>, Error> {
        let bytes = std::fs::read(image).map_err(|e| Error::ReadImage(e, image.to_path_buf()))?;
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, bytes = bytes.len(), "requesting keypoints");

        let detections: Vec<RawDetection> = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .and_then(Response::error_for_status)
            .map_err(Error::KeypointRequest)?
            .json()
            .map_err(Error::ParseKeypointResponse)?;

        detections
            .into_iter()
            .map(RawDetection::into_detection)
            .collect()
    }
}

impl KeypointProvider for HttpKeypointProvider {
    fn detect_body(&self, image: &Path) -> Result<Vec<Detection>, Error> {
        self.detect("body", image)
    }

    fn detect_hands(&self, image: &Path) -> Result<Vec<Detection>, Error> {
        self.detect("hands", image)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Default)]
    pub(crate) struct Scene {
        pub(crate) people: Vec<Detection>,
        pub(crate) hands: Vec<Detection>,
    }

    impl Scene {
        pub(crate) fn new(people: Vec<Detection>, hands: Vec<Detection>) -> Self {
            Self { people, hands }
        }
    }

    /// Serves detections keyed by the image file contents.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedProvider {
        scenes: HashMap<Vec<u8>, Scene>,
        fallback: Option<Scene>,
    }

    impl ScriptedProvider {
        pub(crate) fn repeat(scene: Scene) -> Self {
            Self {
                scenes: HashMap::new(),
                fallback: Some(scene),
            }
        }

        pub(crate) fn failing() -> Self {
            Self::default()
        }

        pub(crate) fn with(mut self, image: &[u8], scene: Scene) -> Self {
            self.scenes.insert(image.to_vec(), scene);
            self
        }

        fn scene(&self, image: &Path) -> Result<&Scene, Error> {
            let bytes =
                std::fs::read(image).map_err(|e| Error::ReadImage(e, image.to_path_buf()))?;
            self.scenes
                .get(&bytes)
                .or(self.fallback.as_ref())
                .ok_or_else(|| {
                    Error::ReadImage(
                        std::io::Error::new(std::io::ErrorKind::InvalidData, "unscripted image"),
                        image.to_path_buf(),
                    )
                })
        }
    }

    impl KeypointProvider for ScriptedProvider {
        fn detect_body(&self, image: &Path) -> Result<Vec<Detection>, Error> {
            Ok(self.scene(image)?.people.clone())
        }

        fn detect_hands(&self, image: &Path) -> Result<Vec<Detection>, Error> {
            Ok(self.scene(image)?.hands.clone())
        }
    }
}
