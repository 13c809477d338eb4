use crate::{
    backend::GeneratedImage,
    checker::{decode_image, CheckReport},
    error::Error,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// The one attempt of a run that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AcceptedResult {
    pub prompt: String,
    pub attempts_used: usize,
    pub image: GeneratedImage,
    pub report: CheckReport,
}

/// Destination for accepted results. Rejected attempts are never persisted.
pub trait ResultStore {
    fn persist(&self, result: &AcceptedResult) -> Result<(), Error>;
}

impl<S> ResultStore for &S
where
    S: ResultStore + ?Sized,
{
    fn persist(&self, result: &AcceptedResult) -> Result<(), Error> {
        (**self).persist(result)
    }
}

/// Writes `<job>.jpg` and a `<job>.json` sidecar into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, job: &str, extension: &str) -> PathBuf {
        let name: String = job
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(name).with_extension(extension)
    }
}

fn write(path: &Path, contents: &[u8]) -> Result<(), Error> {
    std::fs::write(path, contents).map_err(|e| Error::WriteResult(e, path.to_path_buf()))
}

impl ResultStore for DirectoryStore {
    fn persist(&self, result: &AcceptedResult) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::CreateResultDir(e, self.dir.clone()))?;

        let image_path = self.path_for(&result.image.job, "jpg");
        write(&image_path, &decode_image(&result.image.data)?)?;

        let metadata = serde_json::to_vec_pretty(result).map_err(Error::SerializeResult)?;
        write(&self.path_for(&result.image.job, "json"), &metadata)?;

        info!(path = ?image_path, "persisted accepted image");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::CheckResults;
    use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};

    fn accepted(job: &str) -> AcceptedResult {
        AcceptedResult {
            prompt: "a dancer".to_owned(),
            attempts_used: 2,
            image: GeneratedImage {
                data: BASE64_STANDARD.encode(b"jpeg bytes"),
                job: job.to_owned(),
                censored: false,
            },
            report: CheckReport {
                accepted: true,
                score: Some(4),
                checks: CheckResults::default(),
                reason: "all checks passed".to_owned(),
            },
        }
    }

    #[test]
    fn writes_image_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("results"));
        store.persist(&accepted("job-1")).unwrap();

        let image = std::fs::read(dir.path().join("results/job-1.jpg")).unwrap();
        assert_eq!(image, b"jpeg bytes");

        let sidecar: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("results/job-1.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(sidecar["attempts_used"], 2);
        assert_eq!(sidecar["report"]["score"], 4);
        assert!(sidecar["image"].get("data").is_none());
    }

    #[test]
    fn job_ids_cannot_escape_directory() {
        let store = DirectoryStore::new("/tmp/results");
        assert_eq!(
            store.path_for("../etc/passwd", "jpg"),
            PathBuf::from("/tmp/results/___etc_passwd.jpg")
        );
    }
}
