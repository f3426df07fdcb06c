use crate::imagesets::models::metadata::ImagesetMetadata;
use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decompress the metadata blob: {0}")]
    Decompress(std::io::Error),

    #[error("failed to parse the imageset metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("invalid identifier {0:?}")]
    InvalidId(String),

    #[error("the requested resource was not found: {0}")]
    NotFound(String),
}

/// Source of imageset metadata documents and compressed frames.
///
/// Calls are awaited one at a time; implementations need not be reentrant.
#[allow(async_fn_in_trait)]
pub trait ImagesetStore {
    /// Retrieve the metadata document of an imageset.
    async fn get_metadata(
        &self,
        datastore_id: &str,
        imageset_id: &str,
    ) -> Result<ImagesetMetadata, StoreError>;

    /// Retrieve one compressed frame of an imageset.
    async fn get_frame(
        &self,
        datastore_id: &str,
        imageset_id: &str,
        frame_id: &str,
    ) -> Result<Bytes, StoreError>;
}

/// An imageset store backed by an exported directory tree:
///
/// ```text
/// <root>/<datastore id>/<imageset id>/metadata.json.gz   (or metadata.json)
/// <root>/<datastore id>/<imageset id>/frames/<frame id>
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn imageset_dir(&self, datastore_id: &str, imageset_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self
            .root
            .join(checked_id(datastore_id)?)
            .join(checked_id(imageset_id)?))
    }
}

impl ImagesetStore for DirectoryStore {
    async fn get_metadata(
        &self,
        datastore_id: &str,
        imageset_id: &str,
    ) -> Result<ImagesetMetadata, StoreError> {
        let dir = self.imageset_dir(datastore_id, imageset_id)?;

        let gzipped = dir.join("metadata.json.gz");
        let json = if tokio::fs::try_exists(&gzipped).await.unwrap_or(false) {
            gunzip(&read(&gzipped).await?)?
        } else {
            read(&dir.join("metadata.json")).await?
        };

        Ok(serde_json::from_slice(&json)?)
    }

    async fn get_frame(
        &self,
        datastore_id: &str,
        imageset_id: &str,
        frame_id: &str,
    ) -> Result<Bytes, StoreError> {
        let path = self
            .imageset_dir(datastore_id, imageset_id)?
            .join("frames")
            .join(checked_id(frame_id)?);
        read(&path).await.map(Bytes::from)
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, StoreError> {
    tokio::fs::read(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.display().to_string())
        } else {
            StoreError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut json = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut json)
        .map_err(StoreError::Decompress)?;
    Ok(json)
}

/// Identifiers become path components, so they must not escape the store root.
fn checked_id(id: &str) -> Result<&str, StoreError> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        Err(StoreError::InvalidId(id.to_string()))
    } else {
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const METADATA: &str = r#"{
        "Patient": {"DICOM": {"PatientID": "P1"}},
        "Study": {"DICOM": {}, "Series": {"1.2": {"DICOM": {}, "Instances": {}}}}
    }"#;

    fn imageset_dir(root: &Path) -> PathBuf {
        let dir = root.join("ds").join("is");
        std::fs::create_dir_all(dir.join("frames")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_reads_gzipped_metadata() {
        let root = tempfile::tempdir().unwrap();
        let dir = imageset_dir(root.path());
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(METADATA.as_bytes()).unwrap();
        std::fs::write(dir.join("metadata.json.gz"), encoder.finish().unwrap()).unwrap();

        let store = DirectoryStore::new(root.path());
        let metadata = store.get_metadata("ds", "is").await.unwrap();
        assert_eq!(metadata.first_series().map(|(uid, _)| uid), Some("1.2"));
    }

    #[tokio::test]
    async fn test_reads_plain_metadata_and_frames() {
        let root = tempfile::tempdir().unwrap();
        let dir = imageset_dir(root.path());
        std::fs::write(dir.join("metadata.json"), METADATA).unwrap();
        std::fs::write(dir.join("frames").join("f1"), [1u8, 2, 3]).unwrap();

        let store = DirectoryStore::new(root.path());
        assert!(store.get_metadata("ds", "is").await.is_ok());
        let frame = store.get_frame("ds", "is", "f1").await.unwrap();
        assert_eq!(&frame[..], &[1, 2, 3]);
        assert!(matches!(
            store.get_frame("ds", "is", "f2").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(root.path());
        assert!(matches!(
            store.get_frame("ds", "is", "../metadata.json").await,
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(
            store.get_metadata("..", "is").await,
            Err(StoreError::InvalidId(_))
        ));
    }
}
