use bytes::Bytes;
use imageset_dicomizer::common::decoder::{DecodeError, FrameDecoder};
use imageset_dicomizer::common::store::{ImagesetStore, StoreError};
use imageset_dicomizer::imagesets::models::work_item::FrameGeometry;
use imageset_dicomizer::ImagesetMetadata;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

pub(crate) const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

pub(crate) fn init_logging() {
    INIT_LOGGING.call_once(|| {
        tracing::subscriber::set_global_default(
            tracing_subscriber::FmtSubscriber::builder()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .finish(),
        )
        .unwrap()
    })
}

/// An in-memory imageset store. Frame requests are recorded in call order.
#[derive(Default)]
pub(crate) struct FakeStore {
    pub metadata: Option<Value>,
    pub frames: HashMap<String, Vec<u8>>,
    pub requested: RefCell<Vec<String>>,
}

impl FakeStore {
    pub fn new(metadata: Value) -> Self {
        FakeStore {
            metadata: Some(metadata),
            ..Default::default()
        }
    }

    pub fn with_frame(mut self, frame_id: &str, data: &[u8]) -> Self {
        self.frames.insert(frame_id.to_string(), data.to_vec());
        self
    }
}

impl ImagesetStore for FakeStore {
    async fn get_metadata(
        &self,
        _datastore_id: &str,
        imageset_id: &str,
    ) -> Result<ImagesetMetadata, StoreError> {
        let metadata = self
            .metadata
            .clone()
            .ok_or_else(|| StoreError::NotFound(imageset_id.to_string()))?;
        Ok(serde_json::from_value(metadata)?)
    }

    async fn get_frame(
        &self,
        _datastore_id: &str,
        _imageset_id: &str,
        frame_id: &str,
    ) -> Result<Bytes, StoreError> {
        self.requested.borrow_mut().push(frame_id.to_string());
        self.frames
            .get(frame_id)
            .cloned()
            .map(Bytes::from)
            .ok_or_else(|| StoreError::NotFound(frame_id.to_string()))
    }
}

/// Hands frames back unchanged, except those starting with 0xff.
pub(crate) struct FakeDecoder;

impl FrameDecoder for FakeDecoder {
    fn decode(&self, blob: &[u8], _geometry: &FrameGeometry) -> Result<Vec<u8>, DecodeError> {
        match blob.first() {
            Some(0xff) => Err(DecodeError::Codec("corrupt codestream".to_string())),
            Some(_) => Ok(blob.to_vec()),
            None => Err(DecodeError::Empty),
        }
    }
}

/// An instance entry of the metadata document.
pub(crate) fn instance(instance_number: Value, frame_ids: &[&str]) -> Value {
    let frames: Vec<Value> = frame_ids.iter().map(|id| json!({"ID": id})).collect();
    json!({
        "DICOM": {"InstanceNumber": instance_number, "SOPClassUID": CT_IMAGE_STORAGE},
        "ImageFrames": frames
    })
}

/// A single series metadata document holding the given instances.
pub(crate) fn metadata(instances: Value) -> Value {
    json!({
        "DatastoreID": "ds",
        "ImageSetID": "is",
        "Patient": {"DICOM": {"PatientID": "P1", "PatientName": "Doe^Jane"}},
        "Study": {
            "DICOM": {"StudyInstanceUID": "1.2.3", "StudyDescription": "Chest"},
            "Series": {
                "1.2.3.4": {
                    "DICOM": {
                        "SeriesInstanceUID": "1.2.3.4",
                        "Modality": "CT",
                        "Rows": 2,
                        "Columns": 2,
                        "BitsAllocated": 16,
                        "BitsStored": 16,
                        "SamplesPerPixel": 1,
                        "PixelRepresentation": 0,
                        "PhotometricInterpretation": "MONOCHROME2"
                    },
                    "Instances": instances
                }
            }
        }
    })
}
