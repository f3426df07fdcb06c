use crate::common::decoder::DecodeError;
use crate::common::store::StoreError;
use thiserror::Error;

/// Failure to transcode one attribute. The attribute is left out, the record continues.
#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("{key:?} is neither a known keyword nor a tag")]
    UnknownTag { key: String },

    #[error("no value representation is known for {key:?}")]
    UnresolvedVr { key: String },

    #[error("cannot read {key:?} as {vr}: {reason}")]
    Coercion {
        key: String,
        vr: String,
        reason: String,
    },

    #[error("sequence {key:?} is nested deeper than {max} levels")]
    DepthExceeded { key: String, max: usize },
}

impl AttributeError {
    pub(crate) fn coercion(key: &str, vr: impl ToString, reason: impl ToString) -> Self {
        AttributeError::Coercion {
            key: key.to_string(),
            vr: vr.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Failure to assemble a whole instance. The instance is dropped from the study.
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("the record has no SOPClassUID")]
    MissingSopClass,

    #[error("failed to build the file meta group: {0}")]
    FileMeta(String),
}

/// Failure to obtain the pixels of one frame. The frame is left out of the pixel data.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("failed to fetch frame: {0}")]
    Fetch(#[from] StoreError),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] DecodeError),
}

/// Failure to convert an imageset at all.
#[derive(Error, Debug)]
pub enum DicomizeError {
    #[error("no metadata found for datastore {datastore_id:?}, imageset {imageset_id:?}: {source}")]
    MetadataUnavailable {
        datastore_id: String,
        imageset_id: String,
        source: StoreError,
    },

    #[error("imageset {0:?} does not contain any series")]
    NoSeries(String),
}

/// Failure of an output consumer.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("failed to write the DICOM file: {0}")]
    Write(String),

    #[error("failed to serialize DICOM JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("the record has no {0}")]
    MissingAttribute(&'static str),

    #[error("failed to decode the pixel data: {0}")]
    Decode(#[from] dicom_pixeldata::Error),

    #[error("failed to render the image: {0}")]
    Render(String),
}
