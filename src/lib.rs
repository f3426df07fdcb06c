//! Transcodes an imageset metadata document and its compressed pixel frames
//! into DICOM instances.
pub mod common;
pub mod config;
pub mod imagesets;
pub mod utils;

pub use common::decoder::{DecodeError, FrameDecoder, TransferSyntaxDecoder};
pub use common::store::{DirectoryStore, ImagesetStore, StoreError};
pub use imagesets::error::{AssembleError, AttributeError, DicomizeError, ExportError, FrameError};
pub use imagesets::models::metadata::{ImagesetMetadata, SeriesSummary};
pub use imagesets::models::study::{DicomizedInstance, DicomizedStudy, Issue};
pub use imagesets::services::dicomize::{dicomize_imageset, dicomize_metadata};
pub use imagesets::services::export::{grayscale_preview, save_as_dicom, save_as_png, to_dicom_json};
