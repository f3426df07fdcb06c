use crate::imagesets::models::work_item::FrameGeometry;
use dicom::encoding::adapters::{PixelDataObject, RawPixelData};
use dicom::encoding::transfer_syntax::TransferSyntaxIndex;
use dicom::encoding::Codec;
use dicom::transfer_syntax::TransferSyntaxRegistry;
use std::borrow::Cow;
use thiserror::Error;

/// High-Throughput JPEG 2000 Image Compression (Lossless Only),
/// the encoding the imaging store serves frames in.
pub const HTJ2K_LOSSLESS: &str = "1.2.840.10008.1.2.4.201";

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("no pixel data decoder is registered for transfer syntax {0}")]
    UnsupportedTransferSyntax(String),

    #[error("the frame geometry does not declare {0}")]
    MissingGeometry(&'static str),

    #[error("{0}")]
    Codec(String),

    #[error("the decoder produced no samples")]
    Empty,
}

/// Turns one compressed frame into native little endian samples.
pub trait FrameDecoder {
    fn decode(&self, blob: &[u8], geometry: &FrameGeometry) -> Result<Vec<u8>, DecodeError>;
}

/// Decodes frames with the pixel data readers of the transfer syntax registry.
#[derive(Debug, Clone)]
pub struct TransferSyntaxDecoder {
    transfer_syntax_uid: String,
}

impl TransferSyntaxDecoder {
    pub fn new(transfer_syntax_uid: impl Into<String>) -> Self {
        Self {
            transfer_syntax_uid: transfer_syntax_uid.into(),
        }
    }
}

impl FrameDecoder for TransferSyntaxDecoder {
    fn decode(&self, blob: &[u8], geometry: &FrameGeometry) -> Result<Vec<u8>, DecodeError> {
        let unsupported = || DecodeError::UnsupportedTransferSyntax(self.transfer_syntax_uid.clone());

        let ts = TransferSyntaxRegistry
            .get(&self.transfer_syntax_uid)
            .ok_or_else(unsupported)?;
        let Codec::EncapsulatedPixelData(Some(reader), _) = ts.codec() else {
            return Err(unsupported());
        };

        let frame = EncodedFrame::new(&self.transfer_syntax_uid, blob, geometry)?;
        let mut samples = Vec::new();
        reader
            .decode_frame(&frame, 0, &mut samples)
            .map_err(|err| DecodeError::Codec(err.to_string()))?;

        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(samples)
    }
}

/// A single encapsulated frame presented as a pixel data object.
#[derive(Debug)]
struct EncodedFrame<'a> {
    ts_uid: &'a str,
    rows: u16,
    columns: u16,
    samples_per_pixel: u16,
    bits_allocated: u16,
    bits_stored: u16,
    photometric_interpretation: &'a str,
    fragment: &'a [u8],
}

impl<'a> EncodedFrame<'a> {
    fn new(
        ts_uid: &'a str,
        fragment: &'a [u8],
        geometry: &'a FrameGeometry,
    ) -> Result<Self, DecodeError> {
        let rows = geometry.rows.ok_or(DecodeError::MissingGeometry("Rows"))?;
        let columns = geometry
            .columns
            .ok_or(DecodeError::MissingGeometry("Columns"))?;
        let bits_allocated = geometry
            .bits_allocated
            .ok_or(DecodeError::MissingGeometry("BitsAllocated"))?;
        let samples_per_pixel = geometry.samples_per_pixel.unwrap_or(1);
        let default_pmi = if samples_per_pixel == 1 {
            "MONOCHROME2"
        } else {
            "RGB"
        };
        Ok(EncodedFrame {
            ts_uid,
            rows,
            columns,
            samples_per_pixel,
            bits_allocated,
            bits_stored: geometry.bits_stored.unwrap_or(bits_allocated),
            photometric_interpretation: geometry
                .photometric_interpretation
                .as_deref()
                .unwrap_or(default_pmi),
            fragment,
        })
    }
}

impl PixelDataObject for EncodedFrame<'_> {
    fn transfer_syntax_uid(&self) -> &str {
        self.ts_uid
    }

    fn rows(&self) -> Option<u16> {
        Some(self.rows)
    }

    fn cols(&self) -> Option<u16> {
        Some(self.columns)
    }

    fn samples_per_pixel(&self) -> Option<u16> {
        Some(self.samples_per_pixel)
    }

    fn bits_allocated(&self) -> Option<u16> {
        Some(self.bits_allocated)
    }

    fn bits_stored(&self) -> Option<u16> {
        Some(self.bits_stored)
    }

    fn photometric_interpretation(&self) -> Option<&str> {
        Some(self.photometric_interpretation)
    }

    fn number_of_frames(&self) -> Option<u32> {
        Some(1)
    }

    fn number_of_fragments(&self) -> Option<u32> {
        Some(1)
    }

    fn fragment(&self, fragment: usize) -> Option<Cow<[u8]>> {
        (fragment == 0).then(|| Cow::Borrowed(self.fragment))
    }

    fn offset_table(&self) -> Option<Cow<[u32]>> {
        None
    }

    fn raw_pixel_data(&self) -> Option<RawPixelData> {
        Some(RawPixelData {
            fragments: vec![self.fragment.to_vec()].into(),
            offset_table: Default::default(),
        })
    }
}
