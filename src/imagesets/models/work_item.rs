use crate::imagesets::models::metadata::AttributeMap;
use crate::utils::dicom::{attribute_to_int, attribute_to_str};

/// One instance scheduled for conversion.
///
/// Created during enumeration, filled with pixel data by the frame assembler
/// and consumed by the record assembler.
#[derive(Debug, Clone)]
pub struct InstanceWorkItem {
    pub datastore_id: String,
    pub imageset_id: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    pub frame_ids: Vec<String>,
    pub instance_number: i64,
    pub geometry: FrameGeometry,
    pub pixel_data: Vec<u8>,
}

/// Image pixel description needed to interpret a compressed frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameGeometry {
    pub rows: Option<u16>,
    pub columns: Option<u16>,
    pub samples_per_pixel: Option<u16>,
    pub bits_allocated: Option<u16>,
    pub bits_stored: Option<u16>,
    pub pixel_representation: Option<u16>,
    pub photometric_interpretation: Option<String>,
}

impl FrameGeometry {
    /// Collects the image pixel attributes from the given levels,
    /// most specific level first.
    pub fn from_levels(levels: &[&AttributeMap]) -> Self {
        let int = |key: &str| {
            levels
                .iter()
                .find_map(|attrs| attribute_to_int(attrs, key))
                .and_then(|v| u16::try_from(v).ok())
        };
        FrameGeometry {
            rows: int("Rows"),
            columns: int("Columns"),
            samples_per_pixel: int("SamplesPerPixel"),
            bits_allocated: int("BitsAllocated"),
            bits_stored: int("BitsStored"),
            pixel_representation: int("PixelRepresentation"),
            photometric_interpretation: levels
                .iter()
                .find_map(|attrs| attribute_to_str(attrs, "PhotometricInterpretation")),
        }
    }
}
