use crate::imagesets::error::ExportError;
use crate::utils::dicom::element_to_str;
use dicom::core::VR;
use dicom::dictionary_std::tags;
use dicom::object::{DefaultDicomObject, InMemDicomObject};
use dicom_pixeldata::image::{GrayImage, ImageFormat};
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use std::path::{Path, PathBuf};

/// Writes an instance to `<destination>/<SOPInstanceUID>.dcm`, creating the directory.
///
/// Returns whether the file was written. Failures are logged.
pub fn save_as_dicom(obj: &DefaultDicomObject, destination: impl AsRef<Path>) -> bool {
    match write_dicom(obj, destination.as_ref()) {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "saved DICOM file");
            true
        }
        Err(err) => {
            tracing::error!("Failed to save DICOM file: {err}");
            false
        }
    }
}

fn write_dicom(obj: &DefaultDicomObject, destination: &Path) -> Result<PathBuf, ExportError> {
    let sop_instance_uid = element_to_str(obj, tags::SOP_INSTANCE_UID)
        .ok_or(ExportError::MissingAttribute("SOPInstanceUID"))?;

    std::fs::create_dir_all(destination)?;
    let path = destination.join(format!("{sop_instance_uid}.dcm"));
    obj.write_to_file(&path)
        .map_err(|err| ExportError::Write(err.to_string()))?;
    Ok(path)
}

/// Renders the first frame of an instance as an 8-bit grayscale PNG.
///
/// Returns whether the file was written. Failures are logged.
pub fn save_as_png(obj: &DefaultDicomObject, file: impl AsRef<Path>) -> bool {
    let file = file.as_ref();
    let result = grayscale_preview(obj).and_then(|image| {
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image
            .save_with_format(file, ImageFormat::Png)
            .map_err(|err| ExportError::Render(err.to_string()))
    });
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(file = %file.display(), "Failed to save PNG preview: {err}");
            false
        }
    }
}

/// Builds an 8-bit preview of the first frame of single sample pixel data.
///
/// Negative samples are clamped to zero and the largest sample maps to 255.
/// MONOCHROME1 images are inverted so that high values render dark.
pub fn grayscale_preview(obj: &DefaultDicomObject) -> Result<GrayImage, ExportError> {
    // decode the pixel data
    let pixel = obj.decode_pixel_data_frame(0)?;
    if pixel.samples_per_pixel() != 1 {
        return Err(ExportError::Render(format!(
            "cannot preview {} samples per pixel",
            pixel.samples_per_pixel()
        )));
    }

    // stored values, without the rescale of the modality LUT
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let samples: Vec<f64> = pixel
        .to_vec_frame_with_options::<f64>(0, &options)?
        .into_iter()
        .map(|v| v.max(0.))
        .collect();

    let max = samples.iter().copied().fold(0., f64::max);
    let mut gray: Vec<u8> = samples
        .iter()
        .map(|v| if max > 0. { (v / max * 255.) as u8 } else { 0 })
        .collect();

    let monochrome1 = element_to_str(obj, tags::PHOTOMETRIC_INTERPRETATION).as_deref()
        == Some("MONOCHROME1");
    if monochrome1 {
        let brightest = gray.iter().copied().max().unwrap_or(0);
        gray.iter_mut().for_each(|v| *v = brightest - *v);
    }

    GrayImage::from_raw(pixel.columns(), pixel.rows(), gray)
        .ok_or_else(|| ExportError::Render("pixel buffer does not match the image size".to_string()))
}

/// Renders the data set of an instance as DICOM JSON, leaving out bulk binary data.
pub fn to_dicom_json(obj: &InMemDicomObject) -> Result<serde_json::Value, ExportError> {
    let mut filtered = InMemDicomObject::new_empty();
    for element in obj.iter() {
        if matches!(element.vr(), VR::OB | VR::OW | VR::UN) {
            continue;
        }
        filtered.put(element.clone());
    }
    Ok(dicom_json::to_value(filtered)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue};
    use dicom::dictionary_std::uids;
    use dicom::object::FileMetaTableBuilder;

    fn image(bits_allocated: u16, signed: bool, photometric: &str, pixel_data: Vec<u8>) -> DefaultDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        let us = |tag, value: u16| DataElement::new(tag, VR::US, PrimitiveValue::from(value));
        obj.put(us(tags::ROWS, 2));
        obj.put(us(tags::COLUMNS, 2));
        obj.put(us(tags::SAMPLES_PER_PIXEL, 1));
        obj.put(us(tags::BITS_ALLOCATED, bits_allocated));
        obj.put(us(tags::BITS_STORED, bits_allocated));
        obj.put(us(tags::HIGH_BIT, bits_allocated - 1));
        obj.put(us(tags::PIXEL_REPRESENTATION, signed as u16));
        obj.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from(photometric),
        ));
        obj.put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(uids::CT_IMAGE_STORAGE),
        ));
        obj.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.3.4.5"),
        ));
        let vr = if bits_allocated > 8 { VR::OW } else { VR::OB };
        obj.put(DataElement::new(tags::PIXEL_DATA, vr, PrimitiveValue::from(pixel_data)));

        let meta = FileMetaTableBuilder::new()
            .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
            .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
            .media_storage_sop_instance_uid("1.2.3.4.5")
            .build()
            .unwrap();
        obj.with_exact_meta(meta)
    }

    fn le16(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn instance(sop_instance_uid: &str) -> DefaultDicomObject {
        let mut obj = image(16, false, "MONOCHROME2", le16(&[0, 1, 2, 4]));
        obj.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(sop_instance_uid),
        ));
        obj
    }

    #[test]
    fn test_preview_scales_to_max() {
        let obj = image(16, false, "MONOCHROME2", le16(&[0, 1, 2, 4]));
        let preview = grayscale_preview(&obj).unwrap();
        assert_eq!(preview.dimensions(), (2, 2));
        assert_eq!(preview.into_raw(), vec![0, 63, 127, 255]);
    }

    #[test]
    fn test_preview_clamps_negative_samples() {
        let obj = image(16, true, "MONOCHROME2", le16(&[-5, 0, 5, 10]));
        let preview = grayscale_preview(&obj).unwrap();
        assert_eq!(preview.into_raw(), vec![0, 0, 127, 255]);
    }

    #[test]
    fn test_preview_inverts_monochrome1() {
        let obj = image(16, false, "MONOCHROME1", le16(&[0, 1, 2, 4]));
        let preview = grayscale_preview(&obj).unwrap();
        assert_eq!(preview.into_raw(), vec![255, 192, 128, 0]);
    }

    #[test]
    fn test_preview_of_eight_bit_samples() {
        let obj = image(8, false, "MONOCHROME2", vec![0, 50, 100, 200]);
        let preview = grayscale_preview(&obj).unwrap();
        assert_eq!(preview.into_raw(), vec![0, 63, 127, 255]);
    }

    #[test]
    fn test_preview_ignores_rescale() {
        let mut obj = image(16, false, "MONOCHROME2", le16(&[0, 1, 2, 4]));
        obj.put(DataElement::new(tags::RESCALE_INTERCEPT, VR::DS, PrimitiveValue::from("-1024")));
        obj.put(DataElement::new(tags::RESCALE_SLOPE, VR::DS, PrimitiveValue::from("1")));
        let preview = grayscale_preview(&obj).unwrap();
        assert_eq!(preview.into_raw(), vec![0, 63, 127, 255]);
    }

    #[test]
    fn test_preview_requires_pixel_data() {
        let mut obj = image(16, false, "MONOCHROME2", le16(&[0, 1, 2, 4]));
        obj.remove_element(tags::PIXEL_DATA);
        assert!(matches!(grayscale_preview(&obj), Err(ExportError::Decode(_))));
    }

    #[test]
    fn test_save_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("previews").join("image.png");
        let obj = image(16, false, "MONOCHROME2", le16(&[0, 1, 2, 4]));
        assert!(save_as_png(&obj, &file));
        assert!(file.exists());

        let mut no_pixels = obj.clone();
        no_pixels.remove_element(tags::PIXEL_DATA);
        assert!(!save_as_png(&no_pixels, dir.path().join("none.png")));
    }

    #[test]
    fn test_save_as_dicom() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dcm_1.2.3");
        let obj = instance("1.2.3.4.5");
        assert!(save_as_dicom(&obj, &out));

        let path = out.join("1.2.3.4.5.dcm");
        let read = dicom::object::open_file(&path).unwrap();
        assert_eq!(
            element_to_str(&read, tags::SOP_INSTANCE_UID).as_deref(),
            Some("1.2.3.4.5")
        );
        assert_eq!(
            read.meta().transfer_syntax.trim_end_matches('\0'),
            uids::EXPLICIT_VR_LITTLE_ENDIAN
        );
        assert_eq!(&read.element(tags::PIXEL_DATA).unwrap().to_bytes().unwrap()[..], &le16(&[0, 1, 2, 4])[..]);
    }

    #[test]
    fn test_dicom_json_leaves_out_pixel_data() {
        let obj = instance("1.2.3.4.5");
        let json = to_dicom_json(&obj).unwrap();
        assert!(json.get("7FE00010").is_none());
        assert_eq!(json["00080018"]["vr"], "UI");
        assert_eq!(json["00080018"]["Value"][0], "1.2.3.4.5");
        assert_eq!(json["00280010"]["Value"][0], 2);
    }
}
