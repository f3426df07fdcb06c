use crate::imagesets::error::AssembleError;
use crate::imagesets::models::metadata::AttributeMap;
use crate::imagesets::models::study::Issue;
use crate::imagesets::services::populate::TagPopulator;
use crate::imagesets::services::vr::OverrideTable;
use crate::utils::dicom::{element_to_int, element_to_str};
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::{DefaultDicomObject, FileMetaTableBuilder, InMemDicomObject};

/// The four attribute mappings that make up one instance,
/// from the least to the most specific.
#[derive(Debug, Clone, Copy)]
pub struct InstanceLevels<'a> {
    pub patient: &'a AttributeMap,
    pub study: &'a AttributeMap,
    pub series: &'a AttributeMap,
    pub instance: &'a AttributeMap,
}

impl<'a> InstanceLevels<'a> {
    /// The levels in population order. A later level wins on attribute collisions.
    pub fn in_order(&self) -> [&'a AttributeMap; 4] {
        [self.patient, self.study, self.series, self.instance]
    }

    /// The levels from the most specific one down.
    pub fn most_specific_first(&self) -> [&'a AttributeMap; 4] {
        [self.instance, self.series, self.study, self.patient]
    }
}

/// Builds a complete DICOM instance out of its attribute levels and pixel data.
///
/// An empty `pixel_data` leaves the instance without a Pixel Data element.
/// The file meta group declares Explicit VR Little Endian.
///
/// A record without SOPClassUID cannot carry a file meta group, so it fails
/// with [`AssembleError::MissingSopClass`] instead of producing a bare data set.
pub fn assemble_record(
    levels: InstanceLevels<'_>,
    overrides: &OverrideTable,
    pixel_data: Vec<u8>,
    sop_instance_uid: &str,
    issues: &mut Vec<Issue>,
) -> Result<DefaultDicomObject, AssembleError> {
    let mut obj = InMemDicomObject::new_empty();

    let mut populator = TagPopulator::new(overrides, sop_instance_uid, issues);
    for attributes in levels.in_order() {
        populator.populate(attributes, &mut obj);
    }

    if !pixel_data.is_empty() {
        let vr = match element_to_int(&obj, tags::BITS_ALLOCATED) {
            Some(bits) if bits > 8 => VR::OW,
            _ => VR::OB,
        };
        obj.put(DataElement::new(
            tags::PIXEL_DATA,
            vr,
            PrimitiveValue::from(pixel_data),
        ));
    }

    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(sop_instance_uid),
    ));

    let sop_class_uid =
        element_to_str(&obj, tags::SOP_CLASS_UID).ok_or(AssembleError::MissingSopClass)?;

    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
        .media_storage_sop_class_uid(sop_class_uid)
        .media_storage_sop_instance_uid(sop_instance_uid)
        .build()
        .map_err(|err| AssembleError::FileMeta(err.to_string()))?;

    Ok(obj.with_exact_meta(meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

    fn attributes(value: Value) -> AttributeMap {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    struct Fixture {
        patient: AttributeMap,
        study: AttributeMap,
        series: AttributeMap,
        instance: AttributeMap,
    }

    impl Fixture {
        fn new(instance: Value) -> Self {
            Fixture {
                patient: attributes(json!({"PatientID": "P1", "PatientName": "Doe^Jane"})),
                study: attributes(json!({
                    "StudyInstanceUID": "1.2.3",
                    "StudyDescription": "study level",
                    "SOPClassUID": CT_IMAGE_STORAGE
                })),
                series: attributes(json!({
                    "SeriesInstanceUID": "1.2.3.4",
                    "StudyDescription": "series level",
                    "Modality": "CT",
                    "BitsAllocated": 16
                })),
                instance: attributes(instance),
            }
        }

        fn levels(&self) -> InstanceLevels<'_> {
            InstanceLevels {
                patient: &self.patient,
                study: &self.study,
                series: &self.series,
                instance: &self.instance,
            }
        }

        fn assemble(&self, pixel_data: Vec<u8>) -> Result<DefaultDicomObject, AssembleError> {
            let mut issues = Vec::new();
            let obj = assemble_record(
                self.levels(),
                &OverrideTable::default(),
                pixel_data,
                "1.2.3.4.5",
                &mut issues,
            );
            assert!(issues.is_empty(), "unexpected issues: {issues:?}");
            obj
        }
    }

    #[test]
    fn test_most_specific_level_wins() {
        let fixture = Fixture::new(json!({"StudyDescription": "instance level", "InstanceNumber": "1"}));
        let obj = fixture.assemble(Vec::new()).unwrap();
        assert_eq!(
            element_to_str(&obj, tags::STUDY_DESCRIPTION).as_deref(),
            Some("instance level")
        );
        assert_eq!(element_to_str(&obj, tags::PATIENT_ID).as_deref(), Some("P1"));
        assert_eq!(element_to_str(&obj, tags::MODALITY).as_deref(), Some("CT"));
    }

    #[test]
    fn test_series_overrides_study() {
        let fixture = Fixture::new(json!({}));
        let obj = fixture.assemble(Vec::new()).unwrap();
        assert_eq!(
            element_to_str(&obj, tags::STUDY_DESCRIPTION).as_deref(),
            Some("series level")
        );
    }

    #[test]
    fn test_pixel_data_is_attached() {
        let fixture = Fixture::new(json!({}));
        let obj = fixture.assemble(vec![1, 0, 2, 0]).unwrap();
        let pixel_data = obj.element(tags::PIXEL_DATA).unwrap();
        assert_eq!(pixel_data.vr(), VR::OW);
        assert_eq!(&pixel_data.to_bytes().unwrap()[..], &[1, 0, 2, 0]);
    }

    #[test]
    fn test_eight_bit_pixel_data_is_ob() {
        let fixture = Fixture::new(json!({"BitsAllocated": 8}));
        let obj = fixture.assemble(vec![1, 2, 3, 4]).unwrap();
        assert_eq!(obj.element(tags::PIXEL_DATA).unwrap().vr(), VR::OB);
    }

    #[test]
    fn test_empty_pixel_data_is_omitted() {
        let fixture = Fixture::new(json!({}));
        let obj = fixture.assemble(Vec::new()).unwrap();
        assert!(obj.element(tags::PIXEL_DATA).is_err());
    }

    #[test]
    fn test_file_meta_group() {
        let fixture = Fixture::new(json!({"SOPInstanceUID": "ignored"}));
        let obj = fixture.assemble(Vec::new()).unwrap();
        let meta = obj.meta();
        assert_eq!(
            meta.transfer_syntax.trim_end_matches('\0'),
            uids::EXPLICIT_VR_LITTLE_ENDIAN
        );
        assert_eq!(
            meta.media_storage_sop_instance_uid.trim_end_matches('\0'),
            "1.2.3.4.5"
        );
        assert_eq!(
            meta.media_storage_sop_class_uid.trim_end_matches('\0'),
            CT_IMAGE_STORAGE
        );
        assert_eq!(
            element_to_str(&obj, tags::SOP_INSTANCE_UID).as_deref(),
            Some("1.2.3.4.5")
        );
    }

    #[test]
    fn test_missing_sop_class() {
        let mut fixture = Fixture::new(json!({}));
        fixture.study.remove("SOPClassUID");
        let err = fixture.assemble(Vec::new()).unwrap_err();
        assert!(matches!(err, AssembleError::MissingSopClass));
    }
}
