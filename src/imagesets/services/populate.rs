use crate::imagesets::error::AttributeError;
use crate::imagesets::models::metadata::AttributeMap;
use crate::imagesets::models::study::Issue;
use crate::imagesets::services::coerce::coerce_value;
use crate::imagesets::services::vr::{resolve_tag, resolve_vr, OverrideTable};
use dicom::core::DataElement;
use dicom::object::InMemDicomObject;

/// Deepest sequence nesting accepted in an attribute mapping.
pub const MAX_SEQUENCE_DEPTH: usize = 16;

/// File meta information lives in group 0002 and is never written to the data set.
const FILE_META_GROUP: u16 = 0x0002;

/// Writes raw attribute mappings into DICOM data sets for one instance.
///
/// Attributes that cannot be transcoded are left out and reported as
/// [`Issue::AttributeSkipped`], the rest of the mapping is still written.
pub struct TagPopulator<'a> {
    overrides: &'a OverrideTable,
    sop_instance_uid: &'a str,
    issues: &'a mut Vec<Issue>,
}

impl<'a> TagPopulator<'a> {
    pub fn new(
        overrides: &'a OverrideTable,
        sop_instance_uid: &'a str,
        issues: &'a mut Vec<Issue>,
    ) -> Self {
        TagPopulator {
            overrides,
            sop_instance_uid,
            issues,
        }
    }

    /// Writes every attribute of `attributes` into `obj`, in document order.
    ///
    /// An attribute already present in `obj` is replaced.
    pub fn populate(&mut self, attributes: &AttributeMap, obj: &mut InMemDicomObject) {
        self.populate_at(attributes, 0, obj);
    }

    fn populate_at(&mut self, attributes: &AttributeMap, depth: usize, obj: &mut InMemDicomObject) {
        for (key, raw) in attributes {
            match self.element(key, raw, depth) {
                Ok(Some(element)) => {
                    obj.put(element);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(sop_instance_uid = self.sop_instance_uid, "skipping attribute: {err}");
                    self.issues.push(Issue::AttributeSkipped {
                        sop_instance_uid: self.sop_instance_uid.to_string(),
                        key: key.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    /// Builds the element of one attribute.
    ///
    /// File meta attributes are transcoded like any other but yield `None`.
    fn element(
        &mut self,
        key: &str,
        raw: &serde_json::Value,
        depth: usize,
    ) -> Result<Option<DataElement<InMemDicomObject>>, AttributeError> {
        let tag = resolve_tag(key).ok_or_else(|| AttributeError::UnknownTag {
            key: key.to_string(),
        })?;
        let vr = resolve_vr(key, tag, self.overrides).ok_or_else(|| {
            AttributeError::UnresolvedVr {
                key: key.to_string(),
            }
        })?;

        let (vr, value) = coerce_value(key, raw, vr, |item| {
            if depth + 1 > MAX_SEQUENCE_DEPTH {
                return Err(AttributeError::DepthExceeded {
                    key: key.to_string(),
                    max: MAX_SEQUENCE_DEPTH,
                });
            }
            let mut nested = InMemDicomObject::new_empty();
            self.populate_at(item, depth + 1, &mut nested);
            Ok(nested)
        })?;

        if tag.group() == FILE_META_GROUP {
            tracing::debug!(key, "leaving file meta attribute to the file meta group");
            return Ok(None);
        }
        Ok(Some(DataElement::new(tag, vr, value)))
    }
}
