use dicom::core::Tag;
use dicom::object::InMemDicomObject;
use serde_json::Value;

use crate::imagesets::models::metadata::AttributeMap;

/// Gets an optional string value from a DICOM attribute with the given tag.
pub fn element_to_str(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches('\0').trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Gets an optional integer value from a DICOM attribute with the given tag.
pub fn element_to_int(obj: &InMemDicomObject, tag: Tag) -> Option<i64> {
    obj.element(tag).ok().and_then(|e| e.to_int::<i64>().ok())
}

/// Gets the textual form of a raw metadata attribute.
///
/// Numbers are rendered as their JSON text and the first item of a list is used.
pub fn attribute_to_str(attributes: &AttributeMap, key: &str) -> Option<String> {
    match first_item(attributes.get(key)?)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Gets the integer form of a raw metadata attribute, accepting integer strings
/// and whole numbers written with a fraction (`1.0`).
pub fn attribute_to_int(attributes: &AttributeMap, key: &str) -> Option<i64> {
    match first_item(attributes.get(key)?)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|v| v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64)
                .map(|v| v as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_item(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}
