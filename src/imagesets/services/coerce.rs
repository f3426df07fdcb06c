//! Conversion of raw JSON attribute values into typed DICOM values.
use crate::imagesets::error::AttributeError;
use crate::imagesets::models::metadata::AttributeMap;
use crate::imagesets::services::vr::{resolve_tag, vr_name};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dicom::core::dictionary::VirtualVr;
use dicom::core::value::{InMemFragment, Value, C};
use dicom::core::{PrimitiveValue, VR};
use dicom::object::InMemDicomObject;
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// The value type of an in-memory DICOM element.
pub type ElementValue = Value<InMemDicomObject, InMemFragment>;

/// Largest value a signed short can hold.
const SS_MAX: i64 = i16::MAX as i64;

/// Converts a raw attribute value to a DICOM value of the resolved VR.
///
/// Context dependent VRs are settled here, so the returned [`VR`] is the one to
/// encode the element with. Items of a sequence are handed to `nested`, which
/// builds the item data set.
pub fn coerce_value<F>(
    key: &str,
    raw: &JsonValue,
    vr: VirtualVr,
    nested: F,
) -> Result<(VR, ElementValue), AttributeError>
where
    F: FnMut(&AttributeMap) -> Result<InMemDicomObject, AttributeError>,
{
    match vr {
        VirtualVr::Exact(VR::SQ) => sequence(key, raw, nested).map(|v| (VR::SQ, v)),
        VirtualVr::Xs => us_or_ss(key, raw),
        VirtualVr::Lt => match raw {
            JsonValue::String(_) => binary(key, raw, VR::OW),
            _ => primitive(key, raw, VR::US),
        },
        VirtualVr::Exact(vr) if is_binary(vr) => binary(key, raw, vr),
        VirtualVr::Exact(vr) => primitive(key, raw, vr),
        // OB or OW, and anything else that is opaque
        _ => binary(key, raw, VR::OB),
    }
}

/// Whether a VR carries inline binary data, written as base64 in the metadata.
pub fn is_binary(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::UN
    )
}

fn sequence<F>(key: &str, raw: &JsonValue, mut nested: F) -> Result<ElementValue, AttributeError>
where
    F: FnMut(&AttributeMap) -> Result<InMemDicomObject, AttributeError>,
{
    let items: &[JsonValue] = match raw {
        JsonValue::Array(items) => items,
        JsonValue::Null => &[],
        _ => return Err(AttributeError::coercion(key, "SQ", "expected a list of items")),
    };
    let items = items
        .iter()
        .map(|item| match item {
            JsonValue::Object(attributes) => nested(attributes),
            _ => Err(AttributeError::coercion(
                key,
                "SQ",
                "sequence items must be attribute mappings",
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Sequence(items.into()))
}

/// A single integer is signed unless it does not fit a signed short;
/// multiple values are always unsigned.
fn us_or_ss(key: &str, raw: &JsonValue) -> Result<(VR, ElementValue), AttributeError> {
    match raw.as_i64() {
        Some(v) if v > SS_MAX => primitive(key, raw, VR::US),
        Some(_) => primitive(key, raw, VR::SS),
        None => primitive(key, raw, VR::US),
    }
}

fn binary(key: &str, raw: &JsonValue, vr: VR) -> Result<(VR, ElementValue), AttributeError> {
    let encoded = match raw {
        JsonValue::String(s) => s,
        JsonValue::Null => return Ok((vr, PrimitiveValue::Empty.into())),
        _ => return Err(AttributeError::coercion(key, vr, "expected a base64 string")),
    };
    let data = decode_base64(encoded).map_err(|err| AttributeError::coercion(key, vr, err))?;
    Ok((vr, PrimitiveValue::from(data).into()))
}

/// Decodes base64 text, tolerating the line breaks of MIME encoders.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}

fn primitive(key: &str, raw: &JsonValue, vr: VR) -> Result<(VR, ElementValue), AttributeError> {
    let items: Vec<&JsonValue> = match raw {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    if items.is_empty() {
        return Ok((vr, PrimitiveValue::Empty.into()));
    }

    let fail = |reason: &str| AttributeError::coercion(key, vr_name(VirtualVr::Exact(vr)), reason);

    let value = match vr {
        VR::AE
        | VR::AS
        | VR::CS
        | VR::DA
        | VR::DT
        | VR::LO
        | VR::LT
        | VR::SH
        | VR::ST
        | VR::TM
        | VR::UC
        | VR::UI
        | VR::UR
        | VR::UT
        | VR::DS
        | VR::IS => PrimitiveValue::Strs(collect(&items, text).ok_or_else(|| fail("expected text"))?),
        VR::PN => PrimitiveValue::Strs(
            collect(&items, person_name).ok_or_else(|| fail("expected a person name"))?,
        ),
        VR::AT => PrimitiveValue::Tags(
            collect(&items, |v| v.as_str().and_then(|s| resolve_tag(s.trim())))
                .ok_or_else(|| fail("expected a tag"))?,
        ),
        VR::SS => PrimitiveValue::I16(collect(&items, integer).ok_or_else(|| fail("expected 16-bit signed integers"))?),
        VR::US => PrimitiveValue::U16(collect(&items, integer).ok_or_else(|| fail("expected 16-bit unsigned integers"))?),
        VR::SL => PrimitiveValue::I32(collect(&items, integer).ok_or_else(|| fail("expected 32-bit signed integers"))?),
        VR::UL => PrimitiveValue::U32(collect(&items, integer).ok_or_else(|| fail("expected 32-bit unsigned integers"))?),
        VR::SV => PrimitiveValue::I64(collect(&items, integer).ok_or_else(|| fail("expected 64-bit signed integers"))?),
        VR::UV => PrimitiveValue::U64(collect(&items, integer).ok_or_else(|| fail("expected 64-bit unsigned integers"))?),
        VR::FL => PrimitiveValue::F32(
            collect(&items, |v| float(v).map(|f| f as f32)).ok_or_else(|| fail("expected numbers"))?,
        ),
        VR::FD => PrimitiveValue::F64(collect(&items, float).ok_or_else(|| fail("expected numbers"))?),
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::UN => {
            return binary(key, raw, vr);
        }
        VR::SQ => return Err(fail("sequences are not primitive values")),
    };
    Ok((vr, value.into()))
}

fn collect<T>(items: &[&JsonValue], convert: impl Fn(&JsonValue) -> Option<T>) -> Option<C<T>> {
    items.iter().map(|v| convert(*v)).collect()
}

fn text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Null => Some(String::new()),
        _ => None,
    }
}

/// Person names come as plain strings, or as DICOM JSON name groups.
fn person_name(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Object(groups) => {
            let group = |name: &str| groups.get(name).and_then(JsonValue::as_str).unwrap_or("");
            let name = [group("Alphabetic"), group("Ideographic"), group("Phonetic")]
                .join("=")
                .trim_end_matches('=')
                .to_string();
            Some(name)
        }
        other => text(other),
    }
}

fn integer<T>(value: &JsonValue) -> Option<T>
where
    T: TryFrom<i64> + TryFrom<u64> + FromStr,
{
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(|v| <T as TryFrom<i64>>::try_from(v).ok())
            .or_else(|| n.as_u64().and_then(|v| <T as TryFrom<u64>>::try_from(v).ok())),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
