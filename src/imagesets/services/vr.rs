//! Value representation resolution.
//!
//! The standard data dictionary is authoritative. Attributes it does not know
//! (private tags, mostly) fall back to the VRs declared per instance in the
//! metadata document.
use crate::imagesets::models::metadata::OrderedMap;
use dicom::core::dictionary::{DataDictionaryEntry, VirtualVr};
use dicom::core::{DataDictionary, Tag, VR};
use dicom::object::StandardDataDictionary;
use std::collections::HashMap;
use std::str::FromStr;

/// VR declarations of one instance, keyed by attribute identifier.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<String, VirtualVr>,
}

impl OverrideTable {
    pub fn get(&self, key: &str) -> Option<VirtualVr> {
        self.entries.get(key).copied()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for OverrideTable {
    /// The first usable declaration of an attribute wins.
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut entries = HashMap::new();
        for (key, code) in iter {
            match parse_vr_code(code) {
                Some(vr) => {
                    entries.entry(key.to_string()).or_insert(vr);
                }
                None => tracing::debug!(key, code, "ignoring unknown VR declaration"),
            }
        }
        OverrideTable { entries }
    }
}

impl From<&OrderedMap<String>> for OverrideTable {
    fn from(declarations: &OrderedMap<String>) -> Self {
        declarations
            .iter()
            .map(|(key, code)| (key, code.as_str()))
            .collect()
    }
}

/// Parses a VR code as written in the metadata document,
/// including the composite spellings of context dependent VRs.
pub fn parse_vr_code(code: &str) -> Option<VirtualVr> {
    match code.trim() {
        "US or SS" | "SS or US" => Some(VirtualVr::Xs),
        "OB or OW" | "OW or OB" => Some(VirtualVr::Ox),
        "US or OW" | "US or SS or OW" => Some(VirtualVr::Lt),
        code => VR::from_str(code).ok().map(VirtualVr::Exact),
    }
}

/// Resolves an attribute identifier, either a keyword (`PatientName`)
/// or a tag expression (`00100010`, `(0010,0010)`), to its tag.
pub fn resolve_tag(key: &str) -> Option<Tag> {
    if key.len() == 8 && key.bytes().all(|b| b.is_ascii_hexdigit()) {
        let group = u16::from_str_radix(&key[..4], 16).ok()?;
        let element = u16::from_str_radix(&key[4..], 16).ok()?;
        return Some(Tag(group, element));
    }
    StandardDataDictionary.parse_tag(key)
}

/// Resolves the value representation of an attribute.
///
/// Returns `None` when neither the dictionary nor the overrides know the attribute.
pub fn resolve_vr(key: &str, tag: Tag, overrides: &OverrideTable) -> Option<VirtualVr> {
    StandardDataDictionary
        .by_tag(tag)
        .map(|entry| entry.vr())
        .or_else(|| overrides.get(key))
}

/// Human readable name of a VR, as used in diagnostics.
pub fn vr_name(vr: VirtualVr) -> String {
    match vr {
        VirtualVr::Exact(vr) => String::from(vr.to_string()),
        VirtualVr::Xs => "US or SS".to_string(),
        VirtualVr::Ox | VirtualVr::Px => "OB or OW".to_string(),
        VirtualVr::Lt => "US or OW".to_string(),
        other => format!("{other:?}"),
    }
}
