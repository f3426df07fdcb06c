//! The imageset metadata document, as delivered by the imaging store.
//!
//! The document is a four level tree: patient, study, series (keyed by
//! Series Instance UID) and instance (keyed by SOP Instance UID). Every level
//! carries a `DICOM` attribute mapping whose values are kept as raw JSON until
//! they are transcoded.
use crate::utils::dicom::{attribute_to_int, attribute_to_str};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::marker::PhantomData;

/// A raw attribute mapping, iterated in document order.
pub type AttributeMap = serde_json::Map<String, serde_json::Value>;

/// The root of the imageset metadata document.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesetMetadata {
    #[serde(rename = "Patient", default)]
    pub patient: PatientLevel,

    #[serde(rename = "Study")]
    pub study: StudyLevel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientLevel {
    #[serde(rename = "DICOM", default)]
    pub dicom: AttributeMap,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudyLevel {
    #[serde(rename = "DICOM", default)]
    pub dicom: AttributeMap,

    #[serde(rename = "Series", default)]
    pub series: OrderedMap<SeriesLevel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesLevel {
    #[serde(rename = "DICOM", default)]
    pub dicom: AttributeMap,

    #[serde(rename = "Instances", default)]
    pub instances: OrderedMap<InstanceLevel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceLevel {
    #[serde(rename = "DICOM", default)]
    pub dicom: AttributeMap,

    /// Value representations declared for attributes the standard dictionary
    /// does not know, such as private tags.
    #[serde(rename = "DICOMVRs", default)]
    pub dicom_vrs: OrderedMap<String>,

    #[serde(rename = "ImageFrames", default)]
    pub image_frames: Vec<FrameDescriptor>,
}

/// A reference to one retrievable compressed frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameDescriptor {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
}

/// One line of the series listing of an imageset.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    pub series_instance_uid: String,
    pub series_number: Option<i64>,
    pub modality: Option<String>,
    pub series_description: String,
    pub instance_count: usize,
}

impl ImagesetMetadata {
    /// The first series listed in the document, with its Series Instance UID.
    pub fn first_series(&self) -> Option<(&str, &SeriesLevel)> {
        self.study.series.first()
    }

    /// Lists every series of the imageset in document order.
    pub fn series_summaries(&self) -> Vec<SeriesSummary> {
        self.study
            .series
            .iter()
            .map(|(uid, series)| SeriesSummary {
                series_instance_uid: uid.to_string(),
                series_number: attribute_to_int(&series.dicom, "SeriesNumber"),
                modality: attribute_to_str(&series.dicom, "Modality"),
                series_description: attribute_to_str(&series.dicom, "SeriesDescription")
                    .unwrap_or_default(),
                instance_count: series.instances.len(),
            })
            .collect()
    }
}

/// A JSON object deserialized into a list of entries, keeping document order.
#[derive(Debug, Clone)]
pub struct OrderedMap<T>(Vec<(String, T)>);

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

#[allow(clippy::len_without_is_empty)]
impl<T> OrderedMap<T> {
    /// Looks up the first entry with the given key.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn first(&self) -> Option<(&str, &T)> {
        self.0.first().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<T> FromIterator<(String, T)> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

struct OrderedMapVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for OrderedMapVisitor<T>
where
    T: Deserialize<'de>,
{
    type Value = OrderedMap<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, T>()? {
            entries.push((key, value));
        }
        Ok(OrderedMap(entries))
    }
}

impl<'de, T> Deserialize<'de> for OrderedMap<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}
