use crate::common::decoder::FrameDecoder;
use crate::common::store::ImagesetStore;
use crate::imagesets::error::{AssembleError, DicomizeError};
use crate::imagesets::models::metadata::{ImagesetMetadata, InstanceLevel, SeriesLevel};
use crate::imagesets::models::study::{DicomizedInstance, DicomizedStudy, Issue};
use crate::imagesets::models::work_item::{FrameGeometry, InstanceWorkItem};
use crate::imagesets::services::assemble::{assemble_record, InstanceLevels};
use crate::imagesets::services::frames::assemble_frames;
use crate::imagesets::services::vr::OverrideTable;
use crate::utils::dicom::attribute_to_int;

/// Converts the first series of an imageset into DICOM instances.
///
/// Fails only when the metadata document cannot be obtained or lists no series.
/// Every other failure removes at most one attribute, frame or instance and is
/// reported in [`DicomizedStudy::issues`].
pub async fn dicomize_imageset<S, D>(
    store: &S,
    decoder: &D,
    datastore_id: &str,
    imageset_id: &str,
) -> Result<DicomizedStudy, DicomizeError>
where
    S: ImagesetStore,
    D: FrameDecoder,
{
    let metadata = store
        .get_metadata(datastore_id, imageset_id)
        .await
        .map_err(|source| {
            tracing::error!(datastore_id, imageset_id, "failed to retrieve imageset metadata: {source}");
            DicomizeError::MetadataUnavailable {
                datastore_id: datastore_id.to_string(),
                imageset_id: imageset_id.to_string(),
                source,
            }
        })?;

    dicomize_metadata(store, decoder, &metadata, datastore_id, imageset_id).await
}

/// Converts the first series of an already retrieved metadata document.
pub async fn dicomize_metadata<S, D>(
    store: &S,
    decoder: &D,
    metadata: &ImagesetMetadata,
    datastore_id: &str,
    imageset_id: &str,
) -> Result<DicomizedStudy, DicomizeError>
where
    S: ImagesetStore,
    D: FrameDecoder,
{
    let (series_instance_uid, series) = metadata
        .first_series()
        .ok_or_else(|| DicomizeError::NoSeries(imageset_id.to_string()))?;

    if metadata.study.series.len() > 1 {
        tracing::warn!(
            imageset_id,
            "imageset holds {} series, only {} is converted",
            metadata.study.series.len(),
            series_instance_uid
        );
        for summary in metadata.series_summaries() {
            tracing::info!(?summary, "series");
        }
    }

    let mut issues = Vec::new();
    let work_items = enumerate_instances(
        metadata,
        series_instance_uid,
        series,
        datastore_id,
        imageset_id,
        &mut issues,
    );
    tracing::info!(
        series_instance_uid,
        "converting {} of {} instances",
        work_items.len(),
        series.instances.len()
    );

    let mut instances = Vec::with_capacity(work_items.len());
    for (mut item, instance) in work_items {
        assemble_frames(store, decoder, &mut item, &mut issues).await;

        match assemble_instance(metadata, series, instance, item, &mut issues) {
            Ok(instance) => {
                tracing::info!(
                    sop_instance_uid = %instance.sop_instance_uid,
                    instance_number = instance.instance_number,
                    "instance converted"
                );
                instances.push(instance);
            }
            Err((sop_instance_uid, err)) => {
                tracing::error!(%sop_instance_uid, "dropping instance: {err}");
                issues.push(Issue::InstanceDropped {
                    sop_instance_uid,
                    reason: err.to_string(),
                });
            }
        }
    }

    instances.sort_by_key(|instance| instance.instance_number);

    Ok(DicomizedStudy {
        series_instance_uid: series_instance_uid.to_string(),
        instances,
        issues,
    })
}

/// Lists the instances of a series that have frames, ordered by instance number.
fn enumerate_instances<'a>(
    metadata: &ImagesetMetadata,
    series_instance_uid: &str,
    series: &'a SeriesLevel,
    datastore_id: &str,
    imageset_id: &str,
    issues: &mut Vec<Issue>,
) -> Vec<(InstanceWorkItem, &'a InstanceLevel)> {
    let mut items = Vec::new();

    for (sop_instance_uid, instance) in series.instances.iter() {
        if instance.image_frames.is_empty() {
            tracing::info!(sop_instance_uid, "instance has no frames, skipping");
            continue;
        }

        let mut skip = |reason: String| {
            tracing::error!(sop_instance_uid, "skipping instance: {reason}");
            issues.push(Issue::InstanceSkipped {
                sop_instance_uid: sop_instance_uid.to_string(),
                reason,
            });
        };

        let Some(frame_ids) = instance
            .image_frames
            .iter()
            .map(|frame| frame.id.clone())
            .collect::<Option<Vec<_>>>()
        else {
            skip("a frame descriptor has no ID".to_string());
            continue;
        };

        let Some(instance_number) = attribute_to_int(&instance.dicom, "InstanceNumber") else {
            skip(match instance.dicom.get("InstanceNumber") {
                Some(value) => format!("InstanceNumber {value} is not an integer"),
                None => "InstanceNumber is missing".to_string(),
            });
            continue;
        };

        let levels = InstanceLevels {
            patient: &metadata.patient.dicom,
            study: &metadata.study.dicom,
            series: &series.dicom,
            instance: &instance.dicom,
        };

        let item = InstanceWorkItem {
            datastore_id: datastore_id.to_string(),
            imageset_id: imageset_id.to_string(),
            series_instance_uid: series_instance_uid.to_string(),
            sop_instance_uid: sop_instance_uid.to_string(),
            frame_ids,
            instance_number,
            geometry: FrameGeometry::from_levels(&levels.most_specific_first()),
            pixel_data: Vec::new(),
        };
        items.push((item, instance));
    }

    items.sort_by_key(|(item, _)| item.instance_number);
    items
}

fn assemble_instance(
    metadata: &ImagesetMetadata,
    series: &SeriesLevel,
    instance: &InstanceLevel,
    item: InstanceWorkItem,
    issues: &mut Vec<Issue>,
) -> Result<DicomizedInstance, (String, AssembleError)> {
    let InstanceWorkItem {
        sop_instance_uid,
        instance_number,
        pixel_data,
        ..
    } = item;

    let levels = InstanceLevels {
        patient: &metadata.patient.dicom,
        study: &metadata.study.dicom,
        series: &series.dicom,
        instance: &instance.dicom,
    };
    let overrides = OverrideTable::from(&instance.dicom_vrs);

    match assemble_record(levels, &overrides, pixel_data, &sop_instance_uid, issues) {
        Ok(obj) => Ok(DicomizedInstance {
            instance_number,
            sop_instance_uid,
            obj,
        }),
        Err(err) => Err((sop_instance_uid, err)),
    }
}
