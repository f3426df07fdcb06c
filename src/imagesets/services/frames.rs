use crate::common::decoder::FrameDecoder;
use crate::common::store::ImagesetStore;
use crate::imagesets::error::FrameError;
use crate::imagesets::models::study::Issue;
use crate::imagesets::models::work_item::{FrameGeometry, InstanceWorkItem};

/// Fetches, decodes and concatenates the frames of one instance into its pixel data.
///
/// Frames are appended in the order they are listed. A frame that cannot be
/// fetched or decoded is left out and reported; the others are still appended.
pub async fn assemble_frames<S, D>(
    store: &S,
    decoder: &D,
    item: &mut InstanceWorkItem,
    issues: &mut Vec<Issue>,
) where
    S: ImagesetStore,
    D: FrameDecoder,
{
    let InstanceWorkItem {
        datastore_id,
        imageset_id,
        sop_instance_uid,
        frame_ids,
        geometry,
        pixel_data,
        ..
    } = item;

    for frame_id in frame_ids.iter() {
        match frame_samples(store, decoder, datastore_id, imageset_id, frame_id, geometry).await {
            Ok(samples) => pixel_data.extend_from_slice(&samples),
            Err(err) => {
                tracing::warn!(sop_instance_uid = %sop_instance_uid, frame_id = %frame_id, "skipping frame: {err}");
                issues.push(Issue::FrameSkipped {
                    sop_instance_uid: sop_instance_uid.clone(),
                    frame_id: frame_id.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
}

async fn frame_samples<S, D>(
    store: &S,
    decoder: &D,
    datastore_id: &str,
    imageset_id: &str,
    frame_id: &str,
    geometry: &FrameGeometry,
) -> Result<Vec<u8>, FrameError>
where
    S: ImagesetStore,
    D: FrameDecoder,
{
    let blob = store.get_frame(datastore_id, imageset_id, frame_id).await?;
    Ok(decoder.decode(&blob, geometry)?)
}
