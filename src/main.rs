use imageset_dicomizer::config::AppConfig;
use imageset_dicomizer::utils::dicom::element_to_str;
use imageset_dicomizer::{
    dicomize_imageset, save_as_dicom, save_as_png, to_dicom_json, DirectoryStore,
    TransferSyntaxDecoder,
};
use dicom::dictionary_std::tags;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // load environment variables from .env file
    dotenvy::dotenv().ok();

    // parse application configuration
    let config = AppConfig::new();

    // set up tracing
    tracing_subscriber::fmt::init();

    let store = DirectoryStore::new(&config.store.path);
    let decoder = TransferSyntaxDecoder::new(&config.decoder.transfer_syntax);

    let study = match dicomize_imageset(
        &store,
        &decoder,
        &config.imageset.datastore_id,
        &config.imageset.imageset_id,
    )
    .await
    {
        Ok(study) => study,
        Err(err) => {
            tracing::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut saved = 0;
    for instance in &study.instances {
        let study_uid = element_to_str(&instance.obj, tags::STUDY_INSTANCE_UID)
            .unwrap_or_else(|| config.imageset.imageset_id.clone());
        let dir = config.output.path(format!("dcm_{study_uid}"));

        if save_as_dicom(&instance.obj, &dir) {
            saved += 1;
        }

        if config.output.png {
            let file = config
                .output
                .path(format!("png_{study_uid}"))
                .join(format!("{}.png", instance.sop_instance_uid));
            save_as_png(&instance.obj, file);
        }

        if config.output.json {
            let file = dir.join(format!("{}.json", instance.sop_instance_uid));
            let written = to_dicom_json(&instance.obj)
                .and_then(|json| Ok(serde_json::to_vec_pretty(&json)?))
                .and_then(|bytes| Ok(std::fs::write(&file, bytes)?));
            if let Err(err) = written {
                tracing::error!(file = %file.display(), "Failed to save DICOM JSON: {err}");
            }
        }
    }

    tracing::info!(
        series_instance_uid = %study.series_instance_uid,
        instances = study.instances.len(),
        saved,
        skipped_attributes = study.skipped_attributes(),
        skipped_frames = study.skipped_frames(),
        lost_instances = study.lost_instances(),
        "imageset converted"
    );
    for issue in &study.issues {
        tracing::debug!("{issue}");
    }

    if saved == study.instances.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
