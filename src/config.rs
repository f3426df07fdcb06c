use crate::common::decoder::HTJ2K_LOSSLESS;
use clap::{Args, Parser};
use std::path::PathBuf;

/// Converts an exported medical imageset into DICOM files.
#[derive(Parser, Clone, Debug)]
#[command(name = "dicomize")]
pub struct AppConfig {
    /// Imageset store configuration
    #[clap(flatten)]
    pub store: StoreConfig,

    /// Imageset selection
    #[clap(flatten)]
    pub imageset: ImagesetConfig,

    /// Output configuration
    #[clap(flatten)]
    pub output: OutputConfig,

    /// Frame decoder configuration
    #[clap(flatten)]
    pub decoder: DecoderConfig,
}

impl AppConfig {
    /// Parse application configs from std::env::args_os(), exit on error.
    pub fn new() -> Self {
        Self::parse()
    }
}

/// Imageset store configuration
#[derive(Args, Clone, Debug)]
pub struct StoreConfig {
    /// The directory holding exported imagesets, one subdirectory per datastore.
    #[arg(long = "data-dir", env = "DATA_DIR", default_value = "./data")]
    pub path: String,
}

/// Imageset selection
#[derive(Args, Clone, Debug)]
pub struct ImagesetConfig {
    /// The datastore the imageset belongs to.
    #[arg(long, env)]
    pub datastore_id: String,

    /// The imageset to convert.
    #[arg(long, env)]
    pub imageset_id: String,
}

/// Output configuration
#[derive(Args, Clone, Debug)]
pub struct OutputConfig {
    /// The directory the DICOM files are written to.
    #[arg(id = "out_dir", long = "out-dir", env = "OUTPUT_DIR", default_value = "./out")]
    pub path: String,

    /// Also write a PNG preview of every instance.
    #[arg(long = "png", env = "EXPORT_PNG")]
    pub png: bool,

    /// Also write the DICOM JSON of every instance.
    #[arg(long = "json", env = "EXPORT_JSON")]
    pub json: bool,
}

impl OutputConfig {
    /// Helper method to get a path below the output directory.
    pub fn path(&self, path: impl AsRef<std::path::Path>) -> PathBuf {
        PathBuf::from(&self.path).join(path)
    }
}

/// Frame decoder configuration
#[derive(Args, Clone, Debug)]
pub struct DecoderConfig {
    /// The transfer syntax the stored frames are encoded in.
    #[arg(long = "transfer-syntax", env = "FRAME_TRANSFER_SYNTAX", default_value = HTJ2K_LOSSLESS)]
    pub transfer_syntax: String,
}
