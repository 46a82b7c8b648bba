//! neuromif Parameter and Sample Export
//!
//! Loads trained dense-layer parameters (safetensors) and MNIST test images
//! (IDX) and writes them as Q4.4 memory images.

mod config;
mod error;
mod layers;
mod loader;
mod mnist;

pub use config::{ExportConfig, LayerSpec};
pub use error::{ModelError, Result};
pub use layers::{export_layer, export_model, LayerExport, LayerParams};
pub use loader::{SafetensorsLoader, TensorData};
pub use mnist::{
    export_sample, IdxImages, IdxLabels, MnistSample, SampleSource, IMAGE_MAGIC, LABEL_MAGIC,
};
