//! Export configuration

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use neuromif_fixed_point::RoundingMode;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// One dense layer to export: `<tensor_prefix>.weight` / `<tensor_prefix>.bias`
/// become `<name>_weights.mif` / `<name>_biases.mif`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Tensor name prefix in the parameter file (e.g. "fc1")
    pub tensor_prefix: String,
    /// Output file stem (e.g. "layer_1")
    pub name: String,
    pub in_features: usize,
    pub out_features: usize,
}

impl LayerSpec {
    pub fn new(tensor_prefix: &str, name: &str, in_features: usize, out_features: usize) -> Self {
        Self {
            tensor_prefix: tensor_prefix.to_string(),
            name: name.to_string(),
            in_features,
            out_features,
        }
    }

    pub fn weight_tensor(&self) -> String {
        format!("{}.weight", self.tensor_prefix)
    }

    pub fn bias_tensor(&self) -> String {
        format!("{}.bias", self.tensor_prefix)
    }
}

/// Export configuration (parameter source, output locations, rounding)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Trained parameters in safetensors format
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Directory receiving the per-layer memory images
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// MNIST test images (IDX3)
    #[serde(default = "default_images_path")]
    pub images_path: PathBuf,

    /// MNIST test labels (IDX1), optional
    #[serde(default = "default_labels_path")]
    pub labels_path: Option<PathBuf>,

    /// Destination of the exported sample image
    #[serde(default = "default_sample_output")]
    pub sample_output: PathBuf,

    #[serde(default, with = "rounding_name")]
    pub rounding: RoundingMode,

    /// Layers in export order
    #[serde(default = "default_layers")]
    pub layers: Vec<LayerSpec>,
}

fn default_model_path() -> PathBuf { PathBuf::from("mnist_fixed_point.safetensors") }
fn default_out_dir() -> PathBuf { PathBuf::from(".") }
fn default_images_path() -> PathBuf { PathBuf::from("data/MNIST/raw/t10k-images-idx3-ubyte") }
fn default_labels_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/MNIST/raw/t10k-labels-idx1-ubyte"))
}
fn default_sample_output() -> PathBuf { PathBuf::from("mnist_sample.mif") }

/// 784 -> 128 -> 32 -> 10
fn default_layers() -> Vec<LayerSpec> {
    vec![
        LayerSpec::new("fc1", "layer_1", 784, 128),
        LayerSpec::new("fc2", "layer_2", 128, 32),
        LayerSpec::new("fc3", "layer_3", 32, 10),
    ]
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            out_dir: default_out_dir(),
            images_path: default_images_path(),
            labels_path: default_labels_path(),
            sample_output: default_sample_output(),
            rounding: RoundingMode::default(),
            layers: default_layers(),
        }
    }
}

impl ExportConfig {
    /// Load config from a JSON file; missing keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Override fields from `NEUROMIF_*` environment variables
    pub fn with_env(mut self) -> Self {
        if let Ok(path) = std::env::var("NEUROMIF_MODEL") {
            self.model_path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("NEUROMIF_OUT_DIR") {
            self.out_dir = PathBuf::from(dir);
        }

        if let Ok(path) = std::env::var("NEUROMIF_IMAGES") {
            self.images_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("NEUROMIF_LABELS") {
            self.labels_path = Some(PathBuf::from(path));
        }

        if let Ok(mode) = std::env::var("NEUROMIF_ROUNDING") {
            match mode.parse() {
                Ok(m) => self.rounding = m,
                Err(e) => tracing::warn!("Ignoring NEUROMIF_ROUNDING: {}", e),
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(ModelError::Config("no layers to export".to_string()));
        }

        let mut names = HashSet::new();
        for layer in &self.layers {
            if layer.name.is_empty() || layer.tensor_prefix.is_empty() {
                return Err(ModelError::Config(format!(
                    "layer {:?} needs both a name and a tensor prefix",
                    layer
                )));
            }
            if layer.in_features == 0 || layer.out_features == 0 {
                return Err(ModelError::Config(format!(
                    "layer '{}' has a zero dimension ({} x {})",
                    layer.name, layer.out_features, layer.in_features
                )));
            }
            if !names.insert(layer.name.as_str()) {
                return Err(ModelError::Config(format!(
                    "layer name '{}' is used more than once; its files would overwrite each other",
                    layer.name
                )));
            }
        }
        Ok(())
    }
}

/// Rounding modes are stored by name
mod rounding_name {
    use neuromif_fixed_point::RoundingMode;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mode: &RoundingMode, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(mode.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<RoundingMode, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(D::Error::custom)
    }
}
