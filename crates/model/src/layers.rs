//! Per-layer memory image export

use std::path::{Path, PathBuf};

use neuromif_fixed_point::{export_lines_with, ExportSummary, RoundingMode};

use crate::config::ExportConfig;
use crate::error::{ModelError, Result};
use crate::loader::SafetensorsLoader;

/// Parameters of a dense layer (Y = XW^T + b)
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParams {
    /// Output file stem
    pub name: String,
    pub in_features: usize,
    pub out_features: usize,
    /// Weight matrix (out_features × in_features), row-major
    pub weight: Vec<f32>,
    /// Bias vector (out_features)
    pub bias: Vec<f32>,
}

impl LayerParams {
    /// Build from f32 parameters, checking the shapes
    pub fn from_f32(
        name: &str,
        weight: Vec<f32>,
        bias: Vec<f32>,
        in_features: usize,
        out_features: usize,
    ) -> Result<Self> {
        if weight.len() != in_features * out_features {
            return Err(ModelError::InvalidShape {
                name: format!("{} weight", name),
                expected: vec![out_features, in_features],
                got: vec![weight.len()],
            });
        }
        if bias.len() != out_features {
            return Err(ModelError::InvalidShape {
                name: format!("{} bias", name),
                expected: vec![out_features],
                got: vec![bias.len()],
            });
        }

        Ok(Self {
            name: name.to_string(),
            in_features,
            out_features,
            weight,
            bias,
        })
    }

    pub fn weights_file_name(&self) -> String {
        format!("{}_weights.mif", self.name)
    }

    pub fn biases_file_name(&self) -> String {
        format!("{}_biases.mif", self.name)
    }
}

/// Files written for one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerExport {
    pub name: String,
    pub weights_path: PathBuf,
    pub weights: ExportSummary,
    pub biases_path: PathBuf,
    pub biases: ExportSummary,
}

impl LayerExport {
    pub fn clipped(&self) -> usize {
        self.weights.clipped + self.biases.clipped
    }
}

fn export_file(values: &[f32], path: &Path, mode: RoundingMode) -> Result<ExportSummary> {
    let summary = export_lines_with(values.iter().copied(), path, mode)?;
    if summary.clipped > 0 {
        tracing::warn!(
            path = %path.display(),
            clipped = summary.clipped,
            total = summary.lines,
            "Values saturated to the Q4.4 range"
        );
    }
    tracing::info!("Saved: {}", path.display());
    Ok(summary)
}

/// Write `<name>_weights.mif` and `<name>_biases.mif` into `out_dir`
pub fn export_layer(
    params: &LayerParams,
    out_dir: &Path,
    mode: RoundingMode,
) -> Result<LayerExport> {
    let weights_path = out_dir.join(params.weights_file_name());
    let weights = export_file(&params.weight, &weights_path, mode)?;

    let biases_path = out_dir.join(params.biases_file_name());
    let biases = export_file(&params.bias, &biases_path, mode)?;

    Ok(LayerExport {
        name: params.name.clone(),
        weights_path,
        weights,
        biases_path,
        biases,
    })
}

/// Export every configured layer from a parameter file, in config order
pub fn export_model(loader: &SafetensorsLoader, config: &ExportConfig) -> Result<Vec<LayerExport>> {
    config.validate()?;

    tracing::info!(
        layers = config.layers.len(),
        rounding = %config.rounding,
        "Exporting Q4.4 weights in 16-bit MIF format"
    );

    // Load everything first so a bad tensor fails before any file is touched
    let params = config
        .layers
        .iter()
        .map(|spec| loader.load_layer(spec))
        .collect::<Result<Vec<_>>>()?;

    params
        .iter()
        .map(|layer| export_layer(layer, &config.out_dir, config.rounding))
        .collect()
}
