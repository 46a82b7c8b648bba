//! Model loading and export error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Safetensors error: {0}")]
    Safetensors(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing tensor: {0}")]
    MissingTensor(String),

    #[error("Invalid tensor shape for {name}: expected {expected:?}, got {got:?}")]
    InvalidShape {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid tensor dtype for {name}: expected f32, f16 or bf16, got {got}")]
    InvalidDtype { name: String, got: String },

    #[error("Invalid IDX file: {0}")]
    InvalidIdx(String),

    #[error("Sample index {index} out of range (dataset has {count} images)")]
    SampleOutOfRange { index: usize, count: usize },

    #[error("Export config error: {0}")]
    Config(String),

    #[error("Fixed-point error: {0}")]
    FixedPoint(#[from] neuromif_fixed_point::FixedPointError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
