//! Safetensors parameter loading

use std::fs::File;
use std::io::Read;
use std::path::Path;

use half::{bf16, f16};
use safetensors::{Dtype, SafeTensors};

use crate::config::LayerSpec;
use crate::error::{ModelError, Result};
use crate::layers::LayerParams;

/// A tensor decoded to f32, in stored row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// Load trained parameters from a safetensors file
pub struct SafetensorsLoader {
    /// Raw safetensors data
    data: Vec<u8>,
}

impl SafetensorsLoader {
    /// Load from a `.safetensors` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let loader = Self::from_bytes(data)?;
        tracing::debug!(path = %path.as_ref().display(), "Parameter file loaded");
        Ok(loader)
    }

    /// Wrap an in-memory safetensors buffer
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        // Reject a bad header up front rather than on first tensor access
        SafeTensors::deserialize(&data).map_err(|e| ModelError::Safetensors(e.to_string()))?;
        Ok(Self { data })
    }

    fn tensors(&self) -> Result<SafeTensors<'_>> {
        SafeTensors::deserialize(&self.data).map_err(|e| ModelError::Safetensors(e.to_string()))
    }

    /// Get tensor names in the safetensors file
    pub fn tensor_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .tensors()?
            .names()
            .into_iter()
            .map(String::from)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Load a tensor as f32 values
    pub fn load_tensor(&self, name: &str) -> Result<TensorData> {
        let tensors = self.tensors()?;
        let tensor = tensors
            .tensor(name)
            .map_err(|_| ModelError::MissingTensor(name.to_string()))?;

        let data = tensor.data();
        let values: Vec<f32> = match tensor.dtype() {
            Dtype::F32 => data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            Dtype::BF16 => data
                .chunks_exact(2)
                .map(|b| bf16::from_bits(u16::from_le_bytes([b[0], b[1]])).to_f32())
                .collect(),
            Dtype::F16 => data
                .chunks_exact(2)
                .map(|b| f16::from_bits(u16::from_le_bytes([b[0], b[1]])).to_f32())
                .collect(),
            other => {
                return Err(ModelError::InvalidDtype {
                    name: name.to_string(),
                    got: format!("{:?}", other),
                });
            }
        };

        Ok(TensorData {
            shape: tensor.shape().to_vec(),
            values,
        })
    }

    /// Load a tensor and check it has the expected shape
    pub fn load_tensor_shaped(&self, name: &str, expected: &[usize]) -> Result<Vec<f32>> {
        let tensor = self.load_tensor(name)?;
        if tensor.shape != expected {
            return Err(ModelError::InvalidShape {
                name: name.to_string(),
                expected: expected.to_vec(),
                got: tensor.shape,
            });
        }
        Ok(tensor.values)
    }

    /// Load the weight `[out, in]` and bias `[out]` of one dense layer
    pub fn load_layer(&self, spec: &LayerSpec) -> Result<LayerParams> {
        let weight = self.load_tensor_shaped(
            &spec.weight_tensor(),
            &[spec.out_features, spec.in_features],
        )?;
        let bias = self.load_tensor_shaped(&spec.bias_tensor(), &[spec.out_features])?;

        tracing::debug!(
            layer = %spec.name,
            prefix = %spec.tensor_prefix,
            weights = weight.len(),
            biases = bias.len(),
            "Layer parameters loaded"
        );

        LayerParams::from_f32(&spec.name, weight, bias, spec.in_features, spec.out_features)
    }
}
