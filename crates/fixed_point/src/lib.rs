//! neuromif Fixed-Point Encoding
//!
//! Q4.4 quantization of floating-point scalars and the line-oriented
//! binary-text format used to initialise hardware memories.

mod error;
mod fixed;
mod mif;

pub use error::{FixedPointError, Result};
pub use fixed::{
    decode_binary16, quantize, serialize_binary16, Q44, Quantized, RoundingMode, FRAC_BITS,
    SCALE, WORD_BITS,
};
pub use mif::{export_lines, export_lines_with, read_codes, read_lines, write_lines, ExportSummary};
