//! Fixed-point error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixedPointError {
    #[error("Invalid input: {value} is not a finite number")]
    InvalidInput { value: f64 },

    #[error("Code {code} is outside the Q4.4 range [-128, 127]")]
    CodeOutOfRange { code: i16 },

    #[error("Malformed binary word {0:?}: expected exactly 16 characters of '0' or '1'")]
    MalformedWord(String),

    #[error("Malformed line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FixedPointError>;
