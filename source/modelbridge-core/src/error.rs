use thiserror::Error;

use crate::types::TensorType;

pub type Result<T> = std::result::Result<T, ModelError>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Error parsing model config: {0}")]
    ConfigParsingError(#[from] toml::de::Error),

    #[error("No backend available for platform '{0}'")]
    UnknownPlatform(String),

    #[error("The model has not been loaded. Call `load_model` first or set `load_model_at_construction`")]
    ModelNotLoaded,

    #[error("Malformed shape: {0}")]
    MalformedShape(String),

    #[error("Tensor '{name}' has shape {actual:?}, but the model expects {expected}")]
    ShapeMismatch {
        name: String,
        actual: Vec<u64>,
        expected: String,
    },

    #[error("Symbol '{symbol}' is {first} in one dimension but {second} in tensor '{name}'")]
    SymbolMismatch {
        name: String,
        symbol: String,
        first: u64,
        second: u64,
    },

    #[error("Tensor '{name}' is {actual}, but the model expects {expected}")]
    TypeMismatch {
        name: String,
        actual: TensorType,
        expected: TensorType,
    },

    #[error("Tensor name(s) '{0}' are not found in the input spec")]
    UnknownInput(String),

    #[error("Unsupported tensor type: {0}")]
    UnsupportedTensorType(TensorType),

    #[error("Expected {expected} {unit}, but got {actual}")]
    SizeMismatch {
        expected: usize,
        actual: usize,
        unit: &'static str,
    },

    #[error("Invalid visible device: {0}. Expected -1 (CPU) or a GPU index")]
    InvalidDevice(i32),

    #[error("Unknown tensor type tag: {0}")]
    UnknownTensorTag(i32),

    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] std::collections::TryReserveError),
}
