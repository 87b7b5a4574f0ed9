//! The model runtime wrapped by the `modelbridge` bindings.
//!
//! It loads models from a directory containing a `model.toml`, allocates tensors and runs
//! inference with a backend chosen by the model's platform.

pub mod allocator;
pub mod backend;
pub mod config;
pub mod error;
mod format;
pub mod info;
mod model;
pub mod types;

pub use crate::model::Model;
