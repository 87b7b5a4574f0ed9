//! Backends actually run models. Each model config names the platform it needs and
//! `backend_for_platform` picks the matching backend.

use std::sync::Arc;

use async_trait::async_trait;

use crate::allocator::{default_allocator, TensorAllocator};
use crate::error::{ModelError, Result};
use crate::types::{RuntimeOptions, ValueMap};

#[async_trait]
pub trait Backend: Send + Sync {
    /// Load the model in `model_dir`. Called at most once
    async fn load(&self, model_dir: &std::path::Path, opts: &RuntimeOptions) -> Result<()>;

    /// Run inference. `inputs` has already been validated against the model's input spec
    /// (unless checking was disabled)
    async fn infer(&self, inputs: &ValueMap) -> Result<ValueMap>;

    /// The allocator that should be used for tensors passed to this backend
    fn tensor_allocator(&self) -> Arc<dyn TensorAllocator> {
        default_allocator()
    }
}

/// A backend that returns its inputs unchanged
#[derive(Debug, Default)]
pub struct NoopBackend;

#[async_trait]
impl Backend for NoopBackend {
    async fn load(&self, model_dir: &std::path::Path, _opts: &RuntimeOptions) -> Result<()> {
        log::debug!(target: "noop", "Nothing to load for {model_dir:?}");
        Ok(())
    }

    async fn infer(&self, inputs: &ValueMap) -> Result<ValueMap> {
        // Let's just return the input tensors
        Ok(inputs.clone())
    }
}

pub fn backend_for_platform(platform: &str) -> Result<Box<dyn Backend>> {
    match platform {
        "noop" | "identity" => Ok(Box::new(NoopBackend)),
        other => Err(ModelError::UnknownPlatform(other.to_owned())),
    }
}
