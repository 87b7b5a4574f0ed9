use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::OnceCell;

use crate::allocator::TensorAllocator;
use crate::backend::{backend_for_platform, Backend};
use crate::config::CONFIG;
use crate::error::{ModelError, Result};
use crate::info::{Dimension, TensorSpec};
use crate::types::{RuntimeOptions, ValueMap};

pub struct Model {
    name: String,
    platform: String,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
    model_dir: PathBuf,
    opts: RuntimeOptions,
    backend: Box<dyn Backend>,

    /// Set once the backend has loaded the model
    loaded: OnceCell<()>,
}

impl Model {
    /// Load a model given a path to a model directory (or directly to its config file) and options
    pub async fn load<P: AsRef<Path>>(path: P, opts: RuntimeOptions) -> Result<Self> {
        let path = path.as_ref();
        let (model_dir, config_path) = if tokio::fs::metadata(path).await?.is_file() {
            let dir = path.parent().unwrap_or(Path::new(".")).to_owned();
            (dir, path.to_owned())
        } else {
            (path.to_owned(), path.join(&CONFIG.model_config_name))
        };

        let data = tokio::fs::read(&config_path).await?;
        let config = crate::format::parse(&data)?;
        let backend = backend_for_platform(&config.platform)?;

        let model = Self {
            name: config.name,
            platform: config.platform,
            inputs: config
                .input
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            outputs: config
                .output
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            model_dir,
            opts,
            backend,
            loaded: OnceCell::new(),
        };

        log::info!(
            "Created model '{}' (platform: {}) from {:?}",
            model.name,
            model.platform,
            model.model_dir
        );

        if model.opts.load_model_at_construction {
            model.load_model().await?;
        }

        Ok(model)
    }

    /// Load the model if it isn't already loaded. Only needed if `load_model_at_construction`
    /// was false
    pub async fn load_model(&self) -> Result<()> {
        self.loaded
            .get_or_try_init(|| async {
                self.backend.load(&self.model_dir, &self.opts).await?;
                log::info!("Loaded model '{}'", self.name);
                Ok::<_, ModelError>(())
            })
            .await?;

        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Run inference
    pub async fn infer(&self, inputs: &ValueMap) -> Result<ValueMap> {
        if !self.is_loaded() {
            return Err(ModelError::ModelNotLoaded);
        }

        if !self.opts.disable_shape_and_type_checking {
            self.validate_inputs(inputs)?;
        }

        self.backend.infer(inputs).await
    }

    /// Check that every input is declared in the input spec with a matching type and shape.
    /// Dimensions that share a symbol must have the same extent across all inputs
    fn validate_inputs(&self, inputs: &ValueMap) -> Result<()> {
        let mut symbols: HashMap<&str, u64> = HashMap::new();

        // Sort so errors are deterministic
        let mut names: Vec<_> = inputs.keys().collect();
        names.sort();

        for name in names {
            let spec = self
                .inputs
                .iter()
                .find(|spec| &spec.name == name)
                .ok_or_else(|| ModelError::UnknownInput(name.clone()))?;

            let tensor = inputs[name].read();
            let actual_type = tensor.tensor_type();
            if actual_type != spec.dtype {
                return Err(ModelError::TypeMismatch {
                    name: name.clone(),
                    actual: actual_type,
                    expected: spec.dtype,
                });
            }

            let dims = tensor.dims();
            let shape_mismatch = || ModelError::ShapeMismatch {
                name: name.clone(),
                actual: dims.clone(),
                expected: spec.shape_string(),
            };

            if dims.len() != spec.dims.len() {
                return Err(shape_mismatch());
            }

            for (actual, expected) in dims.iter().zip(&spec.dims) {
                match expected {
                    Dimension::Value(v) if v != actual => return Err(shape_mismatch()),
                    Dimension::Symbol(symbol) => {
                        let first = *symbols.entry(symbol.as_str()).or_insert(*actual);
                        if first != *actual {
                            return Err(ModelError::SymbolMismatch {
                                name: name.clone(),
                                symbol: symbol.clone(),
                                first,
                                second: *actual,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    /// The allocator to use for tensors passed to this model
    pub fn tensor_allocator(&self) -> Arc<dyn TensorAllocator> {
        self.backend.tensor_allocator()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.opts
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
}
