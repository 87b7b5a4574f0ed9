// Copyright 2023 Vivek Panyam
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    ffi::{c_char, CString},
    sync::Arc,
};

use modelbridge_core::{info::TensorSpec, types::TensorType, Model};

use crate::{
    bridge::{bridge, Bridge},
    error::{boundary, BoundaryError, Result},
    registry::Handle,
    shape::WireShape,
    types::{BridgeStatus, BridgeTensorSpec},
    utils::{c_string, out_arg, runtime, str_arg},
    value_map::BridgeValueMap,
};

/// The name, type and shape of one model input or output in the form used across the boundary
#[derive(Debug, Clone, PartialEq)]
pub struct WireTensorSpec {
    pub name: String,
    pub dtype: TensorType,
    pub shape: WireShape,
}

/// A tensor spec along with C strings that stay alive as long as the model
struct ExportedSpec {
    wire: WireTensorSpec,
    name: CString,

    /// Owns the strings `symbol_ptrs` points to
    _symbols: Vec<Option<CString>>,
    symbol_ptrs: Vec<*const c_char>,
}

// SAFETY: `symbol_ptrs` only points into `_symbols`, which is never modified after construction
unsafe impl Send for ExportedSpec {}
unsafe impl Sync for ExportedSpec {}

impl ExportedSpec {
    fn new(spec: &TensorSpec) -> Result<Self> {
        let shape = WireShape::encode(&spec.dims)?;
        let symbols = shape
            .symbols
            .iter()
            .map(|s| s.as_deref().map(c_string).transpose())
            .collect::<Result<Vec<_>>>()?;

        let symbol_ptrs = symbols
            .iter()
            .map(|s| s.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()))
            .collect();

        Ok(Self {
            name: c_string(&spec.name)?,
            wire: WireTensorSpec {
                name: spec.name.clone(),
                dtype: spec.dtype,
                shape,
            },
            _symbols: symbols,
            symbol_ptrs,
        })
    }

    fn to_c(&self) -> BridgeTensorSpec {
        BridgeTensorSpec {
            name: self.name.as_ptr(),
            dtype: self.wire.dtype.tag(),
            dims: self.wire.shape.dims.as_ptr(),
            num_dims: self.wire.shape.dims.len() as u64,
            symbols: self.symbol_ptrs.as_ptr(),
        }
    }
}

/// A loaded model plus the strings we hand out for it
pub struct BridgeModel {
    inner: Model,
    name: CString,
    platform: CString,
    inputs: Vec<ExportedSpec>,
    outputs: Vec<ExportedSpec>,
}

impl BridgeModel {
    fn new(inner: Model) -> Result<Self> {
        let export = |specs: &[TensorSpec]| -> Result<Vec<ExportedSpec>> {
            specs.iter().map(ExportedSpec::new).collect()
        };

        Ok(Self {
            name: c_string(inner.name())?,
            platform: c_string(inner.platform())?,
            inputs: export(inner.inputs())?,
            outputs: export(inner.outputs())?,
            inner,
        })
    }

    pub fn model(&self) -> &Model {
        &self.inner
    }
}

fn spec_at(specs: &[ExportedSpec], index: u64) -> Result<&ExportedSpec> {
    specs.get(index as usize).ok_or_else(|| {
        BoundaryError::InvalidArgument(format!(
            "index {index} is out of bounds for a model with {} specs",
            specs.len()
        ))
    })
}

impl Bridge {
    /// Load a model from a directory (or its config file). A null `options` handle means
    /// the default options
    pub fn create_model(&self, path: &str, options: Handle) -> Result<Handle> {
        let opts = self.options_or_default(options)?;
        let model = runtime().block_on(Model::load(path, opts))?;
        let model = BridgeModel::new(model)?;
        Ok(self.models.put(Arc::new(model)))
    }

    /// Load a model that was created with `load_model_at_construction` disabled.
    /// Does nothing if it's already loaded
    pub fn load_model(&self, model: Handle) -> Result<()> {
        let model = self.models.get(model)?;
        runtime().block_on(model.inner.load_model())?;
        Ok(())
    }

    pub fn model_name(&self, model: Handle) -> Result<String> {
        Ok(self.models.get(model)?.inner.name().to_owned())
    }

    pub fn model_platform(&self, model: Handle) -> Result<String> {
        Ok(self.models.get(model)?.inner.platform().to_owned())
    }

    pub fn model_inputs(&self, model: Handle) -> Result<Vec<WireTensorSpec>> {
        let model = self.models.get(model)?;
        Ok(model.inputs.iter().map(|s| s.wire.clone()).collect())
    }

    pub fn model_outputs(&self, model: Handle) -> Result<Vec<WireTensorSpec>> {
        let model = self.models.get(model)?;
        Ok(model.outputs.iter().map(|s| s.wire.clone()).collect())
    }

    /// Run inference and register the outputs as a new value map.
    /// Output values may be shared with the inputs
    pub fn infer(&self, model: Handle, inputs: Handle) -> Result<Handle> {
        let model = self.models.get(model)?;
        let inputs = self.value_maps.get(inputs)?.snapshot();

        let outputs = runtime().block_on(model.inner.infer(&inputs))?;
        Ok(self.value_maps.put(Arc::new(BridgeValueMap::from(outputs))))
    }

    pub fn release_model(&self, model: Handle) {
        self.models.remove(model)
    }
}

/// Load a model from a directory containing a model config (or from the config file itself).
/// `options` can be 0 to use the defaults
#[no_mangle]
pub extern "C" fn bridge_model_create(
    path: *const c_char,
    options: i64,
    handle_out: *mut i64,
) -> BridgeStatus {
    boundary("bridge_model_create", || {
        let path = str_arg(path, "path")?;
        let handle_out = out_arg(handle_out, "handle_out")?;
        *handle_out = bridge()
            .create_model(path, Handle::from_raw(options))?
            .as_raw();
        Ok(())
    })
}

/// Load a model that was created without loading it
#[no_mangle]
pub extern "C" fn bridge_model_load(model: i64) -> BridgeStatus {
    boundary("bridge_model_load", || {
        bridge().load_model(Handle::from_raw(model))
    })
}

/// Get the name of a model.
/// Note: the returned pointer is only valid until the model is released
#[no_mangle]
pub extern "C" fn bridge_model_name(model: i64, name_out: *mut *const c_char) -> BridgeStatus {
    boundary("bridge_model_name", || {
        let name_out = out_arg(name_out, "name_out")?;
        *name_out = bridge().models.get(Handle::from_raw(model))?.name.as_ptr();
        Ok(())
    })
}

/// Get the platform of a model.
/// Note: the returned pointer is only valid until the model is released
#[no_mangle]
pub extern "C" fn bridge_model_platform(
    model: i64,
    platform_out: *mut *const c_char,
) -> BridgeStatus {
    boundary("bridge_model_platform", || {
        let platform_out = out_arg(platform_out, "platform_out")?;
        *platform_out = bridge()
            .models
            .get(Handle::from_raw(model))?
            .platform
            .as_ptr();
        Ok(())
    })
}

/// Get the number of inputs of a model
#[no_mangle]
pub extern "C" fn bridge_model_num_inputs(model: i64, num_out: *mut u64) -> BridgeStatus {
    boundary("bridge_model_num_inputs", || {
        let num_out = out_arg(num_out, "num_out")?;
        *num_out = bridge().models.get(Handle::from_raw(model))?.inputs.len() as u64;
        Ok(())
    })
}

/// Get the number of outputs of a model
#[no_mangle]
pub extern "C" fn bridge_model_num_outputs(model: i64, num_out: *mut u64) -> BridgeStatus {
    boundary("bridge_model_num_outputs", || {
        let num_out = out_arg(num_out, "num_out")?;
        *num_out = bridge().models.get(Handle::from_raw(model))?.outputs.len() as u64;
        Ok(())
    })
}

/// Describe the input at `index`.
/// Note: pointers in the spec are only valid until the model is released
#[no_mangle]
pub extern "C" fn bridge_model_input(
    model: i64,
    index: u64,
    spec_out: *mut BridgeTensorSpec,
) -> BridgeStatus {
    boundary("bridge_model_input", || {
        let spec_out = out_arg(spec_out, "spec_out")?;
        let model = bridge().models.get(Handle::from_raw(model))?;
        *spec_out = spec_at(&model.inputs, index)?.to_c();
        Ok(())
    })
}

/// Describe the output at `index`.
/// Note: pointers in the spec are only valid until the model is released
#[no_mangle]
pub extern "C" fn bridge_model_output(
    model: i64,
    index: u64,
    spec_out: *mut BridgeTensorSpec,
) -> BridgeStatus {
    boundary("bridge_model_output", || {
        let spec_out = out_arg(spec_out, "spec_out")?;
        let model = bridge().models.get(Handle::from_raw(model))?;
        *spec_out = spec_at(&model.outputs, index)?.to_c();
        Ok(())
    })
}

/// Run inference on a value map of inputs. Blocks until inference is complete.
/// The outputs are a new value map that must be released with `bridge_value_map_release`
#[no_mangle]
pub extern "C" fn bridge_model_infer(model: i64, inputs: i64, outputs_out: *mut i64) -> BridgeStatus {
    boundary("bridge_model_infer", || {
        let outputs_out = out_arg(outputs_out, "outputs_out")?;
        *outputs_out = bridge()
            .infer(Handle::from_raw(model), Handle::from_raw(inputs))?
            .as_raw();
        Ok(())
    })
}

/// Release a model. Releasing an unknown or already released handle does nothing
#[no_mangle]
pub extern "C" fn bridge_model_release(model: i64) {
    bridge().release_model(Handle::from_raw(model))
}
