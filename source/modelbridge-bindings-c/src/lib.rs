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

//! A C ABI that lets managed runtimes (e.g. the JVM or .NET) load models, build tensors and run
//! inference with `modelbridge_core`.
//!
//! Objects never cross the boundary directly. Callers get opaque 64 bit handles from the
//! registries in [`Bridge`] and every exported function reports failures with
//! [`BridgeStatus::Error`] and a message available from `bridge_last_error`.
//!
//! The same operations are available from Rust as methods on [`Bridge`].

#[macro_use]
mod utils;

mod bridge;
mod error;
mod model;
mod options;
mod registry;
mod shape;
mod string_list;
mod tensor;
mod types;
mod value_map;

pub use crate::bridge::{bridge, Bridge};
pub use crate::error::{bridge_last_error, take_last_error, BoundaryError, Result};
pub use crate::model::{BridgeModel, WireTensorSpec};
pub use crate::registry::{Handle, Registry};
pub use crate::shape::WireShape;
pub use crate::string_list::BridgeStringList;
pub use crate::tensor::BufferView;
pub use crate::types::*;
pub use crate::value_map::BridgeValueMap;

pub use crate::model::{
    bridge_model_create, bridge_model_infer, bridge_model_input, bridge_model_load,
    bridge_model_name, bridge_model_num_inputs, bridge_model_num_outputs, bridge_model_output,
    bridge_model_platform, bridge_model_release,
};
pub use crate::options::{bridge_options_create, bridge_options_release};
pub use crate::tensor::{
    bridge_tensor_copy_from, bridge_tensor_create, bridge_tensor_create_string,
    bridge_tensor_data, bridge_tensor_dims, bridge_tensor_num_elements, bridge_tensor_release,
    bridge_tensor_strings, bridge_tensor_type, bridge_tensor_type_name,
};
pub use crate::value_map::{
    bridge_value_map_create, bridge_value_map_get, bridge_value_map_keys, bridge_value_map_put,
    bridge_value_map_release,
};

/// Call once when the library is loaded. Sets up logging (configured with `RUST_LOG`) and
/// reads the config
#[no_mangle]
pub extern "C" fn bridge_on_load() -> BridgeStatus {
    error::boundary("bridge_on_load", || {
        let _ = env_logger::try_init();
        let config = &*modelbridge_core::config::CONFIG;
        log::debug!("modelbridge loaded with {config:?}");
        Ok(())
    })
}

/// Call when the library is about to be unloaded. Releases every live object
#[no_mangle]
pub extern "C" fn bridge_on_unload() {
    log::debug!("modelbridge unloading");
    bridge().reset();
}
