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

use std::{ffi::c_char, sync::Arc};

use modelbridge_core::types::{Device, RuntimeOptions};

use crate::{
    bridge::{bridge, Bridge},
    error::{boundary, Result},
    registry::Handle,
    types::BridgeStatus,
    utils::{out_arg, str_arg},
};

impl Bridge {
    /// Register options that can be passed to `create_model`
    pub fn create_options(&self, opts: RuntimeOptions) -> Handle {
        self.options.put(Arc::new(opts))
    }

    pub fn release_options(&self, handle: Handle) {
        self.options.remove(handle)
    }

    /// The options for `handle`, or the defaults for a null handle
    pub(crate) fn options_or_default(&self, handle: Handle) -> Result<RuntimeOptions> {
        if handle.is_null() {
            Ok(RuntimeOptions::default())
        } else {
            Ok(self.options.get(handle)?.as_ref().clone())
        }
    }
}

/// Create a set of options for loading a model.
/// `control_queue_name` may be NULL. `visible_device` is -1 for the CPU or a GPU index
#[no_mangle]
pub extern "C" fn bridge_options_create(
    free_memory_every_cycle: bool,
    control_queue_name: *const c_char,
    visible_device: i32,
    load_model_at_construction: bool,
    disable_shape_and_type_checking: bool,
    handle_out: *mut i64,
) -> BridgeStatus {
    boundary("bridge_options_create", || {
        let handle_out = out_arg(handle_out, "handle_out")?;
        let control_queue_name = if control_queue_name.is_null() {
            String::new()
        } else {
            str_arg(control_queue_name, "control_queue_name")?.to_owned()
        };

        let opts = RuntimeOptions {
            free_memory_every_cycle,
            control_queue_name,
            visible_device: Device::from_index(visible_device)?,
            load_model_at_construction,
            disable_shape_and_type_checking,
        };

        *handle_out = bridge().create_options(opts).as_raw();
        Ok(())
    })
}

/// Release options. Models created with them are not affected
#[no_mangle]
pub extern "C" fn bridge_options_release(handle: i64) {
    bridge().release_options(Handle::from_raw(handle))
}
