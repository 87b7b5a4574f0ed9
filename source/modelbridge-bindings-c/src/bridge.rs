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

use modelbridge_core::types::{RuntimeOptions, Value};

use crate::{model::BridgeModel, registry::Registry, value_map::BridgeValueMap};

/// Every object that can be referred to by a handle lives in one of these registries.
/// The exported C functions use the process wide instance returned by `bridge()`
pub struct Bridge {
    pub(crate) options: Registry<RuntimeOptions>,
    pub(crate) models: Registry<BridgeModel>,
    pub(crate) values: Registry<Value>,
    pub(crate) value_maps: Registry<BridgeValueMap>,
}

impl Bridge {
    pub const fn new() -> Self {
        Self {
            options: Registry::new("options"),
            models: Registry::new("model"),
            values: Registry::new("tensor"),
            value_maps: Registry::new("value map"),
        }
    }

    pub fn options(&self) -> &Registry<RuntimeOptions> {
        &self.options
    }

    pub fn models(&self) -> &Registry<BridgeModel> {
        &self.models
    }

    pub fn values(&self) -> &Registry<Value> {
        &self.values
    }

    pub fn value_maps(&self) -> &Registry<BridgeValueMap> {
        &self.value_maps
    }

    /// Drop every live object. Handles held by callers become invalid
    pub fn reset(&self) {
        // Maps first so values they share are dropped along with the value registry
        self.value_maps.reset();
        self.models.reset();
        self.values.reset();
        self.options.reset();
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

/// The registries used by the exported C functions
pub fn bridge() -> &'static Bridge {
    static BRIDGE: Bridge = Bridge::new();
    &BRIDGE
}
