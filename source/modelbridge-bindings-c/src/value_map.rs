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
    ffi::c_char,
    sync::{Arc, PoisonError, RwLock},
};

use modelbridge_core::types::{Value, ValueMap};

use crate::{
    bridge::{bridge, Bridge},
    error::{boundary, BoundaryError, Result},
    registry::Handle,
    string_list::BridgeStringList,
    types::BridgeStatus,
    utils::{out_arg, str_arg},
};

/// A map from name to value that can be shared across the boundary.
/// This is the input and output type of `infer`
#[derive(Debug, Default)]
pub struct BridgeValueMap {
    inner: RwLock<ValueMap>,
}

impl From<ValueMap> for BridgeValueMap {
    fn from(value: ValueMap) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }
}

impl BridgeValueMap {
    /// A copy of the map. The values themselves are shared
    pub fn snapshot(&self) -> ValueMap {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Insert or replace a value
    pub fn insert(&self, key: String, value: Arc<Value>) {
        let replaced = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);

        drop(replaced);
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();

        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self) {
        let entries = std::mem::take(
            &mut *self.inner.write().unwrap_or_else(PoisonError::into_inner),
        );
        drop(entries);
    }
}

impl Bridge {
    pub fn new_value_map(&self) -> Handle {
        self.value_maps.put(Arc::new(BridgeValueMap::default()))
    }

    /// Look up `key` and register the value so the caller gets a handle to it. The value is
    /// shared with the map, not copied. The returned handle must be released separately
    pub fn value_map_get(&self, map: Handle, key: &str) -> Result<Handle> {
        let value = self
            .value_maps
            .get(map)?
            .get(key)
            .ok_or_else(|| BoundaryError::MissingKey(key.to_owned()))?;

        Ok(self.values.put(value))
    }

    /// Store the value referred to by `value` under `key`, replacing any existing entry.
    /// The map shares the value with the caller's handle
    pub fn value_map_put(&self, map: Handle, key: &str, value: Handle) -> Result<()> {
        let map = self.value_maps.get(map)?;
        let value = self.values.get(value)?;
        map.insert(key.to_owned(), value);
        Ok(())
    }

    pub fn value_map_keys(&self, map: Handle) -> Result<Vec<String>> {
        Ok(self.value_maps.get(map)?.keys())
    }

    /// The number of entries in a map
    pub fn value_map_len(&self, map: Handle) -> Result<usize> {
        Ok(self.value_maps.get(map)?.len())
    }

    /// Release a map. Once the last registration is gone, the map drops its entries even if
    /// something else still has a reference to the map
    pub fn release_value_map(&self, map: Handle) {
        let Ok(inner) = self.value_maps.get(map) else {
            return;
        };

        self.value_maps.remove(map);
        if !self.value_maps.contains(map) {
            inner.clear();
        }
    }
}

/// Create an empty value map
#[no_mangle]
pub extern "C" fn bridge_value_map_create(handle_out: *mut i64) -> BridgeStatus {
    boundary("bridge_value_map_create", || {
        let handle_out = out_arg(handle_out, "handle_out")?;
        *handle_out = bridge().new_value_map().as_raw();
        Ok(())
    })
}

/// Get a handle to the value stored under `key`. The value is shared with the map.
/// The handle must be released with `bridge_tensor_release`
#[no_mangle]
pub extern "C" fn bridge_value_map_get(
    map: i64,
    key: *const c_char,
    handle_out: *mut i64,
) -> BridgeStatus {
    boundary("bridge_value_map_get", || {
        let key = str_arg(key, "key")?;
        let handle_out = out_arg(handle_out, "handle_out")?;
        *handle_out = bridge()
            .value_map_get(Handle::from_raw(map), key)?
            .as_raw();
        Ok(())
    })
}

/// Store a tensor under `key`, replacing any existing entry.
/// The caller still owns `value` and must release it
#[no_mangle]
pub extern "C" fn bridge_value_map_put(map: i64, key: *const c_char, value: i64) -> BridgeStatus {
    boundary("bridge_value_map_put", || {
        let key = str_arg(key, "key")?;
        bridge().value_map_put(Handle::from_raw(map), key, Handle::from_raw(value))
    })
}

/// Get the keys of a map in sorted order.
/// The list must be freed with `bridge_string_list_destroy`
#[no_mangle]
pub extern "C" fn bridge_value_map_keys(
    map: i64,
    list_out: *mut *mut BridgeStringList,
) -> BridgeStatus {
    boundary("bridge_value_map_keys", || {
        let list_out = out_arg(list_out, "list_out")?;
        let keys = bridge().value_map_keys(Handle::from_raw(map))?;
        *list_out = Box::new(BridgeStringList::new(keys)?).into();
        Ok(())
    })
}

/// Release a value map. Releasing an unknown or already released handle does nothing
#[no_mangle]
pub extern "C" fn bridge_value_map_release(map: i64) {
    bridge().release_value_map(Handle::from_raw(map))
}
