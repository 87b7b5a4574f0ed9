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
    ffi::{c_char, c_void},
    sync::Arc,
};

use modelbridge_core::{
    allocator::{default_allocator, TensorAllocator},
    types::{for_each_tensor_type, TensorType},
};

use crate::{
    bridge::{bridge, Bridge},
    error::{boundary, BoundaryError, Result},
    registry::Handle,
    string_list::BridgeStringList,
    types::BridgeStatus,
    utils::{out_arg, slice_arg, str_arg},
};

/// A writable view of the data of a numeric tensor.
/// Writes through `ptr` are visible to every holder of the tensor.
/// The pointer is only valid while the tensor is registered or held by a value map
#[derive(Debug, Clone, Copy)]
pub struct BufferView {
    pub ptr: *mut u8,
    pub len_bytes: usize,
    pub dtype: TensorType,
}

/// Parse a type tag provided by the caller
fn tensor_type_arg(tag: i32) -> Result<TensorType> {
    TensorType::from_tag(tag)
        .map_err(|_| BoundaryError::UnsupportedTensorType(format!("unknown type tag {tag}")))
}

/// A static NUL terminated name for a tensor type
fn type_name_ptr(dtype: TensorType) -> *const c_char {
    for_each_tensor_type! {
        return match dtype {
            $(TensorType::$TensorType => concat!($TypeName, "\0").as_ptr() as *const c_char,)*
        }
    }
}

impl Bridge {
    /// Tensors for a model should come from that model's allocator. A null handle uses the
    /// default allocator
    fn allocator_for(&self, model: Handle) -> Result<Arc<dyn TensorAllocator>> {
        if model.is_null() {
            Ok(default_allocator())
        } else {
            Ok(self.models.get(model)?.model().tensor_allocator())
        }
    }

    /// Allocate a tensor filled with zeros (or empty strings)
    pub fn create_tensor(&self, dims: &[i64], dtype: TensorType, allocator: Handle) -> Result<Handle> {
        let value = self.allocator_for(allocator)?.allocate(dtype, dims)?;
        Ok(self.values.put(value))
    }

    /// Allocate a string tensor from `items` in (flattened) logical order
    pub fn create_string_tensor(
        &self,
        dims: &[i64],
        items: Vec<String>,
        allocator: Handle,
    ) -> Result<Handle> {
        let value = self
            .allocator_for(allocator)?
            .allocate_strings(items, dims)?;
        Ok(self.values.put(value))
    }

    /// Overwrite a numeric tensor with native-endian bytes
    pub fn copy_into_tensor(&self, tensor: Handle, bytes: &[u8]) -> Result<()> {
        self.values.get(tensor)?.copy_from_bytes(bytes)?;
        Ok(())
    }

    /// Get a view of the data of a numeric tensor without copying it
    pub fn buffer_view(&self, tensor: Handle) -> Result<BufferView> {
        let value = self.values.get(tensor)?;
        let dtype = value.tensor_type();
        if !dtype.is_numeric() {
            return Err(BoundaryError::UnsupportedTensorType(format!(
                "{dtype} has no buffer view"
            )));
        }

        let raw = value.raw_data()?;
        Ok(BufferView {
            ptr: raw.ptr as *mut u8,
            len_bytes: raw.len_bytes,
            dtype: raw.dtype,
        })
    }

    /// Copy out the elements of a string tensor
    pub fn string_elements(&self, tensor: Handle) -> Result<Vec<String>> {
        let value = self.values.get(tensor)?;
        match value.tensor_type() {
            TensorType::String => Ok(value.string_elements()?),
            other => Err(BoundaryError::UnsupportedTensorType(format!(
                "{other} is not a string tensor"
            ))),
        }
    }

    pub fn tensor_dims(&self, tensor: Handle) -> Result<Vec<i64>> {
        Ok(self
            .values
            .get(tensor)?
            .dims()
            .into_iter()
            .map(|d| d as i64)
            .collect())
    }

    pub fn tensor_num_elements(&self, tensor: Handle) -> Result<usize> {
        Ok(self.values.get(tensor)?.num_elements())
    }

    pub fn tensor_type(&self, tensor: Handle) -> Result<TensorType> {
        Ok(self.values.get(tensor)?.tensor_type())
    }

    pub fn release_tensor(&self, tensor: Handle) {
        self.values.remove(tensor)
    }
}

/// Create a tensor filled with zeros (or empty strings).
/// `dtype` is one of the `BRIDGE_*_TENSOR` tags. If `model` is not 0, that model's allocator is used
#[no_mangle]
pub extern "C" fn bridge_tensor_create(
    dims: *const i64,
    num_dims: u64,
    dtype: i32,
    model: i64,
    handle_out: *mut i64,
) -> BridgeStatus {
    boundary("bridge_tensor_create", || {
        let dims = slice_arg(dims, num_dims, "dims")?;
        let dtype = tensor_type_arg(dtype)?;
        let handle_out = out_arg(handle_out, "handle_out")?;
        *handle_out = bridge()
            .create_tensor(dims, dtype, Handle::from_raw(model))?
            .as_raw();
        Ok(())
    })
}

/// Create a string tensor from `num_elements` NUL terminated UTF-8 strings in (flattened)
/// logical order. The strings are copied
#[no_mangle]
pub extern "C" fn bridge_tensor_create_string(
    elements: *const *const c_char,
    num_elements: u64,
    dims: *const i64,
    num_dims: u64,
    model: i64,
    handle_out: *mut i64,
) -> BridgeStatus {
    boundary("bridge_tensor_create_string", || {
        let dims = slice_arg(dims, num_dims, "dims")?;
        let elements = slice_arg(elements, num_elements, "elements")?;
        let handle_out = out_arg(handle_out, "handle_out")?;

        let mut items = Vec::new();
        items.try_reserve_exact(elements.len())?;
        for item in elements {
            items.push(str_arg(*item, "elements")?.to_owned());
        }

        *handle_out = bridge()
            .create_string_tensor(dims, items, Handle::from_raw(model))?
            .as_raw();
        Ok(())
    })
}

/// Overwrite the contents of a numeric tensor with `len_bytes` bytes of native-endian data
#[no_mangle]
pub extern "C" fn bridge_tensor_copy_from(
    tensor: i64,
    data: *const c_void,
    len_bytes: u64,
) -> BridgeStatus {
    boundary("bridge_tensor_copy_from", || {
        let data = slice_arg(data as *const u8, len_bytes, "data")?;
        bridge().copy_into_tensor(Handle::from_raw(tensor), data)
    })
}

/// Get a pointer to the underlying tensor data. This only works for numeric tensors.
/// Writes through the pointer are visible to the model and to value maps holding the tensor.
/// Note: the returned pointer is only valid until the last reference to the tensor is released
#[no_mangle]
pub extern "C" fn bridge_tensor_data(
    tensor: i64,
    data_out: *mut *mut c_void,
    len_bytes_out: *mut u64,
) -> BridgeStatus {
    boundary("bridge_tensor_data", || {
        let data_out = out_arg(data_out, "data_out")?;
        let len_bytes_out = out_arg(len_bytes_out, "len_bytes_out")?;

        let view = bridge().buffer_view(Handle::from_raw(tensor))?;
        *data_out = view.ptr as *mut c_void;
        *len_bytes_out = view.len_bytes as u64;
        Ok(())
    })
}

/// Copy out the elements of a string tensor in (flattened) logical order.
/// The list must be freed with `bridge_string_list_destroy`
#[no_mangle]
pub extern "C" fn bridge_tensor_strings(
    tensor: i64,
    list_out: *mut *mut BridgeStringList,
) -> BridgeStatus {
    boundary("bridge_tensor_strings", || {
        let list_out = out_arg(list_out, "list_out")?;
        let items = bridge().string_elements(Handle::from_raw(tensor))?;
        *list_out = Box::new(BridgeStringList::new(items)?).into();
        Ok(())
    })
}

/// Get the shape of a tensor. Up to `capacity` extents are written to `dims_out` and the
/// number of dimensions is always written to `num_dims_out`. `dims_out` can be NULL if
/// `capacity` is 0
#[no_mangle]
pub extern "C" fn bridge_tensor_dims(
    tensor: i64,
    dims_out: *mut i64,
    capacity: u64,
    num_dims_out: *mut u64,
) -> BridgeStatus {
    boundary("bridge_tensor_dims", || {
        let num_dims_out = out_arg(num_dims_out, "num_dims_out")?;
        if capacity > 0 && dims_out.is_null() {
            return Err(BoundaryError::InvalidArgument("`dims_out` was NULL".into()));
        }

        let dims = bridge().tensor_dims(Handle::from_raw(tensor))?;
        let count = dims.len().min(capacity as usize);
        if count > 0 {
            unsafe { std::ptr::copy_nonoverlapping(dims.as_ptr(), dims_out, count) };
        }

        *num_dims_out = dims.len() as u64;
        Ok(())
    })
}

/// Get the number of elements in a tensor
#[no_mangle]
pub extern "C" fn bridge_tensor_num_elements(tensor: i64, num_out: *mut u64) -> BridgeStatus {
    boundary("bridge_tensor_num_elements", || {
        let num_out = out_arg(num_out, "num_out")?;
        *num_out = bridge().tensor_num_elements(Handle::from_raw(tensor))? as u64;
        Ok(())
    })
}

/// Get the `BRIDGE_*_TENSOR` tag of a tensor
#[no_mangle]
pub extern "C" fn bridge_tensor_type(tensor: i64, dtype_out: *mut i32) -> BridgeStatus {
    boundary("bridge_tensor_type", || {
        let dtype_out = out_arg(dtype_out, "dtype_out")?;
        *dtype_out = bridge().tensor_type(Handle::from_raw(tensor))?.tag();
        Ok(())
    })
}

/// Get the name of the type of a tensor (e.g. `FLOAT_TENSOR`). The string is static
#[no_mangle]
pub extern "C" fn bridge_tensor_type_name(tensor: i64, name_out: *mut *const c_char) -> BridgeStatus {
    boundary("bridge_tensor_type_name", || {
        let name_out = out_arg(name_out, "name_out")?;
        *name_out = type_name_ptr(bridge().tensor_type(Handle::from_raw(tensor))?);
        Ok(())
    })
}

/// Release a tensor handle. Value maps holding the tensor keep it alive.
/// Releasing an unknown or already released handle does nothing
#[no_mangle]
pub extern "C" fn bridge_tensor_release(tensor: i64) {
    bridge().release_tensor(Handle::from_raw(tensor))
}
