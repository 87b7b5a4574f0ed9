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

//! Tests the exported C functions. These share the process wide registries so tests hold a lock
//! (handles are addresses, so a handle released by one test could be reused by another)

use std::{
    ffi::{c_char, c_void, CStr, CString},
    sync::{Mutex, MutexGuard},
};

use modelbridge::*;

const MODEL_TOML: &str = r#"
name = "c_identity"
platform = "identity"

[[input]]
name = "x"
dtype = "float32"
shape = ["batch_size", 3]

[[output]]
name = "x"
dtype = "float32"
shape = ["batch_size", 3]
"#;

fn model_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("model.toml"), MODEL_TOML).unwrap();
    dir
}

fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn last_error() -> String {
    let mut message: *const c_char = std::ptr::null();
    bridge_last_error(&mut message);
    assert!(!message.is_null());
    unsafe { CStr::from_ptr(message) }
        .to_string_lossy()
        .into_owned()
}

fn to_str<'a>(ptr: *const c_char) -> &'a str {
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap()
}

#[test]
fn test_c_end_to_end() {
    let _guard = serial();
    assert_eq!(bridge_on_load(), BridgeStatus::Success);

    let dir = model_dir();
    let path = CString::new(dir.path().to_str().unwrap()).unwrap();

    let mut model = 0;
    assert_eq!(
        bridge_model_create(path.as_ptr(), 0, &mut model),
        BridgeStatus::Success
    );

    let mut name = std::ptr::null();
    assert_eq!(bridge_model_name(model, &mut name), BridgeStatus::Success);
    assert_eq!(to_str(name), "c_identity");

    // Create the input
    let dims = [2i64, 3];
    let mut tensor = 0;
    assert_eq!(
        bridge_tensor_create(dims.as_ptr(), 2, BRIDGE_FLOAT_TENSOR, model, &mut tensor),
        BridgeStatus::Success
    );

    let values = [1f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    assert_eq!(
        bridge_tensor_copy_from(tensor, values.as_ptr() as *const c_void, 24),
        BridgeStatus::Success
    );

    let mut inputs = 0;
    assert_eq!(bridge_value_map_create(&mut inputs), BridgeStatus::Success);
    let key = CString::new("x").unwrap();
    assert_eq!(
        bridge_value_map_put(inputs, key.as_ptr(), tensor),
        BridgeStatus::Success
    );

    // Run inference
    let mut outputs = 0;
    assert_eq!(
        bridge_model_infer(model, inputs, &mut outputs),
        BridgeStatus::Success
    );

    let mut keys: *mut BridgeStringList = std::ptr::null_mut();
    assert_eq!(bridge_value_map_keys(outputs, &mut keys), BridgeStatus::Success);
    let keys_ref = unsafe { &*keys };
    let mut num_keys = 0;
    keys_ref.bridge_string_list_len(&mut num_keys);
    assert_eq!(num_keys, 1);
    let mut first = std::ptr::null();
    keys_ref.bridge_string_list_get(0, &mut first);
    assert_eq!(to_str(first), "x");
    BridgeStringList::bridge_string_list_destroy(keys);

    // Read the output
    let mut output = 0;
    assert_eq!(
        bridge_value_map_get(outputs, key.as_ptr(), &mut output),
        BridgeStatus::Success
    );

    let mut dtype = -1;
    bridge_tensor_type(output, &mut dtype);
    assert_eq!(dtype, BRIDGE_FLOAT_TENSOR);

    let mut type_name = std::ptr::null();
    bridge_tensor_type_name(output, &mut type_name);
    assert_eq!(to_str(type_name), "FLOAT_TENSOR");

    let mut out_dims = [0i64; 4];
    let mut num_dims = 0;
    assert_eq!(
        bridge_tensor_dims(output, out_dims.as_mut_ptr(), 4, &mut num_dims),
        BridgeStatus::Success
    );
    assert_eq!(&out_dims[..num_dims as usize], &[2, 3]);

    let mut num_elements = 0;
    bridge_tensor_num_elements(output, &mut num_elements);
    assert_eq!(num_elements, 6);

    let mut data: *mut c_void = std::ptr::null_mut();
    let mut len_bytes = 0;
    assert_eq!(
        bridge_tensor_data(output, &mut data, &mut len_bytes),
        BridgeStatus::Success
    );
    assert_eq!(len_bytes, 24);
    let read = unsafe { std::slice::from_raw_parts(data as *const f32, 6) };
    assert_eq!(read, &values);

    // Release everything
    bridge_tensor_release(output);
    bridge_tensor_release(tensor);
    bridge_value_map_release(inputs);
    bridge_value_map_release(outputs);
    bridge_model_release(model);

    for handle in [output, tensor] {
        assert!(!bridge().values().contains(Handle::from_raw(handle)));
    }
    for handle in [inputs, outputs] {
        assert!(!bridge().value_maps().contains(Handle::from_raw(handle)));
    }
    assert!(!bridge().models().contains(Handle::from_raw(model)));

    // Releasing again is fine
    bridge_tensor_release(tensor);
    bridge_model_release(model);
}

#[test]
fn test_c_model_specs() {
    let _guard = serial();
    let dir = model_dir();
    let path = CString::new(dir.path().join("model.toml").to_str().unwrap()).unwrap();

    let mut options = 0;
    assert_eq!(
        bridge_options_create(true, std::ptr::null(), -1, true, false, &mut options),
        BridgeStatus::Success
    );

    let mut model = 0;
    assert_eq!(
        bridge_model_create(path.as_ptr(), options, &mut model),
        BridgeStatus::Success
    );
    bridge_options_release(options);

    let mut platform = std::ptr::null();
    bridge_model_platform(model, &mut platform);
    assert_eq!(to_str(platform), "identity");

    let mut num_inputs = 0;
    let mut num_outputs = 0;
    bridge_model_num_inputs(model, &mut num_inputs);
    bridge_model_num_outputs(model, &mut num_outputs);
    assert_eq!((num_inputs, num_outputs), (1, 1));

    let mut spec = BridgeTensorSpec {
        name: std::ptr::null(),
        dtype: -1,
        dims: std::ptr::null(),
        num_dims: 0,
        symbols: std::ptr::null(),
    };
    assert_eq!(bridge_model_input(model, 0, &mut spec), BridgeStatus::Success);
    assert_eq!(to_str(spec.name), "x");
    assert_eq!(spec.dtype, BRIDGE_FLOAT_TENSOR);

    let dims = unsafe { std::slice::from_raw_parts(spec.dims, spec.num_dims as usize) };
    assert_eq!(dims, &[BRIDGE_SYMBOL_DIM, 3]);

    let symbols = unsafe { std::slice::from_raw_parts(spec.symbols, spec.num_dims as usize) };
    assert_eq!(to_str(symbols[0]), "batch_size");
    assert!(symbols[1].is_null());

    assert_eq!(bridge_model_output(model, 1, &mut spec), BridgeStatus::Error);
    assert!(last_error().contains("out of bounds"));

    bridge_model_release(model);
}

#[test]
fn test_c_errors() {
    let _guard = serial();
    // Unknown handles
    let mut num_elements = 0;
    assert_eq!(
        bridge_tensor_num_elements(0, &mut num_elements),
        BridgeStatus::Error
    );
    assert!(last_error().contains("Object is not allocated"));

    // Unknown type tags
    let dims = [1i64];
    let mut tensor = 0;
    assert_eq!(
        bridge_tensor_create(dims.as_ptr(), 1, 4, 0, &mut tensor),
        BridgeStatus::Error
    );
    assert!(last_error().contains("Unsupported tensor type"));
    assert_eq!(tensor, 0);

    // Huge shapes are errors, not aborts
    let dims = [1i64 << 30, 1 << 29];
    assert_eq!(
        bridge_tensor_create(dims.as_ptr(), 2, BRIDGE_FLOAT_TENSOR, 0, &mut tensor),
        BridgeStatus::Error
    );
    assert!(last_error().contains("Out of memory"));
    assert_eq!(tensor, 0);

    let dims = [i64::MAX, i64::MAX];
    assert_eq!(
        bridge_tensor_create(dims.as_ptr(), 2, BRIDGE_FLOAT_TENSOR, 0, &mut tensor),
        BridgeStatus::Error
    );
    let message = last_error();
    assert!(message.contains("Malformed shape"));
    assert!(!message.contains("Panic"));
    assert_eq!(tensor, 0);

    // No buffer view for string tensors
    let items = [CString::new("hello").unwrap(), CString::new("world").unwrap()];
    let item_ptrs: Vec<_> = items.iter().map(|s| s.as_ptr()).collect();
    let dims = [2i64];
    assert_eq!(
        bridge_tensor_create_string(item_ptrs.as_ptr(), 2, dims.as_ptr(), 1, 0, &mut tensor),
        BridgeStatus::Success
    );

    let mut data: *mut c_void = std::ptr::null_mut();
    let mut len_bytes = 0;
    assert_eq!(
        bridge_tensor_data(tensor, &mut data, &mut len_bytes),
        BridgeStatus::Error
    );
    assert!(last_error().contains("Unsupported tensor type"));

    let mut list: *mut BridgeStringList = std::ptr::null_mut();
    assert_eq!(bridge_tensor_strings(tensor, &mut list), BridgeStatus::Success);
    let mut second = std::ptr::null();
    unsafe { &*list }.bridge_string_list_get(1, &mut second);
    assert_eq!(to_str(second), "world");
    BridgeStringList::bridge_string_list_destroy(list);
    bridge_tensor_release(tensor);

    // NULL arguments
    assert_eq!(
        bridge_model_create(std::ptr::null(), 0, std::ptr::null_mut()),
        BridgeStatus::Error
    );
    assert!(last_error().contains("NULL"));

    // Invalid devices
    let mut options = 0;
    assert_eq!(
        bridge_options_create(true, std::ptr::null(), -5, true, false, &mut options),
        BridgeStatus::Error
    );
    assert!(last_error().contains("-5"));

    // Missing keys
    let mut map = 0;
    bridge_value_map_create(&mut map);
    let key = CString::new("nope").unwrap();
    let mut value = 0;
    assert_eq!(
        bridge_value_map_get(map, key.as_ptr(), &mut value),
        BridgeStatus::Error
    );
    assert!(last_error().contains("nope"));
    bridge_value_map_release(map);
}
