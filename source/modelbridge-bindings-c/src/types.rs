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

use std::ffi::c_char;

/// cbindgen:rename-all=QualifiedScreamingSnakeCase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum BridgeStatus {
    /// The operation was completed successfully
    Success,

    /// The operation failed. Call `bridge_last_error` for details
    Error,
}

// Element type tags. These are stable across releases.
// Unfortunately, we have to spell these out because cbindgen can't see through our macros
pub const BRIDGE_FLOAT_TENSOR: i32 = 0;
pub const BRIDGE_DOUBLE_TENSOR: i32 = 1;
pub const BRIDGE_INT32_TENSOR: i32 = 2;
pub const BRIDGE_INT64_TENSOR: i32 = 3;
pub const BRIDGE_STRING_TENSOR: i32 = 5;
pub const BRIDGE_INT8_TENSOR: i32 = 6;
pub const BRIDGE_INT16_TENSOR: i32 = 7;
pub const BRIDGE_UINT8_TENSOR: i32 = 8;
pub const BRIDGE_UINT16_TENSOR: i32 = 9;
pub const BRIDGE_UINT32_TENSOR: i32 = 10;
pub const BRIDGE_UINT64_TENSOR: i32 = 11;

/// A dimension that accepts any extent
pub const BRIDGE_ANY_DIM: i64 = -1;

/// A dimension named by a symbol (see `BridgeTensorSpec::symbols`)
pub const BRIDGE_SYMBOL_DIM: i64 = -2;

/// Describes one input or output of a model.
/// All pointers are owned by the model and are valid until it's released
#[repr(C)]
pub struct BridgeTensorSpec {
    /// NUL terminated
    pub name: *const c_char,

    /// One of the `BRIDGE_*_TENSOR` tags
    pub dtype: i32,

    /// Extents. `BRIDGE_ANY_DIM` and `BRIDGE_SYMBOL_DIM` are markers
    pub dims: *const i64,
    pub num_dims: u64,

    /// `num_dims` entries. An entry is NULL unless the matching dim is `BRIDGE_SYMBOL_DIM`
    pub symbols: *const *const c_char,
}

#[cfg(test)]
mod tests {
    use modelbridge_core::types::TensorType;

    use super::*;

    #[test]
    fn tags_match_the_runtime() {
        let tags = [
            (BRIDGE_FLOAT_TENSOR, TensorType::Float),
            (BRIDGE_DOUBLE_TENSOR, TensorType::Double),
            (BRIDGE_INT32_TENSOR, TensorType::Int32),
            (BRIDGE_INT64_TENSOR, TensorType::Int64),
            (BRIDGE_STRING_TENSOR, TensorType::String),
            (BRIDGE_INT8_TENSOR, TensorType::Int8),
            (BRIDGE_INT16_TENSOR, TensorType::Int16),
            (BRIDGE_UINT8_TENSOR, TensorType::Uint8),
            (BRIDGE_UINT16_TENSOR, TensorType::Uint16),
            (BRIDGE_UINT32_TENSOR, TensorType::Uint32),
            (BRIDGE_UINT64_TENSOR, TensorType::Uint64),
        ];

        for (tag, dtype) in tags {
            assert_eq!(dtype.tag(), tag);
            assert_eq!(TensorType::from_tag(tag).unwrap(), dtype);
        }

        assert!(TensorType::from_tag(4).is_err());
    }
}
