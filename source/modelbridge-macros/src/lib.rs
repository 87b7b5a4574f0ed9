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

//! Macros that expand a block once for every tensor element type the bridge understands.
//!
//! Inside the block, `$TensorType` is the variant name, `$RustType` is the element type,
//! `$TypeName` is the name exposed across the boundary (e.g. `FLOAT_TENSOR`) and `$ConfigName`
//! is the name used in model config files (e.g. `float32`).

use proc_macro::TokenStream;
use quote::quote;

// Nested repeating macros get complex with declarative macros
// so we'll use a proc macro instead
// https://github.com/rust-lang/rust/issues/35853
#[proc_macro]
pub fn for_each_tensor_type(item: TokenStream) -> TokenStream {
    let item = proc_macro2::TokenStream::from(item);
    quote! {

            macro_rules! inner {
                ($( ( $TensorType:ident, $RustType:ty, $TypeName:literal, $ConfigName:literal ) ), * ) => {
                    #item
                };
            }

            inner!(
                (Float, f32, "FLOAT_TENSOR", "float32"),
                (Double, f64, "DOUBLE_TENSOR", "float64"),
                (Int32, i32, "INT32_TENSOR", "int32"),
                (Int64, i64, "INT64_TENSOR", "int64"),
                (String, String, "STRING_TENSOR", "string"),
                (Int8, i8, "INT8_TENSOR", "int8"),
                (Int16, i16, "INT16_TENSOR", "int16"),
                (Uint8, u8, "UINT8_TENSOR", "uint8"),
                (Uint16, u16, "UINT16_TENSOR", "uint16"),
                (Uint32, u32, "UINT32_TENSOR", "uint32"),
                (Uint64, u64, "UINT64_TENSOR", "uint64")
            );
    }
    .into()
}

/// Same as `for_each_tensor_type`, but skips `String`
#[proc_macro]
pub fn for_each_numeric_tensor_type(item: TokenStream) -> TokenStream {
    let item = proc_macro2::TokenStream::from(item);
    quote! {

            macro_rules! inner {
                ($( ( $TensorType:ident, $RustType:ty, $TypeName:literal, $ConfigName:literal ) ), * ) => {
                    #item
                };
            }

            inner!(
                (Float, f32, "FLOAT_TENSOR", "float32"),
                (Double, f64, "DOUBLE_TENSOR", "float64"),
                (Int32, i32, "INT32_TENSOR", "int32"),
                (Int64, i64, "INT64_TENSOR", "int64"),
                (Int8, i8, "INT8_TENSOR", "int8"),
                (Int16, i16, "INT16_TENSOR", "int16"),
                (Uint8, u8, "UINT8_TENSOR", "uint8"),
                (Uint16, u16, "UINT16_TENSOR", "uint16"),
                (Uint32, u32, "UINT32_TENSOR", "uint32"),
                (Uint64, u64, "UINT64_TENSOR", "uint64")
            );
    }
    .into()
}
