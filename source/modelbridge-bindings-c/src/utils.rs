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
    ffi::{c_char, CStr},
    sync::OnceLock,
};

use tokio::runtime::Runtime;

use crate::error::{BoundaryError, Result};

/// A utility to lazily start a tokio runtime
pub(crate) fn runtime() -> &'static Runtime {
    static CELL: OnceLock<Runtime> = OnceLock::new();
    CELL.get_or_init(|| Runtime::new().expect("Failed to start the tokio runtime"))
}

/// A macro that helps ensure that we (somewhat safely) convert between C and Rust types
macro_rules! ffi_conversions {
    ($t:ident) => {
        impl From<Box<$t>> for *mut $t {
            fn from(value: Box<$t>) -> Self {
                // SAFETY: We use Box::from_raw below
                Box::into_raw(value)
            }
        }

        impl From<*mut $t> for Box<$t> {
            fn from(value: *mut $t) -> Self {
                // SAFETY: We use Box::into_raw above
                unsafe { Box::from_raw(value) }
            }
        }
    };
}

/// Borrow a NUL terminated UTF-8 string from the caller
pub(crate) fn str_arg<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(BoundaryError::InvalidArgument(format!("`{what}` was NULL")));
    }

    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| BoundaryError::InvalidArgument(format!("`{what}` was not valid UTF-8")))
}

/// Borrow `len` items starting at `ptr`. `ptr` may be NULL if `len` is 0
pub(crate) fn slice_arg<'a, T>(ptr: *const T, len: u64, what: &str) -> Result<&'a [T]> {
    if len == 0 {
        return Ok(&[]);
    }

    if ptr.is_null() {
        return Err(BoundaryError::InvalidArgument(format!("`{what}` was NULL")));
    }

    Ok(unsafe { std::slice::from_raw_parts(ptr, len as _) })
}

/// Borrow an out pointer provided by the caller. Do this before doing any work so a bad pointer
/// doesn't leave anything half done
pub(crate) fn out_arg<'a, T>(out: *mut T, what: &str) -> Result<&'a mut T> {
    unsafe { out.as_mut() }
        .ok_or_else(|| BoundaryError::InvalidArgument(format!("`{what}` was NULL")))
}

/// Convert a string for use across the boundary
pub(crate) fn c_string(s: &str) -> Result<std::ffi::CString> {
    std::ffi::CString::new(s)
        .map_err(|_| BoundaryError::InvalidArgument(format!("`{s}` contains a NUL byte")))
}
