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

use std::ffi::{c_char, CString};

use crate::{
    error::{boundary, BoundaryError, Result},
    types::BridgeStatus,
    utils::{c_string, out_arg},
};

/// An owned list of strings handed to the caller (e.g. the elements of a string tensor)
pub struct BridgeStringList {
    items: Vec<CString>,
}

ffi_conversions!(BridgeStringList);

impl BridgeStringList {
    pub(crate) fn new(items: Vec<String>) -> Result<Self> {
        let mut out = Vec::new();
        out.try_reserve_exact(items.len())?;
        for item in items {
            out.push(c_string(&item)?);
        }

        Ok(Self { items: out })
    }

    /// Get the number of strings in the list
    #[no_mangle]
    pub extern "C" fn bridge_string_list_len(&self, len_out: *mut u64) -> BridgeStatus {
        boundary("bridge_string_list_len", || {
            *out_arg(len_out, "len_out")? = self.items.len() as u64;
            Ok(())
        })
    }

    /// Get the string at `index`.
    /// Note: the returned pointer is only valid until the list is destroyed
    #[no_mangle]
    pub extern "C" fn bridge_string_list_get(
        &self,
        index: u64,
        string_out: *mut *const c_char,
    ) -> BridgeStatus {
        boundary("bridge_string_list_get", || {
            let string_out = out_arg(string_out, "string_out")?;
            let item = self.items.get(index as usize).ok_or_else(|| {
                BoundaryError::InvalidArgument(format!(
                    "index {index} is out of bounds for a list of {} strings",
                    self.items.len()
                ))
            })?;

            *string_out = item.as_ptr();
            Ok(())
        })
    }

    /// Destroy a list
    #[no_mangle]
    pub extern "C" fn bridge_string_list_destroy(list: *mut BridgeStringList) {
        if list.is_null() {
            return;
        }

        let _: Box<BridgeStringList> = list.into();
    }
}
