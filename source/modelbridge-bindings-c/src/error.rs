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
    any::Any,
    cell::RefCell,
    collections::TryReserveError,
    ffi::{c_char, CString},
    panic::AssertUnwindSafe,
};

use modelbridge_core::error::ModelError;
use thiserror::Error;

use crate::types::BridgeStatus;

pub type Result<T> = std::result::Result<T, BoundaryError>;

/// The one error kind surfaced to callers. Every failure, whether it comes from a stale handle,
/// a bad argument or the model runtime, carries a human readable message.
#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error("Object is not allocated! (no live {kind} with handle {handle:#x})")]
    ObjectNotAllocated { kind: &'static str, handle: i64 },

    #[error("Unsupported tensor type: {0}")]
    UnsupportedTensorType(String),

    #[error("Malformed shape: {0}")]
    MalformedShape(String),

    #[error("Value map has no entry for key `{0}`")]
    MissingKey(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),

    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("Panic while running `{op}`: {message}")]
    Panic { op: &'static str, message: String },
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
}

fn set_last_error(err: &BoundaryError) {
    // Messages can't contain interior NULs in C
    let message = CString::new(err.to_string().replace('\0', "\\0")).unwrap_or_default();
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(message));
}

/// Take the message of the last failed call on the current thread (if any)
pub fn take_last_error() -> Option<String> {
    LAST_ERROR.with(|e| e.borrow_mut().take()).map(|m| m.to_string_lossy().into_owned())
}

/// Get the message of the last error on the calling thread.
/// Sets `message_out` to NULL if no call on this thread has failed.
/// Note: the returned pointer is only valid until the next failing call on this thread.
#[no_mangle]
pub extern "C" fn bridge_last_error(message_out: *mut *const c_char) {
    if message_out.is_null() {
        return;
    }

    LAST_ERROR.with(|e| {
        let ptr = e
            .borrow()
            .as_ref()
            .map_or(std::ptr::null(), |m| m.as_ptr());
        unsafe { *message_out = ptr };
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Run the body of an exported function. Errors and panics never unwind into the caller;
/// they're logged, stored for `bridge_last_error` and reported as `BridgeStatus::Error`
pub(crate) fn boundary<F>(op: &'static str, f: F) -> BridgeStatus
where
    F: FnOnce() -> Result<()>,
{
    let res = match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(payload) => Err(BoundaryError::Panic {
            op,
            message: panic_message(payload.as_ref()),
        }),
    };

    match res {
        Ok(()) => BridgeStatus::Success,
        Err(e) => {
            log::warn!("`{op}` failed: {e}");
            set_last_error(&e);
            BridgeStatus::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_stored_per_thread() {
        let status = boundary("test_op", || {
            Err(BoundaryError::MissingKey("x".into()))
        });
        assert_eq!(status, BridgeStatus::Error);

        // Other threads don't see it
        std::thread::spawn(|| assert_eq!(take_last_error(), None))
            .join()
            .unwrap();

        let message = take_last_error().unwrap();
        assert!(message.contains("`x`"));
        assert_eq!(take_last_error(), None);
    }

    #[test]
    fn panics_become_errors() {
        let status = boundary("exploding_op", || panic!("boom"));
        assert_eq!(status, BridgeStatus::Error);

        let message = take_last_error().unwrap();
        assert!(message.contains("exploding_op"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn model_errors_keep_their_message() {
        let err: BoundaryError = ModelError::UnknownInput("z".into()).into();
        assert_eq!(
            err.to_string(),
            ModelError::UnknownInput("z".into()).to_string()
        );
    }
}
