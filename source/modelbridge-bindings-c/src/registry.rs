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

//! Maps opaque integer handles to shared objects so they can be held by code on the other side
//! of the boundary.
//!
//! A handle is the address of the object it refers to and `0` is never a valid handle. The same
//! object can be registered more than once (e.g. a value that's returned from a map lookup while
//! the caller still holds the handle it was created with). Each registration adds a token under
//! the handle and each `remove` drops the newest one, so the handle stays valid until it has been
//! released as many times as it was registered.

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{Arc, PoisonError, RwLock},
};

use crate::error::{BoundaryError, Result};

/// An opaque reference to a registered object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(i64);

impl Handle {
    /// Never refers to an object
    pub const NULL: Handle = Handle(0);

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> i64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The handle for an object is its address
    fn of<T>(object: &Arc<T>) -> Self {
        Self(Arc::as_ptr(object) as *const () as usize as i64)
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<Handle> for i64 {
    fn from(value: Handle) -> Self {
        value.0
    }
}

type Tokens<T> = HashMap<Handle, Vec<Arc<T>>>;

/// A registry of live objects of one kind
pub struct Registry<T> {
    kind: &'static str,

    /// Created on first use
    holder: RwLock<Option<Tokens<T>>>,
}

impl<T> Registry<T> {
    /// `kind` is used in error messages (e.g. "tensor")
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            holder: RwLock::new(None),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Register an object and return its handle
    pub fn put(&self, object: Arc<T>) -> Handle {
        let handle = Handle::of(&object);
        self.insert(handle, object);
        log::debug!("Registered {} {handle}", self.kind);
        handle
    }

    /// Register an object under an explicit handle. `put` should be used instead unless the
    /// handle is known to identify `object`
    pub fn insert(&self, handle: Handle, object: Arc<T>) {
        let mut guard = self.holder.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .get_or_insert_with(HashMap::new)
            .entry(handle)
            .or_default()
            .push(object);
    }

    /// Get the object referred to by `handle`. If it has been registered more than once, this is
    /// the object from the oldest registration
    pub fn get(&self, handle: Handle) -> Result<Arc<T>> {
        let guard = self.holder.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .and_then(|tokens| tokens.get(&handle))
            .and_then(|objects| objects.first())
            .cloned()
            .ok_or_else(|| self.not_allocated(handle))
    }

    /// Drop the newest registration of `handle`. Unknown handles are ignored so releasing twice
    /// is fine
    pub fn remove(&self, handle: Handle) {
        let removed = {
            let mut guard = self.holder.write().unwrap_or_else(PoisonError::into_inner);
            let Some(tokens) = guard.as_mut() else {
                return;
            };

            let Some(objects) = tokens.get_mut(&handle) else {
                return;
            };

            let removed = objects.pop();
            if objects.is_empty() {
                tokens.remove(&handle);
            }

            removed
        };

        if removed.is_some() {
            log::debug!("Released {} {handle}", self.kind);
        }

        // The object is dropped after the lock is released in case dropping it is expensive
        drop(removed);
    }

    /// Succeeds iff `handle` is live
    pub fn check(&self, handle: Handle) -> Result<()> {
        if self.contains(handle) {
            Ok(())
        } else {
            Err(self.not_allocated(handle))
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        let guard = self.holder.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map_or(false, |tokens| tokens.contains_key(&handle))
    }

    /// The number of live handles
    pub fn len(&self) -> usize {
        let guard = self.holder.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map_or(0, |tokens| tokens.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration
    pub fn reset(&self) {
        let tokens = self
            .holder
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(tokens) = &tokens {
            log::debug!("Dropping {} live {} handle(s)", tokens.len(), self.kind);
        }

        drop(tokens);
    }

    fn not_allocated(&self, handle: Handle) -> BoundaryError {
        BoundaryError::ObjectNotAllocated {
            kind: self.kind,
            handle: handle.as_raw(),
        }
    }
}
