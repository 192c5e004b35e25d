//! Optimistic local value with a monotonically increasing local version.
//!
//! Local mutations bump the version. A server confirmation carries the
//! version it was based on and is dropped if a newer local mutation has
//! happened since, so a late confirmation can never roll back fresher
//! local state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub local_version: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            local_version: 0,
        }
    }

    /// Apply a local (optimistic) write and return the new version.
    pub fn set_local(&mut self, value: T) -> u64 {
        self.local_version += 1;
        self.value = value;
        self.local_version
    }

    /// Apply a confirmation based on `based_on`.
    ///
    /// Returns `false` (and leaves the value untouched) when the
    /// confirmation is older than the current local version.
    pub fn confirm(&mut self, value: T, based_on: u64) -> bool {
        if based_on < self.local_version {
            return false;
        }
        self.local_version = based_on;
        self.value = value;
        true
    }
}
