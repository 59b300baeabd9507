//! Outcome of a retried (and possibly cached) read.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::StorageError;

/// Outcome of a read executed through the retry executor.
///
/// Failures are carried as values, never raised: callers decide whether a
/// failed source degrades their response or fails it. `attempts` counts the
/// calls made to the storage collaborator and is `0` when the value was
/// served from cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult<T> {
    outcome: Result<T, StorageError>,
    attempts: u32,
}

impl<T> CachedResult<T> {
    pub fn success(data: T, attempts: u32) -> Self {
        Self {
            outcome: Ok(data),
            attempts,
        }
    }

    pub fn failure(error: StorageError, attempts: u32) -> Self {
        Self {
            outcome: Err(error),
            attempts,
        }
    }

    /// A value served from cache without touching storage.
    pub fn cached(data: T) -> Self {
        Self::success(data, 0)
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&StorageError> {
        self.outcome.as_ref().err()
    }

    pub fn into_result(self) -> Result<T, StorageError> {
        self.outcome
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CachedResult<U> {
        CachedResult {
            outcome: self.outcome.map(f),
            attempts: self.attempts,
        }
    }
}

impl<T: Serialize> Serialize for CachedResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CachedResult", 4)?;
        state.serialize_field("success", &self.is_success())?;
        state.serialize_field("data", &self.data())?;
        state.serialize_field("error", &self.error())?;
        state.serialize_field("attempts", &self.attempts)?;
        state.end()
    }
}
