//! # Copy-on-Write Cells
//!
//! A [`Cow`] shares its payload with every copy of itself until one copy is
//! written under an environment other than the one that last stamped it.
//! Bulk-duplicating component storage (snapshots, restores) therefore stays
//! cheap, and writes made after a restore never reach the snapshot.
//!
//! The revision is the [`EnvironmentId`] of the last writer, or zero if the
//! payload was set outside any environment.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::sync::{self, EnvironmentId};

/// Copy-on-write value holder.
///
/// # Example
///
/// ```rust,ignore
/// let snapshot = env.record();
/// // After restoring, the first `get_rw` in the new environment clones.
/// let path = cell.get_rw_in(args.environment());
/// path.push(next);
/// ```
pub struct Cow<T> {
    value: Arc<T>,
    revision: u64,
}

impl<T: Clone> Cow<T> {
    /// Wraps a value, stamped with the active environment.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
            revision: sync::active().map_or(0, EnvironmentId::get),
        }
    }

    /// Read-only access. Never clones.
    #[inline]
    #[must_use]
    pub fn get_ro(&self) -> &T {
        &self.value
    }

    /// Writable access under the active environment.
    ///
    /// With no active environment the payload is handed out unchanged and an
    /// error is logged.
    pub fn get_rw(&mut self) -> &mut T {
        match sync::active() {
            Some(env) => self.get_rw_in(env),
            None => {
                tracing::error!("Attempted to get a writable copy-on-write value without an active environment");
                Arc::make_mut(&mut self.value)
            }
        }
    }

    /// Writable access under `env`.
    ///
    /// Clones the payload first if the cell was last stamped by another
    /// environment.
    pub fn get_rw_in(&mut self, env: EnvironmentId) -> &mut T {
        if self.revision != env.get() {
            self.value = Arc::new(T::clone(&self.value));
            self.revision = env.get();
        }
        Arc::make_mut(&mut self.value)
    }

    /// Replaces the payload and stamps the active environment (or zero).
    pub fn set(&mut self, value: T) {
        self.set_in(value, sync::active());
    }

    /// Replaces the payload and stamps `env` (or zero).
    pub fn set_in(&mut self, value: T, env: Option<EnvironmentId>) {
        self.value = Arc::new(value);
        self.revision = env.map_or(0, EnvironmentId::get);
    }

    /// Revision of the last writer.
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Checks whether two cells still share one payload.
    #[must_use]
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> Clone for Cow<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            revision: self.revision,
        }
    }
}

impl<T: Clone + Default> Default for Cow<T> {
    fn default() -> Self {
        Self {
            value: Arc::new(T::default()),
            revision: 0,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Cow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cow")
            .field("value", &self.value)
            .field("revision", &self.revision)
            .finish()
    }
}

impl<T: PartialEq> PartialEq for Cow<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// Only the payload is written; the revision is a runtime marker.
impl<T: Serialize> Serialize for Cow<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.as_ref().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Cow<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            value: Arc::new(T::deserialize(deserializer)?),
            revision: 0,
        })
    }
}
