//! Thread-local active-environment marker.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Unique identity of one environment instance.
///
/// Never zero; zero is the "no environment" revision used by copy-on-write
/// cells written outside any environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EnvironmentId(u64);

static NEXT_ENVIRONMENT: AtomicU64 = AtomicU64::new(1);

impl EnvironmentId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ENVIRONMENT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env#{}", self.0)
    }
}

thread_local! {
    static ACTIVE: Cell<Option<EnvironmentId>> = const { Cell::new(None) };
}

/// The environment active on this thread, if any.
#[must_use]
pub fn active() -> Option<EnvironmentId> {
    ACTIVE.with(Cell::get)
}

/// Keeps an environment active until dropped.
///
/// Not `Send`: the marker is per thread.
#[must_use = "the environment is only active while the scope is alive"]
pub struct ActiveScope {
    previous: Option<EnvironmentId>,
    current: EnvironmentId,
    _not_send: PhantomData<*const ()>,
}

impl ActiveScope {
    pub(crate) fn enter(current: EnvironmentId) -> Self {
        let previous = ACTIVE.with(|active| active.replace(Some(current)));
        Self {
            previous,
            current,
            _not_send: PhantomData,
        }
    }

    /// The environment this scope activated.
    #[inline]
    #[must_use]
    pub fn environment(&self) -> EnvironmentId {
        self.current
    }
}

impl Drop for ActiveScope {
    fn drop(&mut self) {
        let popped = ACTIVE.with(|active| active.replace(self.previous));
        if popped != Some(self.current) {
            tracing::error!(
                "Active scope for {} closed while {:?} was active; scopes dropped out of order",
                self.current,
                popped
            );
        }
    }
}

impl fmt::Debug for ActiveScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveScope")
            .field("current", &self.current)
            .field("previous", &self.previous)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_scopes_restore() {
        let a = EnvironmentId::next();
        let b = EnvironmentId::next();
        assert_ne!(a, b);
        assert_eq!(active(), None);

        {
            let _outer = ActiveScope::enter(a);
            assert_eq!(active(), Some(a));
            {
                let inner = ActiveScope::enter(b);
                assert_eq!(inner.environment(), b);
                assert_eq!(active(), Some(b));
            }
            assert_eq!(active(), Some(a));
        }
        assert_eq!(active(), None);
    }

    #[test]
    fn test_ids_never_zero() {
        assert_ne!(EnvironmentId::next().get(), 0);
    }

    #[test]
    fn test_scope_is_thread_local() {
        let _scope = ActiveScope::enter(EnvironmentId::next());
        let seen = std::thread::spawn(active).join().unwrap();
        assert_eq!(seen, None);
    }
}
