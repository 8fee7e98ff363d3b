//! # Diagnostics
//!
//! Sink for non-fatal reports. Every report is logged through `tracing`,
//! counted, and (when enabled) captured so the host can inspect it later.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::EcsError;

/// Severity of a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    /// Probable misuse; behavior is unaffected.
    Warning,
    /// Something was skipped or defaulted.
    Error,
}

/// One captured report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub level: Level,
    /// What happened.
    pub error: EcsError,
}

#[derive(Default)]
struct Inner {
    captured: VecDeque<Diagnostic>,
    errors: u64,
    warnings: u64,
}

/// Report sink owned by an environment.
pub struct Diagnostics {
    inner: Mutex<Inner>,
    capture: bool,
    limit: usize,
}

impl Diagnostics {
    /// Creates a sink.
    ///
    /// # Arguments
    ///
    /// * `capture` - Whether reports are kept for [`Diagnostics::take`]
    /// * `limit` - Maximum number of kept reports; older ones are dropped
    #[must_use]
    pub fn new(capture: bool, limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capture,
            limit,
        }
    }

    /// Reports an error and continues.
    pub fn error(&self, error: EcsError) {
        tracing::error!("{}", error);
        self.push(Level::Error, error);
    }

    /// Reports a warning and continues.
    pub fn warn(&self, error: EcsError) {
        tracing::warn!("{}", error);
        self.push(Level::Warning, error);
    }

    fn push(&self, level: Level, error: EcsError) {
        let mut inner = self.inner.lock();
        match level {
            Level::Error => inner.errors += 1,
            Level::Warning => inner.warnings += 1,
        }

        if !self.capture || self.limit == 0 {
            return;
        }
        if inner.captured.len() == self.limit {
            inner.captured.pop_front();
        }
        inner.captured.push_back(Diagnostic { level, error });
    }

    /// Drains all captured reports, oldest first.
    pub fn take(&self) -> Vec<Diagnostic> {
        self.inner.lock().captured.drain(..).collect()
    }

    /// Drains captured reports and keeps only their errors.
    pub fn take_errors(&self) -> Vec<EcsError> {
        self.take().into_iter().map(|d| d.error).collect()
    }

    /// Total errors reported since creation.
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.inner.lock().errors
    }

    /// Total warnings reported since creation.
    #[must_use]
    pub fn warning_count(&self) -> u64 {
        self.inner.lock().warnings
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(true, 1024)
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Diagnostics")
            .field("errors", &inner.errors)
            .field("warnings", &inner.warnings)
            .field("captured", &inner.captured.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_capture() {
        let sink = Diagnostics::new(true, 8);
        sink.error(EcsError::UnknownSingleton("Foo"));
        sink.warn(EcsError::ForeignEnvironmentActive);

        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.warning_count(), 1);

        let taken = sink.take();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].level, Level::Error);
        assert_eq!(taken[1].level, Level::Warning);
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_capture_limit_drops_oldest() {
        let sink = Diagnostics::new(true, 2);
        sink.error(EcsError::UnknownSingleton("A"));
        sink.error(EcsError::UnknownSingleton("B"));
        sink.error(EcsError::UnknownSingleton("C"));

        assert_eq!(sink.error_count(), 3);
        assert_eq!(
            sink.take_errors(),
            vec![EcsError::UnknownSingleton("B"), EcsError::UnknownSingleton("C")]
        );
    }

    #[test]
    fn test_capture_disabled_still_counts() {
        let sink = Diagnostics::new(false, 16);
        sink.error(EcsError::UnresolvedDeferred(1));
        assert_eq!(sink.error_count(), 1);
        assert!(sink.take().is_empty());
    }
}
