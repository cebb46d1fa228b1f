//! Per-call options and call results.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ErrorMode;
use crate::error::InjectionError;

/// Options for one injection call. Unset values fall back to
/// [`LocatorConfig`](crate::config::LocatorConfig).
#[derive(Debug, Clone, Default)]
pub struct InjectOptions {
    pub(crate) cancellation: Option<CancellationToken>,
    /// `Some(None)` disables the timeout for this call.
    pub(crate) timeout: Option<Option<Duration>>,
    pub(crate) error_mode: Option<ErrorMode>,
}

impl InjectOptions {
    /// All defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caller-owned cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fail with a timeout once `duration` has elapsed.
    #[must_use]
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(Some(duration));
        self
    }

    /// Wait without a deadline.
    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.timeout = Some(None);
        self
    }

    /// Error mode for this call.
    #[must_use]
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = Some(mode);
        self
    }
}

/// Field-level summary of a finished call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionReport {
    pub call_id: Uuid,
    /// Short name of the target.
    pub target: String,
    /// Fields that received a provider.
    pub resolved: Vec<&'static str>,
    /// Optional fields whose contract was never registered.
    pub absent: Vec<&'static str>,
    /// Fields left unset.
    pub unresolved: Vec<&'static str>,
    pub elapsed: Duration,
}

impl fmt::Display for InjectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} resolved, {} absent, {} unresolved in {:?}",
            self.target,
            self.resolved.len(),
            self.absent.len(),
            self.unresolved.len(),
            self.elapsed
        )
    }
}

/// How an injection call ended when it did not return an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// Every required field resolved and all resolved values were applied.
    Completed(InjectionReport),
    /// Shutdown interrupted the call; the fields that did resolve were
    /// applied.
    Interrupted(InjectionReport),
    /// The call failed and the error mode swallowed the failure. Nothing
    /// was applied.
    Suppressed(InjectionError),
}

impl InjectionOutcome {
    /// `Completed`.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// `Interrupted`.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    /// `Suppressed`.
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed(_))
    }

    /// Report of a completed or interrupted call.
    #[must_use]
    pub fn report(&self) -> Option<&InjectionReport> {
        match self {
            Self::Completed(report) | Self::Interrupted(report) => Some(report),
            Self::Suppressed(_) => None,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Interrupted(_) => "interrupted",
            Self::Suppressed(error) => error.kind(),
        }
    }
}
