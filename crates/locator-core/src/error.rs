//! Error types for the service locator.
//!
//! Registry misuse (`RegistryError`) is a programmer error and always
//! returned to the caller. Injection failures (`InjectionError`) are
//! surfaced according to the call's [`ErrorMode`](crate::config::ErrorMode).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::contract::{join_keys, ContractKey};
use crate::domain::entry::RegistrationState;
use crate::domain::graph::CircularityRecord;

/// Registry misuse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No instance was supplied.
    #[error("Cannot register a null instance for contract {contract}")]
    NullRegistration { contract: ContractKey },

    /// The instance does not expose the contract it was registered under.
    #[error(
        "Instance of type {concrete_type} does not implement contract {contract}; \
         it implements [{}]",
        join_keys(.implemented)
    )]
    ContractViolation {
        contract: ContractKey,
        concrete_type: &'static str,
        implemented: Vec<ContractKey>,
    },

    /// `mark_ready` on a contract that is not registered.
    #[error("Cannot mark {contract} ready: it is {state}, expected Registered")]
    InvalidState {
        contract: ContractKey,
        state: RegistrationState,
    },

    /// The provider's declared dependencies close a cycle.
    #[error("Registering {contract} closes a circular dependency: {record}")]
    CircularDependency {
        contract: ContractKey,
        record: CircularityRecord,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Why a single readiness wait ended without an instance.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The waiter's own cancellation fired.
    #[error("Wait for {contract} was cancelled")]
    Cancelled { contract: ContractKey },

    /// The provider was unregistered before it became ready.
    #[error("{contract} was unregistered before it became ready")]
    Withdrawn { contract: ContractKey },
}

/// State of a dependency still outstanding when a call timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutstandingStatus {
    /// No provider was ever registered.
    NeverRegistered,
    /// A provider is registered but never became ready.
    RegisteredNotReady,
}

impl fmt::Display for OutstandingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverRegistered => f.write_str("never registered"),
            Self::RegisteredNotReady => f.write_str("registered but not ready"),
        }
    }
}

/// One unresolved field of a timed-out call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutstandingDependency {
    pub field: &'static str,
    pub contract: ContractKey,
    pub status: OutstandingStatus,
}

impl fmt::Display for OutstandingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (field `{}`, {})", self.contract, self.field, self.status)
    }
}

fn join_outstanding(outstanding: &[OutstandingDependency]) -> String {
    outstanding
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Terminal failure of an injection call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectionError {
    /// Required fields could not be resolved.
    #[error("{target}: missing required dependencies [{}]", join_keys(.missing))]
    MissingRequiredDependency {
        target: String,
        missing: Vec<ContractKey>,
    },

    /// The target takes part in a dependency cycle.
    #[error("{target}: circular dependency {record}")]
    CircularDependency {
        target: String,
        record: CircularityRecord,
    },

    /// The call's timeout elapsed first.
    #[error(
        "{target}: timed out after {duration:?} waiting for [{}]",
        join_outstanding(.outstanding)
    )]
    Timeout {
        target: String,
        duration: Duration,
        outstanding: Vec<OutstandingDependency>,
    },

    /// The caller's cancellation fired first.
    #[error("{target}: injection cancelled while waiting for [{}]", join_keys(.pending))]
    ExternalCancellation {
        target: String,
        pending: Vec<ContractKey>,
    },
}

impl InjectionError {
    /// Target type name the error refers to.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::MissingRequiredDependency { target, .. }
            | Self::CircularDependency { target, .. }
            | Self::Timeout { target, .. }
            | Self::ExternalCancellation { target, .. } => target,
        }
    }

    /// Short kind label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingRequiredDependency { .. } => "missing_required",
            Self::CircularDependency { .. } => "circular",
            Self::Timeout { .. } => "timeout",
            Self::ExternalCancellation { .. } => "cancelled",
        }
    }
}

/// Result type for injection calls.
pub type InjectionResult<T> = Result<T, InjectionError>;

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Tick interval must be greater than zero")]
    ZeroTickInterval,

    #[error("Default timeout must be greater than zero (unset it to disable timeouts)")]
    ZeroTimeout,

    #[error("Unknown error mode '{value}' (expected rethrow, warn, log or silent)")]
    UnknownErrorMode { value: String },
}
