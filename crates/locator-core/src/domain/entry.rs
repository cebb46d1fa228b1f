//! Registry entries and the two-phase registration state machine.
//!
//! ```text
//! [UNREGISTERED] ──register──→ [REGISTERED] ──mark_ready──→ [READY]
//!       ↑                           │   ↑                      │
//!       │                           └───┘ register (overwrite) │
//!       └──────────────── unregister ──────────────────────────┘
//! ```
//!
//! There is no edge from READY back to REGISTERED; re-registering a ready
//! contract is rejected until it has been unregistered.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::contract::{ContractKey, GroupId, ServiceInstance};

/// Registration state of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RegistrationState {
    /// No provider is known.
    #[default]
    Unregistered,
    /// A provider exists but may still be initializing.
    Registered,
    /// The provider is safe to consume.
    Ready,
}

impl RegistrationState {
    /// Stable lowercase name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Registered => "registered",
            Self::Ready => "ready",
        }
    }

    /// Registered or ready.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        !matches!(self, Self::Unregistered)
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unregistered => "Unregistered",
            Self::Registered => "Registered",
            Self::Ready => "Ready",
        };
        f.write_str(label)
    }
}

/// One provider slot in the registry.
#[derive(Debug, Clone)]
pub struct ServiceEntry {
    pub(crate) contract: ContractKey,
    pub(crate) instance: ServiceInstance,
    pub(crate) state: RegistrationState,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) group: Option<GroupId>,
    pub(crate) created_at: DateTime<Utc>,
}

impl ServiceEntry {
    pub(crate) fn registered(
        contract: ContractKey,
        instance: ServiceInstance,
        tags: BTreeSet<String>,
        group: Option<GroupId>,
    ) -> Self {
        Self {
            contract,
            instance,
            state: RegistrationState::Registered,
            tags,
            group,
            created_at: Utc::now(),
        }
    }

    /// Contract the entry is registered under.
    #[must_use]
    pub fn contract(&self) -> ContractKey {
        self.contract
    }

    /// Provider handle.
    #[must_use]
    pub fn instance(&self) -> &ServiceInstance {
        &self.instance
    }

    /// Current state; never `Unregistered` for a stored entry.
    #[must_use]
    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// Metadata tags.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Owner group, if any.
    #[must_use]
    pub fn group(&self) -> Option<&GroupId> {
        self.group.as_ref()
    }

    /// Registration timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state == RegistrationState::Ready
    }
}
