//! Read-only views of registry state for tooling and logs.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contract::{ContractKey, GroupId};
use crate::domain::entry::{RegistrationState, ServiceEntry};

/// Point-in-time copy of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    /// Short contract name.
    pub contract: String,
    /// Concrete provider type name.
    pub concrete_type: String,
    pub state: RegistrationState,
    pub tags: BTreeSet<String>,
    pub group: Option<GroupId>,
    pub created_at: DateTime<Utc>,
    /// False once the provider's owner has been destroyed.
    pub alive: bool,
}

impl ServiceSnapshot {
    pub(crate) fn from_entry(entry: &ServiceEntry) -> Self {
        Self {
            contract: entry.contract().short_name(),
            concrete_type: entry.instance().concrete_type().to_string(),
            state: entry.state(),
            tags: entry.tags().clone(),
            group: entry.group().cloned(),
            created_at: entry.created_at(),
            alive: entry.instance().is_alive(),
        }
    }

    /// `Foo: Ready (tags: [audio, core])`
    #[must_use]
    pub fn status_line(&self) -> String {
        let mut line = format!("{}: {}", self.contract, self.state);
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            line.push_str(&format!(" (tags: [{}])", tags.join(", ")));
        }
        if let Some(group) = &self.group {
            line.push_str(&format!(" (group: {group})"));
        }
        if !self.alive {
            line.push_str(" (dead)");
        }
        line
    }
}

/// Status line for `contract`, including the unregistered case.
#[must_use]
pub fn status_line(contract: ContractKey, snapshot: Option<&ServiceSnapshot>) -> String {
    match snapshot {
        Some(snapshot) => snapshot.status_line(),
        None => format!("{contract}: {}", RegistrationState::Unregistered),
    }
}

/// Pretty-printed JSON export of `snapshots`.
pub fn to_json(snapshots: &[ServiceSnapshot]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(snapshots)
}
