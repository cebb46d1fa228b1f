//! # Dependency Graph
//!
//! Tracks which contracts each provider or injection target depends on, so
//! circular waits are caught before anything blocks on them.
//!
//! ## Detection points
//!
//! - **Registration**: a provider's declared fields are recorded and scanned
//!   immediately, catching cycles that exist purely by field shape.
//! - **Injection start**: a target's fields are recorded and scanned before
//!   any field is resolved.
//!
//! When a cycle is found every call currently resolving on behalf of a
//! participant is cancelled and each participant keeps a circular-error mark
//! until it is unregistered or the graph is cleared.
//!
//! ```text
//!   IFoo ──bar──→ IBar
//!    ↑              │
//!    └─────foo──────┘      path: IFoo → IBar → IFoo, closing edge IBar.foo
//! ```
//!
//! Exempt contracts are invisible to the scan: edges into them are skipped,
//! so nothing reachable only through an exempt contract can form a cycle.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fmt::Write as _;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

use super::contract::ContractKey;
use super::descriptor::InjectionField;

/// Edge `from.field → to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub from: ContractKey,
    pub to: ContractKey,
    pub field: String,
}

/// A detected cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularityRecord {
    /// Ordered path starting and ending at the node whose existing edge
    /// closes the loop.
    pub path: Vec<ContractKey>,
    /// The edge that closes the loop back to the root.
    pub closing_edge: DependencyEdge,
}

impl CircularityRecord {
    /// Distinct contracts on the cycle.
    #[must_use]
    pub fn participants(&self) -> &[ContractKey] {
        match self.path.split_last() {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => &self.path,
        }
    }

    /// `A → B → A`
    #[must_use]
    pub fn describe(&self) -> String {
        self.path
            .iter()
            .map(ContractKey::short_name)
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

impl fmt::Display for CircularityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (closed by {}.{} → {})",
            self.describe(),
            self.closing_edge.from,
            self.closing_edge.field,
            self.closing_edge.to
        )
    }
}

/// Declared dependencies of one contract or target type.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub contract: ContractKey,
    /// Insertion-ordered, duplicate-free.
    pub dependencies: Vec<ContractKey>,
    pub dependency_field_names: HashMap<ContractKey, String>,
    pub is_resolving: bool,
}

impl DependencyNode {
    fn new(contract: ContractKey) -> Self {
        Self {
            contract,
            dependencies: Vec::new(),
            dependency_field_names: HashMap::new(),
            is_resolving: false,
        }
    }
}

/// Cancellation handle of one in-flight injection call.
#[derive(Debug, Clone)]
struct ResolvingHandle {
    call_id: Uuid,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<ContractKey, DependencyNode>,
    exempt: HashSet<ContractKey>,
    resolving: HashMap<ContractKey, Vec<ResolvingHandle>>,
    errored: HashMap<ContractKey, CircularityRecord>,
    /// Calls cancelled by a cycle abort, with the cycle that did it.
    aborted: HashMap<Uuid, CircularityRecord>,
}

/// Dependency edges, exemptions, resolving handles and circular-error marks.
///
/// Owned by a registry and shared with its injector; guarded by its own
/// mutex, never taken while the registry lock is held.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    state: Mutex<GraphState>,
}

impl DependencyGraph {
    /// Empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `contract`'s dependency set with `fields`.
    pub fn update_edges(&self, contract: ContractKey, fields: &[InjectionField]) {
        let mut state = self.state.lock();
        Self::update_edges_locked(&mut state, contract, fields);
    }

    /// Replace `contract`'s edges unless the new set closes a cycle through
    /// it. On a cycle the previous edges are put back and the cycle is
    /// returned. `exempt` takes effect only when the edges are kept.
    pub fn try_update_edges(
        &self,
        contract: ContractKey,
        fields: &[InjectionField],
        exempt: bool,
    ) -> Result<(), CircularityRecord> {
        let mut state = self.state.lock();
        let previous = state.nodes.get(&contract).cloned();
        Self::update_edges_locked(&mut state, contract, fields);

        if exempt {
            state.exempt.insert(contract);
        } else if let Some(record) = Self::detect_cycle_locked(&state, contract) {
            match previous {
                Some(node) => state.nodes.insert(contract, node),
                None => state.nodes.remove(&contract),
            };
            return Err(record);
        }
        Ok(())
    }

    fn update_edges_locked(state: &mut GraphState, contract: ContractKey, fields: &[InjectionField]) {
        let is_resolving = state.resolving.contains_key(&contract);
        let node = state
            .nodes
            .entry(contract)
            .or_insert_with(|| DependencyNode::new(contract));

        node.dependencies.clear();
        node.dependency_field_names.clear();
        for field in fields {
            if !node.dependencies.contains(&field.contract) {
                node.dependencies.push(field.contract);
            }
            node.dependency_field_names
                .entry(field.contract)
                .or_insert_with(|| field.name.to_string());
        }
        node.is_resolving = is_resolving;

        debug!(
            contract = %contract,
            dependencies = node.dependencies.len(),
            "Dependency edges updated"
        );
    }

    /// Depth-first scan for a cycle that returns to `root`.
    #[must_use]
    pub fn detect_cycle(&self, root: ContractKey) -> Option<CircularityRecord> {
        let state = self.state.lock();
        Self::detect_cycle_locked(&state, root)
    }

    fn detect_cycle_locked(state: &GraphState, root: ContractKey) -> Option<CircularityRecord> {
        if state.exempt.contains(&root) {
            return None;
        }
        let mut path = vec![root];
        let mut visited = HashSet::from([root]);
        Self::visit(state, root, root, &mut path, &mut visited)
    }

    fn visit(
        state: &GraphState,
        root: ContractKey,
        current: ContractKey,
        path: &mut Vec<ContractKey>,
        visited: &mut HashSet<ContractKey>,
    ) -> Option<CircularityRecord> {
        let node = state.nodes.get(&current)?;

        for dependency in &node.dependencies {
            if state.exempt.contains(dependency) {
                continue;
            }
            if *dependency == root {
                let mut cycle = path.clone();
                let shift = cycle.len() - 1;
                cycle.rotate_left(shift);
                cycle.push(current);
                let field = node
                    .dependency_field_names
                    .get(dependency)
                    .cloned()
                    .unwrap_or_default();
                return Some(CircularityRecord {
                    path: cycle,
                    closing_edge: DependencyEdge {
                        from: current,
                        to: root,
                        field,
                    },
                });
            }
            // Cycles that do not pass through `root` are reported when one
            // of their own members is scanned.
            if !visited.insert(*dependency) {
                continue;
            }
            path.push(*dependency);
            if let Some(record) = Self::visit(state, root, *dependency, path, visited) {
                return Some(record);
            }
            path.pop();
        }
        None
    }

    /// Track the cancellation handle of a call resolving on behalf of
    /// `contract`.
    pub fn register_resolving(&self, contract: ContractKey, call_id: Uuid, token: CancellationToken) {
        let mut state = self.state.lock();
        state
            .resolving
            .entry(contract)
            .or_default()
            .push(ResolvingHandle { call_id, token });
        if let Some(node) = state.nodes.get_mut(&contract) {
            node.is_resolving = true;
        }
    }

    /// Drop the handle registered for `call_id`, along with any abort
    /// record left for it.
    pub fn unregister_resolving(&self, contract: ContractKey, call_id: Uuid) {
        let mut state = self.state.lock();
        let now_idle = match state.resolving.get_mut(&contract) {
            Some(handles) => {
                handles.retain(|handle| handle.call_id != call_id);
                handles.is_empty()
            }
            None => true,
        };
        if now_idle {
            state.resolving.remove(&contract);
            if let Some(node) = state.nodes.get_mut(&contract) {
                node.is_resolving = false;
            }
        }
        state.aborted.remove(&call_id);
    }

    /// Whether any call is resolving on behalf of `contract`.
    #[must_use]
    pub fn is_resolving(&self, contract: ContractKey) -> bool {
        self.state.lock().resolving.contains_key(&contract)
    }

    /// Cancel every resolving handle of every contract on the cycle.
    /// Already-cancelled handles are skipped.
    pub fn cancel_cycle_participants(&self, record: &CircularityRecord) {
        let mut state = self.state.lock();
        Self::cancel_participants_locked(&mut state, record);
    }

    fn cancel_participants_locked(state: &mut GraphState, record: &CircularityRecord) {
        let mut cancelled = Vec::new();
        for contract in record.participants() {
            let Some(handles) = state.resolving.get(contract) else {
                continue;
            };
            for handle in handles {
                if !handle.token.is_cancelled() {
                    cancelled.push(handle.clone());
                }
            }
        }
        for handle in cancelled {
            state.aborted.insert(handle.call_id, record.clone());
            handle.token.cancel();
        }
    }

    /// Flag every contract on the cycle with a circular-dependency error.
    pub fn mark_path_as_errored(&self, record: &CircularityRecord) {
        let mut state = self.state.lock();
        for contract in record.participants() {
            state.errored.insert(*contract, record.clone());
        }
    }

    /// Cancel participants and mark them errored in one step.
    pub fn abort_cycle(&self, record: &CircularityRecord) {
        let mut state = self.state.lock();
        Self::cancel_participants_locked(&mut state, record);
        for contract in record.participants() {
            state.errored.insert(*contract, record.clone());
        }
        error!(cycle = %record, "Circular dependency detected");
    }

    /// Cycle that cancelled `call_id`, if one did.
    #[must_use]
    pub fn abort_reason(&self, call_id: Uuid) -> Option<CircularityRecord> {
        self.state.lock().aborted.get(&call_id).cloned()
    }

    /// Circular-error mark for `contract`.
    #[must_use]
    pub fn circular_error(&self, contract: ContractKey) -> Option<CircularityRecord> {
        self.state.lock().errored.get(&contract).cloned()
    }

    /// Whether `contract` carries a circular-error mark.
    #[must_use]
    pub fn has_circular_error(&self, contract: ContractKey) -> bool {
        self.state.lock().errored.contains_key(&contract)
    }

    /// Remove the circular-error mark for `contract`.
    pub fn clear_error(&self, contract: ContractKey) {
        self.state.lock().errored.remove(&contract);
    }

    /// Exclude `contract` from cycle analysis.
    pub fn add_exemption(&self, contract: ContractKey) {
        self.state.lock().exempt.insert(contract);
    }

    /// Re-include `contract` in cycle analysis.
    pub fn remove_exemption(&self, contract: ContractKey) {
        self.state.lock().exempt.remove(&contract);
    }

    /// Whether `contract` is exempt.
    #[must_use]
    pub fn is_exempt(&self, contract: ContractKey) -> bool {
        self.state.lock().exempt.contains(&contract)
    }

    /// Declared dependencies of `contract`.
    #[must_use]
    pub fn dependencies_of(&self, contract: ContractKey) -> Vec<ContractKey> {
        self.state
            .lock()
            .nodes
            .get(&contract)
            .map(|node| node.dependencies.clone())
            .unwrap_or_default()
    }

    /// Snapshot of one node.
    #[must_use]
    pub fn node(&self, contract: ContractKey) -> Option<DependencyNode> {
        self.state.lock().nodes.get(&contract).cloned()
    }

    /// Number of tracked nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    /// Reset every map, cancelling all outstanding resolving handles.
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        for handle in state.resolving.values().flatten() {
            handle.token.cancel();
        }
        *state = GraphState::default();
        debug!("Dependency graph cleared");
    }

    /// Human-readable dump of every node, sorted by contract name.
    #[must_use]
    pub fn report(&self) -> String {
        let state = self.state.lock();
        let mut nodes: Vec<_> = state.nodes.values().collect();
        nodes.sort_by(|a, b| a.contract.cmp(&b.contract));

        let mut out = format!("Dependency graph ({} nodes)\n", nodes.len());
        for node in nodes {
            let _ = write!(out, "  {}", node.contract);
            if state.exempt.contains(&node.contract) {
                out.push_str(" [exempt]");
            }
            if state.resolving.contains_key(&node.contract) {
                out.push_str(" [resolving]");
            }
            if let Some(record) = state.errored.get(&node.contract) {
                let _ = write!(out, " [circular: {}]", record.describe());
            }
            out.push('\n');
            for dependency in &node.dependencies {
                let field = node
                    .dependency_field_names
                    .get(dependency)
                    .map(String::as_str)
                    .unwrap_or("?");
                let _ = writeln!(out, "    → {dependency} (field `{field}`)");
            }
        }
        out
    }
}
