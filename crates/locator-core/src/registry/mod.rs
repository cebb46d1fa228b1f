//! # Service Registry
//!
//! Two-phase provider store: a provider is *registered* while it may still
//! be initializing and *ready* once it is safe to consume.
//!
//! ## Locking
//!
//! All entry and waiter mutations happen under one mutex. Waiter futures
//! are subscribed under the lock and awaited outside it, and waiters are
//! completed after the lock is released. The dependency graph has its own
//! lock and is never touched while this one is held.
//!
//! ## Atomic lookup
//!
//! [`ServiceRegistry::try_get_ready_key`] answers "is it ready, and if so
//! give it to me" in one locked step. Callers that must not race an
//! unregister use it instead of a status check followed by a get.

mod waiter;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::diagnostics::ServiceSnapshot;
use crate::domain::contract::{ContractKey, GroupId, ServiceInstance};
use crate::domain::descriptor::{Injectable, InjectionField};
use crate::domain::entry::{RegistrationState, ServiceEntry};
use crate::domain::graph::DependencyGraph;
use crate::error::{RegistryError, RegistryResult, WaitError};
use crate::metrics;

use waiter::{Readiness, Waiter};

/// Options for a registration.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Metadata tags.
    pub tags: BTreeSet<String>,
    /// Exclude the contract from cycle analysis.
    pub exempt: bool,
    /// Owner group for bulk teardown.
    pub group: Option<GroupId>,
    /// The provider's own declared dependencies.
    pub dependencies: Vec<InjectionField>,
}

impl RegisterOptions {
    /// No tags, not exempt, no group, no dependencies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying `P`'s declared dependencies.
    #[must_use]
    pub fn for_provider<P: Injectable>() -> Self {
        Self {
            dependencies: P::injection_fields(),
            ..Self::default()
        }
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Mark the contract exempt from cycle analysis.
    #[must_use]
    pub fn exempt(mut self) -> Self {
        self.exempt = true;
        self
    }

    /// Assign an owner group.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<GroupId>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set declared dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<InjectionField>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// One caller's receiver. Leaving the wait, for any reason, removes the
/// shared waiter if this was its last listener.
struct Subscription<'a> {
    registry: &'a ServiceRegistry,
    contract: ContractKey,
    receiver: Option<broadcast::Receiver<Readiness>>,
}

impl Subscription<'_> {
    async fn recv(&mut self) -> Option<Readiness> {
        self.receiver.as_mut()?.recv().await.ok()
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.registry.prune_waiter(self.contract);
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<ContractKey, ServiceEntry>,
    waiters: HashMap<ContractKey, Waiter>,
}

/// Provider store with per-contract readiness waiters.
#[derive(Debug)]
pub struct ServiceRegistry {
    state: Mutex<RegistryState>,
    graph: Arc<DependencyGraph>,
    warn_on_overwrite: bool,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    /// Registry with its own dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::with_graph(Arc::new(DependencyGraph::new()))
    }

    /// Registry sharing `graph`.
    #[must_use]
    pub fn with_graph(graph: Arc<DependencyGraph>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            graph,
            warn_on_overwrite: true,
        }
    }

    /// Toggle the overwrite warning.
    #[must_use]
    pub fn warn_on_overwrite(mut self, enabled: bool) -> Self {
        self.warn_on_overwrite = enabled;
        self
    }

    /// The dependency graph owned by this registry.
    #[must_use]
    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    // =========================================================================
    // Typed surface
    // =========================================================================

    /// Register `instance` as the provider for contract `C`.
    pub fn register<C: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Arc<C>,
        options: RegisterOptions,
    ) -> RegistryResult<()> {
        self.register_instance(ContractKey::of::<C>(), Some(ServiceInstance::new(instance)), options)
    }

    /// Register `instance` as the provider for contract `C`, tracking the
    /// dependencies `P` declares so a cycle through them is caught now
    /// rather than at injection time.
    pub fn register_provider<C, P>(&self, instance: Arc<C>, options: RegisterOptions) -> RegistryResult<()>
    where
        C: ?Sized + Send + Sync + 'static,
        P: Injectable,
    {
        let mut options = options;
        for field in P::injection_fields() {
            if !options.dependencies.contains(&field) {
                options.dependencies.push(field);
            }
        }
        self.register::<C>(instance, options)
    }

    /// Move `C` from registered to ready.
    pub fn mark_ready<C: ?Sized + 'static>(&self) -> RegistryResult<()> {
        self.mark_ready_key(ContractKey::of::<C>())
    }

    /// Remove `C` in whatever state it is in.
    pub fn unregister<C: ?Sized + 'static>(&self) -> bool {
        self.unregister_key(ContractKey::of::<C>())
    }

    /// The ready provider for `C`, if any.
    #[must_use]
    pub fn get_ready<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.try_get_ready::<C>().ok()
    }

    /// Atomic ready lookup: the provider, or the state that was observed
    /// instead.
    pub fn try_get_ready<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, RegistrationState> {
        let instance = self.try_get_ready_key(ContractKey::of::<C>())?;
        instance.downcast::<C>().ok_or(RegistrationState::Ready)
    }

    /// Wait until `C` is ready, `cancellation` fires, or `C` is unregistered.
    pub async fn wait_until_ready<C: ?Sized + Send + Sync + 'static>(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Arc<C>, WaitError> {
        let contract = ContractKey::of::<C>();
        let instance = self.wait_until_ready_key(contract, cancellation).await?;
        instance
            .downcast::<C>()
            .ok_or(WaitError::Withdrawn { contract })
    }

    // =========================================================================
    // Erased surface
    // =========================================================================

    /// Register a type-erased provider.
    ///
    /// # Errors
    ///
    /// - `NullRegistration` - `instance` is `None`
    /// - `ContractViolation` - `instance` does not expose `contract`
    /// - `CircularDependency` - the declared dependencies close a cycle; the
    ///   entry is not stored
    pub fn register_instance(
        &self,
        contract: ContractKey,
        instance: Option<ServiceInstance>,
        options: RegisterOptions,
    ) -> RegistryResult<()> {
        let instance = instance.ok_or(RegistryError::NullRegistration { contract })?;
        if !instance.satisfies(&contract) {
            return Err(RegistryError::ContractViolation {
                contract,
                concrete_type: instance.concrete_type(),
                implemented: instance.implemented_contracts(),
            });
        }

        if Self::already_ready(&self.state.lock(), contract) {
            return Ok(());
        }

        if let Err(record) =
            self.graph
                .try_update_edges(contract, &options.dependencies, options.exempt)
        {
            self.graph.abort_cycle(&record);
            metrics::record_cycle();
            return Err(RegistryError::CircularDependency { contract, record });
        }

        let RegisterOptions { tags, group, .. } = options;
        let mut state = self.state.lock();
        if Self::already_ready(&state, contract) {
            return Ok(());
        }
        if self.warn_on_overwrite && state.entries.contains_key(&contract) {
            warn!(contract = %contract, "Overwriting registered provider");
        }
        state.entries.insert(
            contract,
            ServiceEntry::registered(contract, instance, tags, group),
        );
        drop(state);

        metrics::record_registration();
        debug!(contract = %contract, "Provider registered");
        Ok(())
    }

    /// Ready entries are never replaced.
    fn already_ready(state: &RegistryState, contract: ContractKey) -> bool {
        let ready = state
            .entries
            .get(&contract)
            .is_some_and(ServiceEntry::is_ready);
        if ready {
            warn!(contract = %contract, "Contract already ready, registration ignored");
        }
        ready
    }

    /// Move `contract` from registered to ready and complete its waiter.
    ///
    /// # Errors
    ///
    /// `InvalidState` when `contract` is not registered. Calling it again on
    /// a ready contract only logs a warning.
    pub fn mark_ready_key(&self, contract: ContractKey) -> RegistryResult<()> {
        let (instance, waiter) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(entry) = state.entries.get_mut(&contract) else {
                return Err(RegistryError::InvalidState {
                    contract,
                    state: RegistrationState::Unregistered,
                });
            };
            if entry.is_ready() {
                warn!(contract = %contract, "Contract already ready");
                return Ok(());
            }
            entry.state = RegistrationState::Ready;
            (entry.instance.clone(), state.waiters.remove(&contract))
        };

        let delivered = waiter.map_or(0, |waiter| waiter.complete(instance));
        debug!(contract = %contract, waiters = delivered, "Provider ready");
        Ok(())
    }

    /// Remove `contract`, withdraw its waiter and clear its exemption and
    /// circular-error mark. Returns whether an entry was removed.
    pub fn unregister_key(&self, contract: ContractKey) -> bool {
        let (removed, waiter) = {
            let mut state = self.state.lock();
            (state.entries.remove(&contract), state.waiters.remove(&contract))
        };
        if let Some(waiter) = waiter {
            waiter.withdraw();
        }
        self.graph.remove_exemption(contract);
        self.graph.clear_error(contract);

        if removed.is_some() {
            debug!(contract = %contract, "Provider unregistered");
        }
        removed.is_some()
    }

    /// Atomic ready lookup on an erased key.
    pub fn try_get_ready_key(&self, contract: ContractKey) -> Result<ServiceInstance, RegistrationState> {
        let state = self.state.lock();
        match state.entries.get(&contract) {
            Some(entry) if entry.is_ready() => Ok(entry.instance.clone()),
            Some(entry) => Err(entry.state),
            None => Err(RegistrationState::Unregistered),
        }
    }

    /// Current state of `contract`.
    #[must_use]
    pub fn status_of(&self, contract: ContractKey) -> RegistrationState {
        self.state
            .lock()
            .entries
            .get(&contract)
            .map_or(RegistrationState::Unregistered, ServiceEntry::state)
    }

    /// Registered or ready.
    #[must_use]
    pub fn is_registered(&self, contract: ContractKey) -> bool {
        self.status_of(contract).is_registered()
    }

    /// Wait for `contract` on an erased key.
    ///
    /// Returns at once if ready. Otherwise subscribes to the contract's
    /// shared waiter (created on first use) and waits outside the lock.
    pub async fn wait_until_ready_key(
        &self,
        contract: ContractKey,
        cancellation: &CancellationToken,
    ) -> Result<ServiceInstance, WaitError> {
        let mut subscription = {
            let mut state = self.state.lock();
            if let Some(entry) = state.entries.get(&contract) {
                if entry.is_ready() {
                    return Ok(entry.instance.clone());
                }
            }
            let receiver = state
                .waiters
                .entry(contract)
                .or_insert_with(Waiter::new)
                .subscribe();
            Subscription {
                registry: self,
                contract,
                receiver: Some(receiver),
            }
        };

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(WaitError::Cancelled { contract }),
            received = subscription.recv() => match received {
                Some(Readiness::Ready(instance)) => Ok(instance),
                Some(Readiness::Withdrawn) | None => Err(WaitError::Withdrawn { contract }),
            },
        }
    }

    /// Drop `contract`'s waiter once nobody listens to it any more.
    fn prune_waiter(&self, contract: ContractKey) {
        let mut state = self.state.lock();
        if state.waiters.get(&contract).is_some_and(|waiter| waiter.listeners() == 0) {
            state.waiters.remove(&contract);
            debug!(contract = %contract, "Abandoned waiter removed");
        }
    }

    /// Contracts that currently have a waiter.
    #[must_use]
    pub fn pending_waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Number of callers currently subscribed to `contract`'s waiter.
    #[must_use]
    pub fn waiter_count(&self, contract: ContractKey) -> usize {
        self.state
            .lock()
            .waiters
            .get(&contract)
            .map_or(0, Waiter::listeners)
    }

    // =========================================================================
    // Bulk lifecycle
    // =========================================================================

    /// Remove every entry owned by `group`. Returns how many were removed.
    pub fn unregister_group(&self, group: &GroupId) -> usize {
        let removed = self.remove_where(|entry| entry.group.as_ref() == Some(group));
        debug!(group = %group, removed, "Group unregistered");
        removed
    }

    /// Remove every entry whose owner has been destroyed.
    pub fn cleanup_dead(&self) -> usize {
        let removed = self.remove_where(|entry| !entry.instance.is_alive());
        if removed > 0 {
            debug!(removed, "Dead providers removed");
        }
        removed
    }

    fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ServiceEntry) -> bool,
    {
        let (keys, waiters) = {
            let mut state = self.state.lock();
            let keys: Vec<ContractKey> = state
                .entries
                .values()
                .filter(|entry| predicate(entry))
                .map(ServiceEntry::contract)
                .collect();
            let mut waiters = Vec::new();
            for key in &keys {
                state.entries.remove(key);
                if let Some(waiter) = state.waiters.remove(key) {
                    waiters.push(waiter);
                }
            }
            (keys, waiters)
        };

        for waiter in waiters {
            waiter.withdraw();
        }
        for key in &keys {
            self.graph.remove_exemption(*key);
            self.graph.clear_error(*key);
        }
        keys.len()
    }

    /// Drop every entry and waiter and reset the dependency graph.
    pub fn clear_all(&self) {
        let (entries, waiters) = {
            let mut state = self.state.lock();
            let entries = state.entries.len();
            let waiters: Vec<Waiter> = state.waiters.drain().map(|(_, waiter)| waiter).collect();
            state.entries.clear();
            (entries, waiters)
        };
        for waiter in waiters {
            waiter.withdraw();
        }
        self.graph.clear_all();
        debug!(entries, "Registry cleared");
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Add a tag to an existing entry. False if `contract` is not stored.
    pub fn add_tag(&self, contract: ContractKey, tag: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        match state.entries.get_mut(&contract) {
            Some(entry) => {
                entry.tags.insert(tag.into());
                true
            }
            None => false,
        }
    }

    /// Remove a tag. False if the entry or the tag is missing.
    pub fn remove_tag(&self, contract: ContractKey, tag: &str) -> bool {
        let mut state = self.state.lock();
        state
            .entries
            .get_mut(&contract)
            .is_some_and(|entry| entry.tags.remove(tag))
    }

    /// Whether the entry carries `tag`.
    #[must_use]
    pub fn has_tag(&self, contract: ContractKey, tag: &str) -> bool {
        self.state
            .lock()
            .entries
            .get(&contract)
            .is_some_and(|entry| entry.tags.contains(tag))
    }

    /// Tags of an entry.
    #[must_use]
    pub fn tags_of(&self, contract: ContractKey) -> Option<BTreeSet<String>> {
        self.state
            .lock()
            .entries
            .get(&contract)
            .map(|entry| entry.tags.clone())
    }

    /// Contracts whose entry carries `tag`, sorted by name.
    #[must_use]
    pub fn find_by_tag(&self, tag: &str) -> Vec<ContractKey> {
        let mut keys: Vec<_> = self
            .state
            .lock()
            .entries
            .values()
            .filter(|entry| entry.tags.contains(tag))
            .map(ServiceEntry::contract)
            .collect();
        keys.sort();
        keys
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Snapshot of every entry, sorted by contract name.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ServiceSnapshot> {
        let mut snapshots: Vec<_> = self
            .state
            .lock()
            .entries
            .values()
            .map(ServiceSnapshot::from_entry)
            .collect();
        snapshots.sort_by(|a, b| a.contract.cmp(&b.contract));
        snapshots
    }

    /// Snapshot of one entry.
    #[must_use]
    pub fn snapshot(&self, contract: ContractKey) -> Option<ServiceSnapshot> {
        self.state
            .lock()
            .entries
            .get(&contract)
            .map(ServiceSnapshot::from_entry)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}
