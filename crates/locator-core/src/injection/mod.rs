//! # Injection Orchestrator
//!
//! Populates a target's declared fields from the registry.
//!
//! ## Call flow
//!
//! ```text
//! inject_into(target)
//!   │
//!   ├── update_edges + detect_cycle ──cycle──→ abort participants, CircularDependency
//!   │
//!   ├── per-call token (child of shutdown)
//!   │     ├── held by the dependency graph (cycle aborts)
//!   │     └── held by the timeout scheduler
//!   │
//!   ├── resolve every field concurrently, join all outcomes
//!   │     ├── required: wait until ready
//!   │     └── optional: ready now → use it
//!   │                   unregistered → one deferred step → still unregistered → absent
//!   │                   registered → wait until ready
//!   │
//!   └── classify: cycle → timeout → caller cancel → shutdown → missing required
//!                 apply all resolved values in one pass, or none of them
//! ```
//!
//! Every terminal failure goes through the call's [`ErrorMode`].

mod options;

pub use options::{InjectOptions, InjectionOutcome, InjectionReport};

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{ErrorMode, LocatorConfig};
use crate::domain::contract::{ContractKey, ServiceInstance};
use crate::domain::descriptor::{Injectable, InjectionField, ResolvedDependencies};
use crate::domain::entry::RegistrationState;
use crate::domain::graph::DependencyGraph;
use crate::domain::timeout::{next_step, TimeoutRegistration, TimeoutScheduler};
use crate::error::{InjectionError, InjectionResult, OutstandingDependency, OutstandingStatus, WaitError};
use crate::metrics;
use crate::registry::ServiceRegistry;

/// How one field settled.
#[derive(Debug)]
enum FieldOutcome {
    Resolved(ServiceInstance),
    /// Optional field whose contract is not registered.
    Absent,
    Cancelled,
    Withdrawn,
}

impl FieldOutcome {
    fn is_failure(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Withdrawn)
    }
}

/// Keeps the call's cancellation handle visible to the dependency graph
/// for the lifetime of the call.
struct ResolvingGuard<'a> {
    graph: &'a DependencyGraph,
    contract: ContractKey,
    call_id: Uuid,
}

impl<'a> ResolvingGuard<'a> {
    fn register(
        graph: &'a DependencyGraph,
        contract: ContractKey,
        call_id: Uuid,
        token: CancellationToken,
    ) -> Self {
        graph.register_resolving(contract, call_id, token);
        Self {
            graph,
            contract,
            call_id,
        }
    }
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        self.graph.unregister_resolving(self.contract, self.call_id);
    }
}

/// Resolves and applies injection fields.
pub struct Injector {
    registry: Arc<ServiceRegistry>,
    scheduler: Arc<TimeoutScheduler>,
    config: LocatorConfig,
    shutdown: CancellationToken,
    descriptors: RwLock<HashMap<TypeId, Arc<[InjectionField]>>>,
}

impl Injector {
    /// Create an injector. Cancelling `shutdown` interrupts every call in
    /// flight.
    pub fn new(
        registry: Arc<ServiceRegistry>,
        scheduler: Arc<TimeoutScheduler>,
        config: LocatorConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            scheduler,
            config,
            shutdown,
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    /// Registry this injector resolves against.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Populate `target`'s declared fields.
    ///
    /// # Returns
    ///
    /// * `Ok(Completed)` - every required field resolved; values applied
    /// * `Ok(Interrupted)` - shutdown fired; the resolved subset was applied
    /// * `Ok(Suppressed)` - the call failed and the error mode swallowed it
    /// * `Err` - the call failed under [`ErrorMode::Rethrow`]
    pub async fn inject_into<T: Injectable>(
        &self,
        target: &mut T,
        options: InjectOptions,
    ) -> InjectionResult<InjectionOutcome> {
        let call_id = Uuid::new_v4();
        let contract = T::injection_key();
        let mode: ErrorMode = options
            .error_mode
            .clone()
            .unwrap_or_else(|| self.config.error_mode.clone());
        let span = info_span!("inject", %call_id, target = %contract);

        async move {
            match self.resolve_and_apply(target, call_id, contract, options).await {
                Ok(outcome) => {
                    metrics::record_injection(outcome.label());
                    Ok(outcome)
                }
                Err(error) => {
                    metrics::record_injection(error.kind());
                    mode.surface(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn resolve_and_apply<T: Injectable>(
        &self,
        target: &mut T,
        call_id: Uuid,
        contract: ContractKey,
        options: InjectOptions,
    ) -> InjectionResult<InjectionOutcome> {
        let started = Instant::now();
        let target_name = contract.short_name();
        let fields = self.descriptor::<T>();
        let graph = self.registry.graph();

        graph.update_edges(contract, &fields);
        if let Some(record) = graph.detect_cycle(contract) {
            graph.abort_cycle(&record);
            metrics::record_cycle();
            return Err(InjectionError::CircularDependency {
                target: target_name,
                record,
            });
        }

        let token = self.shutdown.child_token();
        let _resolving = ResolvingGuard::register(graph, contract, call_id, token.clone());
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);
        let mut registration: Option<TimeoutRegistration> =
            timeout.map(|duration| self.scheduler.register(token.clone(), duration));
        let caller = options.cancellation.unwrap_or_default();

        debug!(fields = fields.len(), ?timeout, "Resolving fields");
        let settled: Vec<FieldOutcome> = join_all(
            fields
                .iter()
                .map(|field| self.resolve_field(*field, &token, &caller)),
        )
        .await;

        let expired = registration.as_ref().is_some_and(TimeoutRegistration::expired);
        if let Some(registration) = registration.as_mut() {
            registration.dispose();
        }

        let report = build_report(call_id, &target_name, &fields, &settled, started.elapsed());
        let unsettled: Vec<InjectionField> = fields
            .iter()
            .zip(settled.iter())
            .filter(|(_, outcome)| outcome.is_failure())
            .map(|(field, _)| *field)
            .collect();

        if settled.iter().any(|outcome| matches!(outcome, FieldOutcome::Cancelled)) {
            if let Some(record) = graph.abort_reason(call_id) {
                return Err(InjectionError::CircularDependency {
                    target: target_name,
                    record,
                });
            }
            if expired {
                return Err(InjectionError::Timeout {
                    target: target_name,
                    duration: timeout.unwrap_or(Duration::ZERO),
                    outstanding: self.outstanding(&unsettled),
                });
            }
            if caller.is_cancelled() || !self.shutdown.is_cancelled() {
                return Err(InjectionError::ExternalCancellation {
                    target: target_name,
                    pending: unsettled.iter().map(|field| field.contract).collect(),
                });
            }

            apply(target, &fields, settled);
            warn!(%report, "Injection interrupted by shutdown, resolved fields applied");
            return Ok(InjectionOutcome::Interrupted(report));
        }

        let missing: Vec<ContractKey> = unsettled
            .iter()
            .filter(|field| field.required)
            .map(|field| field.contract)
            .collect();
        if !missing.is_empty() {
            return Err(InjectionError::MissingRequiredDependency {
                target: target_name,
                missing,
            });
        }

        apply(target, &fields, settled);
        debug!(%report, "Injection completed");
        Ok(InjectionOutcome::Completed(report))
    }

    async fn resolve_field(
        &self,
        field: InjectionField,
        token: &CancellationToken,
        caller: &CancellationToken,
    ) -> FieldOutcome {
        if !field.required {
            match self.registry.try_get_ready_key(field.contract) {
                Ok(instance) => return FieldOutcome::Resolved(instance),
                Err(RegistrationState::Unregistered) => {
                    // Give sibling providers one step to register.
                    next_step().await;
                    if !self.registry.is_registered(field.contract) {
                        debug!(field = field.name, contract = %field.contract, "Optional dependency absent");
                        return FieldOutcome::Absent;
                    }
                }
                Err(_) => {}
            }
        }

        tokio::select! {
            biased;
            _ = caller.cancelled() => FieldOutcome::Cancelled,
            result = self.registry.wait_until_ready_key(field.contract, token) => match result {
                Ok(instance) => FieldOutcome::Resolved(instance),
                Err(WaitError::Cancelled { .. }) => FieldOutcome::Cancelled,
                Err(WaitError::Withdrawn { .. }) => FieldOutcome::Withdrawn,
            },
        }
    }

    fn outstanding(&self, unsettled: &[InjectionField]) -> Vec<OutstandingDependency> {
        unsettled
            .iter()
            .map(|field| OutstandingDependency {
                field: field.name,
                contract: field.contract,
                status: match self.registry.status_of(field.contract) {
                    RegistrationState::Unregistered => OutstandingStatus::NeverRegistered,
                    _ => OutstandingStatus::RegisteredNotReady,
                },
            })
            .collect()
    }

    fn descriptor<T: Injectable>(&self) -> Arc<[InjectionField]> {
        let type_id = TypeId::of::<T>();
        if let Some(fields) = self.descriptors.read().get(&type_id) {
            return Arc::clone(fields);
        }
        let fields: Arc<[InjectionField]> = T::injection_fields().into();
        Arc::clone(self.descriptors.write().entry(type_id).or_insert(fields))
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("config", &self.config)
            .field("descriptors", &self.descriptors.read().len())
            .finish()
    }
}

fn apply<T: Injectable>(target: &mut T, fields: &[InjectionField], settled: Vec<FieldOutcome>) {
    let mut resolved = ResolvedDependencies::default();
    for (field, outcome) in fields.iter().zip(settled) {
        if let FieldOutcome::Resolved(instance) = outcome {
            resolved.insert(field.name, instance);
        }
    }
    target.apply(&mut resolved);
}

fn build_report(
    call_id: Uuid,
    target: &str,
    fields: &[InjectionField],
    settled: &[FieldOutcome],
    elapsed: Duration,
) -> InjectionReport {
    let mut report = InjectionReport {
        call_id,
        target: target.to_string(),
        resolved: Vec::new(),
        absent: Vec::new(),
        unresolved: Vec::new(),
        elapsed,
    };
    for (field, outcome) in fields.iter().zip(settled) {
        match outcome {
            FieldOutcome::Resolved(_) => report.resolved.push(field.name),
            FieldOutcome::Absent => report.absent.push(field.name),
            FieldOutcome::Cancelled | FieldOutcome::Withdrawn => report.unresolved.push(field.name),
        }
    }
    report
}
