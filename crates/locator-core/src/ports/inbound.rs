//! Driving Ports (API - Inbound)
//!
//! The surface consumed by host lifecycle glue: provider registration,
//! readiness, lookups, injection, diagnostics and bulk teardown.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::diagnostics::ServiceSnapshot;
use crate::domain::contract::{ContractKey, GroupId};
use crate::domain::descriptor::Injectable;
use crate::domain::entry::RegistrationState;
use crate::error::{InjectionResult, RegistryResult, WaitError};
use crate::injection::{InjectOptions, InjectionOutcome};
use crate::registry::RegisterOptions;

/// Primary Service Locator API
///
/// This is the driving port for the locator. Registry misuse is always
/// returned as an error; injection failures follow the call's error mode.
#[async_trait]
pub trait ServiceLocatorApi: Send + Sync {
    /// Register `instance` as the provider for contract `C`
    ///
    /// # Errors
    /// * `ContractViolation` or `CircularDependency` (see
    ///   [`ServiceRegistry::register_instance`](crate::registry::ServiceRegistry::register_instance))
    fn register<C: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Arc<C>,
        options: RegisterOptions,
    ) -> RegistryResult<()>;

    /// Register `instance` for `C` with the dependencies provider type `P`
    /// declares, so a cycle through them is rejected at registration.
    fn register_provider<C, P>(&self, instance: Arc<C>, options: RegisterOptions) -> RegistryResult<()>
    where
        C: ?Sized + Send + Sync + 'static,
        P: Injectable;

    /// Move `C` from registered to ready
    fn mark_ready<C: ?Sized + 'static>(&self) -> RegistryResult<()>;

    /// Remove `C` in whatever state it is in
    fn unregister<C: ?Sized + 'static>(&self) -> bool;

    /// Ready provider for `C`, if any
    fn get_ready<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>>;

    /// Atomic ready lookup
    fn try_get_ready<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, RegistrationState>;

    /// Wait until `C` is ready
    async fn wait_until_ready<C: ?Sized + Send + Sync + 'static>(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Arc<C>, WaitError>;

    /// Populate `target`'s declared fields
    async fn inject_into<T: Injectable>(
        &self,
        target: &mut T,
        options: InjectOptions,
    ) -> InjectionResult<InjectionOutcome>;

    /// Every entry with state, tags and group
    fn snapshots(&self) -> Vec<ServiceSnapshot>;

    /// One-line status for `contract`
    fn status_line(&self, contract: ContractKey) -> String;

    /// Human-readable dependency graph dump
    fn dependency_report(&self) -> String;

    /// Remove every entry owned by `group`
    fn unregister_group(&self, group: &GroupId) -> usize;

    /// Remove entries whose owner has been destroyed
    fn cleanup_dead(&self) -> usize;

    /// Reset registry and dependency graph
    fn clear_all(&self);
}
