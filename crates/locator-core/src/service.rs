//! Service Locator - registry, graph, scheduler and injector in one handle

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::LocatorConfig;
use crate::diagnostics::{self, ServiceSnapshot};
use crate::domain::contract::{ContractKey, GroupId};
use crate::domain::descriptor::Injectable;
use crate::domain::entry::RegistrationState;
use crate::domain::graph::DependencyGraph;
use crate::domain::timeout::{spawn_ticker, TickSummary, TimeoutScheduler};
use crate::error::{ConfigError, InjectionResult, RegistryResult, WaitError};
use crate::injection::{InjectOptions, InjectionOutcome, Injector};
use crate::ports::inbound::ServiceLocatorApi;
use crate::registry::{RegisterOptions, ServiceRegistry};

/// Top-level locator.
///
/// Owns one registry (and its dependency graph), shares a timeout
/// scheduler, and carries the shutdown token every injection call derives
/// its cancellation from.
#[derive(Debug)]
pub struct ServiceLocator {
    config: LocatorConfig,
    registry: Arc<ServiceRegistry>,
    scheduler: Arc<TimeoutScheduler>,
    /// False when the scheduler was handed in and may serve other locators.
    owns_scheduler: bool,
    injector: Injector,
    shutdown: CancellationToken,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceLocator {
    /// Create a locator with its own timeout scheduler.
    pub fn new(config: LocatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, TimeoutScheduler::new(), true))
    }

    /// Create a locator that shares `scheduler` with other locators.
    ///
    /// [`shutdown`](Self::shutdown) leaves a shared scheduler running.
    pub fn with_scheduler(
        config: LocatorConfig,
        scheduler: Arc<TimeoutScheduler>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, scheduler, false))
    }

    /// Locator with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::build(LocatorConfig::default(), TimeoutScheduler::new(), true)
    }

    fn build(config: LocatorConfig, scheduler: Arc<TimeoutScheduler>, owns_scheduler: bool) -> Self {
        let graph = Arc::new(DependencyGraph::new());
        let registry = Arc::new(
            ServiceRegistry::with_graph(graph).warn_on_overwrite(config.warn_on_overwrite),
        );
        let shutdown = CancellationToken::new();
        let injector = Injector::new(
            Arc::clone(&registry),
            Arc::clone(&scheduler),
            config.clone(),
            shutdown.clone(),
        );

        debug!(
            default_timeout = ?config.default_timeout,
            error_mode = config.error_mode.as_str(),
            "Service locator created"
        );

        Self {
            config,
            registry,
            scheduler,
            owns_scheduler,
            injector,
            shutdown,
            ticker: Mutex::new(None),
        }
    }

    /// Drive the timeout scheduler from a tokio interval at the configured
    /// tick period. Returns false if the ticker is already running.
    ///
    /// Hosts with their own update loop call [`tick`](Self::tick) instead.
    pub fn start_ticker(&self) -> bool {
        let mut ticker = self.ticker.lock();
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        *ticker = Some(spawn_ticker(
            Arc::clone(&self.scheduler),
            self.config.tick_interval,
            self.shutdown.clone(),
        ));
        true
    }

    /// Scan pending timeouts once.
    pub fn tick(&self) -> TickSummary {
        self.scheduler.tick()
    }

    /// Interrupt every injection call in flight and stop the ticker. An
    /// owned scheduler is shut down too. Registered providers are left in
    /// place.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        if self.owns_scheduler {
            self.scheduler.shutdown();
        }
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
        info!(services = self.registry.len(), "Service locator shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Dependency graph owned by the registry.
    #[must_use]
    pub fn graph(&self) -> &Arc<DependencyGraph> {
        self.registry.graph()
    }

    /// Timeout scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<TimeoutScheduler> {
        &self.scheduler
    }

    /// Injection orchestrator.
    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Snapshots as pretty JSON.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        diagnostics::to_json(&self.registry.snapshots())
    }
}

impl Drop for ServiceLocator {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl ServiceLocatorApi for ServiceLocator {
    fn register<C: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Arc<C>,
        options: RegisterOptions,
    ) -> RegistryResult<()> {
        self.registry.register::<C>(instance, options)
    }

    fn register_provider<C, P>(&self, instance: Arc<C>, options: RegisterOptions) -> RegistryResult<()>
    where
        C: ?Sized + Send + Sync + 'static,
        P: Injectable,
    {
        self.registry.register_provider::<C, P>(instance, options)
    }

    fn mark_ready<C: ?Sized + 'static>(&self) -> RegistryResult<()> {
        self.registry.mark_ready::<C>()
    }

    fn unregister<C: ?Sized + 'static>(&self) -> bool {
        self.registry.unregister::<C>()
    }

    fn get_ready<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.registry.get_ready::<C>()
    }

    fn try_get_ready<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, RegistrationState> {
        self.registry.try_get_ready::<C>()
    }

    async fn wait_until_ready<C: ?Sized + Send + Sync + 'static>(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Arc<C>, WaitError> {
        self.registry.wait_until_ready::<C>(cancellation).await
    }

    async fn inject_into<T: Injectable>(
        &self,
        target: &mut T,
        options: InjectOptions,
    ) -> InjectionResult<InjectionOutcome> {
        self.injector.inject_into(target, options).await
    }

    fn snapshots(&self) -> Vec<ServiceSnapshot> {
        self.registry.snapshots()
    }

    fn status_line(&self, contract: ContractKey) -> String {
        diagnostics::status_line(contract, self.registry.snapshot(contract).as_ref())
    }

    fn dependency_report(&self) -> String {
        self.registry.graph().report()
    }

    fn unregister_group(&self, group: &GroupId) -> usize {
        self.registry.unregister_group(group)
    }

    fn cleanup_dead(&self) -> usize {
        self.registry.cleanup_dead()
    }

    fn clear_all(&self) {
        self.registry.clear_all();
    }
}
