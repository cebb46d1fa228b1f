//! # locator-core
//!
//! Runtime service locator with two-phase registration and asynchronous
//! dependency injection, for hosts that create components in no guaranteed
//! order.
//!
//! ## Overview
//!
//! This crate provides:
//! - **Two-phase registry**: providers are *registered* while initializing
//!   and *ready* once safe to consume
//! - **Dependency graph**: cycles are detected at registration and at the
//!   start of every injection call
//! - **Injection orchestrator**: concurrent field resolution, all-or-nothing
//!   application, configurable error surfacing
//! - **Coalesced timeouts**: one shared list scanned per host tick
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────── ServiceLocator ───────────────────────┐
//!                 │                                                               │
//! register ──────→│  ServiceRegistry ──edges──→ DependencyGraph                   │
//! mark_ready ────→│    │  entries + waiters        │  resolving handles          │
//!                 │    │                           │  circular-error marks       │
//!                 │    ↓ wait_until_ready          ↓ cancel on cycle             │
//! inject_into ───→│  Injector ──register token──→ TimeoutScheduler ←── tick ──────┼── host loop
//!                 │                                                               │
//!                 └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Registration state machine
//!
//! ```text
//! [UNREGISTERED] ──register──→ [REGISTERED] ──mark_ready──→ [READY]
//!       ↑                                                      │
//!       └─────────────────────── unregister ───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use locator_core::{
//!     FieldSet, Injectable, InjectionField, InjectOptions, LocatorConfig, RegisterOptions,
//!     ResolvedDependencies, ServiceLocator, ServiceLocatorApi,
//! };
//!
//! trait Audio: Send + Sync {}
//!
//! #[derive(Default)]
//! struct Player {
//!     audio: Option<Arc<dyn Audio>>,
//! }
//!
//! impl Injectable for Player {
//!     fn injection_fields() -> Vec<InjectionField> {
//!         FieldSet::new().required::<dyn Audio>("audio").build()
//!     }
//!
//!     fn apply(&mut self, resolved: &mut ResolvedDependencies) {
//!         self.audio = resolved.take::<dyn Audio>("audio");
//!     }
//! }
//!
//! let locator = ServiceLocator::new(LocatorConfig::from_env())?;
//! locator.start_ticker();
//!
//! locator.register::<dyn Audio>(mixer, RegisterOptions::new())?;
//! locator.mark_ready::<dyn Audio>()?;
//!
//! let mut player = Player::default();
//! locator.inject_into(&mut player, InjectOptions::new()).await?;
//! ```

pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod injection;
pub mod metrics;
pub mod ports;
pub mod registry;
pub mod service;

pub use config::{ErrorHandler, ErrorMode, LocatorConfig};
pub use diagnostics::ServiceSnapshot;
pub use domain::{
    CircularityRecord, ContractKey, DependencyEdge, DependencyGraph, FieldSet, GroupId,
    Injectable, InjectionField, RegistrationState, ResolvedDependencies, ServiceInstance,
    TickSummary, TimeoutRegistration, TimeoutScheduler,
};
pub use error::{
    ConfigError, InjectionError, InjectionResult, OutstandingDependency, OutstandingStatus,
    RegistryError, RegistryResult, WaitError,
};
pub use injection::{InjectOptions, InjectionOutcome, InjectionReport, Injector};
pub use ports::ServiceLocatorApi;
pub use registry::{RegisterOptions, ServiceRegistry};
pub use service::ServiceLocator;
