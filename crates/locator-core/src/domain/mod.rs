//! Domain module for the service locator
//!
//! ## Core Modules
//! - contract: Contract identity and type-erased provider handles
//! - entry: Registry entries and the two-phase state machine
//! - descriptor: Injection field descriptors
//! - graph: Dependency edges and cycle detection
//! - timeout: Coalesced, tick-driven timeouts

pub mod contract;
pub mod descriptor;
pub mod entry;
pub mod graph;
pub mod timeout;

pub use contract::{ContractKey, GroupId, ServiceInstance};
pub use descriptor::{FieldSet, Injectable, InjectionField, ResolvedDependencies};
pub use entry::{RegistrationState, ServiceEntry};
pub use graph::{CircularityRecord, DependencyEdge, DependencyGraph, DependencyNode};
pub use timeout::{next_step, spawn_ticker, TickSummary, TimeoutRegistration, TimeoutScheduler};
