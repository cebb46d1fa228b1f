//! Ports module for the service locator

pub mod inbound;

pub use inbound::ServiceLocatorApi;
