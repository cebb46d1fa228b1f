//! Cross-module integration tests.

pub mod lifecycle;
pub mod properties;
pub mod scenarios;
