//! # Service Locator Test Suite
//!
//! Unified test crate for cross-module behavior and benchmarks.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Shared contracts, providers and injection targets
//! │
//! └── integration/      # Cross-module behavior
//!     ├── properties.rs # Ordering, atomicity, cycle and timeout guarantees
//!     ├── scenarios.rs  # End-to-end register → ready → inject flows
//!     └── lifecycle.rs  # Groups, dead providers, teardown, diagnostics
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p locator-tests
//!
//! # By category
//! cargo test -p locator-tests integration::properties::
//! cargo test -p locator-tests integration::scenarios::
//!
//! # Benchmarks
//! cargo bench -p locator-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
