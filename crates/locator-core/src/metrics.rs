//! # Locator Metrics
//!
//! Prometheus counters for registry and injection activity.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! locator-core = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `locator_registrations_total` - Counter of stored registrations
//! - `locator_injections_total` - Counter of injection calls (by outcome)
//! - `locator_timeouts_total` - Counter of injection calls that timed out
//! - `locator_cycles_detected_total` - Counter of detected dependency cycles

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total registrations stored
    pub static ref REGISTRATIONS: IntCounter = register_int_counter!(
        "locator_registrations_total",
        "Total number of provider registrations stored"
    )
    .expect("Failed to create REGISTRATIONS metric");

    /// Total injection calls, labeled by outcome
    pub static ref INJECTIONS: IntCounterVec = register_int_counter_vec!(
        "locator_injections_total",
        "Total number of injection calls",
        &["outcome"]
    )
    .expect("Failed to create INJECTIONS metric");

    /// Total injection calls that timed out
    pub static ref TIMEOUTS: IntCounter = register_int_counter!(
        "locator_timeouts_total",
        "Total number of injection calls that timed out"
    )
    .expect("Failed to create TIMEOUTS metric");

    /// Total dependency cycles detected
    pub static ref CYCLES_DETECTED: IntCounter = register_int_counter!(
        "locator_cycles_detected_total",
        "Total number of dependency cycles detected"
    )
    .expect("Failed to create CYCLES_DETECTED metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a stored registration
#[cfg(feature = "metrics")]
pub fn record_registration() {
    REGISTRATIONS.inc();
}

/// Record a finished injection call with its outcome label
#[cfg(feature = "metrics")]
pub fn record_injection(outcome: &str) {
    INJECTIONS.with_label_values(&[outcome]).inc();
    if outcome == "timeout" {
        TIMEOUTS.inc();
    }
}

/// Record a detected cycle
#[cfg(feature = "metrics")]
pub fn record_cycle() {
    CYCLES_DETECTED.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_registration() {}

#[cfg(not(feature = "metrics"))]
pub fn record_injection(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_cycle() {}
