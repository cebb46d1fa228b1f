//! # Locator Telemetry
//!
//! Structured logging for hosts embedding the service locator.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use locator_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_logging(&config).expect("Failed to init logging");
//!
//!     // Locator spans and events are now emitted
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SL_SERVICE_NAME` | `service-locator` | Service name attached to log lines |
//! | `SL_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `SL_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `SL_JSON_LOGS` | `false` (`true` in containers) | JSON instead of pretty output |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};

use thiserror::Error;

#[doc(hidden)]
pub use tracing;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to install global subscriber: {0}")]
    SubscriberInit(String),
}

/// Helper to create structured log entries with a consistent `component`
/// field.
///
/// # Example
///
/// ```rust,ignore
/// use locator_telemetry::log_event;
///
/// log_event!(info, "scene-loader", "Level services ready", count = 12);
/// ```
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::info!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::warn!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::error!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::debug!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Span tagged with a component name.
#[macro_export]
macro_rules! component_span {
    ($name:expr, $($field:tt)*) => {
        $crate::tracing::info_span!($name, $($field)*)
    };
}
