//! # Locator Configuration
//!
//! Defaults for injection calls and the timeout ticker.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SL_DEFAULT_TIMEOUT_MS` | `30000` | Injection timeout; `0` disables it |
//! | `SL_TICK_INTERVAL_MS` | `16` | Timeout scan period for the built-in ticker |
//! | `SL_ERROR_MODE` | `rethrow` | `rethrow`, `warn`, `log` or `silent` |
//! | `SL_WARN_ON_OVERWRITE` | `true` | Warn when a registered provider is replaced |

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::{ConfigError, InjectionError, InjectionResult};
use crate::injection::InjectionOutcome;

/// Callback invoked for every terminal injection failure.
pub type ErrorHandler = Arc<dyn Fn(&InjectionError) + Send + Sync>;

/// How a terminal injection failure is surfaced. Never changes what was
/// or was not injected.
#[derive(Clone, Default)]
pub enum ErrorMode {
    /// Return the error to the caller.
    #[default]
    Rethrow,
    /// Log at `warn` and report the call as suppressed.
    Warn,
    /// Log at `error` and report the call as suppressed.
    Log,
    /// Report the call as suppressed without logging.
    Silent,
    /// Hand the error to a callback and report the call as suppressed.
    Custom(ErrorHandler),
}

impl ErrorMode {
    /// Wrap a callback.
    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(&InjectionError) + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(handler))
    }

    /// Route `error` through this mode.
    pub fn surface(&self, error: InjectionError) -> InjectionResult<InjectionOutcome> {
        match self {
            Self::Rethrow => return Err(error),
            Self::Warn => warn!(target_type = error.target(), kind = error.kind(), %error, "Injection failed"),
            Self::Log => error!(target_type = error.target(), kind = error.kind(), %error, "Injection failed"),
            Self::Silent => {}
            Self::Custom(handler) => handler(&error),
        }
        Ok(InjectionOutcome::Suppressed(error))
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rethrow => "rethrow",
            Self::Warn => "warn",
            Self::Log => "log",
            Self::Silent => "silent",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorMode::{}", self.as_str())
    }
}

impl FromStr for ErrorMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "rethrow" | "throw" => Ok(Self::Rethrow),
            "warn" | "warnandswallow" => Ok(Self::Warn),
            "log" | "logandswallow" => Ok(Self::Log),
            "silent" => Ok(Self::Silent),
            _ => Err(ConfigError::UnknownErrorMode {
                value: value.to_string(),
            }),
        }
    }
}

/// Locator-wide defaults.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Timeout applied when a call does not set one. `None` waits forever.
    pub default_timeout: Option<Duration>,
    /// Error mode applied when a call does not set one.
    pub error_mode: ErrorMode,
    /// Period of the built-in timeout ticker.
    pub tick_interval: Duration,
    /// Warn when `register` overwrites a registered (not ready) provider.
    pub warn_on_overwrite: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Some(Duration::from_secs(30)),
            error_mode: ErrorMode::Rethrow,
            tick_interval: Duration::from_millis(16),
            warn_on_overwrite: true,
        }
    }
}

impl LocatorConfig {
    /// Read overrides from `SL_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_timeout = match env::var("SL_DEFAULT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.default_timeout,
        };

        Self {
            default_timeout,
            error_mode: env::var("SL_ERROR_MODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.error_mode),
            tick_interval: env::var("SL_TICK_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(defaults.tick_interval, Duration::from_millis),
            warn_on_overwrite: env::var("SL_WARN_ON_OVERWRITE")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.warn_on_overwrite),
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.default_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Builder: set the default timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Builder: set the default error mode.
    #[must_use]
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Builder: set the ticker period.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}
