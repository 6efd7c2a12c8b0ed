//! Logging initialization module

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output at debug level
    Development,
    /// JSON structured output at info level
    Production,
    /// Bare registry; tests install capture via `init_test_capture()`
    Test,
}

impl Profile {
    fn default_directive(&self) -> &'static str {
        match self {
            Profile::Development => "yuow=debug,yuow_core=debug,yuow_store=debug",
            Profile::Production | Profile::Test => "yuow=info,yuow_core=info,yuow_store=info",
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

static INIT_ONCE: Once = Once::new();

/// Initialize the logging facility
///
/// Sets up the process-wide tracing subscriber for the selected profile.
/// Subsequent calls are no-ops. `RUST_LOG` overrides the default filter.
///
/// # Example
///
/// ```
/// use yuow_core::logging_facility::{init, Profile};
///
/// init(Profile::Production);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| match profile {
        Profile::Development => {
            // try_init: another subscriber may already be global in embedding apps
            let _ = tracing_subscriber::fmt()
                .with_env_filter(profile.filter())
                .try_init();
        }
        Profile::Production => {
            let _ = tracing_subscriber::fmt()
                .json()
                .with_env_filter(profile.filter())
                .try_init();
        }
        Profile::Test => {
            let _ = tracing_subscriber::registry().try_init();
        }
    });
}
