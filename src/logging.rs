//! Logging and tracing setup.
//!
//! All logs are written to **stderr** so stdout stays free for the host
//! protocol. Filtering follows `RUST_LOG`.
//!
//! ```bash
//! # Trace every remote call made by the App Runner resources
//! RUST_LOG=hemmer_provider_aws::resources=debug ./hemmer-provider-aws
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Initialize the default logging subscriber at `info` level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level, used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}

/// Route logs through the test harness's captured output.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn try_init_test_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter("debug"))
        .with(fmt::layer().with_test_writer().with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_aws=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_aws::resources=trace").is_ok());
    }

    #[test]
    fn test_test_logging_is_idempotent() {
        try_init_test_logging();
        assert!(!try_init_test_logging());
    }
}
