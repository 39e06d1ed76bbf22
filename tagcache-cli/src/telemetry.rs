//! Tracing subscriber for the CLI.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::CliError;

const DEFAULT_FILTER: &str = "tagcache=info,warn";

/// Whether `TAGCACHE_LOG_JSON` asks for JSON lines.
fn json_requested() -> bool {
    std::env::var("TAGCACHE_LOG_JSON")
        .map(|s| s == "true" || s == "1")
        .unwrap_or(false)
}

/// Install the global subscriber. Logs go to stderr so payloads written to
/// stdout stay clean.
pub fn init_tracing() -> Result<(), CliError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json_requested() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| CliError::Telemetry(e.to_string()))
}
