use tagcache_core::{CacheError, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),
}
