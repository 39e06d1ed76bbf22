//! tagcache: administrative CLI for TagCache namespaces.

mod args;
mod commands;
mod error;
mod telemetry;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tagcache_core::TagCacheConfig;
use tagcache_storage::{Cache, PostgresAdapter, RedisAdapter, StorageAdapter};

use args::{Backend, Cli, Command};
use commands::Outcome;
use error::CliError;

fn load_config(cli: &Cli) -> Result<TagCacheConfig, CliError> {
    let mut config = TagCacheConfig::load(cli.config.as_deref())?;
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    Ok(config)
}

async fn connect(
    backend: Backend,
    config: &TagCacheConfig,
) -> Result<Arc<dyn StorageAdapter>, CliError> {
    Ok(match backend {
        Backend::Postgres => Arc::new(PostgresAdapter::from_config(
            &config.relational,
            &config.namespace,
        )?),
        Backend::Redis => Arc::new(RedisAdapter::connect(&config.kv, &config.namespace).await?),
    })
}

async fn init_schema(backend: Backend, config: &TagCacheConfig) -> Result<(), CliError> {
    match backend {
        Backend::Postgres => {
            PostgresAdapter::from_config(&config.relational, &config.namespace)?
                .ensure_schema()
                .await?;
        }
        Backend::Redis => {
            tracing::info!("redis keeps no schema; nothing to initialize");
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<Outcome, CliError> {
    let config = load_config(&cli)?;

    if cli.command == Command::InitSchema {
        init_schema(cli.backend, &config).await?;
        return Ok(Outcome::Done);
    }

    let adapter = connect(cli.backend, &config).await?;
    let cache = Cache::open(adapter, config.cache.clone()).await?;

    let mut stdout = std::io::stdout();
    let outcome = commands::execute(&cache, cli.command, &mut stdout).await?;
    stdout.flush()?;
    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = telemetry::init_tracing() {
        eprintln!("{e}");
    }

    match run(cli).await {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Missing) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
