//! Command-line surface for `tagcache`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "tagcache", version, about = "Operate a TagCache namespace", long_about = None)]
pub struct Cli {
    /// TOML configuration file (falls back to TAGCACHE_* environment variables)
    #[arg(long, env = "TAGCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage backend holding the namespace
    #[arg(long, value_enum, env = "TAGCACHE_BACKEND", default_value_t = Backend::Redis)]
    pub backend: Backend,

    /// Namespace to operate on (overrides the configured one)
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Redis,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Write an entry's payload to stdout
    Get { identifier: String },
    /// Store an entry
    Set {
        identifier: String,
        /// Payload given inline
        #[arg(conflicts_with = "file")]
        value: Option<String>,
        /// Read the payload from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Tag to attach (repeatable)
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
        /// Lifetime in seconds; 0 never expires, omitted uses the default
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Exit status tells whether a live entry exists
    Has { identifier: String },
    /// Remove an entry
    Remove { identifier: String },
    /// Remove every entry in the namespace
    Flush,
    /// Remove every entry carrying a tag
    FlushTag { tag: String },
    /// List identifiers carrying a tag
    Tags { tag: String },
    /// List every live entry with its payload size
    List,
    /// Freeze the namespace
    Freeze,
    /// Show namespace state
    Status,
    /// Collect expired entries and dangling tag references
    Gc,
    /// Discard everything, including the freeze
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
    /// Create the relational tables if missing
    InitSchema,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_with_tags() {
        let cli = Cli::try_parse_from([
            "tagcache", "--backend", "postgres", "-n", "pages", "set", "home", "<html>", "-t",
            "layout", "--tag", "nav", "--ttl", "60",
        ])
        .unwrap();
        assert_eq!(cli.backend, Backend::Postgres);
        assert_eq!(cli.namespace.as_deref(), Some("pages"));
        assert_eq!(
            cli.command,
            Command::Set {
                identifier: "home".into(),
                value: Some("<html>".into()),
                file: None,
                tags: vec!["layout".into(), "nav".into()],
                ttl: Some(60),
            }
        );
    }

    #[test]
    fn test_value_conflicts_with_file() {
        let result = Cli::try_parse_from(["tagcache", "set", "a", "inline", "--file", "payload.bin"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_subcommand_names() {
        let cli = Cli::try_parse_from(["tagcache", "flush-tag", "nav"]).unwrap();
        assert_eq!(cli.command, Command::FlushTag { tag: "nav".into() });
        let cli = Cli::try_parse_from(["tagcache", "init-schema"]).unwrap();
        assert_eq!(cli.command, Command::InitSchema);
    }
}
