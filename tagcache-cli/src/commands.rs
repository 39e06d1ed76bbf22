//! Command handlers. Each runs against an open [`Cache`] and writes its
//! report to `out`.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::TryStreamExt;
use tagcache_storage::Cache;

use crate::args::Command;
use crate::error::CliError;

/// How a command finished, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The requested entry does not exist.
    Missing,
}

fn read_payload(value: Option<String>, file: Option<PathBuf>) -> Result<Vec<u8>, CliError> {
    if let Some(path) = file {
        std::fs::read(&path).map_err(|source| CliError::InputFile {
            path: path.display().to_string(),
            source,
        })
    } else if let Some(value) = value {
        Ok(value.into_bytes())
    } else {
        Err(CliError::InvalidInput("a value or --file is required".into()))
    }
}

pub async fn execute<W: Write>(
    cache: &Cache,
    command: Command,
    out: &mut W,
) -> Result<Outcome, CliError> {
    match command {
        Command::Get { identifier } => match cache.get(&identifier).await? {
            Some(payload) => {
                out.write_all(&payload)?;
                Ok(Outcome::Done)
            }
            None => Ok(Outcome::Missing),
        },
        Command::Set {
            identifier,
            value,
            file,
            tags,
            ttl,
        } => {
            let payload = read_payload(value, file)?;
            cache
                .set(&identifier, &payload, &tags, ttl.map(Duration::from_secs))
                .await?;
            Ok(Outcome::Done)
        }
        Command::Has { identifier } => Ok(if cache.has(&identifier).await? {
            Outcome::Done
        } else {
            Outcome::Missing
        }),
        Command::Remove { identifier } => {
            cache.remove(&identifier).await?;
            Ok(Outcome::Done)
        }
        Command::Flush => {
            cache.flush().await?;
            Ok(Outcome::Done)
        }
        Command::FlushTag { tag } => {
            let removed = cache.flush_by_tag(&tag).await?;
            writeln!(out, "removed {removed}")?;
            Ok(Outcome::Done)
        }
        Command::Tags { tag } => {
            for identifier in cache.find_identifiers_by_tag(&tag).await? {
                writeln!(out, "{identifier}")?;
            }
            Ok(Outcome::Done)
        }
        Command::List => {
            let mut entries = cache.iterate();
            while let Some((identifier, payload)) = entries.try_next().await? {
                writeln!(out, "{identifier}\t{}", payload.len())?;
            }
            Ok(Outcome::Done)
        }
        Command::Freeze => {
            cache.freeze().await?;
            Ok(Outcome::Done)
        }
        Command::Status => {
            let frozen = cache.refresh_frozen_state().await?;
            let live = cache.iterate().try_fold(0u64, |n, _| async move { Ok(n + 1) }).await?;
            writeln!(out, "namespace: {}", cache.namespace())?;
            writeln!(out, "backend:   {}", cache.backend_name())?;
            writeln!(out, "frozen:    {frozen}")?;
            writeln!(out, "entries:   {live}")?;
            Ok(Outcome::Done)
        }
        Command::Gc => {
            let report = cache.collect_garbage().await?;
            writeln!(out, "expired entries removed: {}", report.expired_entries)?;
            writeln!(
                out,
                "dangling tag references removed: {}",
                report.dangling_tag_references
            )?;
            Ok(Outcome::Done)
        }
        Command::Purge { yes } => {
            if !yes {
                return Err(CliError::InvalidInput(
                    "purge discards every entry and the freeze; pass --yes to confirm".into(),
                ));
            }
            cache.purge().await?;
            Ok(Outcome::Done)
        }
        // Needs the concrete adapter; main runs it before the cache opens.
        Command::InitSchema => Ok(Outcome::Done),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tagcache_core::{CacheOptions, ErrorKind};
    use tagcache_storage::MemoryAdapter;

    async fn cache() -> Cache {
        Cache::open(Arc::new(MemoryAdapter::new("cli")), CacheOptions::default())
            .await
            .unwrap()
    }

    async fn run(cache: &Cache, command: Command) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = execute(cache, command, &mut out).await.unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    fn set(identifier: &str, value: &str, tags: &[&str]) -> Command {
        Command::Set {
            identifier: identifier.to_string(),
            value: Some(value.to_string()),
            file: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ttl: None,
        }
    }

    #[tokio::test]
    async fn test_set_then_get_writes_raw_payload() {
        let cache = cache().await;
        run(&cache, set("home", "<html>", &["layout"])).await;

        let (outcome, out) = run(&cache, Command::Get { identifier: "home".into() }).await;
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(out, "<html>");

        let (outcome, out) = run(&cache, Command::Get { identifier: "away".into() }).await;
        assert_eq!(outcome, Outcome::Missing);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_set_reads_file() {
        let cache = cache().await;
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"\x00\x01binary").unwrap();

        let command = Command::Set {
            identifier: "blob".into(),
            value: None,
            file: Some(file.path().to_path_buf()),
            tags: vec![],
            ttl: Some(0),
        };
        run(&cache, command).await;
        assert_eq!(cache.get("blob").await.unwrap(), Some(b"\x00\x01binary".to_vec()));
    }

    #[tokio::test]
    async fn test_set_requires_payload() {
        let cache = cache().await;
        let command = Command::Set {
            identifier: "a".into(),
            value: None,
            file: None,
            tags: vec![],
            ttl: None,
        };
        let err = execute(&cache, command, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, CliError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_tag_listing_and_flush() {
        let cache = cache().await;
        run(&cache, set("a", "1", &["x", "y"])).await;
        run(&cache, set("b", "2", &["y"])).await;

        let (_, out) = run(&cache, Command::Tags { tag: "y".into() }).await;
        assert_eq!(out, "a\nb\n");

        let (_, out) = run(&cache, Command::FlushTag { tag: "x".into() }).await;
        assert_eq!(out, "removed 1\n");

        let (_, out) = run(&cache, Command::List).await;
        assert_eq!(out, "b\t1\n");
    }

    #[tokio::test]
    async fn test_frozen_namespace_rejects_set() {
        let cache = cache().await;
        run(&cache, set("a", "1", &[])).await;
        run(&cache, Command::Freeze).await;

        let (_, out) = run(&cache, Command::Status).await;
        assert!(out.contains("frozen:    true"));
        assert!(out.contains("entries:   1"));

        let err = execute(&cache, set("b", "2", &[]), &mut Vec::new())
            .await
            .unwrap_err();
        match err {
            CliError::Cache(e) => assert_eq!(e.kind(), ErrorKind::Frozen),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_purge_needs_confirmation() {
        let cache = cache().await;
        run(&cache, set("a", "1", &[])).await;
        run(&cache, Command::Freeze).await;

        let err = execute(&cache, Command::Purge { yes: false }, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::InvalidInput(_)));
        assert!(cache.is_frozen());

        run(&cache, Command::Purge { yes: true }).await;
        assert!(!cache.is_frozen());
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_gc_report() {
        let cache = cache().await;
        let (_, out) = run(&cache, Command::Gc).await;
        assert_eq!(
            out,
            "expired entries removed: 0\ndangling tag references removed: 0\n"
        );
    }
}
