//! Exposes the command line application.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use url::Url;

use chirp_service::avatars::{Avatar, AvatarService};
use chirp_service::config::Config;
use chirp_service::timeline::Timeline;

use crate::logging;
use crate::output;

/// Chirp commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Render the timeline to the terminal.
    Show {
        /// Path to the timeline file, overriding the configuration.
        #[arg(long, value_name = "FILE")]
        timeline: Option<PathBuf>,

        /// Skip downloading avatars.
        #[arg(long)]
        no_avatars: bool,
    },

    /// Check that a timeline file decodes cleanly.
    Validate {
        /// Path to the timeline file, overriding the configuration.
        #[arg(long, value_name = "FILE")]
        timeline: Option<PathBuf>,
    },
}

/// Command line interface parser.
#[derive(Debug, Parser)]
#[command(name = "chirp", version)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config.as_deref()).context("failed loading config")?;

    logging::init_logging(&config);

    match cli.command {
        Command::Show {
            timeline,
            no_avatars,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to create runtime")?;
            runtime.block_on(show(&config, timeline, no_avatars))
        }
        Command::Validate { timeline } => validate(&config, timeline),
    }
}

fn timeline_path(config: &Config, timeline: Option<PathBuf>) -> PathBuf {
    timeline.unwrap_or_else(|| config.timeline.clone())
}

fn load_timeline(config: &Config, timeline: Option<PathBuf>) -> Result<(PathBuf, Timeline)> {
    let path = timeline_path(config, timeline);
    let timeline = Timeline::load(&path)
        .with_context(|| format!("failed loading timeline from {}", path.display()))?;
    Ok((path, timeline))
}

async fn show(config: &Config, timeline: Option<PathBuf>, no_avatars: bool) -> Result<()> {
    let (path, timeline) = load_timeline(config, timeline)?;
    tracing::info!("Loaded {} tweets from {}", timeline.len(), path.display());

    let avatars = if no_avatars {
        BTreeMap::new()
    } else {
        fetch_avatars(config, &timeline).await?
    };

    let mut stdout = std::io::stdout().lock();
    output::render_timeline(&mut stdout, &timeline, &avatars)?;

    Ok(())
}

/// Downloads every distinct avatar the timeline references.
///
/// All downloads go through one [`AvatarService`], so a user appearing many
/// times in the timeline is still fetched once. Failures are logged and the
/// tweet is rendered without an avatar.
async fn fetch_avatars(config: &Config, timeline: &Timeline) -> Result<BTreeMap<Url, Avatar>> {
    let service = AvatarService::new(config)?;

    let fetches = timeline.avatar_urls().into_iter().cloned().map(|url| {
        let service = service.clone();
        async move {
            let result = service.avatar(url.clone()).await;
            (url, result)
        }
    });

    let mut avatars = BTreeMap::new();
    for (url, result) in futures::future::join_all(fetches).await {
        match result {
            Ok(avatar) => {
                avatars.insert(url, avatar);
            }
            Err(error) => tracing::warn!("Failed to fetch avatar from `{url}`: {error}"),
        }
    }

    Ok(avatars)
}

fn validate(config: &Config, timeline: Option<PathBuf>) -> Result<()> {
    let (path, timeline) = load_timeline(config, timeline)?;

    let users: BTreeSet<_> = timeline
        .tweets()
        .iter()
        .map(|tweet| tweet.author.id.as_str())
        .collect();

    let dangling = timeline
        .tweets()
        .iter()
        .filter(|tweet| {
            tweet
                .in_reply_to
                .as_deref()
                .is_some_and(|id| timeline.get(id).is_none())
        })
        .count();

    println!(
        "{}: {} tweets from {} users, {} distinct avatars",
        path.display(),
        timeline.len(),
        users.len(),
        timeline.avatar_urls().len(),
    );

    if dangling > 0 {
        anyhow::bail!("{dangling} replies reference tweets missing from the timeline");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_fixture() {
        let path = chirp_test::fixture("timeline.json");
        validate(&Config::default(), Some(path)).unwrap();
    }

    #[test]
    fn test_validate_rejects_dangling_replies() {
        let dir = chirp_test::tempdir();
        let path = dir.path().join("timeline.json");
        std::fs::write(
            &path,
            r#"{"timeline": [{"id": "2", "author": "@b", "date": "2020-01-01T00:00:00Z",
                "content": "orphaned", "inReplyTo": "missing"}]}"#,
        )
        .unwrap();

        assert!(validate(&Config::default(), Some(path)).is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_file() {
        let dir = chirp_test::tempdir();
        let path = dir.path().join("timeline.json");
        std::fs::write(&path, "{").unwrap();

        assert!(validate(&Config::default(), Some(path)).is_err());
    }
}
