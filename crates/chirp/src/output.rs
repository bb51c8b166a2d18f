//! Terminal rendering of a timeline.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, Utc};
use console::style;
use url::Url;

use chirp_service::avatars::Avatar;
use chirp_service::entities::{entities, EntityKind};
use chirp_service::timeline::{Timeline, Tweet};

/// Renders the whole timeline, oldest tweet first.
pub fn render_timeline(
    out: &mut impl Write,
    timeline: &Timeline,
    avatars: &BTreeMap<Url, Avatar>,
) -> io::Result<()> {
    for tweet in timeline.tweets() {
        render_tweet(out, timeline, tweet, avatars)?;
        writeln!(out)?;
    }
    Ok(())
}

fn render_tweet(
    out: &mut impl Write,
    timeline: &Timeline,
    tweet: &Tweet,
    avatars: &BTreeMap<Url, Avatar>,
) -> io::Result<()> {
    write!(
        out,
        "{} {}",
        style(&tweet.author.id).bold(),
        style(format_age(tweet.date)).dim(),
    )?;
    if let Some(avatar) = tweet
        .author
        .avatar_url
        .as_ref()
        .and_then(|url| avatars.get(url))
    {
        write!(
            out,
            " {}",
            style(format!(
                "[{} avatar, {} bytes]",
                avatar.format,
                avatar.data.len()
            ))
            .dim(),
        )?;
    }
    writeln!(out)?;

    if let Some(parent_id) = tweet.in_reply_to.as_deref() {
        let parent = match timeline.get(parent_id) {
            Some(parent) => parent.author.id.clone(),
            None => format!("a missing tweet ({parent_id})"),
        };
        writeln!(out, "  {}", style(format!("in reply to {parent}")).dim())?;
    }

    writeln!(out, "  {}", render_content(&tweet.content))
}

/// Styles the mentions and links within tweet content.
fn render_content(content: &str) -> String {
    let mut rendered = String::new();
    let mut cursor = 0;

    for entity in entities(content) {
        rendered.push_str(&content[cursor..entity.range.start]);
        let text = &content[entity.range.clone()];
        match entity.kind {
            EntityKind::Mention(_) => rendered.push_str(&style(text).cyan().to_string()),
            EntityKind::Link(_) => {
                rendered.push_str(&style(text).blue().underlined().to_string())
            }
        }
        cursor = entity.range.end;
    }
    rendered.push_str(&content[cursor..]);

    rendered
}

fn format_age(date: DateTime<Utc>) -> String {
    match (Utc::now() - date).to_std() {
        Ok(age) if age < Duration::from_secs(60) => "just now".to_owned(),
        Ok(age) => {
            // Sub-minute precision is noise in a timeline.
            let rounded = Duration::from_secs(age.as_secs() / 60 * 60);
            format!("{} ago", humantime::format_duration(rounded))
        }
        Err(_) => "in the future".to_owned(),
    }
}
