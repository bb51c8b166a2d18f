//! The timeline data model and its JSON decoding.
//!
//! A timeline file is a JSON document of the form
//! `{"timeline": [{"id", "author", "avatar"?, "date", "content", "inReplyTo"?}, ...]}`.
//! The author handle and avatar URL are denormalized per record in the wire
//! format; decoding folds them into a [`User`] on each [`Tweet`].

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

/// A unique identifier referencing a [`Tweet`].
pub type TweetId = String;

/// A unique identifier referencing a [`User`].
///
/// User identifiers are handles including the leading `@`, as that is how the
/// wire format spells them both in the `author` field and in mentions.
pub type UserId = String;

/// Someone with an account on the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// The user's handle.
    pub id: UserId,
    /// Where to fetch the user's avatar image, if they have one.
    pub avatar_url: Option<Url>,
}

/// A piece of content broadcast by a user.
#[derive(Clone, Debug)]
pub struct Tweet {
    /// A unique identifier referencing this tweet.
    pub id: TweetId,
    /// When the tweet was created.
    pub date: DateTime<Utc>,
    /// Who wrote the tweet.
    pub author: User,
    /// The user-created content.
    pub content: String,
    /// The tweet this one replies to, if any.
    pub in_reply_to: Option<TweetId>,
}

// Tweet identity is its id.
impl PartialEq for Tweet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Tweet {}

impl Hash for Tweet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Errors that can occur while loading a timeline file.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// The timeline file could not be read.
    #[error("failed to read timeline file")]
    Io(#[from] std::io::Error),
    /// The timeline file is not valid timeline JSON.
    #[error("failed to decode timeline")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct TimelineWire {
    timeline: Vec<TweetWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TweetWire {
    id: String,
    author: String,
    #[serde(default)]
    avatar: Option<Url>,
    date: DateTime<Utc>,
    content: String,
    #[serde(default)]
    in_reply_to: Option<String>,
}

/// A decoded timeline, sorted oldest-first.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    tweets: Vec<Tweet>,
}

impl Timeline {
    /// Loads and decodes a timeline from a local JSON file.
    pub fn load(path: &Path) -> Result<Self, TimelineError> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    /// Decodes a timeline from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self, TimelineError> {
        let wire: TimelineWire = serde_json::from_slice(data)?;
        Ok(Self::from_wire(wire))
    }

    fn from_wire(wire: TimelineWire) -> Self {
        let mut tweets: Vec<_> = wire
            .timeline
            .into_iter()
            .map(|tweet| Tweet {
                id: tweet.id,
                date: tweet.date,
                author: User {
                    id: tweet.author,
                    avatar_url: tweet.avatar,
                },
                content: tweet.content,
                in_reply_to: tweet.in_reply_to,
            })
            .collect();

        // The wire format is unordered.
        tweets.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        Timeline { tweets }
    }

    /// The tweets of this timeline, oldest first.
    pub fn tweets(&self) -> &[Tweet] {
        &self.tweets
    }

    /// Looks up a tweet by id.
    pub fn get(&self, id: &str) -> Option<&Tweet> {
        self.tweets.iter().find(|tweet| tweet.id == id)
    }

    /// Resolves the reply chain ending in the given tweet, oldest first.
    ///
    /// Returns an empty chain if the id is unknown. Replies referencing
    /// missing tweets terminate the chain; reference cycles are cut rather
    /// than looped.
    pub fn thread(&self, id: &str) -> Vec<&Tweet> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();

        let mut current = self.get(id);
        while let Some(tweet) = current {
            if !seen.insert(tweet.id.as_str()) {
                break;
            }
            chain.push(tweet);
            current = tweet
                .in_reply_to
                .as_deref()
                .and_then(|parent| self.get(parent));
        }

        chain.reverse();
        chain
    }

    /// The distinct avatar URLs referenced by this timeline.
    pub fn avatar_urls(&self) -> BTreeSet<&Url> {
        self.tweets
            .iter()
            .filter_map(|tweet| tweet.author.avatar_url.as_ref())
            .collect()
    }

    /// The number of tweets in this timeline.
    pub fn len(&self) -> usize {
        self.tweets.len()
    }

    /// Returns `true` if the timeline contains no tweets.
    pub fn is_empty(&self) -> bool {
        self.tweets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMELINE: &str = r#"{
        "timeline": [
            {
                "id": "00042",
                "author": "@olarivain",
                "content": "@randomInternetStranger I think you are wrong about that.",
                "avatar": "https://example.com/avatars/olarivain.png",
                "date": "2020-09-29T14:41:00-08:00",
                "inReplyTo": "00041"
            },
            {
                "id": "00041",
                "author": "@randomInternetStranger",
                "content": "Spherical trigonometry is underrated. https://en.wikipedia.org/wiki/Spherical_trigonometry",
                "date": "2020-09-29T14:30:00-08:00"
            }
        ]
    }"#;

    #[test]
    fn test_decode_and_sort() {
        let timeline = Timeline::from_json(TIMELINE.as_bytes()).unwrap();
        assert_eq!(timeline.len(), 2);

        // Oldest first, regardless of wire order.
        let ids: Vec<_> = timeline.tweets().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["00041", "00042"]);

        let reply = timeline.get("00042").unwrap();
        assert_eq!(reply.author.id, "@olarivain");
        assert_eq!(
            reply.author.avatar_url.as_ref().unwrap().as_str(),
            "https://example.com/avatars/olarivain.png"
        );
        assert_eq!(reply.in_reply_to.as_deref(), Some("00041"));

        let root = timeline.get("00041").unwrap();
        assert_eq!(root.author.avatar_url, None);
        assert_eq!(root.in_reply_to, None);
    }

    #[test]
    fn test_dates_normalize_to_utc() {
        let timeline = Timeline::from_json(TIMELINE.as_bytes()).unwrap();
        let root = timeline.get("00041").unwrap();
        assert_eq!(root.date.to_rfc3339(), "2020-09-29T22:30:00+00:00");
    }

    #[test]
    fn test_thread() {
        let timeline = Timeline::from_json(TIMELINE.as_bytes()).unwrap();

        let thread = timeline.thread("00042");
        let ids: Vec<_> = thread.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["00041", "00042"]);

        assert!(timeline.thread("99999").is_empty());
    }

    #[test]
    fn test_avatar_urls_deduplicated() {
        let timeline = Timeline::from_json(
            r#"{
                "timeline": [
                    {"id": "1", "author": "@a", "avatar": "https://example.com/a.png",
                     "date": "2020-01-01T00:00:00Z", "content": "one"},
                    {"id": "2", "author": "@a", "avatar": "https://example.com/a.png",
                     "date": "2020-01-02T00:00:00Z", "content": "two"}
                ]
            }"#
            .as_bytes(),
        )
        .unwrap();

        assert_eq!(timeline.avatar_urls().len(), 1);
    }

    #[test]
    fn test_malformed_timeline() {
        assert!(matches!(
            Timeline::from_json(b"{\"timeline\": 42}"),
            Err(TimelineError::Decode(_))
        ));
        assert!(matches!(
            Timeline::from_json(
                b"{\"timeline\": [{\"id\": \"1\", \"author\": \"@a\", \"date\": \"yesterday\", \"content\": \"x\"}]}"
            ),
            Err(TimelineError::Decode(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Timeline::load(Path::new("/nonexistent/timeline.json"));
        assert!(matches!(result, Err(TimelineError::Io(_))));
    }
}
