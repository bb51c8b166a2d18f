//! Extraction of mentions and links from tweet content.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::timeline::UserId;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z0-9_]+").unwrap());

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// A piece of tweet content with special meaning, located by byte range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    /// The byte range of the entity within the content.
    pub range: Range<usize>,
    /// What the entity is.
    pub kind: EntityKind,
}

/// The kinds of entities recognized in tweet content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityKind {
    /// A `@handle` user mention. The handle includes the leading `@`.
    Mention(UserId),
    /// A link.
    Link(Url),
}

/// Extracts the mentions and links from `text`, ordered by position.
///
/// Mentions overlapping a link (such as userinfo in a URL) are not reported
/// separately. Trailing sentence punctuation is not considered part of a link.
pub fn entities(text: &str) -> Vec<Entity> {
    let mut found = Vec::new();

    for m in URL_RE.find_iter(text) {
        let trimmed = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
        if let Ok(url) = Url::parse(trimmed) {
            found.push(Entity {
                range: m.start()..m.start() + trimmed.len(),
                kind: EntityKind::Link(url),
            });
        }
    }

    for m in MENTION_RE.find_iter(text) {
        let inside_link = found
            .iter()
            .any(|entity| m.start() < entity.range.end && entity.range.start < m.end());
        if !inside_link {
            found.push(Entity {
                range: m.range(),
                kind: EntityKind::Mention(m.as_str().to_owned()),
            });
        }
    }

    found.sort_by_key(|entity| entity.range.start);
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentions() {
        let found = entities("@olarivain I think @randomInternetStranger is wrong");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].range, 0..10);
        assert_eq!(
            found[0].kind,
            EntityKind::Mention("@olarivain".to_owned())
        );
        assert_eq!(
            found[1].kind,
            EntityKind::Mention("@randomInternetStranger".to_owned())
        );
    }

    #[test]
    fn test_links() {
        let found = entities("see https://en.wikipedia.org/wiki/Spherical_trigonometry.");
        assert_eq!(found.len(), 1);
        let EntityKind::Link(url) = &found[0].kind else {
            panic!("expected a link");
        };
        // The sentence-ending period is not part of the link.
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/wiki/Spherical_trigonometry"
        );
        assert_eq!(&"see https://en.wikipedia.org/wiki/Spherical_trigonometry."
            [found[0].range.clone()],
            "https://en.wikipedia.org/wiki/Spherical_trigonometry");
    }

    #[test]
    fn test_mention_inside_link_not_reported() {
        let found = entities("http://example.com/@not_a_mention");
        assert_eq!(found.len(), 1);
        assert!(matches!(found[0].kind, EntityKind::Link(_)));
    }

    #[test]
    fn test_ordering_and_plain_text() {
        assert!(entities("no entities here").is_empty());

        let found = entities("@a said http://x.io then @b replied");
        let kinds: Vec<_> = found
            .iter()
            .map(|entity| match &entity.kind {
                EntityKind::Mention(_) => "mention",
                EntityKind::Link(_) => "link",
            })
            .collect();
        assert_eq!(kinds, ["mention", "link", "mention"]);
    }
}
