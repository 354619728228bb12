use chrono::{DateTime, Utc};
use feed_rs::parser::{self, ParseFeedError};

use super::dates::parse_timestamp;

/// Channel-level metadata of a fetched feed.
#[derive(Debug, Clone, Default)]
pub struct RawChannel {
    pub title: String,
    pub description: String,
}

/// One link attached to a feed item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLink {
    pub href: String,
    /// MIME type (`type` attribute), e.g. `text/html`
    pub media_type: Option<String>,
    /// Link relation (`rel` attribute), e.g. `alternate`
    pub rel: Option<String>,
}

/// A feed item as delivered by the feed parser, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
    pub guid: String,
    pub title: String,
    pub links: Vec<RawLink>,
    /// Published timestamp, falling back to the updated timestamp. `None`
    /// when absent or when no entry of the layout list matched.
    pub published: Option<DateTime<Utc>>,
    /// Rich content body (`content:encoded`, Atom `<content>`)
    pub content: Option<String>,
    /// Plain description (`<description>`, Atom `<summary>`)
    pub description: Option<String>,
}

/// A parsed feed: the channel and all of its items, in document order.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub channel: RawChannel,
    pub items: Vec<RawItem>,
}

/// Parses RSS/Atom bytes (already UTF-8) into raw channel and item records.
///
/// Dates are parsed by [`parse_timestamp`], installed as the feed-rs
/// timestamp parser. Items without a guid keep an empty one; feed-rs would
/// otherwise invent an id from the link and title.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseFeedError> {
    let parser = parser::Builder::new()
        .timestamp_parser(parse_timestamp)
        .id_generator(|_links, _title, _uri| String::new())
        .build();
    let feed = parser.parse(bytes)?;

    let channel = RawChannel {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        description: feed.description.map(|t| t.content).unwrap_or_default(),
    };

    let items = feed
        .entries
        .into_iter()
        .map(|entry| RawItem {
            guid: entry.id,
            title: entry.title.map(|t| t.content).unwrap_or_default(),
            links: entry
                .links
                .into_iter()
                .map(|link| RawLink {
                    href: link.href,
                    media_type: link.media_type,
                    rel: link.rel,
                })
                .collect(),
            published: entry.published.or(entry.updated),
            content: entry.content.and_then(|c| c.body),
            description: entry.summary.map(|s| s.content),
        })
        .collect();

    Ok(ParsedFeed { channel, items })
}
