//! Turns raw feed items into storable entries.
//!
//! For each item this derives the canonical link, the identity hash used as
//! the dedup key, the canonical creation timestamp and the site label, and
//! runs the body through the sanitizer.

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use thiserror::Error;

use super::dates::format_canonical;
use super::parser::{RawChannel, RawItem, RawLink};
use crate::content::sanitize_html;
use crate::storage::NewEntry;

/// Why an item was not turned into an entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// No usable link and the guid is not a URL either
    #[error("item has no usable link")]
    NoLink,
}

/// Picks the canonical link of an item.
///
/// In order: the first link with a non-empty href whose media type is
/// `text/html` or whose relation is `alternate`; the only link when there
/// is exactly one; the guid when it is an absolute http(s) URL.
pub fn select_link(links: &[RawLink], guid: &str) -> Option<String> {
    let preferred = links.iter().find(|link| {
        !link.href.trim().is_empty()
            && (link
                .media_type
                .as_deref()
                .is_some_and(|t| essence(t).eq_ignore_ascii_case("text/html"))
                || link
                    .rel
                    .as_deref()
                    .is_some_and(|r| r.eq_ignore_ascii_case("alternate")))
    });
    if let Some(link) = preferred {
        return Some(link.href.trim().to_owned());
    }

    if let [only] = links {
        if !only.href.trim().is_empty() {
            return Some(only.href.trim().to_owned());
        }
    }

    guid_as_link(guid)
}

/// Media type without parameters (`text/html; charset=utf-8` -> `text/html`)
fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or_default().trim()
}

fn guid_as_link(guid: &str) -> Option<String> {
    let url = url::Url::parse(guid.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| guid.trim().to_owned())
}

/// SHA-1 of the guid (or the link when the guid is empty), uppercase hex.
///
/// Used as the entry id and dedup key only.
pub fn identity_hash(guid: &str, link: &str) -> String {
    let source = if guid.is_empty() { link } else { guid };
    hex::encode_upper(Sha1::digest(source.as_bytes()))
}

/// Channel title, or the description when the title is empty
pub fn site_label(channel: &RawChannel) -> String {
    if channel.title.trim().is_empty() {
        channel.description.clone()
    } else {
        channel.title.clone()
    }
}

/// Normalizes one item of `channel` into an entry.
///
/// `now` is used as the creation timestamp when the item carries no date
/// the layout list understands.
pub fn normalize_item(
    channel: &RawChannel,
    item: &RawItem,
    now: DateTime<Utc>,
) -> Result<NewEntry, SkipReason> {
    let url = select_link(&item.links, &item.guid).ok_or(SkipReason::NoLink)?;
    let id = identity_hash(&item.guid, &url);

    let created = match item.published {
        Some(instant) => format_canonical(instant),
        None => {
            tracing::debug!(entry = %id, "No parseable date, using current time");
            format_canonical(now)
        }
    };

    let body = item
        .content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .or(item.description.as_deref())
        .unwrap_or_default();

    Ok(NewEntry {
        id,
        url,
        site: site_label(channel),
        title: item.title.clone(),
        content: sanitize_html(body),
        created,
    })
}
