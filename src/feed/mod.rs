//! Feed ingestion: fetching, parsing, normalization and subscription import.
//!
//! - [`fetcher`] - HTTP retrieval with a charset-decoding hook
//! - [`parser`] - RSS/Atom parsing via `feed-rs` into raw channel/item records
//! - [`dates`] - the timestamp layout table and canonical formatting
//! - [`normalize`] - link selection, identity hashing and entry construction
//! - [`opml`] - OPML outline parsing and subscription import
//!
//! # Example
//!
//! ```ignore
//! use feedcrawler::feed::{normalize_item, FeedFetcher};
//!
//! let parsed = FeedFetcher::new(client).fetch(&feed.url).await?;
//! for item in &parsed.items {
//!     let entry = normalize_item(&parsed.channel, item, chrono::Utc::now());
//! }
//! ```

pub mod charset;
pub mod dates;
pub mod fetcher;
pub mod normalize;
pub mod opml;
pub mod parser;

pub use charset::{CharsetError, CharsetResolver};
pub use fetcher::{FeedFetcher, FetchError};
pub use normalize::{identity_hash, normalize_item, select_link, site_label, SkipReason};
pub use opml::{import_content, import_file, parse_opml_content, parse_outlines, OpmlError, Outline};
pub use parser::{parse_feed, ParsedFeed, RawChannel, RawItem, RawLink};
