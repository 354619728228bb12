//! Feed crawler: polls RSS/Atom subscriptions, sanitizes item content and
//! stores new entries in SQLite.
//!
//! - [`feed`] - fetching, parsing, normalization and OPML import
//! - [`content`] - HTML sanitization of item bodies
//! - [`storage`] - the SQLite store and its serializing gateway
//! - [`poller`] - the long-running poll loop
//! - [`config`] - the optional TOML configuration file

pub mod config;
pub mod content;
pub mod feed;
pub mod poller;
pub mod storage;
