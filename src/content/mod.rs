//! Article content handling.
//!
//! Feed item bodies arrive as arbitrary HTML. Before anything is persisted the
//! body goes through the [`sanitize`] pass, which keeps a fixed allow-list of
//! readable tags, strips inline event handlers and drops non-HTTP(S) URLs.

pub mod sanitize;

pub use sanitize::{
    content_nodes, is_allowed_tag, render, sanitize_document, sanitize_html, SafeElement, SafeNode,
};
