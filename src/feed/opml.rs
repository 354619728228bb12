use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::storage::{ImportReport, NewFeed, StoreGateway};

/// Maximum allowed nesting depth for OPML outline elements.
/// Deeper documents are rejected instead of recursed into.
const MAX_OPML_DEPTH: usize = 50;

/// Errors that can occur during OPML parsing.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// OPML nesting depth exceeds the limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// File I/O error.
    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),
}

/// One `<outline>` node of an OPML body, with its nested outlines.
///
/// Folder outlines have no `xml_url`; feed outlines usually have no
/// children, but nothing stops a document from nesting under a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    /// `title` attribute, falling back to `text`
    pub title: Option<String>,
    pub xml_url: Option<String>,
    pub html_url: Option<String>,
    pub children: Vec<Outline>,
}

/// Parses OPML content into the outline tree found under `<body>`.
///
/// Returns the top-level outlines in document order.
///
/// # Security
///
/// quick-xml (0.37) does not parse `<!ENTITY>` declarations. Attribute values
/// go through `decode_and_unescape_value()`, which resolves only the five XML
/// builtins; any other entity reference is an error, so external entities
/// can never be expanded.
pub fn parse_outlines(content: &str) -> Result<Vec<Outline>, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut roots = Vec::new();
    // Open outlines, innermost last. Its length is the current depth.
    let mut open: Vec<Outline> = Vec::new();
    let mut in_body = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"body" => in_body = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"body" => in_body = false,
            Ok(Event::Start(e)) if in_body && e.name().as_ref() == b"outline" => {
                if open.len() >= MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                open.push(read_outline(&e, &reader)?);
            }
            Ok(Event::Empty(e)) if in_body && e.name().as_ref() == b"outline" => {
                // Self-closing outline doesn't affect depth
                let leaf = read_outline(&e, &reader)?;
                attach(leaf, &mut open, &mut roots);
            }
            Ok(Event::End(e)) if in_body && e.name().as_ref() == b"outline" => {
                if let Some(done) = open.pop() {
                    attach(done, &mut open, &mut roots);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !open.is_empty() {
        return Err(OpmlError::XmlParse(format!(
            "{} unclosed outline element(s)",
            open.len()
        )));
    }

    Ok(roots)
}

fn attach(outline: Outline, open: &mut [Outline], roots: &mut Vec<Outline>) {
    match open.last_mut() {
        Some(parent) => parent.children.push(outline),
        None => roots.push(outline),
    }
}

/// Reads the attributes of one outline element.
fn read_outline(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Outline, OpmlError> {
    let mut outline = Outline::default();
    let mut text = None;
    let decoder = reader.decoder();

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let value = || {
            attr.decode_and_unescape_value(decoder)
                .map(|v| v.trim().to_string())
                .map_err(|e| OpmlError::XmlParse(e.to_string()))
        };
        match attr.key.as_ref() {
            b"xmlUrl" => outline.xml_url = Some(value()?),
            b"htmlUrl" => outline.html_url = Some(value()?),
            b"title" => outline.title = Some(value()?),
            b"text" => text = Some(value()?),
            _ => {}
        }
    }

    if outline.title.as_deref().map_or(true, str::is_empty) {
        outline.title = text.filter(|t| !t.is_empty());
    }
    Ok(outline)
}

/// Flattens an outline tree into subscriptions.
///
/// Depth-first, pre-order, so the result follows document order. Every node
/// with a non-empty feed address yields one subscription; its title falls
/// back to the address itself.
pub fn subscriptions(outlines: &[Outline]) -> Vec<NewFeed> {
    let mut feeds = Vec::new();
    for outline in outlines {
        collect(outline, &mut feeds);
    }
    feeds
}

fn collect(outline: &Outline, feeds: &mut Vec<NewFeed>) {
    if let Some(url) = outline.xml_url.as_deref().filter(|u| !u.is_empty()) {
        feeds.push(NewFeed {
            title: outline.title.clone().unwrap_or_else(|| url.to_string()),
            xml_url: url.to_string(),
            html_url: outline.html_url.clone().filter(|u| !u.is_empty()),
        });
    }
    for child in &outline.children {
        collect(child, feeds);
    }
}

/// Parses OPML content and extracts its subscriptions.
pub fn parse_opml_content(content: &str) -> Result<Vec<NewFeed>, OpmlError> {
    Ok(subscriptions(&parse_outlines(content)?))
}

/// Imports every subscription of an OPML document.
///
/// The whole document is parsed first; a malformed document fails before
/// anything is written. Rows are then inserted in one transaction.
pub async fn import_content(gateway: &StoreGateway, content: &str) -> Result<ImportReport> {
    let feeds = parse_opml_content(content)?;
    let report = gateway.import_feeds(&feeds).await?;
    tracing::info!(
        imported = report.inserted,
        skipped = report.skipped,
        "Subscriptions imported"
    );
    Ok(report)
}

/// Reads an OPML file from disk and imports its subscriptions.
pub async fn import_file(gateway: &StoreGateway, path: &str) -> Result<ImportReport> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(OpmlError::Io)
        .with_context(|| format!("Failed to read OPML file: {}", path))?;
    import_content(gateway, &content).await
}
