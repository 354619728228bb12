use scraper::{ElementRef, Html, Node};

/// Tags that survive sanitization. Everything else is dropped together with
/// its subtree (scripts, styles, forms, embeds, document head, ...).
///
/// `html` and `body` are listed so the document wrappers stay intact; they
/// are unwrapped again by [`content_nodes`] before rendering.
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "address", "article", "aside", "audio", "b", "bdi", "bdo", "blockquote",
    "body", "br", "caption", "cite", "code", "col", "colgroup", "dd", "del", "details", "dfn",
    "div", "dl", "dt", "em", "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "html", "i", "img", "ins", "kbd", "li", "main", "mark", "ol", "p",
    "picture", "pre", "q", "s", "samp", "section", "small", "source", "span", "strong", "sub",
    "summary", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "time", "tr", "u", "ul",
    "var", "video", "wbr",
];

/// Allowed tags that never carry children or an end tag.
const VOID_TAGS: &[&str] = &["br", "col", "hr", "img", "source", "wbr"];

/// A node of the sanitized document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafeNode {
    Element(SafeElement),
    Text(String),
}

/// An element that passed the allow-list, with its filtered attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<SafeNode>,
}

/// Returns true if `name` is on the sanitizer allow-list.
pub fn is_allowed_tag(name: &str) -> bool {
    ALLOWED_TAGS.contains(&name)
}

/// Builds a filtered copy of a parsed document.
///
/// The walk is depth-first and pre-order. An element whose tag is not on the
/// allow-list is skipped along with its entire subtree, so nothing below it
/// is ever visited. The root element has no element parent and is always
/// kept. Text survives; comments, doctypes and processing instructions do
/// not.
///
/// Attributes of surviving elements are filtered by [`keep_attribute`].
///
/// The parsed tree itself is never mutated, which avoids removing nodes out
/// from under a sibling cursor.
pub fn sanitize_document(document: &Html) -> SafeNode {
    SafeNode::Element(filter_element(document.root_element()))
}

fn filter_element(element: ElementRef<'_>) -> SafeElement {
    let value = element.value();

    let attrs = value
        .attrs()
        .filter_map(|(name, value)| keep_attribute(name, value))
        .collect();

    let mut children = Vec::new();
    for child in element.children() {
        match child.value() {
            Node::Element(el) => {
                if !is_allowed_tag(el.name()) {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    children.push(SafeNode::Element(filter_element(child_ref)));
                }
            }
            Node::Text(text) => children.push(SafeNode::Text((**text).to_owned())),
            _ => {}
        }
    }

    SafeElement {
        name: value.name().to_owned(),
        attrs,
        children,
    }
}

/// Decides whether an attribute survives, returning the value to keep.
///
/// - `on*` attributes (any case) are inline event handlers and always go.
/// - `src`/`href` stay only when the trimmed value starts with `http://` or
///   `https://`; this rejects `javascript:`, `data:` and relative URLs. The
///   trimmed value is what gets stored.
fn keep_attribute(name: &str, value: &str) -> Option<(String, String)> {
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("on") {
        return None;
    }

    if lower == "src" || lower == "href" {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Some((name.to_owned(), trimmed.to_owned()));
        }
        return None;
    }

    Some((name.to_owned(), value.to_owned()))
}

fn is_wrapper(name: &str) -> bool {
    matches!(name, "" | "html" | "body")
}

/// Unwraps the document, descending through `html`/`body` wrappers until the
/// first node that is neither. That node and its following siblings are the
/// renderable content. Returns an empty slice when the body is empty.
pub fn content_nodes(root: &SafeNode) -> &[SafeNode] {
    let mut level = std::slice::from_ref(root);
    while let Some(SafeNode::Element(element)) = level.first() {
        if !is_wrapper(&element.name) {
            break;
        }
        level = &element.children;
    }
    level
}

/// Serializes sanitized nodes back to HTML.
pub fn render(nodes: &[SafeNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &SafeNode, out: &mut String) {
    match node {
        SafeNode::Text(text) => escape_text(text, out),
        SafeNode::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for (name, value) in &element.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attribute(value, out);
                out.push('"');
            }
            out.push('>');

            if VOID_TAGS.contains(&element.name.as_str()) {
                return;
            }

            for child in &element.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

/// Parses an item body as an HTML document, sanitizes it and renders the
/// body content.
///
/// html5ever recovers from any malformed input, so this never fails; a body
/// with nothing left after filtering renders as an empty string.
pub fn sanitize_html(input: &str) -> String {
    let document = Html::parse_document(input);
    let root = sanitize_document(&document);
    render(content_nodes(&root))
}
