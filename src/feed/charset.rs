//! Charset handling for fetched feed payloads.
//!
//! The feed parser only ever sees UTF-8. Payloads that declare another
//! encoding are transcoded first, through a [`CharsetResolver`] hook that
//! maps the declared label to an `encoding_rs` decoder.

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

/// Bytes inspected when looking for an XML declaration.
const DECLARATION_SCAN_LIMIT: usize = 512;

const UTF8_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Error)]
pub enum CharsetError {
    /// The declared charset label is not known to the resolver
    #[error("Unsupported charset: {0}")]
    Unsupported(String),
}

/// Maps a declared charset label (e.g. `ISO-8859-1`, `Shift_JIS`) to a decoder.
pub type CharsetResolver = fn(&str) -> Option<&'static Encoding>;

/// Default resolver: WHATWG encoding labels via `encoding_rs`.
pub fn resolve_charset(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Determines the declared charset of a payload.
///
/// A byte-order mark wins, then the XML declaration's `encoding`, then the
/// `charset` parameter of the HTTP `Content-Type` header.
pub fn declared_charset(content_type: Option<&str>, body: &[u8]) -> Option<String> {
    if let Some((encoding, _)) = Encoding::for_bom(body) {
        return Some(encoding.name().to_owned());
    }
    xml_declared_encoding(body).or_else(|| content_type.and_then(content_type_charset))
}

fn xml_declared_encoding(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(DECLARATION_SCAN_LIMIT)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    if !head.starts_with("<?xml") {
        return None;
    }

    let declaration = &head[..head.find("?>")?];
    let after_key = &declaration[declaration.find("encoding")? + "encoding".len()..];
    let after_eq = after_key.trim_start().strip_prefix('=')?.trim_start();
    let quote = after_eq.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &after_eq[1..];
    let end = value.find(quote)?;

    let label = value[..end].trim();
    (!label.is_empty()).then(|| label.to_owned())
}

fn content_type_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim_matches('\'');
        (!value.is_empty()).then(|| value.to_owned())
    })
}

/// Transcodes `body` from `charset` to UTF-8.
///
/// UTF-8 (and undeclared) payloads pass through untouched. Anything else is
/// decoded with the resolver's encoding, malformed sequences become U+FFFD,
/// and the XML declaration is rewritten to say UTF-8 so the parser does not
/// try to decode a second time.
pub fn decode_to_utf8(
    body: Vec<u8>,
    charset: Option<&str>,
    resolve: CharsetResolver,
) -> Result<Vec<u8>, CharsetError> {
    let Some(label) = charset else {
        return Ok(body);
    };

    let encoding = resolve(label).ok_or_else(|| CharsetError::Unsupported(label.to_owned()))?;
    if encoding == UTF_8 {
        return Ok(body);
    }

    let (text, actual, had_errors) = encoding.decode(&body);
    if had_errors {
        tracing::warn!(
            charset = %actual.name(),
            "Malformed byte sequences replaced while decoding feed"
        );
    }

    Ok(rewrite_declaration(&text).into_bytes())
}

fn rewrite_declaration(text: &str) -> String {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return format!("{}{}", UTF8_DECLARATION, &trimmed[end + 2..]);
        }
    }
    trimmed.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_declared_charset_from_xml_declaration() {
        let body = br#"<?xml version="1.0" encoding="ISO-8859-1"?><rss/>"#;
        assert_eq!(declared_charset(None, body).as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_declared_charset_single_quotes() {
        let body = b"<?xml version='1.0' encoding='windows-1251'?><rss/>";
        assert_eq!(declared_charset(None, body).as_deref(), Some("windows-1251"));
    }

    #[test]
    fn test_declared_charset_from_content_type() {
        let body = b"<rss/>";
        assert_eq!(
            declared_charset(Some("application/rss+xml; charset=\"Shift_JIS\""), body).as_deref(),
            Some("Shift_JIS")
        );
    }

    #[test]
    fn test_xml_declaration_wins_over_header() {
        let body = br#"<?xml version="1.0" encoding="ISO-8859-1"?><rss/>"#;
        assert_eq!(
            declared_charset(Some("text/xml; charset=utf-8"), body).as_deref(),
            Some("ISO-8859-1")
        );
    }

    #[test]
    fn test_no_declared_charset() {
        assert_eq!(declared_charset(Some("text/xml"), b"<rss/>"), None);
        assert_eq!(declared_charset(None, br#"<?xml version="1.0"?><rss/>"#), None);
    }

    #[test]
    fn test_decode_latin1_rewrites_declaration() {
        let mut body = br#"<?xml version="1.0" encoding="ISO-8859-1"?><title>caf"#.to_vec();
        body.push(0xE9);
        body.extend_from_slice(b"</title>");

        let decoded = decode_to_utf8(body, Some("ISO-8859-1"), resolve_charset).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert_eq!(
            text,
            r#"<?xml version="1.0" encoding="UTF-8"?><title>café</title>"#
        );
    }

    #[test]
    fn test_utf8_passes_through() {
        let body = "<title>naïve</title>".as_bytes().to_vec();
        let decoded = decode_to_utf8(body.clone(), Some("utf-8"), resolve_charset).unwrap();
        assert_eq!(decoded, body);

        let undeclared = decode_to_utf8(body.clone(), None, resolve_charset).unwrap();
        assert_eq!(undeclared, body);
    }

    #[test]
    fn test_unknown_charset_is_error() {
        let result = decode_to_utf8(b"<rss/>".to_vec(), Some("x-klingon"), resolve_charset);
        assert!(matches!(result, Err(CharsetError::Unsupported(label)) if label == "x-klingon"));
    }

    #[test]
    fn test_custom_resolver_is_used() {
        fn always_latin1(_: &str) -> Option<&'static Encoding> {
            Some(encoding_rs::WINDOWS_1252)
        }
        let decoded = decode_to_utf8(vec![0x41, 0xE9], Some("anything"), always_latin1).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "Aé");
    }
}
