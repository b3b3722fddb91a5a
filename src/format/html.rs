//! HTML: one unit per non-blank text node.
//!
//! The document is scanned, not parsed. Tags, comments, doctype and
//! `<script>`/`<style>` bodies are copied through byte-for-byte; only the
//! text between them is offered for rewriting. A reference split by inline
//! markup (`<b>John</b> 3:16`) spans two units and is left alone.
//!
//! Non-breaking space entities (`gen&nbsp;1:1`) reach the rewriter as
//! U+00A0; a rewritten node writes them back as `&#160;`.

use std::borrow::Cow;

use super::{Container, UnitKind, check_unit_count, decode_text, encode_text};
use crate::error::Result;
use crate::rewrite::RewriteResult;

#[derive(Debug)]
enum Piece {
    Markup(String),
    Text(String),
}

impl Piece {
    fn is_unit(&self) -> bool {
        matches!(self, Piece::Text(text) if !text.trim().is_empty())
    }
}

/// An HTML or XHTML document.
#[derive(Debug)]
pub struct Html {
    pieces: Vec<Piece>,
    bom: bool,
}

impl Html {
    pub fn parse(bytes: &[u8]) -> Self {
        let hint = charset_hint(bytes);
        let decoded = decode_text(bytes, hint.as_deref());
        Self {
            pieces: split(&decoded.text),
            bom: decoded.bom,
        }
    }

    pub fn source(&self) -> String {
        self.pieces
            .iter()
            .map(|piece| match piece {
                Piece::Markup(s) | Piece::Text(s) => s.as_str(),
            })
            .collect()
    }

    fn text_nodes_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.pieces.iter_mut().filter_map(|piece| match piece {
            Piece::Text(text) if !text.trim().is_empty() => Some(text),
            _ => None,
        })
    }
}

impl Container for Html {
    fn unit_kind(&self) -> UnitKind {
        UnitKind::TextNode
    }

    fn units(&self) -> Vec<String> {
        self.pieces
            .iter()
            .filter(|piece| piece.is_unit())
            .filter_map(|piece| match piece {
                Piece::Text(text) => Some(unit_text(text).into_owned()),
                Piece::Markup(_) => None,
            })
            .collect()
    }

    fn apply(&mut self, results: &[RewriteResult]) -> Result<()> {
        let expected = self.pieces.iter().filter(|piece| piece.is_unit()).count();
        check_unit_count(expected, results.len())?;
        for (text, result) in self.text_nodes_mut().zip(results) {
            if result.changed {
                *text = source_text(&result.text);
            }
        }
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode_text(&self.source(), self.bom))
    }
}

/// Split a document into markup and text pieces.
fn split(html: &str) -> Vec<Piece> {
    let bytes = html.as_bytes();
    let mut pieces = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(offset) = memchr::memchr(b'<', &bytes[pos..]) else {
            pieces.push(Piece::Text(html[pos..].to_string()));
            break;
        };
        let tag_start = pos + offset;
        if tag_start > pos {
            pieces.push(Piece::Text(html[pos..tag_start].to_string()));
        }

        let tag_end = markup_end(bytes, tag_start);
        pieces.push(Piece::Markup(html[tag_start..tag_end].to_string()));
        pos = tag_end;

        if let Some(closing) = raw_text_closing(&bytes[tag_start..tag_end]) {
            let body_end = find_ignore_case(bytes, pos, closing);
            if body_end > pos {
                pieces.push(Piece::Markup(html[pos..body_end].to_string()));
            }
            pos = body_end;
        }
    }

    pieces
}

const NBSP_ENTITIES: [&str; 4] = ["&nbsp;", "&#160;", "&#xa0;", "&#xA0;"];

/// A text node as the rewriter sees it.
fn unit_text(source: &str) -> Cow<'_, str> {
    if memchr::memchr(b'&', source.as_bytes()).is_none() {
        return Cow::Borrowed(source);
    }
    let mut text = source.to_string();
    for entity in NBSP_ENTITIES {
        text = text.replace(entity, "\u{a0}");
    }
    Cow::Owned(text)
}

fn source_text(unit: &str) -> String {
    unit.replace('\u{a0}', "&#160;")
}

/// End of the tag or comment starting at `start`, exclusive.
fn markup_end(bytes: &[u8], start: usize) -> usize {
    let rest = &bytes[start..];
    if rest.starts_with(b"<!--") {
        return memchr::memmem::find(&rest[4..], b"-->").map_or(bytes.len(), |i| start + 4 + i + 3);
    }

    // '>' inside a quoted attribute value does not close the tag
    let mut quote = None;
    for (i, &b) in rest.iter().enumerate().skip(1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return start + i + 1,
            None => {}
        }
    }
    bytes.len()
}

/// Closing tag prefix for elements whose body is not text.
fn raw_text_closing(tag: &[u8]) -> Option<&'static [u8]> {
    if tag.starts_with(b"</") || tag.starts_with(b"<!") || tag.starts_with(b"<?") || tag.ends_with(b"/>") {
        return None;
    }
    let name_len = tag[1..]
        .iter()
        .position(|&b| b.is_ascii_whitespace() || b == b'>' || b == b'/')
        .unwrap_or(tag.len() - 1);
    let name = &tag[1..1 + name_len];

    if name.eq_ignore_ascii_case(b"script") {
        Some(b"</script")
    } else if name.eq_ignore_ascii_case(b"style") {
        Some(b"</style")
    } else {
        None
    }
}

fn find_ignore_case(bytes: &[u8], from: usize, needle: &[u8]) -> usize {
    let mut pos = from;
    while let Some(offset) = memchr::memchr(b'<', &bytes[pos..]) {
        let at = pos + offset;
        if bytes.len() - at >= needle.len() && bytes[at..at + needle.len()].eq_ignore_ascii_case(needle) {
            return at;
        }
        pos = at + 1;
    }
    bytes.len()
}

/// Charset declared in a `<meta>` tag near the top of the document.
fn charset_hint(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(1024)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();
    (!label.is_empty()).then_some(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::AbbreviationTable;
    use crate::format::rewrite_document;
    use crate::pattern::PatternSet;

    const PAGE: &str = concat!(
        "<!DOCTYPE html>\n<html><head><title>gen 1:1</title>",
        "<style>p > b { color: red }</style></head>\n",
        "<body><p class=\"a>b\">See gen 1:1 and ps 23.</p>\n",
        "<script>var ref = \"jn 3:16\";</script>",
        "<!-- Rom 8:28 -->",
        "<p title='Rom 8:28'><b>jn</b> 3:16</p></body></html>"
    );

    #[test]
    fn test_scan_round_trips() {
        let doc = Html::parse(PAGE.as_bytes());
        assert_eq!(doc.source(), PAGE);
    }

    #[test]
    fn test_units_are_text_nodes() {
        let doc = Html::parse(PAGE.as_bytes());
        assert_eq!(
            doc.units(),
            vec!["gen 1:1", "See gen 1:1 and ps 23.", "jn", " 3:16"]
        );
    }

    #[test]
    fn test_rewrite_leaves_markup_alone() {
        let patterns = PatternSet::compile(&AbbreviationTable::default_table().unwrap()).unwrap();
        let mut doc = Html::parse(PAGE.as_bytes());
        let results = rewrite_document(&mut doc, &patterns).unwrap();
        assert_eq!(results.iter().filter(|r| r.changed).count(), 2);

        let out = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert!(out.contains("<title>Genesis 1:1</title>"));
        assert!(out.contains("See Genesis 1:1 and Psalms 23:1."));
        assert!(out.contains("var ref = \"jn 3:16\";"));
        assert!(out.contains("<!-- Rom 8:28 -->"));
        assert!(out.contains("<p title='Rom 8:28'><b>jn</b> 3:16</p>"));
    }

    #[test]
    fn test_non_breaking_space_entities() {
        let patterns = PatternSet::compile(&AbbreviationTable::default_table().unwrap()).unwrap();
        let source = "<p>gen&nbsp;1:1 and Ps&#160;23</p><p>a&nbsp;b</p><p>x&nbsp;y jn 3:16</p>";
        let mut doc = Html::parse(source.as_bytes());
        assert_eq!(doc.units()[0], "gen\u{a0}1:1 and Ps\u{a0}23");

        let results = rewrite_document(&mut doc, &patterns).unwrap();
        assert_eq!(results.iter().filter(|r| r.changed).count(), 2);
        assert_eq!(
            doc.source(),
            "<p>Genesis 1:1 and Psalms 23:1</p><p>a&nbsp;b</p><p>x&#160;y John 3:16</p>"
        );
    }

    #[test]
    fn test_blank_text_is_not_a_unit() {
        let doc = Html::parse(b"<p>\n  </p>");
        assert!(doc.units().is_empty());
    }

    #[test]
    fn test_unclosed_script_runs_to_end() {
        let doc = Html::parse(b"<p>x</p><script>gen 1:1");
        assert_eq!(doc.units(), vec!["x"]);
    }

    #[test]
    fn test_charset_hint() {
        assert_eq!(
            charset_hint(b"<meta charset=\"ISO-8859-2\">"),
            Some("iso-8859-2".to_string())
        );
        assert_eq!(
            charset_hint(b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\">"),
            Some("windows-1252".to_string())
        );
        assert_eq!(charset_hint(b"<p>no declaration</p>"), None);
    }
}
