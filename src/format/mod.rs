//! Document containers.
//!
//! A [`Container`] presents a document as an ordered list of text units and
//! takes the rewritten units back in the same order. References never span
//! units, so each unit is rewritten on its own and the containers only
//! decide what a unit is:
//!
//! | Format | Unit |
//! |--------|------|
//! | Plain text | one line, without its terminator |
//! | HTML | one non-blank text node |
//! | DOCX | one `w:p` paragraph |

mod docx;
mod html;
mod text;

pub use docx::Docx;
pub use html::Html;
pub use text::PlainText;

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::pattern::PatternSet;
use crate::rewrite::{RewriteResult, rewrite_units};

/// What one text unit of a container corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Line,
    TextNode,
    Paragraph,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnitKind::Line => "line",
            UnitKind::TextNode => "text node",
            UnitKind::Paragraph => "paragraph",
        })
    }
}

/// A document split into independently rewritable text units.
pub trait Container: Send {
    fn unit_kind(&self) -> UnitKind;

    /// Text units in document order.
    fn units(&self) -> Vec<String>;

    /// Write rewritten units back.
    ///
    /// `results` must have one entry per unit, in the order of
    /// [`units`](Container::units).
    fn apply(&mut self, results: &[RewriteResult]) -> Result<()>;

    /// Serialize the document.
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

/// Supported input formats, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Html,
    Docx,
}

impl Format {
    /// Detect the format of `path` from its extension.
    ///
    /// Legacy `.doc` and `.pdf` files are recognized but rejected: they
    /// need an external converter.
    pub fn from_path(path: &Path) -> Result<Format> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "docx" => Ok(Format::Docx),
            "html" | "htm" | "xhtml" => Ok(Format::Html),
            "txt" | "text" | "md" => Ok(Format::Text),
            "doc" => Err(Error::UnsupportedFormat(
                "legacy .doc files must be converted to .docx first".to_string(),
            )),
            "pdf" => Err(Error::UnsupportedFormat(
                "PDF files cannot be rewritten in place".to_string(),
            )),
            "" => Err(Error::UnsupportedFormat(format!(
                "{} has no file extension",
                path.display()
            ))),
            other => Err(Error::UnsupportedFormat(format!(".{other} files"))),
        }
    }

    /// Short lowercase name, as used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Html => "html",
            Format::Docx => "docx",
        }
    }

    /// Parse `bytes` into a container of this format.
    pub fn open(self, bytes: &[u8]) -> Result<Box<dyn Container>> {
        Ok(match self {
            Format::Text => Box::new(PlainText::parse(bytes)),
            Format::Html => Box::new(Html::parse(bytes)),
            Format::Docx => Box::new(Docx::parse(bytes)?),
        })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// True if `path` has an extension [`Format::from_path`] accepts.
pub fn is_supported(path: &Path) -> bool {
    Format::from_path(path).is_ok()
}

/// Rewrite every unit of `container` and apply the results.
pub fn rewrite_document(
    container: &mut dyn Container,
    patterns: &PatternSet,
) -> Result<Vec<RewriteResult>> {
    let units = container.units();
    let results = rewrite_units(&units, patterns);
    container.apply(&results)?;
    Ok(results)
}

pub(crate) fn check_unit_count(expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::UnitMismatch { expected, found })
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decoded text and whether the input carried a UTF-8 byte order mark.
pub(crate) struct Decoded {
    pub text: String,
    pub bom: bool,
}

/// Decode bytes to a string, trying UTF-8 first.
///
/// Falls back to `hint_encoding` (a charset label such as `"utf-16"` or
/// `"iso-8859-1"`) and then to Windows-1252, the usual encoding of older
/// word-processor exports.
pub(crate) fn decode_text(bytes: &[u8], hint_encoding: Option<&str>) -> Decoded {
    let bom = bytes.starts_with(UTF8_BOM);

    // Handles the BOM
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    let text: Cow<'_, str> = if !malformed {
        result
    } else if let Some(encoding) =
        hint_encoding.and_then(|name| encoding_rs::Encoding::for_label(name.as_bytes()))
    {
        encoding.decode(bytes).0
    } else {
        encoding_rs::WINDOWS_1252.decode(bytes).0
    };

    Decoded {
        text: text.into_owned(),
        bom,
    }
}

pub(crate) fn encode_text(text: &str, bom: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + UTF8_BOM.len());
    if bom {
        out.extend_from_slice(UTF8_BOM);
    }
    out.extend_from_slice(text.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        let cases = [
            ("notes.txt", Format::Text),
            ("NOTES.MD", Format::Text),
            ("page.htm", Format::Html),
            ("page.xhtml", Format::Html),
            ("sermon.docx", Format::Docx),
        ];
        for (name, format) in cases {
            assert_eq!(Format::from_path(&PathBuf::from(name)).unwrap(), format, "{name}");
        }
    }

    #[test]
    fn test_legacy_formats_are_unsupported() {
        for name in ["old.doc", "scan.pdf", "image.png", "README"] {
            assert!(matches!(
                Format::from_path(&PathBuf::from(name)),
                Err(Error::UnsupportedFormat(_))
            ));
            assert!(!is_supported(&PathBuf::from(name)));
        }
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let decoded = decode_text(b"\xEF\xBB\xBFgen 1:1", None);
        assert_eq!(decoded.text, "gen 1:1");
        assert!(decoded.bom);
        assert_eq!(encode_text(&decoded.text, decoded.bom), b"\xEF\xBB\xBFgen 1:1");
    }

    #[test]
    fn test_decode_falls_back_to_windows_1252() {
        // 0x93/0x94 are curly quotes in Windows-1252
        let decoded = decode_text(b"\x93jn 3:16\x94", None);
        assert_eq!(decoded.text, "\u{201c}jn 3:16\u{201d}");
        assert!(!decoded.bom);
    }

    #[test]
    fn test_decode_uses_hint() {
        let decoded = decode_text(b"caf\xE9", Some("iso-8859-15"));
        assert_eq!(decoded.text, "caf\u{e9}");
    }

    #[test]
    fn test_unit_count_mismatch() {
        assert!(check_unit_count(2, 2).is_ok());
        assert!(matches!(
            check_unit_count(2, 1),
            Err(Error::UnitMismatch {
                expected: 2,
                found: 1
            })
        ));
    }
}
