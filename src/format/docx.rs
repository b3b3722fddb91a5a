//! DOCX: one unit per `w:p` paragraph.
//!
//! Text parts (the main document, headers, footers, footnotes and
//! endnotes) are located with quick-xml and edited in place; every other
//! ZIP entry is written back untouched.
//!
//! A paragraph's text is the concatenation of its `w:t` runs. Replacements
//! are mapped back onto the runs: a replacement lands in the run where the
//! original span started, and the rest of the span is cut from the runs it
//! covered. Run properties (bold, italics, fonts) are never touched.

use std::cmp::Reverse;
use std::io::{Cursor, Read, Write};
use std::ops::Range;

use quick_xml::Reader;
use quick_xml::escape::{partial_escape, unescape};
use quick_xml::events::Event;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{Container, UnitKind, check_unit_count};
use crate::error::{Error, Result};
use crate::rewrite::{Edit, RewriteResult};

const DOCUMENT: &str = "word/document.xml";

#[derive(Debug)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// One `w:t` element.
#[derive(Debug)]
struct TextRun {
    /// The start tag, `<w:t ...>`.
    tag: Range<usize>,
    /// Raw (escaped) content between the tags.
    content: Range<usize>,
    text: String,
}

#[derive(Debug, Default)]
struct Paragraph {
    runs: Vec<TextRun>,
}

impl Paragraph {
    fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

#[derive(Debug)]
struct Part {
    entry: usize,
    xml: String,
    paragraphs: Vec<Paragraph>,
}

/// A Word document.
#[derive(Debug)]
pub struct Docx {
    entries: Vec<Entry>,
    parts: Vec<Part>,
}

impl Docx {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                compression: file.compression(),
                is_dir: file.is_dir(),
                data,
            });
        }

        if !entries.iter().any(|e| e.name == DOCUMENT) {
            return Err(Error::InvalidDocument(format!("missing {DOCUMENT}")));
        }

        // Main document first, then the other parts by name
        let mut order: Vec<usize> = (0..entries.len())
            .filter(|&i| is_text_part(&entries[i].name))
            .collect();
        order.sort_by_key(|&i| (entries[i].name != DOCUMENT, entries[i].name.clone()));

        let parts = order
            .into_iter()
            .map(|entry| {
                let xml = String::from_utf8(entries[entry].data.clone()).map_err(|e| {
                    Error::InvalidDocument(format!("{}: {e}", entries[entry].name))
                })?;
                let paragraphs = scan_paragraphs(&xml)?;
                Ok(Part {
                    entry,
                    xml,
                    paragraphs,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            entries = entries.len(),
            parts = parts.len(),
            paragraphs = parts.iter().map(|p| p.paragraphs.len()).sum::<usize>(),
            "opened docx"
        );
        Ok(Self { entries, parts })
    }

    /// Current XML of a text part.
    pub fn part(&self, name: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|part| self.entries[part.entry].name == name)
            .map(|part| part.xml.as_str())
    }
}

impl Container for Docx {
    fn unit_kind(&self) -> UnitKind {
        UnitKind::Paragraph
    }

    fn units(&self) -> Vec<String> {
        self.parts
            .iter()
            .flat_map(|part| part.paragraphs.iter().map(Paragraph::text))
            .collect()
    }

    fn apply(&mut self, results: &[RewriteResult]) -> Result<()> {
        let expected = self.parts.iter().map(|p| p.paragraphs.len()).sum();
        check_unit_count(expected, results.len())?;
        let mut results = results.iter();

        for part in &mut self.parts {
            let mut splices: Vec<(Range<usize>, String)> = Vec::new();

            for (paragraph, result) in part.paragraphs.iter().zip(&mut results) {
                if !result.changed {
                    continue;
                }
                let rewritten = distribute(&paragraph.runs, &result.edits);
                for (run, text) in paragraph.runs.iter().zip(rewritten) {
                    if text == run.text {
                        continue;
                    }
                    if let Some(tag) = preserve_space(&part.xml[run.tag.clone()]) {
                        splices.push((run.tag.clone(), tag));
                    }
                    splices.push((run.content.clone(), partial_escape(&text).into_owned()));
                }
            }

            if splices.is_empty() {
                continue;
            }
            splices.sort_by_key(|(range, _)| Reverse(range.start));
            for (range, replacement) in splices {
                part.xml.replace_range(range, &replacement);
            }
            part.paragraphs = scan_paragraphs(&part.xml)?;
            self.entries[part.entry].data = part.xml.as_bytes().to_vec();
        }
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
            } else {
                zip.start_file(entry.name.as_str(), options)?;
                zip.write_all(&entry.data)?;
            }
        }

        Ok(zip.finish()?.into_inner())
    }
}

fn is_text_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    let Some(stem) = file.strip_suffix(".xml") else {
        return false;
    };
    let numbered = |prefix: &str| {
        stem.strip_prefix(prefix)
            .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
    };
    matches!(stem, "document" | "footnotes" | "endnotes") || numbered("header") || numbered("footer")
}

/// Paragraphs of a part, in document order.
///
/// Paragraphs nest (text boxes inside a paragraph hold paragraphs of their
/// own); runs belong to the innermost open paragraph.
fn scan_paragraphs(xml: &str) -> Result<Vec<Paragraph>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<Paragraph> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut text_tag: Option<Range<usize>> = None;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let end = reader.buffer_position() as usize;

        match event {
            Event::Start(e) if e.name().as_ref() == b"w:p" => {
                open.push(paragraphs.len());
                paragraphs.push(Paragraph::default());
            }
            Event::End(e) if e.name().as_ref() == b"w:p" => {
                open.pop();
            }
            Event::Start(e) if e.name().as_ref() == b"w:t" => {
                text_tag = Some(start..end);
            }
            Event::End(e) if e.name().as_ref() == b"w:t" => {
                if let (Some(tag), Some(&index)) = (text_tag.take(), open.last()) {
                    let content = tag.end..start;
                    let text = unescape(&xml[content.clone()])
                        .map_err(quick_xml::Error::from)?
                        .into_owned();
                    paragraphs[index].runs.push(TextRun { tag, content, text });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// New text of each run after applying `edits` to the paragraph text.
fn distribute(runs: &[TextRun], edits: &[Edit]) -> Vec<String> {
    let mut bounds = Vec::with_capacity(runs.len());
    let mut offset = 0;
    for run in runs {
        bounds.push(offset..offset + run.text.len());
        offset += run.text.len();
    }

    let mut out = vec![String::new(); runs.len()];
    let mut pos = 0;
    for edit in edits {
        copy_span(runs, &bounds, pos..edit.range.start, &mut out);
        if let Some(owner) = bounds.iter().position(|b| b.contains(&edit.range.start)) {
            out[owner].push_str(&edit.replacement);
        }
        pos = edit.range.end;
    }
    copy_span(runs, &bounds, pos..offset, &mut out);
    out
}

fn copy_span(runs: &[TextRun], bounds: &[Range<usize>], span: Range<usize>, out: &mut [String]) {
    for (i, bound) in bounds.iter().enumerate() {
        let lo = bound.start.max(span.start);
        let hi = bound.end.min(span.end);
        if lo < hi {
            out[i].push_str(&runs[i].text[lo - bound.start..hi - bound.start]);
        }
    }
}

/// Start tag with `xml:space="preserve"` added, if it lacks one.
fn preserve_space(tag: &str) -> Option<String> {
    if tag.contains("xml:space") {
        return None;
    }
    let open = tag.strip_suffix('>')?;
    Some(format!(r#"{open} xml:space="preserve">"#))
}
