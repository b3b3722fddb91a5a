//! Parsed references and their canonical rendering.
//!
//! A [`ParsedReference`] is produced from the capture groups of one
//! [`PatternKind`] match. Its [`Display`](fmt::Display) impl is the
//! renderer: the output is always `Book Chapter:Verse`, which no looser
//! pattern reinterprets, so rendering is a fixed point of the rewriter.

use std::fmt;

use regex::Captures;

use crate::books::{AbbreviationTable, BookEntry, BookForm};
use crate::error::ParseError;
use crate::pattern::PatternKind;

/// One entry of a verse list: a verse or an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseSegment {
    pub start: u32,
    pub end: Option<u32>,
}

impl fmt::Display for VerseSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}", self.start),
        }
    }
}

/// The verse part of a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verses {
    /// `3:16`
    Single(u32),
    /// `13:4-8`
    Range(u32, u32),
    /// `3:16,18` (entries may be ranges: `5:3-5,7`)
    List(Vec<VerseSegment>),
    /// `3:16-4:2`
    CrossChapter {
        verse: u32,
        end_chapter: u32,
        end_verse: u32,
    },
    /// `1-3`: whole chapters, no verse given.
    ChapterSpan { end_chapter: u32 },
    /// Standalone chapter citation.
    Absent,
}

impl Verses {
    /// True when the source citation named chapters only.
    pub fn is_chapter_only(&self) -> bool {
        matches!(self, Verses::Absent | Verses::ChapterSpan { .. })
    }
}

/// A recognized reference, borrowing its book from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference<'t> {
    pub book: &'t BookEntry,
    /// Form of the token that was matched.
    pub form: BookForm,
    pub chapter: u32,
    pub verses: Verses,
}

impl ParsedReference<'_> {
    /// Name used in rendered output.
    ///
    /// Chapter-only citations and citations spelled with the alternate
    /// form take the book's alternate name when it has one.
    pub fn book_name(&self) -> &str {
        if self.form == BookForm::Alternate || self.verses.is_chapter_only() {
            self.book.display_name(BookForm::Alternate)
        } else {
            self.book.display_name(BookForm::Canonical)
        }
    }
}

impl fmt::Display for ParsedReference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:", self.book_name(), self.chapter)?;
        match &self.verses {
            Verses::Single(verse) => write!(f, "{verse}"),
            Verses::Range(start, end) => write!(f, "{start}-{end}"),
            Verses::List(segments) => {
                for (i, segment) in segments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{segment}")?;
                }
                Ok(())
            }
            Verses::CrossChapter {
                verse,
                end_chapter,
                end_verse,
            } => write!(f, "{verse}-{end_chapter}:{end_verse}"),
            Verses::ChapterSpan { end_chapter } => write!(f, "1-{end_chapter}:1"),
            Verses::Absent => f.write_str("1"),
        }
    }
}

/// Build a reference from the captures of a `kind` match.
///
/// `Ok(None)` means the span is not a reference: the book token is not in
/// the table or a number is zero. `Err` only signals a pattern whose
/// capture groups do not fit its kind.
pub fn parse<'t>(
    table: &'t AbbreviationTable,
    kind: PatternKind,
    caps: &Captures<'_>,
) -> Result<Option<ParsedReference<'t>>, ParseError> {
    let Some((book, form)) = table.resolve(group(caps, "book")?) else {
        return Ok(None);
    };
    let Some(chapter) = number(group(caps, "ch")?) else {
        return Ok(None);
    };

    let verses = match kind {
        PatternKind::CrossChapter => {
            let parts = (
                number(group(caps, "v")?),
                number(group(caps, "ch2")?),
                number(group(caps, "v2")?),
            );
            match parts {
                (Some(verse), Some(end_chapter), Some(end_verse)) => Verses::CrossChapter {
                    verse,
                    end_chapter,
                    end_verse,
                },
                _ => return Ok(None),
            }
        }
        PatternKind::Colon | PatternKind::Period => match verse_list(group(caps, "verses")?) {
            Some(verses) => verses,
            None => return Ok(None),
        },
        PatternKind::Spaced | PatternKind::Verbose => {
            let Some(start) = number(group(caps, "v")?) else {
                return Ok(None);
            };
            match caps.name("v2") {
                Some(end) => match number(end.as_str()) {
                    Some(end) => Verses::Range(start, end),
                    None => return Ok(None),
                },
                None => Verses::Single(start),
            }
        }
        PatternKind::ChapterSpan => match number(group(caps, "ch2")?) {
            Some(end_chapter) => Verses::ChapterSpan { end_chapter },
            None => return Ok(None),
        },
        PatternKind::Chapter => Verses::Absent,
    };

    Ok(Some(ParsedReference {
        book,
        form,
        chapter,
        verses,
    }))
}

fn group<'h>(caps: &Captures<'h>, name: &'static str) -> Result<&'h str, ParseError> {
    caps.name(name)
        .map(|m| m.as_str())
        .ok_or(ParseError::MissingGroup(name))
}

fn number(digits: &str) -> Option<u32> {
    digits.trim().parse::<u32>().ok().filter(|&n| n > 0)
}

/// Parse `16`, `16-18` or `16,18-20` into the narrowest [`Verses`].
fn verse_list(source: &str) -> Option<Verses> {
    let mut segments = Vec::new();
    for item in source.split(',') {
        let mut bounds = item.split(['-', '\u{2013}']);
        let start = number(bounds.next()?)?;
        let end = match bounds.next() {
            Some(end) => Some(number(end)?),
            None => None,
        };
        segments.push(VerseSegment { start, end });
    }

    Some(match segments.as_slice() {
        [VerseSegment { start, end: None }] => Verses::Single(*start),
        [VerseSegment {
            start,
            end: Some(end),
        }] => Verses::Range(*start, *end),
        _ => Verses::List(segments),
    })
}
