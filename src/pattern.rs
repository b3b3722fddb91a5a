//! Reference shapes and the compiled pattern set.
//!
//! Every shape the rewriter understands is one [`PatternKind`] variant,
//! declared in priority order. [`PatternSet::compile`] builds one regex per
//! kind with the table's tokens in the book slot. The `regex` crate never
//! backtracks, so matching stays linear in the input.
//!
//! Tie-break at a start offset: the longest span wins, then the earlier
//! kind.

use std::borrow::Borrow;
use std::cmp::Reverse;
use std::ops::Range;

use regex::{Captures, Regex};

use crate::books::{AbbreviationTable, normalize_token};
use crate::error::{ConfigError, ParseError};
use crate::reference::{self, ParsedReference};

/// Reference shapes, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatternKind {
    /// `John 3:16-4:2`, `John 3.16-4.2`
    CrossChapter,
    /// `John 3:16`, `John 3:16-18`, `John 3:16,18`
    Colon,
    /// `John 3.16`
    Period,
    /// `John 3 16`
    Spaced,
    /// `John chapter 3 verse 16`
    Verbose,
    /// `Psalm 1-3`
    ChapterSpan,
    /// `Psalm 23`
    Chapter,
}

impl PatternKind {
    /// All kinds in priority order.
    pub const ALL: [PatternKind; 7] = [
        PatternKind::CrossChapter,
        PatternKind::Colon,
        PatternKind::Period,
        PatternKind::Spaced,
        PatternKind::Verbose,
        PatternKind::ChapterSpan,
        PatternKind::Chapter,
    ];

    /// Kinds with no punctuation between book and numbers, which collide
    /// with ordinary prose ("there is 1 way").
    pub fn is_loose(self) -> bool {
        matches!(
            self,
            PatternKind::Spaced | PatternKind::ChapterSpan | PatternKind::Chapter
        )
    }

    fn template(self) -> String {
        let tail = format!(r"{NUM}(?:{DASH}{NUM})?");
        match self {
            PatternKind::CrossChapter => format!(
                r"(?P<ch>{NUM})[:.](?P<v>{NUM}){DASH}(?P<ch2>{NUM})[:.](?P<v2>{NUM})"
            ),
            PatternKind::Colon => {
                format!(r"(?P<ch>{NUM}):(?P<verses>{tail}(?:\s*,\s*{tail})*)")
            }
            PatternKind::Period => {
                format!(r"(?P<ch>{NUM})\.(?P<verses>{tail}(?:\s*,\s*{tail})*)")
            }
            PatternKind::Spaced => {
                format!(r"(?P<ch>{NUM})\s+(?P<v>{NUM})(?:{DASH}(?P<v2>{NUM}))?")
            }
            PatternKind::Verbose => format!(
                r"chapter\s+(?P<ch>{NUM})\s*,?\s+verse\s+(?P<v>{NUM})(?:{DASH}(?P<v2>{NUM}))?"
            ),
            PatternKind::ChapterSpan => format!(r"(?P<ch>{NUM}){DASH}(?P<ch2>{NUM})"),
            PatternKind::Chapter => format!(r"(?P<ch>{NUM})"),
        }
    }

    /// Reject matches whose continuation shows a longer shape was intended.
    ///
    /// The regex crate has no lookahead, so "`Book C` not followed by a
    /// verse" is checked here on the text after the match.
    ///
    /// A rendered reference ends in a verse number, so a tail that a verse
    /// list would absorb (`, 5`) is rejected too: otherwise a second pass
    /// would extend the reference.
    fn accepts_tail(self, tail: &str) -> bool {
        match self {
            PatternKind::Chapter => !(starts_with_verse_marker(tail)
                || starts_with_spaced_number(tail)
                || starts_with_dash_number(tail)
                || starts_with_comma_number(tail)),
            PatternKind::Spaced | PatternKind::Verbose => {
                !(starts_with_verse_marker(tail) || starts_with_comma_number(tail))
            }
            PatternKind::ChapterSpan => !starts_with_verse_marker(tail),
            // "3:16-4" of "3:16-4:2" belongs to a cross-chapter range
            PatternKind::Colon | PatternKind::Period => !starts_with_glued_verse_marker(tail),
            PatternKind::CrossChapter => true,
        }
    }
}

/// Bounded digit run: chapters and verses never need more than three.
const NUM: &str = "[0-9]{1,3}";
/// Range dash: hyphen or en dash, optionally spaced.
const DASH: &str = r"\s*[-\x{2013}]\s*";

/// Words that are also book abbreviations. Loose shapes ignore them when
/// written in lower case or all caps, and abbreviations among them when
/// they open a sentence.
pub const AMBIGUOUS_WORDS: &[&str] = &[
    "is", "am", "he", "ho", "es", "ne", "na", "mi", "ob", "la", "le", "de", "ge", "nu", "ru",
    "ja", "re", "co", "ro", "ac", "ex", "ti", "pro", "jon", "job", "mark", "act", "acts", "song",
    "numbers", "judges", "lamentations",
];

/// Knobs for [`PatternSet::with_options`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Tokens the loose shapes accept only when capitalized mid-sentence.
    pub ambiguous_words: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            ambiguous_words: AMBIGUOUS_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct Pattern {
    kind: PatternKind,
    regex: Regex,
}

/// A match that passed the shape guards and may still fail to parse.
#[derive(Debug)]
pub struct Candidate<'h> {
    pub kind: PatternKind,
    pub range: Range<usize>,
    caps: Captures<'h>,
}

impl Candidate<'_> {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// The compiled recognition rules for one abbreviation table.
#[derive(Debug, Clone)]
pub struct PatternSet {
    table: AbbreviationTable,
    patterns: Vec<Pattern>,
    ambiguous: Vec<String>,
    /// `Word C:V` shapes, for reporting citations with unknown books.
    candidate: Regex,
}

impl PatternSet {
    /// Compile with default options.
    pub fn compile(table: &AbbreviationTable) -> Result<Self, ConfigError> {
        Self::with_options(table, CompileOptions::default())
    }

    pub fn with_options(
        table: &AbbreviationTable,
        options: CompileOptions,
    ) -> Result<Self, ConfigError> {
        let book = book_alternation(table);
        let patterns = PatternKind::ALL
            .iter()
            .map(|&kind| {
                let source = format!(r"(?i)\b(?P<book>{book})\.?\s*{}\b", kind.template());
                Ok(Pattern {
                    kind,
                    regex: Regex::new(&source)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let candidate = Regex::new(&format!(
            r"\b(?P<book>(?:[1-3]\s?)?\p{{L}}{{2,}})\.?\s+{NUM}[:.]{NUM}\b"
        ))?;

        Ok(Self {
            table: table.clone(),
            patterns,
            ambiguous: options
                .ambiguous_words
                .iter()
                .map(|w| normalize_token(w))
                .collect(),
            candidate,
        })
    }

    pub fn table(&self) -> &AbbreviationTable {
        &self.table
    }

    /// Kinds in the order they are tried.
    pub fn kinds(&self) -> impl Iterator<Item = PatternKind> + '_ {
        self.patterns.iter().map(|p| p.kind)
    }

    /// Leftmost acceptable match of `kind` starting at or after `from`.
    pub fn find_at<'h>(&self, kind: PatternKind, text: &'h str, from: usize) -> Option<Candidate<'h>> {
        let pattern = self.patterns.iter().find(|p| p.kind == kind)?;
        let mut at = from;

        while at <= text.len() {
            let mut caps = pattern.regex.captures_at(text, at)?;
            let whole = caps.get(0)?;
            let mut range = whole.range();

            if matches!(kind, PatternKind::Colon | PatternKind::Period) {
                let end = trim_verse_list(text, &caps, range.end);
                if end < range.end {
                    // Re-capture so the verse group matches the shortened span.
                    match pattern.regex.captures_at(&text[..end], range.start) {
                        Some(trimmed) if trimmed.get(0).is_some_and(|m| m.range() == (range.start..end)) => {
                            caps = trimmed;
                            range.end = end;
                        }
                        _ => {
                            at = next_char_boundary(text, range.start);
                            continue;
                        }
                    }
                }
            }

            if kind.accepts_tail(&text[range.end..]) && self.accepts_book(kind, text, &caps) {
                return Some(Candidate { kind, range, caps });
            }
            at = next_char_boundary(text, whole.start());
        }
        None
    }

    /// Every kind's candidate at exactly `start`, best first.
    pub fn ranked_at<'h>(&self, text: &'h str, start: usize) -> Vec<Candidate<'h>> {
        let mut found: Vec<Candidate<'h>> = self
            .kinds()
            .filter_map(|kind| self.find_at(kind, text, start))
            .filter(|c| c.range.start == start)
            .collect();
        rank(&mut found);
        found
    }

    /// Parse a candidate into a reference.
    ///
    /// Parse failures collapse to `None`: the span is left as it was.
    pub fn parse<'s>(&'s self, candidate: &Candidate<'_>) -> Option<ParsedReference<'s>> {
        match reference::parse(&self.table, candidate.kind, &candidate.caps) {
            Ok(parsed) => parsed,
            Err(ParseError::MissingGroup(_)) => None,
        }
    }

    /// Parse a string that consists of exactly one reference.
    pub fn parse_reference<'s>(&'s self, text: &str) -> Option<ParsedReference<'s>> {
        let text = text.trim();
        self.ranked_at(text, 0)
            .into_iter()
            .filter(|c| c.range.end == text.len())
            .find_map(|c| self.parse(&c))
    }

    /// Matcher for `Word C:V` shapes regardless of the word.
    pub(crate) fn citation_shape(&self) -> &Regex {
        &self.candidate
    }

    fn accepts_book(&self, kind: PatternKind, text: &str, caps: &Captures<'_>) -> bool {
        if !kind.is_loose() {
            return true;
        }
        let Some(book) = caps.name("book") else {
            return false;
        };
        let token = book.as_str();
        let normalized = normalize_token(token);
        if !self.ambiguous.contains(&normalized) {
            return true;
        }

        let mut letters = token.chars().filter(|c| c.is_alphabetic());
        let Some(first) = letters.next() else {
            return true;
        };
        if first.is_lowercase() {
            return false;
        }
        // "AM", "IS": shouting or a time of day, not a book
        if letters.clone().next().is_some() && letters.all(char::is_uppercase) {
            return false;
        }
        // "Is 5 enough?" opens a sentence; "Mark 5" still names the book
        let full_name = self
            .table
            .resolve(token)
            .is_some_and(|(entry, _)| normalize_token(&entry.name) == normalized);
        full_name || !opens_sentence(&text[..book.start()])
    }
}

/// Sort candidates at one offset: longest first, then priority.
pub fn rank<'h, C: Borrow<Candidate<'h>>>(candidates: &mut [C]) {
    candidates.sort_by_key(|c| {
        let c = c.borrow();
        (Reverse(c.len()), c.kind)
    });
}

/// Regex alternation of every table token, longest first so that the
/// leftmost-first engine prefers "isaiah" over "is".
fn book_alternation(table: &AbbreviationTable) -> String {
    let mut tokens: Vec<&str> = table.tokens().collect();
    if tokens.is_empty() {
        return r"[^\s\S]".to_string();
    }
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let alternatives: Vec<String> = tokens.iter().map(|t| token_pattern(t)).collect();
    alternatives.join("|")
}

/// Pattern for one normalized token.
///
/// A leading numeral may be followed by a period and may be glued to the
/// name ("1 Cor", "1. Cor", "1Cor"); other words are separated by any
/// whitespace.
fn token_pattern(token: &str) -> String {
    let words: Vec<&str> = token.split(' ').collect();
    match words.as_slice() {
        [numeral, rest @ ..]
            if !rest.is_empty() && numeral.chars().all(|c| c.is_ascii_digit()) =>
        {
            let rest: Vec<String> = rest.iter().map(|w| regex::escape(w)).collect();
            format!(r"{}\.?\s*{}", numeral, rest.join(r"\s+"))
        }
        _ => {
            let words: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
            words.join(r"\s+")
        }
    }
}

/// A verse list ends before an item that starts the next citation: the
/// numeral of a following book ("John 3:16, 2 Cor 5:17") or the chapter of
/// a following `C:V` ("John 3:16-18, 4:1").
fn trim_verse_list(text: &str, caps: &Captures<'_>, end: usize) -> usize {
    let Some(verses) = caps.name("verses") else {
        return end;
    };
    let Some(comma) = verses.as_str().rfind(',') else {
        return end;
    };
    let tail = &text[end..];
    let last = verses.as_str()[comma + 1..].trim();

    let before_book = matches!(last, "1" | "2" | "3")
        && tail.starts_with(char::is_whitespace)
        && tail.trim_start().starts_with(char::is_alphabetic);
    if before_book || starts_with_glued_verse_marker(tail) {
        let trimmed = verses.start() + comma;
        text[..trimmed].trim_end().len()
    } else {
        end
    }
}

/// Start of the text or just after a sentence end, ignoring opening quotes
/// and brackets.
fn opens_sentence(before: &str) -> bool {
    let before = before.trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '(' | '[' | '\u{201c}' | '\u{2018}')
    });
    before.is_empty() || before.ends_with(['.', '!', '?'])
}

/// `:16` or `.2` directly after the match.
fn starts_with_glued_verse_marker(tail: &str) -> bool {
    tail.strip_prefix([':', '.'])
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

fn starts_with_verse_marker(tail: &str) -> bool {
    let rest = tail.trim_start();
    let Some(rest) = rest.strip_prefix([':', '.']) else {
        return false;
    };
    rest.trim_start().starts_with(|c: char| c.is_ascii_digit())
}

fn starts_with_spaced_number(tail: &str) -> bool {
    tail.starts_with(char::is_whitespace) && tail.trim_start().starts_with(|c: char| c.is_ascii_digit())
}

fn starts_with_comma_number(tail: &str) -> bool {
    tail.trim_start()
        .strip_prefix(',')
        .is_some_and(|rest| rest.trim_start().starts_with(|c: char| c.is_ascii_digit()))
}

fn starts_with_dash_number(tail: &str) -> bool {
    tail.trim_start()
        .strip_prefix(['-', '\u{2013}'])
        .is_some_and(|rest| rest.trim_start().starts_with(|c: char| c.is_ascii_digit()))
}

pub(crate) fn next_char_boundary(text: &str, at: usize) -> usize {
    text[at..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| at + c.len_utf8())
}
