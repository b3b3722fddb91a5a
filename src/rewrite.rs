//! Text rewriting.
//!
//! [`rewrite`] scans a unit of text left to right. At each position the
//! earliest candidate of any kind wins; candidates that start at the same
//! offset are ranked with [`rank`]. A recognized span is replaced by its
//! canonical rendering and never rescanned. If no candidate at the earliest
//! offset parses, the scan advances one character.
//!
//! Rewriting is idempotent: canonical spans render to themselves and are
//! not reported as replacements.

use std::ops::Range;

use rayon::prelude::*;

use crate::pattern::{Candidate, PatternKind, PatternSet, next_char_boundary, rank};

/// One replaced span, in byte offsets of the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

/// Outcome of rewriting one text unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    pub original: String,
    pub text: String,
    /// True only if `text` differs from `original`.
    pub changed: bool,
    /// Number of spans whose rendering differed from the source.
    pub replacements: usize,
    pub edits: Vec<Edit>,
}

impl RewriteResult {
    fn unchanged(text: &str) -> Self {
        Self {
            original: text.to_string(),
            text: text.to_string(),
            changed: false,
            replacements: 0,
            edits: Vec::new(),
        }
    }
}

/// A recognized reference span and its canonical rendering.
#[derive(Debug)]
struct Recognized {
    range: Range<usize>,
    rendered: String,
}

/// Cached search state for one pattern kind.
enum Slot<'h> {
    Unknown,
    Found(Candidate<'h>),
    Exhausted,
}

/// Left-to-right reference scanner.
///
/// Each kind keeps its next candidate. A cached candidate stays valid as
/// long as it starts at or after the scan position, so each regex runs
/// roughly once per match instead of once per position.
struct Scanner<'p, 'h> {
    patterns: &'p PatternSet,
    text: &'h str,
    kinds: Vec<PatternKind>,
    slots: Vec<Slot<'h>>,
    pos: usize,
}

impl<'p, 'h> Scanner<'p, 'h> {
    fn new(patterns: &'p PatternSet, text: &'h str) -> Self {
        let kinds: Vec<PatternKind> = patterns.kinds().collect();
        let slots = kinds.iter().map(|_| Slot::Unknown).collect();
        Self {
            patterns,
            text,
            kinds,
            slots,
            pos: 0,
        }
    }

    fn refresh(&mut self) {
        for (slot, &kind) in self.slots.iter_mut().zip(&self.kinds) {
            let stale = match slot {
                Slot::Unknown => true,
                Slot::Found(candidate) => candidate.range.start < self.pos,
                Slot::Exhausted => false,
            };
            if stale {
                *slot = match self.patterns.find_at(kind, self.text, self.pos) {
                    Some(candidate) => Slot::Found(candidate),
                    None => Slot::Exhausted,
                };
            }
        }
    }

    /// Earliest start among the cached candidates.
    fn earliest(&self) -> Option<usize> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Found(candidate) => Some(candidate.range.start),
                _ => None,
            })
            .min()
    }
}

impl Iterator for Scanner<'_, '_> {
    type Item = Recognized;

    fn next(&mut self) -> Option<Recognized> {
        while self.pos <= self.text.len() {
            self.refresh();
            let start = self.earliest()?;

            let mut ranked: Vec<&Candidate<'_>> = self
                .slots
                .iter()
                .filter_map(|slot| match slot {
                    Slot::Found(candidate) if candidate.range.start == start => Some(candidate),
                    _ => None,
                })
                .collect();
            rank(&mut ranked);

            let found = ranked.iter().find_map(|candidate| {
                self.patterns
                    .parse(candidate)
                    .map(|parsed| (candidate.range.clone(), parsed.to_string()))
            });

            match found {
                Some((range, rendered)) => {
                    self.pos = range.end;
                    return Some(Recognized { range, rendered });
                }
                None => self.pos = next_char_boundary(self.text, start),
            }
        }
        None
    }
}

/// Rewrite every recognized reference in `text` to canonical form.
pub fn rewrite(text: &str, patterns: &PatternSet) -> RewriteResult {
    let mut edits = Vec::new();
    for recognized in Scanner::new(patterns, text) {
        if text[recognized.range.clone()] != recognized.rendered {
            edits.push(Edit {
                range: recognized.range,
                replacement: recognized.rendered,
            });
        }
    }

    if edits.is_empty() {
        return RewriteResult::unchanged(text);
    }

    let mut out = String::with_capacity(text.len() + edits.len() * 8);
    let mut copied = 0;
    for edit in &edits {
        out.push_str(&text[copied..edit.range.start]);
        out.push_str(&edit.replacement);
        copied = edit.range.end;
    }
    out.push_str(&text[copied..]);

    RewriteResult {
        original: text.to_string(),
        changed: out != text,
        text: out,
        replacements: edits.len(),
        edits,
    }
}

/// Rewrite independent units in parallel, preserving their order.
pub fn rewrite_units<S>(units: &[S], patterns: &PatternSet) -> Vec<RewriteResult>
where
    S: AsRef<str> + Sync,
{
    units
        .par_iter()
        .map(|unit| rewrite(unit.as_ref(), patterns))
        .collect()
}

/// Spans shaped like `Word C:V` whose word is not a known book.
///
/// Spans inside a recognized reference are not reported ("Solomon 2:1"
/// in "Song of Solomon 2:1").
pub fn find_unrecognized(text: &str, patterns: &PatternSet) -> Vec<String> {
    let recognized: Vec<Range<usize>> = Scanner::new(patterns, text).map(|r| r.range).collect();
    let overlaps = |span: &Range<usize>| {
        recognized
            .iter()
            .any(|r| r.start < span.end && span.start < r.end)
    };

    patterns
        .citation_shape()
        .captures_iter(text)
        .filter(|caps| {
            caps.name("book")
                .is_some_and(|book| patterns.table().resolve(book.as_str()).is_none())
        })
        .filter_map(|caps| caps.get(0))
        .filter(|m| !overlaps(&m.range()))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::books::{AbbreviationTable, BookForm};
    use proptest::prelude::*;

    static PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| {
        PatternSet::compile(&AbbreviationTable::default_table().unwrap()).unwrap()
    });

    fn patterns() -> &'static PatternSet {
        &PATTERNS
    }

    fn normalized(text: &str) -> String {
        rewrite(text, patterns()).text
    }

    #[test]
    fn test_rewrites_each_shape() {
        let cases = [
            ("gen 1.1", "Genesis 1:1"),
            ("ps 23", "Psalms 23:1"),
            ("Rom 8.28", "Romans 8:28"),
            ("Mt 5:3-12", "Matthew 5:3-12"),
            ("Mt 5:3\u{2013}12", "Matthew 5:3-12"),
            ("Matt 5:3,5", "Matthew 5:3,5"),
            ("jn 3:16,18", "John 3:16,18"),
            ("jn 3:16, 18-20", "John 3:16,18-20"),
            ("1 cor 13:4-8", "1 Corinthians 13:4-8"),
            ("1Cor 13:4", "1 Corinthians 13:4"),
            ("heb 11 1", "Hebrews 11:1"),
            ("isa chapter 53 verse 5", "Isaiah 53:5"),
            ("Psalm 1-3", "Psalms 1:1-3:1"),
            ("Pss 23:1", "Psalms 23:1"),
            ("Song of Songs 2:1", "Song of Solomon 2:1"),
            ("JOHN 3:16", "John 3:16"),
            ("1 jn 1:9", "1 John 1:9"),
        ];
        let set = patterns();
        for (input, expected) in cases {
            assert_eq!(rewrite(input, &set).text, expected, "{input}");
        }
    }

    #[test]
    fn test_cross_chapter_keeps_both_chapters() {
        let result = rewrite("jn 3:16-4:2", patterns());
        assert_eq!(result.text, "John 3:16-4:2");

        let result = rewrite("John 3:16-4:2", patterns());
        assert!(!result.changed);
    }

    #[test]
    fn test_cross_chapter_with_periods() {
        assert_eq!(normalized("John 3.16-4.2"), "John 3:16-4:2");
        assert_eq!(normalized("gen 1.1-2.3"), "Genesis 1:1-2:3");
        assert_eq!(normalized("see jn 3:16-4.2."), "see John 3:16-4:2.");
    }

    #[test]
    fn test_verse_list_keeps_following_chapter() {
        assert_eq!(normalized("John 3:16-18, 4:1"), "John 3:16-18, 4:1");
        assert_eq!(normalized("jn 3:16-18, 4:1"), "John 3:16-18, 4:1");
        assert_eq!(normalized("gen 1.1, 2.3"), "Genesis 1:1, 2.3");
    }

    #[test]
    fn test_unknown_book_is_untouched() {
        let result = rewrite("xyz 3:16", patterns());
        assert_eq!(result.text, "xyz 3:16");
        assert!(!result.changed);
        assert_eq!(result.replacements, 0);
    }

    #[test]
    fn test_canonical_text_is_not_a_replacement() {
        let result = rewrite("Psalm 23:1 and Genesis 1:1", patterns());
        assert!(!result.changed);
        assert_eq!(result.replacements, 0);
        assert!(result.edits.is_empty());
    }

    #[test]
    fn test_paragraph() {
        let text = "In the beginning (gen 1.1), later Ex 20:3-17; compare \
                    jn 3:16, 2 cor 5:17 and ps 23. See also Psalm 1-3.";
        let result = rewrite(text, patterns());
        assert_eq!(
            result.text,
            "In the beginning (Genesis 1:1), later Exodus 20:3-17; compare \
             John 3:16, 2 Corinthians 5:17 and Psalms 23:1. See also Psalms 1:1-3:1."
        );
        assert!(result.changed);
        assert_eq!(result.replacements, 6);
    }

    #[test]
    fn test_edits_use_original_offsets() {
        let result = rewrite("x gen 1.1 y Psalm 23:1", patterns());
        assert_eq!(
            result.edits,
            vec![Edit {
                range: 2..9,
                replacement: "Genesis 1:1".to_string(),
            }]
        );
        assert_eq!(result.original, "x gen 1.1 y Psalm 23:1");
        assert_eq!(result.text, "x Genesis 1:1 y Psalm 23:1");
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(normalized("\u{ab} jn 3:16 \u{bb}"), "\u{ab} John 3:16 \u{bb}");
        assert_eq!(normalized("caf\u{e9} gen 1:1"), "caf\u{e9} Genesis 1:1");
    }

    #[test]
    fn test_unparseable_match_is_skipped() {
        assert_eq!(normalized("Ps 0 and Ps 23"), "Ps 0 and Psalms 23:1");
        assert_eq!(normalized("jn 3:0"), "jn 3:0");
    }

    #[test]
    fn test_prose_is_left_alone() {
        for text in [
            "there is 1 way",
            "is 3 ways",
            "the job 2 of them",
            "Meeting at 10 AM 5 days",
            "Is 5 enough?",
            "He 2 sons came",
            "They left. He 2 sons stayed",
            "",
        ] {
            assert_eq!(normalized(text), text);
        }
    }

    #[test]
    fn test_rewrite_units_preserves_order() {
        let units = vec![
            "gen 1:1".to_string(),
            "plain".to_string(),
            "ps 23".to_string(),
        ];
        let results = rewrite_units(&units, patterns());
        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Genesis 1:1", "plain", "Psalms 23:1"]);
        assert_eq!(results.iter().filter(|r| r.changed).count(), 2);
    }

    #[test]
    fn test_find_unrecognized() {
        let text = "See xyz 3:16, John 3:16 and Song of Solomon 2:1; also Hezekiah 1.2";
        assert_eq!(
            find_unrecognized(text, patterns()),
            vec!["xyz 3:16".to_string(), "Hezekiah 1.2".to_string()]
        );
    }

    #[test]
    fn test_every_token_rewrites_to_its_book() {
        let set = patterns();
        let table = set.table();
        for token in table.tokens() {
            let (book, form) = table.resolve(token).unwrap();
            let expected_name = match form {
                BookForm::Canonical => book.name.as_str(),
                BookForm::Alternate => book.display_name(BookForm::Alternate),
            };
            assert_eq!(
                rewrite(&format!("{token} 3:16"), &set).text,
                format!("{expected_name} 3:16"),
                "{token}"
            );
        }
    }

    fn shaped_reference() -> impl Strategy<Value = String> {
        let tokens: Vec<String> = AbbreviationTable::default_table()
            .unwrap()
            .tokens()
            .map(str::to_string)
            .collect();
        (prop::sample::select(tokens), 0usize..8, 1u32..150, 1u32..40, 1u32..40).prop_map(
            |(token, shape, c, v, w)| match shape {
                0 => format!("{token} {c}:{v}"),
                1 => format!("{token} {c}.{v}"),
                2 => format!("{token} {c} {v}"),
                3 => format!("{token} chapter {c} verse {v}"),
                4 => format!("{token} {c}:{v}-{w}"),
                5 => format!("{token} {c}:{v}, {w}"),
                6 => format!("{token} {c}-{w}"),
                _ => format!("{token} {c}"),
            },
        )
    }

    proptest! {
        #[test]
        fn prop_rewrite_is_idempotent(
            pieces in prop::collection::vec(
                (shaped_reference(), prop::sample::select(vec!["and", "see", ";", "then", "compare"])),
                1..6,
            )
        ) {
            let text = pieces
                .iter()
                .map(|(reference, filler)| format!("{reference} {filler}"))
                .collect::<Vec<_>>()
                .join(" ");
            let set = patterns();
            let once = rewrite(&text, &set);
            let twice = rewrite(&once.text, &set);
            prop_assert_eq!(&twice.text, &once.text);
            prop_assert!(!twice.changed);
            prop_assert_eq!(twice.replacements, 0);
        }

        #[test]
        fn prop_parse_render_round_trip(
            index in 0usize..66,
            shape in 0usize..5,
            c in 1u32..150,
            v in 1u32..100,
            span in 1u32..20,
            c2 in 1u32..150,
        ) {
            let set = patterns();
            let book = &set.table().books()[index].name;
            let (w, x) = (v + span, v + span + 2);
            let text = match shape {
                0 => format!("{book} {c}:{v}"),
                1 => format!("{book} {c}:{v}-{w}"),
                2 => format!("{book} {c}:{v},{w}"),
                3 => format!("{book} {c}:{v},{w}-{x}"),
                _ => format!("{book} {c}:{v}-{c2}:{w}"),
            };
            let parsed = set.parse_reference(&text);
            prop_assert!(parsed.is_some(), "{}", text);
            let parsed = parsed.unwrap();
            let rendered = parsed.to_string();
            prop_assert_eq!(set.parse_reference(&rendered), Some(parsed));
        }

        #[test]
        fn prop_canonical_round_trip(index in 0usize..66, c in 1u32..150, v in 1u32..176) {
            let set = patterns();
            let book = &set.table().books()[index];
            let text = format!("{} {c}:{v}", book.name);
            let result = rewrite(&text, &set);
            prop_assert_eq!(&result.text, &text);
            prop_assert!(!result.changed);
        }

        #[test]
        fn prop_changed_matches_text_difference(text in "[a-zA-Z0-9 :.,-]{0,40}") {
            let result = rewrite(&text, patterns());
            prop_assert_eq!(result.changed, result.text != text);
            prop_assert_eq!(result.changed, result.replacements > 0);
        }
    }
}
