//! Book names and the abbreviations that refer to them.
//!
//! An [`AbbreviationTable`] maps every recognized spelling of a book
//! ("gen", "Ge", "Genesis", "1cor", "1 Cor.") to its [`BookEntry`]. Tokens
//! are normalized before lookup so the table is case-insensitive and
//! tolerant of the usual punctuation around numeric prefixes.

mod csv;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use crate::error::ConfigError;

/// Bundled table of the 66 Protestant canon books.
pub const DEFAULT_TABLE: &str = include_str!("default_books.csv");

/// Which of a book's names a citation should be rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookForm {
    /// The canonical name ("Psalm").
    Canonical,
    /// The alternate, usually plural, name ("Psalms").
    Alternate,
}

/// One book of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookEntry {
    /// Canonical name, as rendered in output.
    pub name: String,
    /// Name used for whole-chapter citations, when the book has one.
    pub alternate: Option<String>,
    /// Abbreviations in source order.
    pub abbreviations: Vec<String>,
    /// Abbreviations of the alternate form ("Pss").
    pub alternate_abbreviations: Vec<String>,
}

impl BookEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alternate: None,
            abbreviations: Vec::new(),
            alternate_abbreviations: Vec::new(),
        }
    }

    pub fn with_alternate(mut self, alternate: impl Into<String>) -> Self {
        self.alternate = Some(alternate.into());
        self
    }

    pub fn with_abbreviation(mut self, abbreviation: impl Into<String>) -> Self {
        self.abbreviations.push(abbreviation.into());
        self
    }

    /// The name to print for `form`, falling back to the canonical name.
    pub fn display_name(&self, form: BookForm) -> &str {
        match (form, &self.alternate) {
            (BookForm::Alternate, Some(alternate)) => alternate,
            _ => &self.name,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TokenTarget {
    book: usize,
    form: BookForm,
}

/// Immutable lookup from normalized token to book.
#[derive(Debug, Clone, Default)]
pub struct AbbreviationTable {
    books: Vec<BookEntry>,
    tokens: HashMap<String, TokenTarget>,
}

impl AbbreviationTable {
    /// Load a table from a file on disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    /// The bundled table.
    pub fn default_table() -> Result<Self, ConfigError> {
        Self::parse(DEFAULT_TABLE)
    }

    /// Parse table rows of the form `Canonical,"abbr, abbr, ..."`.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();
        let mut lines = Vec::new();

        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields =
                csv::split_record(trimmed).ok_or(ConfigError::UnterminatedQuote { line })?;
            if fields.len() != 2 {
                return Err(ConfigError::ColumnCount {
                    line,
                    found: fields.len(),
                });
            }

            entries.push(parse_row(line, &fields[0], &fields[1])?);
            lines.push(line);
        }

        Self::build(entries, &lines)
    }

    /// Build a table from entries assembled in code.
    pub fn from_entries(entries: Vec<BookEntry>) -> Result<Self, ConfigError> {
        let lines: Vec<usize> = (1..=entries.len()).collect();
        for (entry, &line) in entries.iter().zip(&lines) {
            validate_entry(line, entry)?;
        }
        Self::build(entries, &lines)
    }

    fn build(books: Vec<BookEntry>, lines: &[usize]) -> Result<Self, ConfigError> {
        let mut tokens: HashMap<String, TokenTarget> = HashMap::new();
        let mut names: HashMap<String, usize> = HashMap::new();

        for (index, (book, &line)) in books.iter().zip(lines).enumerate() {
            if names.insert(normalize_token(&book.name), index).is_some() {
                return Err(ConfigError::DuplicateName {
                    line,
                    name: book.name.clone(),
                });
            }

            let canonical = std::iter::once(&book.name).chain(&book.abbreviations);
            let alternate = book.alternate.iter().chain(&book.alternate_abbreviations);
            let spellings = canonical
                .map(|s| (s, BookForm::Canonical))
                .chain(alternate.map(|s| (s, BookForm::Alternate)));

            for (spelling, form) in spellings {
                let token = normalize_token(spelling);
                match tokens.entry(token) {
                    Entry::Vacant(slot) => {
                        slot.insert(TokenTarget { book: index, form });
                    }
                    Entry::Occupied(slot) if slot.get().book != index => {
                        return Err(ConfigError::ConflictingToken {
                            line,
                            token: slot.key().clone(),
                            owner: books[slot.get().book].name.clone(),
                        });
                    }
                    Entry::Occupied(_) => {}
                }
            }
        }

        Ok(Self { books, tokens })
    }

    /// Look up a token as it appears in text ("Gen.", "1cor", "PSALMS").
    pub fn resolve(&self, token: &str) -> Option<(&BookEntry, BookForm)> {
        let target = self.tokens.get(&normalize_token(token))?;
        Some((&self.books[target.book], target.form))
    }

    /// All books in source order.
    pub fn books(&self) -> &[BookEntry] {
        &self.books
    }

    /// All normalized tokens, in no particular order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    /// Number of books.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Number of distinct tokens.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Normalize a book token for lookup.
///
/// Lower-cases, treats periods as spaces, collapses whitespace, and
/// separates a leading numeral from the name: "1Cor.", "1. cor" and
/// "1 COR" all become "1 cor".
pub fn normalize_token(token: &str) -> String {
    let lowered = token.to_lowercase().replace('.', " ");
    let mut words = lowered.split_whitespace();
    let mut normalized = String::with_capacity(lowered.len());

    if let Some(first) = words.next() {
        let digits = first.len() - first.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 && digits < first.len() {
            normalized.push_str(&first[..digits]);
            normalized.push(' ');
            normalized.push_str(&first[digits..]);
        } else {
            normalized.push_str(first);
        }
    }
    for word in words {
        normalized.push(' ');
        normalized.push_str(word);
    }
    normalized
}

fn parse_row(line: usize, name_field: &str, abbreviation_field: &str) -> Result<BookEntry, ConfigError> {
    let (name, annotation) = split_annotation(name_field);
    if name.is_empty() {
        return Err(ConfigError::BlankName { line });
    }

    let mut entry = BookEntry::new(name);
    match annotation {
        Some(Annotation::Plural(plural)) => entry.alternate = Some(plural.to_string()),
        Some(Annotation::Variant(variant)) => entry.abbreviations.push(variant.to_string()),
        None => {}
    }

    if abbreviation_field.trim().is_empty() {
        return Err(ConfigError::NoAbbreviations {
            line,
            name: entry.name,
        });
    }

    for raw in abbreviation_field.split(',') {
        let (abbreviation, annotation) = split_annotation(raw);
        if abbreviation.is_empty() {
            return Err(ConfigError::EmptyAbbreviation {
                line,
                name: entry.name,
            });
        }
        entry.abbreviations.push(abbreviation.to_string());
        match annotation {
            Some(Annotation::Plural(plural)) => {
                entry.alternate_abbreviations.push(plural.to_string())
            }
            Some(Annotation::Variant(variant)) => entry.abbreviations.push(variant.to_string()),
            None => {}
        }
    }

    Ok(entry)
}

fn validate_entry(line: usize, entry: &BookEntry) -> Result<(), ConfigError> {
    if entry.name.trim().is_empty() {
        return Err(ConfigError::BlankName { line });
    }
    if entry.abbreviations.is_empty() {
        return Err(ConfigError::NoAbbreviations {
            line,
            name: entry.name.clone(),
        });
    }
    let all = entry.abbreviations.iter().chain(&entry.alternate_abbreviations);
    if all.chain(&entry.alternate).any(|a| normalize_token(a).is_empty()) {
        return Err(ConfigError::EmptyAbbreviation {
            line,
            name: entry.name.clone(),
        });
    }
    Ok(())
}

/// Parenthetical note after a name or abbreviation.
enum Annotation<'a> {
    /// `(pl. Psalms)`
    Plural(&'a str),
    /// Any other parenthetical, treated as another spelling.
    Variant(&'a str),
}

fn split_annotation(field: &str) -> (&str, Option<Annotation<'_>>) {
    let field = field.trim();
    let Some(open) = field.find('(') else {
        return (field, None);
    };
    let base = field[..open].trim();
    let inner = field[open + 1..].trim_end();
    let inner = inner.strip_suffix(')').unwrap_or(inner).trim();

    let annotation = match inner.strip_prefix("pl.") {
        Some(plural) if !plural.trim().is_empty() => Some(Annotation::Plural(plural.trim())),
        Some(_) => None,
        None if inner.is_empty() => None,
        None => Some(Annotation::Variant(inner)),
    };
    (base, annotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("Gen"), "gen");
        assert_eq!(normalize_token("  Gen. "), "gen");
        assert_eq!(normalize_token("1Cor"), "1 cor");
        assert_eq!(normalize_token("1. Cor."), "1 cor");
        assert_eq!(normalize_token("1   COR"), "1 cor");
        assert_eq!(normalize_token("Song  of\tSolomon"), "song of solomon");
        assert_eq!(normalize_token("123"), "123");
    }

    #[test]
    fn test_parse_rows() {
        let table = AbbreviationTable::parse(
            "# comment\n\nGenesis,\"Gen, Ge, Gn\"\nJob,Jb\n",
        )
        .unwrap();
        assert_eq!(table.len(), 2);

        let (book, form) = table.resolve("GE").unwrap();
        assert_eq!(book.name, "Genesis");
        assert_eq!(form, BookForm::Canonical);
        assert_eq!(table.resolve("job").unwrap().0.name, "Job");
        assert!(table.resolve("xyz").is_none());
    }

    #[test]
    fn test_canonical_name_is_a_token() {
        let table = AbbreviationTable::parse("Genesis,Gen").unwrap();
        assert_eq!(table.resolve("genesis").unwrap().0.name, "Genesis");
    }

    #[test]
    fn test_plural_annotations() {
        let table =
            AbbreviationTable::parse("Psalm (pl. Psalms),\"Ps (pl. Pss), Psa\"").unwrap();
        let (book, form) = table.resolve("ps").unwrap();
        assert_eq!(book.name, "Psalm");
        assert_eq!(book.alternate.as_deref(), Some("Psalms"));
        assert_eq!(form, BookForm::Canonical);

        assert_eq!(table.resolve("Pss").unwrap().1, BookForm::Alternate);
        assert_eq!(table.resolve("psalms").unwrap().1, BookForm::Alternate);
        assert_eq!(book.display_name(BookForm::Alternate), "Psalms");
        assert_eq!(book.display_name(BookForm::Canonical), "Psalm");
    }

    #[test]
    fn test_variant_annotation() {
        let table = AbbreviationTable::parse("Song of Solomon (Song of Songs),SS").unwrap();
        let (book, _) = table.resolve("song of songs").unwrap();
        assert_eq!(book.name, "Song of Solomon");
    }

    #[test]
    fn test_numeric_prefix_spellings_share_a_token() {
        let table = AbbreviationTable::parse("1 Corinthians,\"1 Cor, 1Cor\"").unwrap();
        assert_eq!(table.resolve("1.cor").unwrap().0.name, "1 Corinthians");
        assert_eq!(table.token_count(), 2);
    }

    #[test]
    fn test_wrong_column_count() {
        let err = AbbreviationTable::parse("Genesis").unwrap_err();
        assert!(matches!(err, ConfigError::ColumnCount { line: 1, found: 1 }));

        let err = AbbreviationTable::parse("Genesis,Gen\nExodus,Ex,extra").unwrap_err();
        assert!(matches!(err, ConfigError::ColumnCount { line: 2, found: 3 }));
    }

    #[test]
    fn test_blank_name() {
        let err = AbbreviationTable::parse("  ,Gen").unwrap_err();
        assert!(matches!(err, ConfigError::BlankName { line: 1 }));
    }

    #[test]
    fn test_duplicate_name() {
        let err = AbbreviationTable::parse("Genesis,Gen\ngenesis,Gn").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { line: 2, .. }));
    }

    #[test]
    fn test_empty_abbreviations() {
        let err = AbbreviationTable::parse("Genesis,\"\"").unwrap_err();
        assert!(matches!(err, ConfigError::NoAbbreviations { line: 1, .. }));

        let err = AbbreviationTable::parse("Genesis,\"Gen, , Ge\"").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyAbbreviation { line: 1, .. }));
    }

    #[test]
    fn test_conflicting_token() {
        let err = AbbreviationTable::parse("Judges,Jud\nJude,Jud").unwrap_err();
        match err {
            ConfigError::ConflictingToken { line, token, owner } => {
                assert_eq!(line, 2);
                assert_eq!(token, "jud");
                assert_eq!(owner, "Judges");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unterminated_quote() {
        let err = AbbreviationTable::parse("Genesis,\"Gen, Ge").unwrap_err();
        assert!(matches!(err, ConfigError::UnterminatedQuote { line: 1 }));
    }

    #[test]
    fn test_unreadable_source() {
        let err = AbbreviationTable::load("/nonexistent/books.csv").unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn test_from_entries() {
        let table = AbbreviationTable::from_entries(vec![
            BookEntry::new("Obadiah").with_abbreviation("Obad"),
            BookEntry::new("Psalm")
                .with_alternate("Psalms")
                .with_abbreviation("Ps"),
        ])
        .unwrap();
        assert_eq!(table.resolve("obad").unwrap().0.name, "Obadiah");
        assert_eq!(table.resolve("psalms").unwrap().1, BookForm::Alternate);

        let err = AbbreviationTable::from_entries(vec![BookEntry::new("Obadiah")]).unwrap_err();
        assert!(matches!(err, ConfigError::NoAbbreviations { line: 1, .. }));
    }

    #[test]
    fn test_default_table() {
        let table = AbbreviationTable::default_table().unwrap();
        assert_eq!(table.len(), 66);

        let expected = [
            ("genesis", "Genesis"),
            ("gen", "Genesis"),
            ("ge", "Genesis"),
            ("gn", "Genesis"),
            ("john", "John"),
            ("jn", "John"),
            ("psalms", "Psalm"),
            ("ps", "Psalm"),
            ("1 corinthians", "1 Corinthians"),
            ("1 cor", "1 Corinthians"),
            ("1cor", "1 Corinthians"),
            ("song of solomon", "Song of Solomon"),
            ("rev", "Revelation"),
        ];
        for (token, name) in expected {
            assert_eq!(
                table.resolve(token).map(|(b, _)| b.name.as_str()),
                Some(name),
                "token {token}"
            );
        }
    }
}
