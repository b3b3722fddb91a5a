//! # scriptref
//!
//! Find scripture references in free text and rewrite them to one canonical
//! `Book Chapter:Verse` form.
//!
//! ## Features
//!
//! - Recognizes abbreviations from a configurable table ("gen", "1 Cor.", "Pss")
//! - Accepts colon, period, space and verbose forms, verse ranges and lists,
//!   cross-chapter ranges and whole-chapter citations
//! - Idempotent: canonical text is left alone
//! - Rewrites plain text, HTML and DOCX files in place, with backups
//!
//! ## Quick Start
//!
//! ```
//! use scriptref::{AbbreviationTable, PatternSet, rewrite};
//!
//! let table = AbbreviationTable::default_table().unwrap();
//! let patterns = PatternSet::compile(&table).unwrap();
//!
//! let result = rewrite("see jn 3:16 and ps 23", &patterns);
//! assert_eq!(result.text, "see John 3:16 and Psalms 23:1");
//! assert_eq!(result.replacements, 2);
//! ```
//!
//! ## Working with Files
//!
//! A [`Session`] bundles the compiled patterns with file handling:
//!
//! ```no_run
//! use std::path::Path;
//! use scriptref::{Session, Settings};
//!
//! let session = Session::new(Settings::default().with_dry_run(true)).unwrap();
//! let report = session.process_file(Path::new("sermon.docx"), None).unwrap();
//! println!("{} paragraphs changed", report.units_changed);
//! ```

pub mod backup;
pub mod books;
pub mod error;
pub mod format;
pub mod pattern;
pub mod reference;
pub mod rewrite;
pub mod session;
pub mod settings;

pub use books::{AbbreviationTable, BookEntry, BookForm};
pub use error::{ConfigError, Error, ParseError, Result};
pub use format::{Container, Format, UnitKind};
pub use pattern::{CompileOptions, PatternKind, PatternSet};
pub use reference::{ParsedReference, VerseSegment, Verses};
pub use rewrite::{Edit, RewriteResult, find_unrecognized, rewrite, rewrite_units};
pub use session::{BatchReport, FileReport, Session};
pub use settings::Settings;
