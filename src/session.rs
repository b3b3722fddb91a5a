//! File and directory processing.
//!
//! A [`Session`] owns one compiled [`PatternSet`]. Building it is the only
//! step that can fail on configuration; after that every file is rewritten
//! with the same immutable rules, from any number of threads.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::backup::{create_backup, is_backup};
use crate::books::AbbreviationTable;
use crate::error::Result;
use crate::format::{Format, UnitKind, is_supported, rewrite_document};
use crate::pattern::PatternSet;
use crate::rewrite::{RewriteResult, find_unrecognized, rewrite};
use crate::settings::Settings;

/// Outcome of processing one file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub format: Format,
    pub unit_kind: UnitKind,
    pub units_processed: usize,
    /// Units whose text changed. Always the number of per-unit changed
    /// flags set.
    pub units_changed: usize,
    pub replacements: usize,
    /// Copy made before overwriting, if any.
    pub backup: Option<PathBuf>,
    /// Where the result was written. `None` for dry runs and unchanged
    /// files processed in place.
    pub output: Option<PathBuf>,
    /// `Word C:V` spans whose word is not a known book.
    pub unrecognized: Vec<String>,
}

impl FileReport {
    pub fn changed(&self) -> bool {
        self.units_changed > 0
    }
}

/// Outcome of processing a directory.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Supported files in name order, with their result.
    pub processed: Vec<(PathBuf, Result<FileReport>)>,
    /// Files left alone: unsupported formats and earlier backups.
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &FileReport> {
        self.processed.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn failed(&self) -> usize {
        self.processed.iter().filter(|(_, r)| r.is_err()).count()
    }
}

/// Loaded configuration plus compiled patterns.
pub struct Session {
    settings: Settings,
    patterns: PatternSet,
    pool: Option<rayon::ThreadPool>,
}

impl Session {
    /// Load the abbreviation table and compile the patterns.
    pub fn new(settings: Settings) -> Result<Self> {
        let table = match &settings.abbreviations {
            Some(path) => AbbreviationTable::load(path)?,
            None => AbbreviationTable::default_table()?,
        };
        let patterns = PatternSet::with_options(&table, settings.compile.clone())?;
        let pool = settings
            .threads
            .map(|n| rayon::ThreadPoolBuilder::new().num_threads(n).build())
            .transpose()?;

        let source = match &settings.abbreviations {
            Some(path) => path.display().to_string(),
            None => "bundled".to_string(),
        };
        tracing::info!(
            books = table.len(),
            tokens = table.token_count(),
            %source,
            "abbreviation table loaded"
        );

        Ok(Self {
            settings,
            patterns,
            pool,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn rewrite_text(&self, text: &str) -> RewriteResult {
        rewrite(text, &self.patterns)
    }

    pub fn find_unrecognized(&self, text: &str) -> Vec<String> {
        find_unrecognized(text, &self.patterns)
    }

    fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Rewrite one file.
    ///
    /// With no `output` the file is rewritten in place, and only if
    /// something changed; a backup is taken first when enabled. An explicit
    /// `output` is always written. Dry runs write nothing.
    pub fn process_file(&self, path: &Path, output: Option<&Path>) -> Result<FileReport> {
        let format = Format::from_path(path)?;
        let bytes = std::fs::read(path)?;
        let mut container = format.open(&bytes)?;
        let results = self.install(|| rewrite_document(container.as_mut(), &self.patterns))?;

        let units_changed = results.iter().filter(|r| r.changed).count();
        let replacements: usize = results.iter().map(|r| r.replacements).sum();
        for (unit, result) in results.iter().enumerate().filter(|(_, r)| r.changed) {
            tracing::debug!(
                path = %path.display(),
                unit,
                replacements = result.replacements,
                "unit rewritten"
            );
        }

        let unrecognized = if self.settings.report_unrecognized {
            results
                .iter()
                .flat_map(|r| find_unrecognized(&r.original, &self.patterns))
                .collect()
        } else {
            Vec::new()
        };

        let target = match output {
            Some(out) => Some(out.to_path_buf()),
            None if units_changed > 0 => Some(path.to_path_buf()),
            None => None,
        };

        let mut backup = None;
        let mut written = None;
        match target {
            Some(_) if self.settings.dry_run => {
                tracing::info!(path = %path.display(), "dry run, not writing");
            }
            Some(target) => {
                let data = container.to_bytes()?;
                let in_place = target == path;
                if in_place && self.settings.backup {
                    backup = Some(create_backup(path)?);
                }
                std::fs::write(&target, data)?;
                written = Some(target);
            }
            None => {}
        }

        tracing::info!(
            path = %path.display(),
            format = %format,
            units = results.len(),
            changed = units_changed,
            replacements,
            "processed file"
        );

        Ok(FileReport {
            path: path.to_path_buf(),
            format,
            unit_kind: container.unit_kind(),
            units_processed: results.len(),
            units_changed,
            replacements,
            backup,
            output: written,
            unrecognized,
        })
    }

    /// Rewrite every supported file directly inside `dir`.
    ///
    /// Files are processed in parallel. A failure is recorded against its
    /// file and does not stop the batch. With `out_dir`, results are
    /// written there under their original names instead of in place.
    pub fn process_dir(&self, dir: &Path, out_dir: Option<&Path>) -> Result<BatchReport> {
        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if is_supported(&path) && !is_backup(&path) {
                files.push(path);
            } else {
                skipped.push(path);
            }
        }
        files.sort();
        skipped.sort();

        for path in &skipped {
            tracing::warn!(path = %path.display(), "skipping file");
        }
        if let Some(out_dir) = out_dir {
            std::fs::create_dir_all(out_dir)?;
        }

        let processed = self.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let output = out_dir.and_then(|d| path.file_name().map(|name| d.join(name)));
                    let result = self.process_file(path, output.as_deref());
                    if let Err(e) = &result {
                        tracing::warn!(path = %path.display(), error = %e, "failed to process file");
                    }
                    (path.clone(), result)
                })
                .collect()
        });

        Ok(BatchReport { processed, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_text() {
        let session = Session::new(Settings::default()).unwrap();
        let result = session.rewrite_text("read jn 3:16 today");
        assert_eq!(result.text, "read John 3:16 today");
        assert_eq!(result.replacements, 1);
    }

    #[test]
    fn test_bad_table_fails_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.csv");
        std::fs::write(&path, "Genesis,\"Gen\"\nExodus,\"Gen\"\n").unwrap();

        let err = Session::new(Settings::default().with_abbreviations(&path)).err().unwrap();
        assert!(matches!(
            err,
            crate::Error::Config(crate::ConfigError::ConflictingToken { line: 2, .. })
        ));
    }

    #[test]
    fn test_missing_table_fails_at_start() {
        let settings = Settings::default().with_abbreviations("/nonexistent/books.csv");
        assert!(matches!(
            Session::new(settings),
            Err(crate::Error::Config(crate::ConfigError::Unreadable { .. }))
        ));
    }

    #[test]
    fn test_custom_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.csv");
        std::fs::write(&path, "# test\nRevelation,\"Rev, Apoc\"\n").unwrap();

        let session = Session::new(Settings::default().with_abbreviations(&path)).unwrap();
        assert_eq!(session.patterns().table().len(), 1);
        assert_eq!(session.rewrite_text("apoc 21:4").text, "Revelation 21:4");
        assert_eq!(session.rewrite_text("gen 1:1").text, "gen 1:1");
    }

    #[test]
    fn test_dedicated_pool() {
        let session = Session::new(Settings::default().with_threads(2)).unwrap();
        assert!(session.pool.is_some());
        assert_eq!(session.rewrite_text("ps 23").text, "Psalms 23:1");
    }
}
