//! Session configuration.

use std::path::PathBuf;

use crate::pattern::CompileOptions;

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Abbreviation table to load. `None` uses the bundled table.
    pub abbreviations: Option<PathBuf>,
    /// Copy a file before overwriting it in place. Default is true.
    pub backup: bool,
    /// Report what would change without writing anything.
    pub dry_run: bool,
    /// Worker threads for rewriting. `None` uses rayon's global pool.
    pub threads: Option<usize>,
    /// Collect `Word C:V` spans with unknown books into reports.
    pub report_unrecognized: bool,
    pub compile: CompileOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            abbreviations: None,
            backup: true,
            dry_run: false,
            threads: None,
            report_unrecognized: false,
            compile: CompileOptions::default(),
        }
    }
}

impl Settings {
    pub fn with_abbreviations(mut self, path: impl Into<PathBuf>) -> Self {
        self.abbreviations = Some(path.into());
        self
    }

    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Zero means "use the global pool".
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = (threads > 0).then_some(threads);
        self
    }

    pub fn with_report_unrecognized(mut self, report: bool) -> Self {
        self.report_unrecognized = report;
        self
    }

    pub fn with_ambiguous_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compile.ambiguous_words = words.into_iter().map(Into::into).collect();
        self
    }
}
