//! scriptref - Normalize scripture references

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use scriptref::{BatchReport, FileReport, Session, Settings};

#[derive(Parser)]
#[command(name = "scriptref")]
#[command(version, about = "Normalize scripture references to Book Chapter:Verse", long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["path", "text"])))]
#[command(after_help = "EXAMPLES:
    scriptref sermon.docx               Rewrite in place, keeping a backup
    scriptref notes/ -o cleaned/        Rewrite every file of notes/ into cleaned/
    scriptref --text \"see jn 3:16\"      Rewrite a string and print it
    scriptref --dry-run --json page.html")]
struct Cli {
    /// File or directory to rewrite (TXT, MD, HTML, DOCX)
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Rewrite TEXT and print the result
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,

    /// Write results here instead of in place (a directory when PATH is one)
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,

    /// Do not keep a backup of files rewritten in place
    #[arg(long)]
    no_backup: bool,

    /// Abbreviation table to use instead of the bundled one
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Report changes without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// List citations whose book is not in the table
    #[arg(long)]
    report_unmatched: bool,

    /// Worker threads (0 = one per core)
    #[arg(short = 'j', long, value_name = "N", default_value_t = 0)]
    jobs: usize,

    /// Log each rewritten unit
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG overrides; -v => debug, -q => errors only
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "scriptref=debug"
        } else if cli.quiet {
            "scriptref=error"
        } else {
            "scriptref=warn"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> scriptref::Result<ExitCode> {
    let mut settings = Settings::default()
        .with_backup(!cli.no_backup)
        .with_dry_run(cli.dry_run)
        .with_threads(cli.jobs)
        .with_report_unrecognized(cli.report_unmatched);
    if let Some(csv) = &cli.csv {
        settings = settings.with_abbreviations(csv);
    }
    let session = Session::new(settings)?;

    match (&cli.text, &cli.path) {
        (Some(text), _) => {
            rewrite_text(&session, text, cli);
            Ok(ExitCode::SUCCESS)
        }
        (None, Some(path)) if path.is_dir() => {
            let report = session.process_dir(path, cli.output.as_deref())?;
            Ok(show_batch(&report, cli))
        }
        (None, Some(path)) => {
            let report = session.process_file(path, cli.output.as_deref())?;
            show_file(&report, cli);
            Ok(ExitCode::SUCCESS)
        }
        (None, None) => Ok(ExitCode::SUCCESS),
    }
}

#[derive(Serialize)]
struct TextSummary<'a> {
    original: &'a str,
    text: &'a str,
    changed: bool,
    replacements: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unrecognized: Vec<String>,
}

#[derive(Serialize)]
struct FileSummary<'a> {
    path: String,
    format: &'static str,
    unit_kind: String,
    units_processed: usize,
    units_changed: usize,
    replacements: usize,
    backup: Option<String>,
    output: Option<String>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    unrecognized: &'a [String],
}

impl<'a> From<&'a FileReport> for FileSummary<'a> {
    fn from(report: &'a FileReport) -> Self {
        Self {
            path: report.path.display().to_string(),
            format: report.format.name(),
            unit_kind: report.unit_kind.to_string(),
            units_processed: report.units_processed,
            units_changed: report.units_changed,
            replacements: report.replacements,
            backup: report.backup.as_deref().map(display),
            output: report.output.as_deref().map(display),
            unrecognized: &report.unrecognized,
        }
    }
}

#[derive(Serialize)]
struct Failure {
    path: String,
    error: String,
}

#[derive(Serialize)]
struct BatchSummary<'a> {
    files: Vec<FileSummary<'a>>,
    failed: Vec<Failure>,
    skipped: Vec<String>,
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: {e}"),
    }
}

fn rewrite_text(session: &Session, text: &str, cli: &Cli) {
    let result = session.rewrite_text(text);
    let unrecognized = if cli.report_unmatched {
        session.find_unrecognized(text)
    } else {
        Vec::new()
    };

    if cli.json {
        print_json(&TextSummary {
            original: &result.original,
            text: &result.text,
            changed: result.changed,
            replacements: result.replacements,
            unrecognized,
        });
        return;
    }

    println!("{}", result.text);
    for span in &unrecognized {
        eprintln!("unmatched: {span}");
    }
}

fn show_file(report: &FileReport, cli: &Cli) {
    if cli.json {
        print_json(&FileSummary::from(report));
        return;
    }
    if cli.quiet {
        return;
    }

    println!(
        "{}: {} of {} {}s changed, {} replacements{}",
        report.path.display(),
        report.units_changed,
        report.units_processed,
        report.unit_kind,
        report.replacements,
        if cli.dry_run { " (dry run)" } else { "" }
    );
    if let Some(backup) = &report.backup {
        println!("  backup: {}", backup.display());
    }
    if let Some(output) = &report.output
        && output != &report.path
    {
        println!("  written: {}", output.display());
    }
    for span in &report.unrecognized {
        println!("  unmatched: {span}");
    }
}

fn show_batch(report: &BatchReport, cli: &Cli) -> ExitCode {
    let code = if report.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    };

    if cli.json {
        print_json(&BatchSummary {
            files: report.succeeded().map(FileSummary::from).collect(),
            failed: report
                .processed
                .iter()
                .filter_map(|(path, result)| {
                    result.as_ref().err().map(|e| Failure {
                        path: display(path),
                        error: e.to_string(),
                    })
                })
                .collect(),
            skipped: report.skipped.iter().map(|p| display(p)).collect(),
        });
        return code;
    }

    for (path, result) in &report.processed {
        match result {
            Ok(file) => show_file(file, cli),
            Err(e) => eprintln!("error: {}: {e}", path.display()),
        }
    }
    if !cli.quiet {
        for path in &report.skipped {
            println!("skipped: {}", path.display());
        }
        let changed = report.succeeded().filter(|f| f.changed()).count();
        println!(
            "{} files processed, {} changed, {} failed, {} skipped",
            report.processed.len(),
            changed,
            report.failed(),
            report.skipped.len()
        );
    }
    code
}
