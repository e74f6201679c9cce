use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use comment_guard::responses::{collect_epa_comments, parse_records};
use comment_guard::summary::{check_report, EpaCheckSummary, REPORT_EPAS};
use comment_guard::{normalize, CommentAnalyzer, FaultReason, Lexicon};

#[derive(Parser)]
#[command(
    name = "comment-guard",
    about = "Flag low-quality rater comments in EPA evaluations",
    version
)]
struct Cli {
    /// Comment files, one comment per line (reads stdin if none provided)
    files: Vec<PathBuf>,

    /// JSON export of form result rows; prints per-EPA summaries
    #[arg(long, requires = "student", conflicts_with = "files")]
    responses: Option<PathBuf>,

    /// Student whose comments are checked in --responses mode
    #[arg(long)]
    student: Option<String>,

    /// TOML file overriding the built-in word lists
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv); ignored when RUST_LOG is set
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct EpaCheckOutput<'a> {
    epa: u32,
    #[serde(flatten)]
    summary: &'a EpaCheckSummary,
    top_reason: Option<FaultReason>,
    top_reason_label: Option<&'static str>,
}

/// `RUST_LOG`, when set, wins over `-v`.
fn log_filter(verbose: u8, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return EnvFilter::new(directives);
    }
    EnvFilter::new(match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })
}

fn init_logging(verbose: u8) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    // stdout carries the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, rust_log.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn comments_from(input: &str) -> Vec<String> {
    input
        .lines()
        .filter(|l| !normalize(l).is_empty())
        .map(str::to_string)
        .collect()
}

fn check_responses(analyzer: &CommentAnalyzer, path: &Path, student: &str) -> Result<()> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("Error reading {}", path.display()))?;
    let records = parse_records(&input)
        .with_context(|| format!("Error decoding form responses in {}", path.display()))?;
    debug!(records = records.len(), student, "decoded form responses");

    let per_epa = collect_epa_comments(&records, student, REPORT_EPAS);
    let summaries = check_report(analyzer, &per_epa);
    let output: Vec<EpaCheckOutput> = summaries
        .iter()
        .map(|(epa, summary)| {
            let top_reason = summary.top_reason();
            EpaCheckOutput {
                epa: *epa,
                summary,
                top_reason,
                top_reason_label: top_reason.map(FaultReason::label),
            }
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let lexicon = match &cli.lexicon {
        Some(path) => Lexicon::load(path)
            .with_context(|| format!("Error loading lexicon {}", path.display()))?,
        None => Lexicon::default(),
    };
    let analyzer = CommentAnalyzer::new(lexicon).context("Error compiling lexicon")?;

    if let Some(path) = &cli.responses {
        let student = cli.student.as_deref().unwrap_or_default();
        return check_responses(&analyzer, path, student);
    }

    if cli.files.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read stdin")?;
        let report = analyzer.analyze(&comments_from(&input));
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for path in &cli.files {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Error reading {}", path.display()))?;
            let report = analyzer.analyze(&comments_from(&text));
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_sets_level_without_rust_log() {
        assert_eq!(log_filter(0, None).to_string(), "warn");
        assert_eq!(log_filter(2, None).to_string(), "debug");
        assert_eq!(log_filter(9, Some("  ")).to_string(), "trace");
    }

    #[test]
    fn rust_log_overrides_verbosity() {
        assert_eq!(log_filter(0, Some("debug")).to_string(), "debug");
        assert_eq!(
            log_filter(3, Some("comment_guard=info")).to_string(),
            "comment_guard=info"
        );
    }

    #[test]
    fn blank_lines_and_byte_order_marks_are_not_comments() {
        let comments = comments_from("\u{feff}good\n\n  \n\u{feff}\nfine\n");
        assert_eq!(comments, vec!["\u{feff}good", "fine"]);
    }
}
