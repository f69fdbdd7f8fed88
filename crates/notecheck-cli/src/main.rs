//! Notecheck CLI
//!
//! Command-line interface for compliance note gap assessment.
//!
//! ## Usage
//!
//! ```bash
//! # Assess a note against the built-in FCA checklist
//! notecheck evaluate note.txt --config notecheck.yaml
//!
//! # Pipe from stdin, annual review profile, JSON output
//! cat note.txt | notecheck evaluate --meeting-type annual_review --format json
//!
//! # Assess every row of a CSV export
//! notecheck batch notes.csv --output results.csv
//!
//! # Inspect checklists
//! notecheck checklist list
//! notecheck checklist show fca_suitability_v1 --meeting-type ad_hoc_call
//! ```
//!
//! ## Exit Codes
//!
//! - 0: Passed (batch: every note passed)
//! - 1: Failed (batch: at least one note failed or errored)
//! - 2: Error (batch: nothing could be evaluated)

mod format;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use notecheck_core::{builtin_ids, resolve_checklist, Checklist, SummaryDocument};
use notecheck_runtime::{AssessmentOrchestrator, AssessmentRequest, RuntimeConfig};

use crate::format::{render_batch_table, render_report, BatchRow, Palette};

const DEFAULT_CHECKLIST: &str = "fca_suitability_v1";

/// Notecheck: gap assessment for compliance notes
#[derive(Parser)]
#[command(name = "notecheck")]
#[command(version)]
#[command(about = "Assess compliance notes against regulatory checklists", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a single note
    Evaluate {
        /// Path to the note (reads from stdin if not provided)
        note: Option<PathBuf>,

        #[command(flatten)]
        assessment: AssessmentArgs,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Also write the JSON report document to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Caller metadata recorded in the report (repeatable, KEY=VALUE)
        #[arg(long = "metadata", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },

    /// Assess every note in a CSV file
    Batch {
        /// CSV with a `text` or `note` column
        input: PathBuf,

        #[command(flatten)]
        assessment: AssessmentArgs,

        /// Write results to a .csv or .json file instead of printing a table
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Checklist commands
    Checklist {
        #[command(subcommand)]
        action: ChecklistAction,
    },
}

/// Options shared by `evaluate` and `batch`.
#[derive(Args)]
struct AssessmentArgs {
    /// Built-in checklist id or path to a checklist file
    #[arg(short, long, default_value = DEFAULT_CHECKLIST)]
    checklist: String,

    /// Meeting type whose overrides apply
    #[arg(short, long)]
    meeting_type: Option<String>,

    /// Runtime configuration file (YAML or JSON)
    #[arg(long, env = "NOTECHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Provider type (anthropic, openai)
    #[arg(long)]
    provider: Option<String>,

    /// Model id
    #[arg(long)]
    model: Option<String>,

    /// Capture reviewer notes on each element
    #[arg(short, long)]
    verbose: bool,

    /// Redact PII from the note before assessment
    #[arg(long)]
    redact_pii: bool,

    /// Elements assessed in parallel
    #[arg(long)]
    concurrency: Option<usize>,

    /// Explicit timestamp for deterministic reports (RFC 3339).
    /// Example: --evaluated-at 2025-12-20T00:00:00Z
    #[arg(long, value_parser = parse_datetime)]
    evaluated_at: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
enum ChecklistAction {
    /// Validate a checklist
    Validate {
        /// Built-in id or path
        reference: String,
    },

    /// Show checklist elements
    Show {
        /// Built-in id or path
        reference: String,

        /// Show the effective elements for this meeting type
        #[arg(short, long)]
        meeting_type: Option<String>,
    },

    /// List built-in checklists, or checklist files in a directory
    List {
        /// Directory containing checklists
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Summary,
}

/// Parse ISO 8601 / RFC 3339 datetime string to DateTime<Utc>.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid datetime format: {}. Expected RFC 3339 (e.g., 2025-12-20T00:00:00Z)", e))
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run().await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            note,
            assessment,
            format,
            output,
            metadata,
        } => evaluate_command(note, assessment, format, output, metadata).await,

        Commands::Batch {
            input,
            assessment,
            output,
        } => batch_command(input, assessment, output).await,

        Commands::Checklist { action } => match action {
            ChecklistAction::Validate { reference } => validate_checklist(&reference),
            ChecklistAction::Show {
                reference,
                meeting_type,
            } => show_checklist(&reference, meeting_type.as_deref()),
            ChecklistAction::List { path } => list_checklists(path),
        },
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn load_config(args: &AssessmentArgs) -> Result<RuntimeConfig> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => RuntimeConfig::default(),
    };

    if let Some(provider) = &args.provider {
        config.provider.provider_type = provider.clone();
    }
    if let Some(model) = &args.model {
        config.provider.model_id = model.clone();
    }
    if args.verbose {
        config.verbose = true;
    }
    if args.redact_pii {
        config.redact_pii = true;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(evaluated_at) = args.evaluated_at {
        config.determinism.evaluated_at = Some(evaluated_at);
    }

    Ok(config)
}

fn prepare(args: &AssessmentArgs) -> Result<(AssessmentOrchestrator, Checklist)> {
    let checklist = resolve_checklist(&args.checklist)
        .with_context(|| format!("Failed to load checklist '{}'", args.checklist))?;
    let config = load_config(args)?;
    let orchestrator = AssessmentOrchestrator::from_config(config).context("Invalid configuration")?;
    Ok((orchestrator, checklist))
}

fn base_request(args: &AssessmentArgs) -> AssessmentRequest {
    AssessmentRequest {
        meeting_type: args.meeting_type.clone(),
        ..AssessmentRequest::default()
    }
}

async fn evaluate_command(
    note_path: Option<PathBuf>,
    args: AssessmentArgs,
    format: OutputFormat,
    output: Option<PathBuf>,
    metadata: Vec<(String, String)>,
) -> Result<ExitCode> {
    let (orchestrator, checklist) = prepare(&args)?;

    let note = match note_path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read note from {:?}", path))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            buffer
        }
    };
    if note.trim().is_empty() {
        bail!("Note is empty");
    }

    let mut request = base_request(&args);
    request.metadata.extend(metadata);

    let report = orchestrator
        .assess(&note, &checklist, &request)
        .await
        .context("Assessment failed")?;

    if let Some(path) = &output {
        std::fs::write(path, report.to_json_pretty()?)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
    }

    match format {
        OutputFormat::Text => print!("{}", render_report(&report, Palette::detect())),
        OutputFormat::Json => println!("{}", report.to_json_pretty()?),
        OutputFormat::Summary => {
            println!("{}", serde_json::to_string_pretty(&SummaryDocument::from(&report))?)
        }
    }

    Ok(if report.passed {
        ExitCode::from(0)
    } else {
        ExitCode::from(1)
    })
}

/// Columns carried from the input CSV into report metadata.
const CARRIED_COLUMNS: [&str; 4] = ["adviser", "adviser_id", "date", "reference"];

struct BatchInput {
    note_id: String,
    text: String,
    metadata: BTreeMap<String, String>,
}

fn read_batch_input(path: &Path) -> Result<Vec<BatchInput>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));

    let text_column = column("text")
        .or_else(|| column("note"))
        .with_context(|| format!("{:?} has no 'text' or 'note' column", path))?;
    let id_column = column("note_id").or_else(|| column("id"));
    let carried: Vec<(&str, usize)> = CARRIED_COLUMNS
        .iter()
        .filter_map(|name| column(name).map(|index| (*name, index)))
        .collect();

    let mut inputs = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV row {}", row + 1))?;
        let note_id = id_column
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("row-{}", row + 1));

        let text = record.get(text_column).unwrap_or("").trim().to_string();
        if text.is_empty() {
            tracing::warn!(note_id = %note_id, "Skipping row with empty note text");
            continue;
        }

        let metadata = carried
            .iter()
            .filter_map(|(name, index)| {
                record
                    .get(*index)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (name.to_string(), v.trim().to_string()))
            })
            .collect();

        inputs.push(BatchInput {
            note_id,
            text,
            metadata,
        });
    }

    Ok(inputs)
}

#[derive(Serialize)]
struct BatchCsvRecord<'a> {
    note_id: &'a str,
    adviser: Option<&'a str>,
    adviser_id: Option<&'a str>,
    date: Option<&'a str>,
    reference: Option<&'a str>,
    passed: Option<bool>,
    overall_score: Option<f64>,
    overall_rating: Option<&'static str>,
    gaps: Option<usize>,
    critical_gaps: Option<usize>,
    error: Option<&'a str>,
}

impl<'a> BatchCsvRecord<'a> {
    fn new(row: &'a BatchRow, metadata: &'a BTreeMap<String, String>) -> Self {
        let field = |key: &str| metadata.get(key).map(String::as_str);
        let report = row.outcome.as_ref().ok();

        Self {
            note_id: &row.note_id,
            adviser: field("adviser"),
            adviser_id: field("adviser_id"),
            date: field("date"),
            reference: field("reference"),
            passed: report.map(|r| r.passed),
            overall_score: report.map(|r| r.overall_score),
            overall_rating: report.map(|r| r.overall_rating.label()),
            gaps: report.map(|r| r.stats.gap_count()),
            critical_gaps: report.map(|r| r.stats.critical_gaps),
            error: row.outcome.as_ref().err().map(String::as_str),
        }
    }
}

async fn batch_command(input: PathBuf, args: AssessmentArgs, output: Option<PathBuf>) -> Result<ExitCode> {
    let (orchestrator, checklist) = prepare(&args)?;
    let inputs = read_batch_input(&input)?;
    if inputs.is_empty() {
        eprintln!("No notes to evaluate in {:?}", input);
        return Ok(ExitCode::from(2));
    }

    let mut rows = Vec::with_capacity(inputs.len());
    for note in &inputs {
        let mut request = base_request(&args);
        request.metadata = note.metadata.clone();
        request.metadata.insert("note_id".to_string(), note.note_id.clone());

        let outcome = orchestrator
            .assess(&note.text, &checklist, &request)
            .await
            .map_err(|e| {
                tracing::warn!(note_id = %note.note_id, error = %e, "Note assessment failed");
                e.to_string()
            });
        rows.push(BatchRow {
            note_id: note.note_id.clone(),
            outcome,
        });
    }

    match &output {
        Some(path) if has_extension(path, "json") => {
            let documents = rows
                .iter()
                .map(|row| match &row.outcome {
                    Ok(report) => serde_json::to_value(report.to_document()),
                    Err(error) => Ok(serde_json::json!({ "note_id": row.note_id, "error": error })),
                })
                .collect::<Result<Vec<_>, _>>()?;
            std::fs::write(path, serde_json::to_string_pretty(&documents)?)
                .with_context(|| format!("Failed to write {:?}", path))?;
        }
        Some(path) => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("Failed to create {:?}", path))?;
            for (row, note) in rows.iter().zip(&inputs) {
                writer.serialize(BatchCsvRecord::new(row, &note.metadata))?;
            }
            writer.flush()?;
        }
        None => print!("{}", render_batch_table(&rows, Palette::detect())),
    }

    let evaluated = rows.iter().filter(|r| r.outcome.is_ok()).count();
    let all_passed = rows
        .iter()
        .all(|r| r.outcome.as_ref().map(|report| report.passed).unwrap_or(false));

    eprintln!("Evaluated {} of {} notes", evaluated, rows.len());

    Ok(if evaluated == 0 {
        ExitCode::from(2)
    } else if all_passed {
        ExitCode::from(0)
    } else {
        ExitCode::from(1)
    })
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn validate_checklist(reference: &str) -> Result<ExitCode> {
    match resolve_checklist(reference) {
        Ok(c) => {
            println!("Checklist is valid: {}", c.name);
            println!();
            println!("Id: {}", c.id);
            println!("Version: {}", c.version);
            println!("Regulator: {}", c.regulator);
            println!("Elements: {} ({} required)", c.elements.len(), c.required_count());
            Ok(ExitCode::from(0))
        }
        Err(e) => {
            eprintln!("Checklist validation failed: {}", e);
            Ok(ExitCode::from(1))
        }
    }
}

fn show_checklist(reference: &str, meeting_type: Option<&str>) -> Result<ExitCode> {
    let checklist = resolve_checklist(reference)
        .with_context(|| format!("Failed to load checklist '{}'", reference))?;
    let effective = checklist.apply_meeting_type(meeting_type);
    if let (Some(requested), None) = (meeting_type, &effective.meeting_type) {
        eprintln!("Unknown meeting type '{}'; showing base checklist", requested);
    }

    println!("Checklist: {} ({})", checklist.name, checklist.id);
    println!("Version: {}", checklist.version);
    println!("Regulator: {}", checklist.regulator);
    if let Some(description) = &checklist.description {
        println!("Description: {}", description.trim());
    }
    let meeting_types: Vec<&str> = checklist.meeting_types().collect();
    if !meeting_types.is_empty() {
        println!("Meeting types: {}", meeting_types.join(", "));
    }
    if let Some(applied) = &effective.meeting_type {
        println!("Showing: {}", applied);
    }
    println!();

    println!("Elements:");
    for element in &effective.checklist.elements {
        let requirement = if element.required { "required" } else { "optional" };
        println!(
            "  [{}] {} - {} ({})",
            element.severity.as_str().to_uppercase(),
            element.id,
            element.display_name(),
            requirement
        );
        println!("      {}", element.description.trim());
    }

    Ok(ExitCode::from(0))
}

fn list_checklists(path: Option<PathBuf>) -> Result<ExitCode> {
    let Some(path) = path else {
        for id in builtin_ids() {
            match resolve_checklist(id) {
                Ok(c) => println!("{}: {} (v{}, {} elements)", id, c.name, c.version, c.elements.len()),
                Err(e) => eprintln!("{}: INVALID - {}", id, e),
            }
        }
        return Ok(ExitCode::from(0));
    };

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&path)
        .with_context(|| format!("Failed to read directory {:?}", path))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| ["yaml", "yml", "json"].iter().any(|ext| has_extension(p, ext)))
        .collect();
    entries.sort();

    let mut found = false;
    for entry in entries {
        let file_name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let loaded = if has_extension(&entry, "json") {
            Checklist::from_json_file(&entry)
        } else {
            Checklist::from_yaml_file(&entry)
        };

        match loaded {
            Ok(c) => {
                println!("{}: {} (v{})", file_name, c.name, c.version);
                found = true;
            }
            Err(e) => eprintln!("{}: INVALID - {}", file_name, e),
        }
    }

    if !found {
        println!("No checklists found in {:?}", path);
    }

    Ok(ExitCode::from(0))
}
