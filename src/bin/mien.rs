//! Mien CLI - Command-line interface for Mien
//!
//! Commands:
//! - analyze: Analyze a recorded batch of landmark frames (batch mode)
//! - run: Analyze landmark frames streamed over stdin (streaming mode)
//! - validate: Check landmark frames against the required landmark set
//! - schema: Print wire format information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

use mien::engine::AnalysisEngine;
use mien::geometry::GeometryClassifier;
use mien::landmarks::REQUIRED_LANDMARKS;
use mien::narrative::RuleBasedNarrator;
use mien::pipeline::analyze_with_provider;
use mien::types::{BatchPolicy, FrameBatch, LandmarkFrame, SessionOutcome};
use mien::ENGINE_VERSION;

/// Mien - Engagement analytics engine for facial landmark session streams
#[derive(Parser)]
#[command(name = "mien")]
#[command(author = "Mien Labs")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Turn facial landmark streams into engagement timelines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a recorded batch of landmark frames (batch mode)
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// How to treat frames with missing landmarks
        #[arg(long, default_value = "abort")]
        policy: Policy,

        /// Session ID to stamp on the outcome (overrides the batch envelope)
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Analyze landmark frames streamed over stdin (streaming mode)
    Run {
        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// How to treat frames with missing landmarks
        #[arg(long, default_value = "abort")]
        policy: Policy,

        /// Session ID for the streamed session
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Check landmark frames against the required landmark set
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print wire format information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Frame batch object with an optional session_id
    Json,
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON on a single line
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Plain-text narrative report only
    Report,
}

#[derive(Clone, ValueEnum)]
enum Policy {
    /// Reject the whole batch on the first invalid frame
    Abort,
    /// Drop invalid frames and analyze the rest
    Skip,
}

impl From<Policy> for BatchPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Abort => BatchPolicy::AbortOnError,
            Policy::Skip => BatchPolicy::SkipInvalid,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (frame batch)
    Input,
    /// Output schema (session outcome)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), MienCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            input_format,
            output_format,
            policy,
            session_id,
        } => cmd_analyze(&input, &output, input_format, output_format, policy, session_id),

        Commands::Run {
            output_format,
            policy,
            session_id,
        } => cmd_run(output_format, policy, session_id),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema { schema_type, json_schema } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_analyze(
    input: &PathBuf,
    output: &PathBuf,
    input_format: InputFormat,
    output_format: OutputFormat,
    policy: Policy,
    session_id: Option<String>,
) -> Result<(), MienCliError> {
    // Read input
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    // Parse frames
    let batch = parse_frames(&input_data, input_format)?;

    if batch.frames.is_empty() {
        return Err(MienCliError::NoFrames);
    }

    let session_id = session_id
        .or(batch.session_id)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = analyze_with_provider(&session_id, &batch.frames, policy.into(), &RuleBasedNarrator)?;

    // Write output
    let output_data = format_output(&outcome, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    output_format: OutputFormat,
    policy: Policy,
    session_id: Option<String>,
) -> Result<(), MienCliError> {
    let engine = AnalysisEngine::with_policy(policy.into());
    let session_id = session_id.unwrap_or_else(|| engine.open_session());

    if atty::is(atty::Stream::Stdin) {
        eprintln!("mien: reading landmark frames from stdin (one JSON object per line, Ctrl-D to finish)");
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        // Parse the frame
        let frame: LandmarkFrame = serde_json::from_str(trimmed).map_err(|e| {
            MienCliError::ParseError(format!("Failed to parse frame: {}", e))
        })?;

        engine.submit_frames(&session_id, &[frame])?;
    }

    // Finalize once stdin closes
    let outcome = engine.finalize_session(&session_id);
    let output = format_output(&outcome, &output_format)?;

    write!(stdout, "{}", output)?;
    stdout.flush()?;

    Ok(())
}

fn cmd_validate(
    input: &PathBuf,
    input_format: InputFormat,
    json: bool,
) -> Result<(), MienCliError> {
    // Read input
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    // Parse frames
    let batch = parse_frames(&input_data, input_format)?;

    // Classify each frame and collect the rejects
    let mut errors: Vec<ValidationErrorDetail> = Vec::new();

    for (index, frame) in batch.frames.iter().enumerate() {
        if let Err(e) = GeometryClassifier::classify(frame) {
            errors.push(ValidationErrorDetail {
                index,
                timestamp_ms: frame.timestamp_ms,
                error: e.to_string(),
            });
        }
    }

    let report = ValidationReport {
        total_frames: batch.frames.len(),
        valid_frames: batch.frames.len() - errors.len(),
        invalid_frames: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Frame at {}ms (index {}): {}",
                    err.timestamp_ms, err.index, err.error
                );
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(MienCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), MienCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: frame batch");
                println!();
                println!("A frame batch is a JSON object with two fields:");
                println!();
                println!("- session_id: optional session identifier (one is generated if absent)");
                println!("- frames: array of landmark frames, in any order");
                println!();
                println!("Each landmark frame contains:");
                println!();
                println!("- timestamp_ms: capture time in milliseconds");
                println!("- landmarks: map of named points, each {{ x, y }} with an optional z");
                println!();
                println!("Required landmark names:");
                for name in REQUIRED_LANDMARKS {
                    println!("  - {}", name);
                }
                println!();
                println!("Extra landmark names are accepted and ignored.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: session outcome");
                println!();
                println!("A session outcome contains:");
                println!();
                println!("- session_id: the analyzed session");
                println!("- producer: {{ name, version, instance_id }}");
                println!("- frame_count: frames aggregated into the timeline");
                println!("- observed_at_utc: capture time of the earliest frame");
                println!("- computed_at_utc: when the analysis ran");
                println!("- timeline: array of five-second windows containing:");
                println!("  - time_range: window label, e.g. \"0-5s\"");
                println!("  - state: Distracted | Enthusiastic | Contemplative | Neutral");
                println!("  - metrics: {{ looking_away_pct, smiling_pct }}");
                println!("- report: narrative interpretation of the timeline");
            }
        }
    }

    Ok(())
}

// Helper functions

fn parse_frames(input_data: &str, input_format: InputFormat) -> Result<FrameBatch, MienCliError> {
    match input_format {
        InputFormat::Json => {
            let batch: FrameBatch = serde_json::from_str(input_data)?;
            Ok(batch)
        }
        InputFormat::Ndjson => {
            let mut frames: Vec<LandmarkFrame> = Vec::new();

            for (number, line) in input_data.lines().enumerate() {
                let trimmed = line.trim();

                if trimmed.is_empty() {
                    continue;
                }

                let frame: LandmarkFrame = serde_json::from_str(trimmed).map_err(|e| {
                    MienCliError::ParseError(format!("line {}: {}", number + 1, e))
                })?;
                frames.push(frame);
            }

            Ok(FrameBatch {
                session_id: None,
                frames,
            })
        }
    }
}

fn format_output(outcome: &SessionOutcome, format: &OutputFormat) -> Result<String, MienCliError> {
    match format {
        OutputFormat::Json => {
            let mut line = serde_json::to_string(outcome)?;
            line.push('\n');
            Ok(line)
        }
        OutputFormat::JsonPretty => {
            let mut body = serde_json::to_string_pretty(outcome)?;
            body.push('\n');
            Ok(body)
        }
        OutputFormat::Report => Ok(format!("{}\n", outcome.report)),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://mienlabs.io/schemas/frame_batch.json",
        "title": "FrameBatch",
        "description": "Batch of facial landmark frames for one session",
        "type": "object",
        "required": ["frames"],
        "properties": {
            "session_id": { "type": "string" },
            "frames": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["timestamp_ms", "landmarks"],
                    "properties": {
                        "timestamp_ms": { "type": "integer" },
                        "landmarks": {
                            "type": "object",
                            "additionalProperties": {
                                "type": "object",
                                "required": ["x", "y"],
                                "properties": {
                                    "x": { "type": "number" },
                                    "y": { "type": "number" },
                                    "z": { "type": "number" }
                                }
                            }
                        }
                    }
                }
            }
        }
    }).to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://mienlabs.io/schemas/session_outcome.json",
        "title": "SessionOutcome",
        "description": "Finalized engagement analysis for one session",
        "type": "object",
        "required": ["session_id", "producer", "frame_count", "computed_at_utc", "timeline", "report"],
        "properties": {
            "session_id": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "frame_count": { "type": "integer" },
            "observed_at_utc": { "type": "string", "format": "date-time" },
            "computed_at_utc": { "type": "string", "format": "date-time" },
            "timeline": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["time_range", "state", "metrics"],
                    "properties": {
                        "time_range": { "type": "string" },
                        "state": {
                            "type": "string",
                            "enum": ["Distracted", "Enthusiastic", "Contemplative", "Neutral"]
                        },
                        "metrics": {
                            "type": "object",
                            "properties": {
                                "looking_away_pct": { "type": "number" },
                                "smiling_pct": { "type": "number" }
                            }
                        }
                    }
                }
            },
            "report": { "type": "string" }
        }
    }).to_string()
}

// Error types

#[derive(Debug)]
enum MienCliError {
    Io(io::Error),
    Analysis(mien::AnalysisError),
    Json(serde_json::Error),
    NoFrames,
    ValidationFailed(usize),
    ParseError(String),
}

impl From<io::Error> for MienCliError {
    fn from(e: io::Error) -> Self {
        MienCliError::Io(e)
    }
}

impl From<mien::AnalysisError> for MienCliError {
    fn from(e: mien::AnalysisError) -> Self {
        MienCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for MienCliError {
    fn from(e: serde_json::Error) -> Self {
        MienCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MienCliError> for CliError {
    fn from(e: MienCliError) -> Self {
        match e {
            MienCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MienCliError::Analysis(e) => CliError {
                code: "ANALYSIS_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'mien validate' on the input for details".to_string()),
            },
            MienCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            MienCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No landmark frames found in input".to_string(),
                hint: Some("Ensure input contains at least one frame".to_string()),
            },
            MienCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix the reported frames and retry".to_string()),
            },
            MienCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp_ms: i64,
    error: String,
}
