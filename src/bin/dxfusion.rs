//! dxfusion command-line front end
//!
//! Reads one case as JSON, diagnoses it and prints the report as JSON on
//! stdout. Logs go to stderr and are filtered by `RUST_LOG`.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dxfusion::{
    CaseData, DiagnosisEngine, DxError, EngineConfig, MorphologyFeatures, ValidationError,
};

/// CLI configuration
struct Args {
    /// Case JSON file
    case: PathBuf,
    /// Optional engine configuration JSON file
    config: Option<PathBuf>,
    /// Single-line JSON output
    compact: bool,
}

fn print_help() {
    println!("dxfusion - sarcoma diagnostic evidence fusion");
    println!();
    println!("USAGE:");
    println!("    dxfusion --case <FILE> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --case <FILE>         Case JSON (clinical, histology, ihc[, molecular])");
    println!("        --config <FILE>       Engine configuration JSON [default: built-in]");
    println!("        --compact             Print the report on a single line");
    println!("    -h, --help                Print help information");
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut case = None;
    let mut config = None;
    let mut compact = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--case" | "-c" => {
                if i + 1 < args.len() {
                    case = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --case requires a value");
                    std::process::exit(2);
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --config requires a value");
                    std::process::exit(2);
                }
            }
            "--compact" => {
                compact = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(2);
            }
        }
    }

    let Some(case) = case else {
        eprintln!("error: --case is required (see --help)");
        std::process::exit(2);
    };
    Args { case, config, compact }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn run(args: &Args) -> Result<String, DxError> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = DiagnosisEngine::with_config(config)?;

    let malformed = |reason: String| DxError::from(ValidationError::Malformed { reason });
    let raw = fs::read_to_string(&args.case)
        .map_err(|e| malformed(format!("failed to read {}: {e}", args.case.display())))?;
    let case: CaseData<MorphologyFeatures> = serde_json::from_str(&raw)
        .map_err(|e| malformed(format!("{}: {e}", args.case.display())))?;

    let report = engine.diagnose(&case)?;
    if report.requires_review() {
        warn!(
            case_id = %report.case_id,
            tier = %report.recommendation_tier,
            decision = %report.decision,
            "case flagged for review"
        );
    }
    let rendered = if args.compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    };
    rendered.map_err(|e| DxError::internal(format!("failed to render report: {e}")))
}

fn main() -> ExitCode {
    let args = parse_args();
    init_logging();

    match run(&args) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "diagnosis failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
