use chrono::NaiveDate;
use clap::Parser;
use log::{error, info, warn};
use mrzscan::{
    models::ProcessingResult,
    processing::{build_engine, DirectorySink, OcrEngine},
    CountryCodes, DocumentImage, PassportError, PassportValidator, PipelineConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Read and validate the machine-readable zone of passport images.
///
/// Several inputs are treated as candidate pages of one document; the first
/// page that decodes is reported.
#[derive(Parser)]
#[command(name = "mrzscan", version)]
struct Args {
    /// Image files to process, in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the JSON report here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pipeline configuration (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Country-code table: a JSON array or one code per line.
    #[arg(long)]
    country_codes: Option<PathBuf>,

    /// Save intermediate images as debug_<stage>.png in this directory.
    #[arg(short, long)]
    debug_dir: Option<PathBuf>,

    /// Include the region box and recognized text in the report.
    #[arg(long)]
    diagnostics: bool,

    /// Also print a human-readable report to stderr.
    #[arg(long)]
    summary: bool,
}

fn display_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

fn print_summary(result: &ProcessingResult) {
    eprintln!("\n===============================================");
    eprintln!("      PASSPORT MRZ REPORT");
    eprintln!("===============================================\n");

    match result {
        ProcessingResult::Success { record, verdict, .. } => {
            eprintln!("PASSPORT INFORMATION:");
            eprintln!("  Document Type: {}", record.document_type);
            eprintln!("  Issuing Country: {}", record.issuing_country);
            eprintln!("  Passport Number: {}", record.passport_number);
            eprintln!("  Name: {}", record.full_name());
            eprintln!("  Nationality: {}", record.nationality);
            eprintln!("  Date of Birth: {}", display_date(record.date_of_birth));
            eprintln!("  Sex: {}", record.sex.as_char());
            eprintln!("  Date of Expiry: {}", display_date(record.date_of_expiry));
            eprintln!("  Personal Number: {}", record.personal_number.as_deref().unwrap_or("-"));

            eprintln!("\nCHECK DIGITS:");
            for (name, ok) in record.check_digits.iter() {
                eprintln!("  {}: {}", name, if ok { "PASSED" } else { "FAILED" });
            }

            if !verdict.issues.is_empty() {
                eprintln!("\nISSUES FOUND:");
                for issue in &verdict.issues {
                    eprintln!("  - [{:?}] {}", issue.issue_type, issue.message);
                }
            }

            eprintln!(
                "\nPassport validation result: {}",
                if verdict.is_valid { "VALID" } else { "INVALID" }
            );
        }
        ProcessingResult::Failure { stage, reason } => {
            eprintln!("Processing failed at {} stage: {}", stage, reason);
        }
    }
}

fn run(args: &Args) -> Result<ProcessingResult, PassportError> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    let countries = match &args.country_codes {
        Some(path) => CountryCodes::load(path)?,
        None => CountryCodes::iso3166_alpha3(),
    };
    info!("Loaded {} country codes", countries.len());

    let engine = build_engine(&config.engine)?;
    info!("Using OCR engine {}", engine.name());

    let mut validator = PassportValidator::from_config(&config, engine, Arc::new(countries));
    if args.diagnostics {
        validator = validator.with_diagnostics(true);
    }
    if let Some(dir) = &args.debug_dir {
        validator = validator.with_debug_sink(Arc::new(DirectorySink::new(dir)?));
    }

    let images = args.inputs.iter().filter_map(|path| match DocumentImage::open(path) {
        Ok(image) => {
            info!("Processing {}", path.display());
            Some(image)
        }
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            None
        }
    });
    Ok(validator.process_candidates(images))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = match run(&args) {
        Ok(result) => result,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.summary {
        print_summary(&result);
    }

    let report = match serde_json::to_string_pretty(&result.to_report()) {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to serialize report: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, report + "\n") {
                error!("Failed to write {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
        None => println!("{}", report),
    }

    if result.is_valid_passport() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
