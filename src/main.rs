use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use dawascan_lib::config::{self, AppConfig};
use dawascan_lib::pipeline::{PipelineError, ScanEvent, ScanPipeline, VisionOutcome};
use dawascan_lib::report;

const FILE_NOT_FOUND: &str = "File not found. Please check the path and try again.";

#[derive(Parser, Debug)]
#[command(name = "dawascan", version, about = "Identify a medicine from a photo of its strip")]
struct Cli {
    /// Path to the strip photo (prompted for when omitted)
    image: Option<PathBuf>,

    /// Name the medicine from local OCR only, without the vision model
    #[arg(long)]
    ocr_only: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    // `.env` first: RUST_LOG may come from it.
    let env_file = config::load_dotenv();
    dawascan_lib::init_tracing();
    if let Some(ref path) = env_file {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::from(2);
        }
    };
    tracing::info!(?config, "{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let path = match cli.image {
        Some(path) => path,
        None => match prompt_for_path() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Could not read the image path: {e}");
                return ExitCode::FAILURE;
            }
        },
    };

    // Nothing is built or contacted for a path that does not exist.
    if !path.is_file() {
        println!("{FILE_NOT_FOUND}");
        return ExitCode::SUCCESS;
    }

    let pipeline = match ScanPipeline::from_config(&config, cli.ocr_only) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Setup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match pipeline.scan_with(&path, narrate) {
        Ok(scan) => {
            print!("{}", report::render_report(&scan));
            ExitCode::SUCCESS
        }
        Err(PipelineError::FileNotFound(_)) => {
            println!("{FILE_NOT_FOUND}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "Scan aborted");
            eprintln!("Could not scan the image: {e}");
            ExitCode::FAILURE
        }
    }
}

fn prompt_for_path() -> io::Result<PathBuf> {
    print!("Enter the full path of the medicine image: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    // Drag-and-drop into a terminal often wraps the path in quotes.
    let trimmed = line.trim().trim_matches(|c| c == '"' || c == '\'');
    Ok(PathBuf::from(trimmed))
}

fn narrate(event: &ScanEvent<'_>) {
    match event {
        ScanEvent::OcrStarted => println!("Running local OCR..."),
        ScanEvent::OcrFinished {
            raw_text,
            name,
            failure,
        } => {
            match failure {
                Some(e) => println!("\nLocal OCR failed: {e}"),
                None => println!("\nOCR extracted text:\n{}", raw_text.trim()),
            }
            match name {
                Some(name) if name.was_corrected() => println!(
                    "OCR candidate: {} (corrected to {})",
                    name.original, name.corrected
                ),
                Some(name) => println!("OCR candidate: {}", name.corrected),
                None => println!("OCR found no candidate name."),
            }
        }
        ScanEvent::VisionStarted => println!("\nAsking the vision model..."),
        ScanEvent::VisionFinished(outcome) => match outcome {
            VisionOutcome::Recognized(name) => println!("Vision model detected: {name}"),
            VisionOutcome::Unreadable => println!("Vision model could not read a name."),
            VisionOutcome::Failed(e) => println!("Vision model unavailable: {e}"),
            VisionOutcome::Skipped => {}
        },
        ScanEvent::NameChosen(Some(chosen)) => println!(
            "\nFinal medicine name: {} (from {})",
            chosen.name,
            chosen.source.label()
        ),
        ScanEvent::NameChosen(None) => println!("\nNo medicine name could be recognized."),
        ScanEvent::LookupStarted(name) => println!("Fetching label information for {name}..."),
    }
}
