//! CLI front end for restyling a PowerPoint deck through a language model.

mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use deck_core::config::DEFAULT_SECRETS_PATH;
use deck_core::guard::key_from_query;
use deck_core::{AccessGuard, Config, EnhancedDeck, Error, ExtractedDeck, Upload};
use deck_llm::OpenAiClient;
use pipeline::{FormSubmission, Pipeline, StageObserver};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit status when the passkey is missing or wrong.
const EXIT_ACCESS_DENIED: u8 = 3;

/// Restructure a presentation with GPT-4 and render a new deck.
#[derive(Parser, Debug)]
#[command(name = "deck-enhance")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Presentation to enhance (.pptx)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Topic of the presentation
    #[arg(short, long, default_value = "AI in Healthcare")]
    topic: String,

    /// Approximate number of slides to ask for
    #[arg(short = 'n', long = "slides", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(3..=20))]
    slides: u8,

    /// Design style
    #[arg(short, long, default_value = "Professional, modern, minimal")]
    style: String,

    /// Directory the enhanced presentation is written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Secrets file with the passkey and API key
    #[arg(long, default_value = DEFAULT_SECRETS_PATH)]
    secrets: PathBuf,

    /// Access passkey
    #[arg(short, long, conflicts_with = "query")]
    key: Option<String>,

    /// Query string carrying the passkey, e.g. "?key=..."
    #[arg(long)]
    query: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match run(&args) {
        Ok(path) => {
            println!("Download ready: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<Error>() {
                Some(Error::AccessDenied) => ExitCode::from(EXIT_ACCESS_DENIED),
                Some(err) if err.is_retryable() => {
                    log::warn!("The language-model service may succeed if retried");
                    ExitCode::FAILURE
                }
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(args: &Args) -> Result<PathBuf> {
    let config = Config::load(&args.secrets)?;
    let key = match (&args.key, &args.query) {
        (Some(key), _) => Some(key.clone()),
        (None, Some(query)) => key_from_query(query),
        (None, None) => None,
    };

    let pipeline = Pipeline::new(AccessGuard::new(&config), OpenAiClient::new(&config)?);
    pipeline.authorize(key.as_deref())?;

    let form = FormSubmission {
        upload: args.input.as_deref().map(read_upload).transpose()?,
        topic: args.topic.clone(),
        slide_count: args.slides,
        style: args.style.clone(),
    };

    let artifact = pipeline.run(key.as_deref(), &form, &mut JsonPrinter)?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let path = args.output.join(&artifact.file_name);
    fs::write(&path, &artifact.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

/// Read an uploaded file into memory.
fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload::new(filename, bytes))
}

/// Prints each stage's result to stdout as it completes.
struct JsonPrinter;

impl JsonPrinter {
    fn show<T: Serialize>(&self, heading: &str, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}\n{}\n", heading, json),
            Err(e) => log::warn!("Cannot display {}: {}", heading, e),
        }
    }
}

impl StageObserver for JsonPrinter {
    fn extracted(&mut self, deck: &ExtractedDeck) {
        self.show("Slide content extracted", deck);
    }

    fn enhanced(&mut self, deck: &EnhancedDeck) {
        self.show("JSON structure ready", deck);
    }
}
