//! Run medication reviews for a patients file against a local Ollama model.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use med_review_core::{load_jsonl, DrugReference, ReferenceConfig, V1Handler};
use med_review_llm::ollama::{OllamaChatModel, OllamaConfig, DEFAULT_OLLAMA_URL};
use med_review_llm::solver::DEFAULT_MAX_TOOL_ROUNDS;
use med_review_llm::{ChatModel, ReviewConfig, ReviewSolver, ReviewTools};

const PATIENTS_FILE_ENV: &str = "PATIENTS_FILE";

#[derive(Parser, Debug)]
#[command(about = "Structured medication reviews with BNF lookup tools", version)]
struct Args {
    /// JSON Lines patients file (falls back to $PATIENTS_FILE)
    #[arg(long, value_name = "FILE")]
    patients: Option<PathBuf>,

    /// Reference data root (falls back to $MED_REVIEW_DATA_ROOT)
    #[arg(long, value_name = "DIR")]
    data_root: Option<PathBuf>,

    /// Model under evaluation
    #[arg(long)]
    model: String,

    /// Model used for the critique round (defaults to --model)
    #[arg(long)]
    critic_model: Option<String>,

    #[arg(long, default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Fuzzy name matching threshold, 0-100
    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long, default_value_t = DEFAULT_MAX_TOOL_ROUNDS)]
    max_tool_rounds: usize,

    /// Skip the critique round
    #[arg(long, default_value_t = false)]
    no_critique: bool,

    /// Review at most this many patients (0 = all)
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// Where to write JSON Lines results (defaults to stdout)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let patients_path = match args.patients.clone() {
        Some(path) => path,
        None => std::env::var(PATIENTS_FILE_ENV)
            .map(PathBuf::from)
            .context("No --patients given and PATIENTS_FILE is not set")?,
    };

    let mut config = ReferenceConfig::from_env();
    if let Some(root) = &args.data_root {
        config.data_root = root.clone();
    }
    if let Some(threshold) = args.threshold {
        if !(0.0..=100.0).contains(&threshold) {
            bail!("--threshold {} is outside 0-100", threshold);
        }
        config = config.threshold(threshold);
    }

    let reference = DrugReference::open(&config)
        .with_context(|| format!("Failed to load reference data from {}", config.data_root.display()))?;
    let patients = load_jsonl(&patients_path, &V1Handler)
        .with_context(|| format!("Failed to load patients from {}", patients_path.display()))?;

    let model: Arc<dyn ChatModel> = Arc::new(OllamaChatModel::new(
        OllamaConfig::new(args.model.as_str()).base_url(args.ollama_url.as_str()),
    )?);
    let mut solver = ReviewSolver::new(model, ReviewTools::new(Arc::new(reference))).with_config(
        ReviewConfig {
            max_tool_rounds: args.max_tool_rounds,
            critique: !args.no_critique,
            ..ReviewConfig::default()
        },
    );
    if let Some(critic) = &args.critic_model {
        solver = solver.with_critic(Arc::new(OllamaChatModel::new(
            OllamaConfig::new(critic.as_str()).base_url(args.ollama_url.as_str()),
        )?));
    }

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to open output {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let take = if args.limit == 0 { patients.len() } else { args.limit };
    let mut reviewed = 0usize;
    let mut failed = 0usize;
    for patient in patients.iter().take(take) {
        match solver.review(patient) {
            Ok(transcript) => {
                serde_json::to_writer(&mut out, &transcript)?;
                out.write_all(b"\n")?;
                reviewed += 1;
            }
            Err(e) => {
                tracing::error!(patient_id = patient.patient_id, error = %e, "Review failed, skipping patient");
                failed += 1;
            }
        }
    }
    out.flush()?;

    tracing::info!(reviewed, failed, "Done");
    Ok(())
}
