//! CLI entry point: translate a saved HTML document in place.
//!
//! Drives the same pipeline the library exposes, against a JSON file store
//! and the HTTP backend. Useful for batch-translating saved pages and for
//! exercising the pipeline against a real endpoint.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use pagelingo::config::constants;
use pagelingo::dom;
use pagelingo::store::ConfigStore;
use pagelingo::{FileStore, HttpBackend, Pipeline, PipelineConfig, PumpStatus};

#[derive(Parser, Debug)]
#[command(name = "pagelingo", version, about = "Translate a saved HTML page in place")]
struct Args {
    /// Input HTML file
    input: PathBuf,

    /// Output HTML file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Page URL the document was saved from; its host scopes the
    /// enablement flags and defaults to "localhost" when omitted
    #[arg(long)]
    url: Option<String>,

    /// Target language (persisted for later runs)
    #[arg(long)]
    lang: Option<String>,

    /// Model identifier (persisted for later runs)
    #[arg(long)]
    model: Option<String>,

    /// API token; falls back to the PAGELINGO_API_TOKEN environment variable
    #[arg(long)]
    token: Option<String>,

    /// Translation endpoint URL
    #[arg(long, default_value = constants::DEFAULT_API_URL)]
    api_url: String,

    /// Path of the JSON store holding settings and the translation cache
    #[arg(long, default_value = "pagelingo-store.json")]
    store: PathBuf,

    /// Give up after this many failed submissions of the same batch
    #[arg(long, default_value_t = 5)]
    max_retries: usize,
}

fn origin_of(url: Option<&str>) -> String {
    url.and_then(|raw| url::Url::parse(raw).ok())
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagelingo=info".into()),
        )
        .init();

    let args = Args::parse();
    let origin = origin_of(args.url.as_deref());
    let store = FileStore::new(&args.store);

    // Fold the CLI overrides into the persisted settings, then enable the
    // target origin for this run.
    let mut config = PipelineConfig::load(&store).await;
    if let Some(lang) = &args.lang {
        config.target_language = lang.clone();
    }
    if let Some(model) = &args.model {
        config.model_id = model.clone();
    }
    config.global_enabled = true;
    config.set_origin_enabled(&origin, true);
    if let Err(err) = config.save(&store).await {
        error!("cannot write settings store: {err}");
        return ExitCode::FAILURE;
    }

    let token = args
        .token
        .clone()
        .or_else(|| std::env::var("PAGELINGO_API_TOKEN").ok());
    match token {
        Some(token) => {
            let mut entries = std::collections::HashMap::new();
            entries.insert(
                constants::keys::API_TOKEN.to_string(),
                serde_json::Value::String(token),
            );
            if let Err(err) = store.set(entries).await {
                error!("cannot store the API token: {err}");
                return ExitCode::FAILURE;
            }
        }
        None => warn!("no API token given; only cached translations will apply"),
    }

    let html = match tokio::fs::read_to_string(&args.input).await {
        Ok(html) => html,
        Err(err) => {
            error!("cannot read {}: {err}", args.input.display());
            return ExitCode::FAILURE;
        }
    };

    let page = dom::parse_html(&html);
    let backend = HttpBackend::new(args.api_url.clone(), store.clone());
    let mut pipeline = Pipeline::new(page.document.clone(), &origin, store, backend);
    pipeline.init().await;

    let batches = pipeline.harvest();
    info!(batches, origin = %origin, "starting translation");

    let mut retries = 0;
    loop {
        match pipeline.pump().await {
            PumpStatus::Idle | PumpStatus::Drained(_) => break,
            PumpStatus::Disabled => {
                error!("translation is disabled for {origin}");
                return ExitCode::FAILURE;
            }
            PumpStatus::RetryAfter(delay) => {
                retries += 1;
                if retries > args.max_retries {
                    error!("giving up after {} failed submissions", args.max_retries);
                    return ExitCode::FAILURE;
                }
                tokio::time::sleep(delay).await;
            }
        }
    }

    let translated = match dom::serialize_html(&page) {
        Ok(translated) => translated,
        Err(err) => {
            error!("serialization failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    let result = match &args.output {
        Some(path) => tokio::fs::write(path, translated).await,
        None => {
            println!("{translated}");
            Ok(())
        }
    };
    if let Err(err) = result {
        error!("cannot write output: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
