//! CLI binary for edgequake-doc2csv.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one upload and prints the response JSON.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doc2csv::{
    AlignmentMode, AzureBlobStore, AzureOpenAiSettings, ExtractionConfig, FailurePolicy,
    LocalDirStore, ObjectStore, OcrSettings, Pipeline, PipelineObserver, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI stage observer using indicatif ───────────────────────────────────────

/// Spinner whose message follows the pipeline stage.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineObserver for CliObserver {
    fn on_stage(&self, filename: &str, stage: Stage) {
        self.bar.set_prefix(filename.to_string());
        match stage {
            Stage::TextExtracted => self.bar.set_message("querying model…"),
            Stage::Persisted => {
                self.bar
                    .finish_with_message(format!("{} {}", green("✓"), stage));
            }
            other => self.bar.set_message(other.to_string()),
        }
    }

    fn on_reply_unavailable(&self, _filename: &str, reason: &str) {
        self.bar
            .println(format!("  {} model unavailable: {}", red("✗"), dim(reason)));
    }

    fn on_failed(&self, _filename: &str, error: &str) {
        self.bar.abandon_with_message(format!("{} {}", red("✗"), error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract an invoice, store original + invoice.csv under ./out
  doc2csv invoice.pdf --store-dir out

  # OCR a scanned image (no model call, no CSV)
  doc2csv photo.png --store-dir out

  # Store in an Azure Storage container
  doc2csv invoice.pdf --container-url https://acct.blob.core.windows.net/uploads --sas-token "sv=..."

  # Fail instead of writing an empty row when the model is unreachable
  doc2csv invoice.pdf --fail-closed --strict

ENVIRONMENT VARIABLES:
  AZURE_OPENAI_ENDPOINT     Azure OpenAI resource endpoint
  AZURE_OPENAI_KEY          Azure OpenAI API key
  AZURE_OPENAI_DEPLOYMENT   Deployment name
  AZURE_OPENAI_API_VERSION  REST API version (default 2024-02-01)
  AZURE_CONTAINER_URL       Blob container URL for uploads and CSVs
  AZURE_STORAGE_SAS_TOKEN   SAS token for the container
  EDGEQUAKE_LLM_PROVIDER    Provider when Azure is not configured
  EDGEQUAKE_MODEL           Model ID for that provider
  PDFIUM_LIB_PATH           Directory containing libpdfium
"#;

/// Extract shipment/invoice fields from a PDF or image into CSV.
#[derive(Parser, Debug)]
#[command(
    name = "doc2csv",
    version,
    about = "Extract shipment/invoice fields from PDFs and images into CSV",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF, PNG or JPEG file to process.
    input: PathBuf,

    /// Directory to store the upload and its CSV in.
    #[arg(long, env = "DOC2CSV_STORE_DIR", default_value = "doc2csv-out")]
    store_dir: PathBuf,

    /// Azure Storage container URL. Overrides --store-dir.
    #[arg(long, env = "AZURE_CONTAINER_URL")]
    container_url: Option<String>,

    /// SAS token for --container-url.
    #[arg(long, env = "AZURE_STORAGE_SAS_TOKEN", default_value = "", hide_env_values = true)]
    sas_token: String,

    /// Azure OpenAI endpoint.
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    azure_endpoint: Option<String>,

    /// Azure OpenAI API key.
    #[arg(long, env = "AZURE_OPENAI_KEY", hide_env_values = true)]
    azure_key: Option<String>,

    /// Azure OpenAI deployment name.
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT")]
    azure_deployment: Option<String>,

    /// Azure OpenAI REST API version.
    #[arg(long, env = "AZURE_OPENAI_API_VERSION", default_value = "2024-02-01")]
    azure_api_version: String,

    /// LLM provider when Azure is not configured: openai, anthropic, gemini, ollama.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Model ID for --provider.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Reject model replies whose field count differs from the schema.
    #[arg(long, env = "DOC2CSV_STRICT")]
    strict: bool,

    /// Fail the upload when the model is unreachable instead of writing an empty row.
    #[arg(long, env = "DOC2CSV_FAIL_CLOSED")]
    fail_closed: bool,

    /// Tesseract binary.
    #[arg(long, env = "DOC2CSV_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Tesseract language code.
    #[arg(long, env = "DOC2CSV_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Directory containing libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Completion request timeout in seconds.
    #[arg(long, env = "DOC2CSV_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Print the full outcome (CSV, stored objects, timings) instead of {file_type, content}.
    #[arg(long)]
    full: bool,

    /// Disable the progress spinner and log at INFO level instead.
    #[arg(long, env = "DOC2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the JSON result.
    #[arg(short, long, env = "DOC2CSV_QUIET")]
    quiet: bool,
}

impl Cli {
    /// The spinner owns stderr unless logs were asked for.
    fn show_progress(&self) -> bool {
        !self.quiet && !self.verbose && !self.no_progress
    }

    fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet || self.show_progress() {
            "error"
        } else {
            "info"
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = cli.show_progress();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(io::stderr)
        .init();

    let observer = show_progress.then(CliObserver::new);
    let config = build_config(&cli, observer)?;
    let store = build_store(&cli)?;
    let pipeline = Pipeline::from_config(&config, store).context("Failed to set up pipeline")?;

    match pipeline.process_file(&cli.input).await {
        Ok(outcome) => {
            let json = if cli.full {
                serde_json::to_string_pretty(&outcome)
            } else {
                serde_json::to_string_pretty(&outcome.response())
            }
            .context("Failed to serialise output")?;
            println!("{json}");

            if !cli.quiet {
                eprintln!(
                    "{}  stored {}  {}",
                    if outcome.reply_available { green("✔") } else { red("⚠") },
                    outcome.stored.join(", "),
                    dim(&format!("{}ms", outcome.stats.total_duration_ms)),
                );
            }
            Ok(())
        }
        Err(e) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&e.to_response()).context("Failed to serialise error")?
            );
            Err(anyhow::Error::new(e).context(format!("Processing {} failed", cli.input.display())))
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<CliObserver>>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .failure_policy(if cli.fail_closed {
            FailurePolicy::Propagate
        } else {
            FailurePolicy::Degrade
        })
        .alignment(if cli.strict {
            AlignmentMode::Strict
        } else {
            AlignmentMode::Passthrough
        })
        .ocr(OcrSettings {
            binary: cli.tesseract.clone(),
            language: cli.ocr_lang.clone(),
        })
        .api_timeout_secs(cli.api_timeout);

    if let (Some(endpoint), Some(key), Some(deployment)) =
        (&cli.azure_endpoint, &cli.azure_key, &cli.azure_deployment)
    {
        builder = builder.azure(AzureOpenAiSettings {
            endpoint: endpoint.clone(),
            api_key: key.clone(),
            deployment: deployment.clone(),
            api_version: cli.azure_api_version.clone(),
        });
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(dir.clone());
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs as Arc<dyn PipelineObserver>);
    }

    builder.build().context("Invalid configuration")
}

fn build_store(cli: &Cli) -> Result<Arc<dyn ObjectStore>> {
    match cli.container_url {
        Some(ref url) => {
            let store = AzureBlobStore::new(url, cli.sas_token.clone(), cli.api_timeout)
                .context("Invalid Azure container")?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(LocalDirStore::new(cli.store_dir.clone()))),
    }
}
