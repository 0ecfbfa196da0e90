use anyhow::{Context, Result, bail};
use billmail_core::{CategorySchema, ExtractionOutcome, RunStatus};
use billmail_finance::{
    CategoryMapping, Extractor, Pipeline, RunRecorder, build_task_spec, load_mapping, resolve,
};
use billmail_ingest::normalize;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod ci;
mod config;
mod llm;
mod sinks;
mod spool;
mod state;

use config::Config;
use llm::{HttpProvider, LlmConfig};
use sinks::JsonlSink;
use spool::SpoolMailSource;
use state::expand_home;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BILLMAIL_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "billmail", version = VERSION, about = "Extract bills from bank notification emails")]
struct Cli {
    /// Config file (default: ~/.billmail/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process unread spool emails once and log the run
    Run,

    /// Normalize and extract a single email body, print the outcome as JSON
    Extract {
        #[arg(long, default_value = "")]
        subject: String,

        /// File holding the raw body (plain text or HTML)
        #[arg(long, conflicts_with = "body", required_unless_present = "body")]
        body_file: Option<PathBuf>,

        /// Raw body text
        #[arg(long)]
        body: Option<String>,
    },

    /// Print the normalized form of a raw email body
    Normalize { file: PathBuf },

    /// Show the merchant rules, or resolve one merchant against them
    Categories {
        #[arg(long)]
        merchant: Option<String>,
    },

    /// Write a default config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let loaded = config::load_config(cli.config.as_deref());
    init_logging(loaded.as_ref().ok().and_then(|c| c.logging.level.as_deref()));
    let cfg = match loaded {
        Ok(cfg) => cfg,
        Err(e) if matches!(cli.command, Command::Run) => {
            // still leave a run log behind when possible
            let defaults = Config::default();
            let meta = ci::run_metadata(&defaults.workflow.name, env_var);
            let recorder = RunRecorder::start(runs_sink(&defaults.output.runs_file), meta);
            error!("configuration error: {e:#}");
            recorder.abort(format!("configuration error: {e:#}"));
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    match cli.command {
        Command::Run => run(&cfg),
        Command::Extract {
            subject,
            body_file,
            body,
        } => {
            let body = match (body_file, body) {
                (Some(path), _) => read_body(&path)?,
                (None, Some(body)) => body,
                (None, None) => bail!("pass --body-file or --body"),
            };
            extract_one(&cfg, &subject, &body)
        }
        Command::Normalize { file } => {
            println!("{}", normalize(&read_body(&file)?));
            Ok(())
        }
        Command::Categories { merchant } => categories(&cfg, merchant.as_deref()),
        Command::InitConfig => config::init_config(cli.config.as_deref()),
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Map common level spellings onto tracing directives.
fn level_directive(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

/// RUST_LOG, then LOG_LEVEL, then the config file, then `warn`.
fn init_logging(config_level: Option<&str>) {
    let fallback = env_var("LOG_LEVEL")
        .filter(|l| !l.trim().is_empty())
        .or_else(|| config_level.map(str::to_string))
        .map(|l| level_directive(&l))
        .unwrap_or_else(|| "warn".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run-log sink for `file`. When `~` cannot be expanded the path is taken
/// relative to the working directory so the run is still logged somewhere.
fn runs_sink(file: &str) -> JsonlSink {
    match expand_home(file) {
        Ok(path) => JsonlSink::new(path),
        Err(e) => {
            let fallback = file.strip_prefix("~/").unwrap_or(file);
            warn!("{e:#}, writing run log to ./{fallback}");
            JsonlSink::new(fallback)
        }
    }
}

fn read_body(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn mapping_for(cfg: &Config) -> Result<CategoryMapping> {
    let schema = cfg.categories.schema;
    Ok(match &cfg.categories.mapping_file {
        Some(file) => load_mapping(expand_home(file)?, schema),
        None => CategoryMapping::new(),
    })
}

fn provider_for(cfg: &Config) -> Result<HttpProvider> {
    let llm_cfg = LlmConfig::resolve(&cfg.llm, env_var)?;
    info!(provider = llm_cfg.provider.name(), model = %llm_cfg.model, "using model");
    HttpProvider::new(llm_cfg)
}

fn build_pipeline(cfg: &Config) -> Result<Pipeline<SpoolMailSource, HttpProvider, JsonlSink>> {
    let provider = provider_for(cfg)?;
    let mapping = mapping_for(cfg)?;
    let task = build_task_spec(&mapping, cfg.categories.schema);

    let mail = SpoolMailSource::new(expand_home(&cfg.mail.spool_dir)?);
    let records = JsonlSink::new(expand_home(&cfg.output.bills_file)?);

    Ok(Pipeline::new(mail, Extractor::new(provider, task), records, mapping)
        .with_sender_filter(cfg.mail.sender_filter.clone()))
}

fn run(cfg: &Config) -> Result<()> {
    let recorder = RunRecorder::start(
        runs_sink(&cfg.output.runs_file),
        ci::run_metadata(&cfg.workflow.name, env_var),
    );

    let pipeline = match build_pipeline(cfg) {
        Ok(p) => p,
        Err(e) => {
            error!("configuration error: {e:#}");
            recorder.abort(format!("configuration error: {e:#}"));
            return Err(e);
        }
    };

    let log = pipeline.run_recorded(recorder);
    println!("{}: {}", log.name, log.status);
    if let Some(notes) = &log.notes {
        println!("{notes}");
    }
    if log.status == RunStatus::Failed {
        bail!("run failed");
    }
    Ok(())
}

fn extract_one(cfg: &Config, subject: &str, body: &str) -> Result<()> {
    let mapping = mapping_for(cfg)?;
    let extractor = Extractor::new(provider_for(cfg)?, build_task_spec(&mapping, cfg.categories.schema));

    let normalized = normalize(body);
    let out = match extractor.extract(subject, &normalized) {
        ExtractionOutcome::Found(record) => json!({ "status": "found", "record": record }),
        ExtractionOutcome::NotFound => json!({ "status": "not_found" }),
        ExtractionOutcome::Failed(e) => {
            json!({ "status": "failed", "error_kind": e.kind(), "error": e.to_string() })
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn categories(cfg: &Config, merchant: Option<&str>) -> Result<()> {
    let schema: CategorySchema = cfg.categories.schema;
    let mapping = mapping_for(cfg)?;

    if let Some(merchant) = merchant {
        match resolve(Some(merchant), &mapping) {
            Some(category) => println!("{merchant} -> {category}"),
            None => println!("{merchant} -> (no rule)"),
        }
        return Ok(());
    }

    println!("Scheme: {}", schema.name());
    for category in schema.categories() {
        println!("  {:<10} {}", category.label(), category.description());
    }
    if mapping.is_empty() {
        warn!("no merchant rules loaded");
        println!("\nNo merchant rules configured.");
    } else {
        println!("\nMerchant rules ({}):\n{}", mapping.len(), mapping.guidance());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_spellings() {
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive(" Info "), "info");
        assert_eq!(level_directive("CRITICAL"), "error");
        assert_eq!(level_directive("billmail_finance=debug"), "billmail_finance=debug");
    }

    #[test]
    fn test_extract_args() {
        let cli = Cli::try_parse_from(["billmail", "extract", "--subject", "Paid", "--body", "You sent $5.00"]).unwrap();
        assert!(matches!(cli.command, Command::Extract { body: Some(_), body_file: None, .. }));
        assert!(Cli::try_parse_from(["billmail", "extract", "--subject", "Paid"]).is_err());
        assert!(
            Cli::try_parse_from(["billmail", "extract", "--body", "x", "--body-file", "y.txt"]).is_err()
        );
    }

    #[test]
    fn test_runs_sink_plain_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let sink = runs_sink(path.to_str().unwrap());
        let log = RunRecorder::start(sink, billmail_core::RunMetadata::named("bills")).abort("boom");
        assert_eq!(log.status, RunStatus::Failed);
        assert!(std::fs::read_to_string(&path).unwrap().contains("workflow failed: boom"));
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["billmail", "categories", "--config", "/tmp/b.toml", "--merchant", "ACME"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/b.toml")));
    }
}
