//! Command-line entry point: analyze one article URL and print the result.

use anyhow::{bail, Context as _};
use newsflow::observability::init_tracing;
use newsflow::pipeline::{LogFormat, Pipeline, PipelineConfig, PipelineStatus};
use std::process::ExitCode;
use tracing::info;

struct Args {
    url: String,
    config_path: Option<String>,
    mock: bool,
    json_logs: bool,
    continue_on_failure: bool,
}

fn print_help() {
    println!("newsflow v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: newsflow [OPTIONS] <URL>");
    println!();
    println!("Options:");
    println!("  --mock, -m               Use canned data, no network calls");
    println!("  --config, -c <FILE>      Read pipeline settings from a JSON file");
    println!("  --json-logs              Log as JSON lines on stderr");
    println!("  --continue-on-failure    Keep running after an agent fails");
    println!("  --help, -h               Show this help");
    println!();
    println!("Exit status: 0 completed, 1 failed, 2 needs clarification");
    println!();
    println!("Environment variables:");
    println!("  OPENAI_API_KEY           API key for chat, speech and embeddings");
    println!("  OPENAI_BASE_URL          API base URL");
    println!("  NEWSFLOW_MOCK_MODE       Same as --mock");
    println!("  NEWSFLOW_PROMPTS_DIR     Directory of prompt overrides");
    println!("  NEWSFLOW_LOG_FORMAT      pretty or json");
    println!("  RUST_LOG                 Log filter (default: info)");
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut url = None;
    let mut config_path = None;
    let mut mock = false;
    let mut json_logs = false;
    let mut continue_on_failure = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--mock" | "-m" => mock = true,
            "--json-logs" => json_logs = true,
            "--continue-on-failure" => continue_on_failure = true,
            "--config" | "-c" => {
                config_path = Some(args.next().context("--config needs a file path")?);
            }
            flag if flag.starts_with('-') => bail!("unknown option {flag}"),
            _ if url.is_some() => bail!("only one URL can be analyzed per run"),
            _ => url = Some(arg),
        }
    }

    let Some(url) = url else {
        bail!("missing article URL (see --help)");
    };
    Ok(Some(Args {
        url,
        config_path,
        mock,
        json_logs,
        continue_on_failure,
    }))
}

fn load_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config_path {
        Some(path) => {
            let _ = dotenvy::dotenv();
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            PipelineConfig::from_json_str(&raw)?
        }
        None => PipelineConfig::from_env()?,
    };
    if args.mock {
        config.mock_mode = true;
    }
    if args.json_logs {
        config.log_format = LogFormat::Json;
    }
    if args.continue_on_failure {
        config.stop_on_failure = false;
    }
    Ok(config)
}

async fn run() -> anyhow::Result<ExitCode> {
    let Some(args) = parse_args()? else {
        print_help();
        return Ok(ExitCode::SUCCESS);
    };
    let config = load_config(&args)?;
    init_tracing(config.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mock = config.mock_mode,
        "Starting newsflow"
    );
    let pipeline = Pipeline::with_default_agents(config)?;
    let result = pipeline.run(&args.url).await;

    println!("{}", serde_json::to_string_pretty(&result.to_json())?);

    Ok(match result.status() {
        PipelineStatus::Completed => ExitCode::SUCCESS,
        PipelineStatus::Failed => ExitCode::from(1),
        PipelineStatus::NeedsClarification => ExitCode::from(2),
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
