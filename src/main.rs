mod config;
mod error;
mod gemini;
mod ingest;
mod llm_client;
mod logging;
mod models;
mod page;
mod request_id;
mod router;

use clap::Parser;
use config::Config;
use llm_client::{GeminiClient, ModelClient};
use router::AppState;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "invoice-extractor")]
#[command(about = "Ask questions about an uploaded invoice image")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    ip: String,

    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Optional YAML config file (model, api_base, system_prompt, ...)
    #[arg(short, long)]
    config: Option<String>,

    /// trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Also write logs here, capped at 10 MiB
    #[arg(long)]
    log_file: Option<String>,

    /// socks and http proxy, example: socks5://192.168.0.2:10080
    #[arg(long)]
    proxy: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = Level::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using INFO level.", args.log_level);
        Level::INFO
    });
    logging::init_logging(log_level, args.log_file.as_deref());

    let env_file = Path::new(".env");
    if Config::load_env_file(env_file)? {
        info!("Loaded environment from {}", env_file.display());
    }

    let config = Arc::new(Config::load(args.config.as_deref())?);
    info!(
        "Using model {} at {}",
        config.llm_params.model, config.llm_params.api_base
    );

    let mut client_builder =
        reqwest::Client::builder().timeout(Duration::from_secs(config.llm_params.timeout_secs));
    if let Some(proxy) = &args.proxy {
        client_builder = client_builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    let http_client = Arc::new(client_builder.build()?);

    let gemini = GeminiClient::new(http_client, config.llm_params.clone());
    let app_state = AppState {
        config: config.clone(),
        model_client: ModelClient::new(Arc::new(gemini)),
    };
    let app = router::build_router(app_state);

    let bind_address = format!("{}:{}", args.ip, args.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server started on http://{}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
