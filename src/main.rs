use clap::Parser;
use gemini_openai_proxy::config::config_search_paths;
use gemini_openai_proxy::{build_router, AppState, ProxyConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "gemini-openai-proxy",
    about = "OpenAI-compatible chat completions gateway in front of Google Gemini",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log file path
    #[arg(long, default_value = "gemini-openai-proxy.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_openai_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let logger = SharedLogger::new(&cli.log_file)?;
    let state = Arc::new(AppState::from_config(&config, logger.clone())?);

    info!("gemini-openai-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Default model: {}", config.default_model);
    info!("  Deployments:   {}", state.pipeline.resolver().models().join(", "));
    info!(
        "  Forward proxy: {}",
        config
            .transport
            .effective_proxy_url()
            .unwrap_or_else(|| "system default".to_string())
    );
    info!("  Log file:      {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting gemini-openai-proxy port={} deployments={}",
            config.port,
            state.pipeline.resolver().models().len()
        ),
    );

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  OPENAI_BASE_URL=http://localhost:{}/v1", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
