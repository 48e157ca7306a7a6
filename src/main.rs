use anyhow::{Context, Result};
use clap::Parser;
use kairos_live::{create_router, AppState, Config, SessionDefaults};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kairos-live", about = "Live voice companion session service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/kairos-live")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let api_key =
        std::env::var("KAIROS_API_KEY").context("KAIROS_API_KEY environment variable not set")?;

    info!("Kairos Live v0.1.0");
    info!("Loaded config: {}", cfg.service.name);
    info!("Live endpoint: {} ({})", cfg.live.endpoint, cfg.live.model);

    let defaults = SessionDefaults {
        endpoint: cfg.live.endpoint,
        model: cfg.live.model,
        voice: cfg.live.voice,
        system_instruction: cfg.live.system_instruction,
        api_key,
        capture_sample_rate: cfg.audio.capture_sample_rate,
        playback_sample_rate: cfg.audio.playback_sample_rate,
        block_size: cfg.audio.block_size,
    };

    let state = AppState::new(defaults);
    let router = create_router(state);

    let bind = args.bind.unwrap_or(cfg.service.http.bind);
    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
