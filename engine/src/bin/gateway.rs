use clap::Parser;
use color_eyre::Result;
use engine::gateway::{DEFAULT_PORT, Gateway, GatewayConfig, load_env_file};
use log::info;
use tokio::net::TcpListener;

/// Proxies image generation requests to the upstream API, attaching the API key.
#[derive(clap::Parser)]
struct Cli {
    #[arg(short, long, env = "GATEWAY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, env = "UPSTREAM_URL")]
    upstream_url: Option<String>,

    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    load_env_file();
    pretty_env_logger::init();

    let args = Cli::parse();
    let mut cfg = GatewayConfig::from_env()?;
    cfg.port = args.port;
    if let Some(url) = args.upstream_url {
        cfg.upstream_url = url;
    }

    let listener = TcpListener::bind((args.host.as_str(), cfg.port)).await?;
    info!("Forwarding to {}", cfg.upstream_url);
    Gateway::new(cfg)
        .serve(listener, async {
            _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
