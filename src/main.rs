use std::sync::Arc;

use clap::Parser;

use gridshot::{RenderServer, Renderer, RendererConfig};

/// Grid compositing screenshot service
#[derive(Parser, Debug)]
#[command(name = "gridshot", version, about)]
struct Args {
    /// Listening port. Falls back to the PORT environment variable, then 3000.
    #[arg(long)]
    port: Option<u16>,

    /// Disable the Chrome sandbox (required on some container hosts)
    #[arg(long)]
    no_sandbox: bool,

    /// In-page budget for embedded images to finish decoding, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    image_settle_ms: u64,

    /// Timeout for a single asset fetch, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    fetch_timeout_ms: u64,
}

fn port_from(args: &Args) -> u16 {
    args.port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(3000)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = RendererConfig {
        sandbox: !args.no_sandbox,
        image_settle_ms: args.image_settle_ms,
        fetch_timeout_ms: args.fetch_timeout_ms,
        ..Default::default()
    };

    let renderer = Arc::new(Renderer::new(config)?);
    let server = RenderServer::start(renderer, port_from(&args)).await?;

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    Ok(())
}
