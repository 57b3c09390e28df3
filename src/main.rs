use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use freelancekz::config::AppConfig;

fn parse_port_flag(args: &[String]) -> Option<u16> {
    args.windows(2).find(|w| w[0] == "--port").and_then(|w| w[1].parse().ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    let mut cfg = AppConfig::from_env();
    if let Some(port) = parse_port_flag(&args) {
        cfg.gateway_port = port;
    }

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "server",
        "freelancekz gateway starting: RUST_LOG='{}', port={}, frontend='{}', egov='{}'",
        rust_log, cfg.gateway_port, cfg.frontend_url, cfg.egov.base_url
    );

    freelancekz::server::run(cfg).await
}
