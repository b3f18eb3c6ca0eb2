use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use etsin_finder::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cfg = AppConfig::from_env()?;
    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "Etsin finder starting: RUST_LOG='{}', http_port={}, server_url='{}'",
        rust_log, cfg.http_port, cfg.server_url
    );

    etsin_finder::server::run_with_config(cfg).await
}
