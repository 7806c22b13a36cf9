use anyhow::Result;
use tracing_subscriber::EnvFilter;

use repwatch_common::Config;
use repwatch_server::{build_router, state};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting repwatch-server");

    let config = Config::from_env();
    let app_state = state::build_state(&config).await?;
    let app = build_router(app_state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
