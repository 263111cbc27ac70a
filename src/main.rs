// src/main.rs
use tracing::{error, info, warn};
use yard_planner::config::AppConfig;
use yard_planner::{api, logging};

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();
    logging::init();

    if let Err(err) = dotenv {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();

    info!("🚀 Yard planning service starting...");
    if let Err(err) = api::start_api_server(app_config.api, app_config.planner).await {
        error!("❌ Yard planning service stopped: {err}");
        std::process::exit(1);
    }
}
