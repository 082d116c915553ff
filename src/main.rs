use std::path::PathBuf;

use jenkins_notify::{NotifyConfig, api, build_state, load_config, logging};
use tracing::info;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8888";
const DEFAULT_CONFIG_PATH: &str = "notify_config.toml";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let config_path = PathBuf::from(
        std::env::var("NOTIFY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
    );

    let config: NotifyConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let _log_guard = logging::init();

    let state = build_state(config, config_path.clone());
    let app = api::router(state.clone());

    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    let listener = tokio::net::TcpListener::bind(bind_address).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Teardown happens exactly once: cancel in-flight notifications and
    // stop accepting new ones.
    state.dispatcher.shutdown().await;
    info!("Notification dispatcher stopped");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
