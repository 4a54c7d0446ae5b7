use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("ATELIER_HTTP_PORT").unwrap_or_else(|_| "7880".to_string());
    let db_folder = std::env::var("ATELIER_DB_FOLDER").unwrap_or_else(|_| "site-data".to_string());
    let push_endpoint = std::env::var("ATELIER_PUSH_ENDPOINT").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "atelier",
        "Atelier starting: RUST_LOG='{}', http_port={}, db_root='{}', push_endpoint='{}'",
        rust_log, http_port, db_folder, push_endpoint
    );

    atelier::server::run().await
}
