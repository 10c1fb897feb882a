use tsdb_lsm::config::{EngineConfig, ServerConfig};
use tsdb_lsm::http::start_server;
use tsdb_lsm::LsmTree;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_target(false).with_level(true).init();

    let engine_config = EngineConfig::from_env();
    let server_config = ServerConfig::from_env("STORAGE_HOST", "STORAGE_PORT", 8087);

    let tree = LsmTree::new(engine_config).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    start_server(tree, server_config).await
}
