use tsdb_lsm::config::{storage_url_from_env, ServerConfig};
use tsdb_lsm::http::edge::start_query_edge;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_target(false).with_level(true).init();

    let server_config = ServerConfig::from_env("QUERY_HOST", "QUERY_PORT", 8088);
    let storage_url = storage_url_from_env();

    start_query_edge(&server_config.host, server_config.port, storage_url).await
}
