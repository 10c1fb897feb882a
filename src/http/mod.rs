//! HTTP surface: the storage process's two endpoints. The edge
//! (ingest/query) processes' forwarding logic lives in [`edge`].
//!
//! Actix-web service registration, an `AppState` holding the engine behind
//! an `Arc`, a CORS wrap, and per-handler JSON-vs-plaintext responses.
//! Narrowed to exactly an ingest endpoint and a query endpoint rather than
//! a general key-value REST surface.

pub mod edge;

use crate::config::ServerConfig;
use crate::lsm::LsmTree;
use crate::query::executor::{execute, outcome_to_json};
use crate::query::parser::parse_query;
use crate::record::parse_line;
use actix_cors::Cors;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AppState {
    pub tree: Arc<LsmTree>,
}

#[derive(Deserialize)]
struct QueryParams {
    query: Option<String>,
}

/// `POST /` — body is one line-protocol record. Malformed lines are
/// dropped and logged, never surfaced as an error response.
#[post("/")]
async fn ingest(body: web::Bytes, data: web::Data<AppState>) -> impl Responder {
    let text = String::from_utf8_lossy(&body);
    match parse_line(&text) {
        Ok(record) => match record.to_json_bytes() {
            Ok(value) => match data.tree.put(record.storage_key(), value) {
                Ok(()) => HttpResponse::Ok().body("Data received and saved"),
                Err(e) => {
                    warn!(error = %e, "storage write failed");
                    HttpResponse::InternalServerError().body(e.to_string())
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to encode record");
                HttpResponse::InternalServerError().body(e.to_string())
            }
        },
        Err(e) => {
            warn!(line = %text, error = %e, "dropping malformed line");
            HttpResponse::Ok().body("Data received and saved")
        }
    }
}

/// `GET /?query=<urlencoded query>` — parses and executes the query.
#[get("/")]
async fn query(params: web::Query<QueryParams>, data: web::Data<AppState>) -> impl Responder {
    let Some(query) = &params.query else {
        return HttpResponse::BadRequest().body("Missing 'query' parameter");
    };

    let plan = match parse_query(query) {
        Ok(plan) => plan,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };

    match execute(&data.tree, &plan) {
        Ok(outcome) => HttpResponse::Ok().json(outcome_to_json(outcome)),
        Err(e) => {
            warn!(error = %e, "query execution failed");
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

pub async fn start_server(tree: LsmTree, config: ServerConfig) -> std::io::Result<()> {
    let tree = Arc::new(tree);
    info!(host = %config.host, port = config.port, "starting storage server");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(AppState { tree: Arc::clone(&tree) }))
            .service(ingest)
            .service(query)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use actix_web::{test, App};
    use tempfile::tempdir;

    fn app_state(dir: &std::path::Path) -> web::Data<AppState> {
        let tree = LsmTree::new(EngineConfig {
            data_dir: dir.to_path_buf(),
            memtable_max_entries: 1000,
            max_levels: 4,
            compaction_threshold: 2,
        })
        .unwrap();
        web::Data::new(AppState { tree: Arc::new(tree) })
    }

    #[actix_web::test]
    async fn ingest_then_query_round_trip() {
        let dir = tempdir().unwrap();
        let state = app_state(dir.path());
        let app = test::init_service(
            App::new().app_data(state.clone()).service(ingest).service(query),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .set_payload("cpu,host=a value=1 1")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let req = test::TestRequest::get()
            .uri("/?query=SELECT%20%2A%20FROM%20cpu")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn query_without_param_is_bad_request() {
        let dir = tempdir().unwrap();
        let state = app_state(dir.path());
        let app = test::init_service(
            App::new().app_data(state.clone()).service(ingest).service(query),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn malformed_line_still_returns_200() {
        let dir = tempdir().unwrap();
        let state = app_state(dir.path());
        let app = test::init_service(App::new().app_data(state.clone()).service(ingest)).await;

        let req = test::TestRequest::post().uri("/").set_payload("onlyonetoken").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
