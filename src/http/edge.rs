//! Forwarding logic shared by the two trivial HTTP edge processes: the
//! ingest receiver and the query front-end. Each relays a request to the
//! storage process over `reqwest` and passes its response straight back,
//! registered as actix-web services the way the storage process registers
//! its own handlers.

use actix_web::http::StatusCode;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;
use tracing::{info, warn};

pub struct EdgeState {
    pub storage_url: String,
    pub client: reqwest::Client,
}

#[derive(Deserialize)]
struct QueryParams {
    query: Option<String>,
}

fn to_actix_status(status: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// `POST /` — forward the line-protocol body verbatim to the storage
/// endpoint's `POST /`.
#[post("/")]
async fn ingest_forward(body: web::Bytes, data: web::Data<EdgeState>) -> impl Responder {
    match data.client.post(&data.storage_url).body(body).send().await {
        Ok(resp) => {
            let status = to_actix_status(resp.status());
            let text = resp.text().await.unwrap_or_default();
            HttpResponse::build(status).body(text)
        }
        Err(e) => {
            warn!(error = %e, "failed to forward ingest request to storage");
            HttpResponse::BadGateway().body(format!("Error forwarding to storage: {e}"))
        }
    }
}

/// `GET /?query=<urlencoded query>` — forward to the storage endpoint's
/// `GET /?query=...` and relay its status and JSON body verbatim.
#[get("/")]
async fn query_forward(params: web::Query<QueryParams>, data: web::Data<EdgeState>) -> impl Responder {
    let Some(query) = &params.query else {
        return HttpResponse::BadRequest().body("Missing 'query' parameter");
    };

    match data
        .client
        .get(&data.storage_url)
        .query(&[("query", query)])
        .send()
        .await
    {
        Ok(resp) => {
            let status = to_actix_status(resp.status());
            let text = resp.text().await.unwrap_or_default();
            HttpResponse::build(status)
                .content_type("application/json")
                .body(text)
        }
        Err(e) => {
            warn!(error = %e, "failed to forward query to storage");
            HttpResponse::BadGateway().json(serde_json::json!({
                "error": format!("Error communicating with storage service: {e}")
            }))
        }
    }
}

pub async fn start_ingest_edge(host: &str, port: u16, storage_url: String) -> std::io::Result<()> {
    info!(host, port, %storage_url, "starting ingest edge");
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(EdgeState {
                storage_url: storage_url.clone(),
                client: reqwest::Client::new(),
            }))
            .service(ingest_forward)
    })
    .bind((host, port))?
    .run()
    .await
}

pub async fn start_query_edge(host: &str, port: u16, storage_url: String) -> std::io::Result<()> {
    info!(host, port, %storage_url, "starting query edge");
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(EdgeState {
                storage_url: storage_url.clone(),
                client: reqwest::Client::new(),
            }))
            .service(query_forward)
    })
    .bind((host, port))?
    .run()
    .await
}
