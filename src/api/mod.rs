//! HTTP surface: the JSON query API and the HTML dashboard.

pub mod dashboard;

use crate::matching::{ProductMatcher, TermVectorSimilarity};
use crate::models::Product;
use crate::store::{JsonStore, StoreError};
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};

/// Shared by every worker
pub struct AppState {
    pub store: JsonStore,
    pub matcher: ProductMatcher<TermVectorSimilarity>,
}

impl AppState {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new(data_path),
            matcher: ProductMatcher::new(TermVectorSimilarity::new()),
        }
    }
}

/// Records whose category labels or path fields contain `query`, ignoring case
pub fn filter_by_category<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    let query = query.to_lowercase();
    products
        .iter()
        .filter(|p| {
            p.category
                .labels()
                .chain(p.path_fields())
                .any(|label| label.to_lowercase().contains(&query))
        })
        .collect()
}

fn store_error_response(e: &StoreError) -> HttpResponse {
    match e {
        StoreError::NotFound(_) => {
            HttpResponse::NotFound().json(json!({ "error": "materials.json not found" }))
        }
        other => {
            error!("Failed to read product data: {}", other);
            HttpResponse::InternalServerError().json(json!({ "error": other.to_string() }))
        }
    }
}

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": "Welcome to the materials API. Use /materials/{category} to query products."
    }))
}

#[get("/healthz")]
async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[get("/materials/{category}")]
async fn materials(state: web::Data<AppState>, category: web::Path<String>) -> impl Responder {
    match state.store.load() {
        Ok(products) => {
            let hits = filter_by_category(&products, &category);
            info!("/materials/{} -> {} products", category, hits.len());
            HttpResponse::Ok().json(hits)
        }
        Err(e) => store_error_response(&e),
    }
}

/// Register every route; shared by the server and the tests
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(healthz)
        .service(materials)
        .service(dashboard::browse)
        .service(dashboard::compare);
}

pub async fn serve(host: &str, port: u16, data_path: PathBuf) -> Result<()> {
    info!("Serving {} on http://{}:{}", data_path.display(), host, port);
    let state = web::Data::new(AppState::new(data_path));

    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .bind((host, port))
        .with_context(|| format!("Failed to bind {host}:{port}"))?
        .run()
        .await
        .context("API server stopped with an error")?;
    Ok(())
}
