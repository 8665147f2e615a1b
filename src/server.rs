use std::sync::Arc;

use actix_web::{get, web, App, HttpResponse, HttpResponseBuilder, HttpServer, Responder};
use serde_json::json;
use tracing::{error, info};

use crate::models::Catalog;
use crate::scrapers::traits::VehicleSource;

/// Shared handle to the inventory source scraped on demand
pub struct SourceHandle(pub Arc<dyn VehicleSource>);

/// Headers every response carries: the storefront page consumes the
/// endpoint cross-origin and caches the result client-side for an hour
fn consumer_headers(mut builder: HttpResponseBuilder) -> HttpResponseBuilder {
    builder
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .insert_header(("Access-Control-Allow-Headers", "Content-Type"))
        .insert_header(("Cache-Control", "public, max-age=3600"));
    builder
}

#[get("/vehicles")]
async fn vehicles(source: web::Data<SourceHandle>) -> impl Responder {
    match source.0.scrape().await {
        Ok(records) => {
            let catalog = Catalog::new(records, source.0.source_url());
            consumer_headers(HttpResponse::Ok()).json(catalog)
        }
        Err(e) => {
            error!("On-demand scrape failed: {e:#}");
            consumer_headers(HttpResponse::InternalServerError())
                .json(json!({ "error": format!("{e:#}") }))
        }
    }
}

#[get("/healthz")]
async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

/// Serve the on-demand catalog endpoint until the process is stopped
pub async fn run(bind: &str, source: Arc<dyn VehicleSource>) -> std::io::Result<()> {
    info!("Serving {} inventory on http://{}/vehicles", source.source_name(), bind);

    let handle = web::Data::new(SourceHandle(source));
    HttpServer::new(move || {
        App::new()
            .app_data(handle.clone())
            .service(vehicles)
            .service(healthz)
    })
    .bind(bind)?
    .run()
    .await
}
