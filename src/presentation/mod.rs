pub mod envelope;
pub mod middleware;
pub mod orders;
pub mod products;
pub mod recommend;
pub mod users;

use actix_cors::Cors;
use actix_web::http::{Method, header};
use actix_web::web;
use chrono::Utc;
use serde_json::{Value, json};

/// Same policy on every server: any origin, the verbs the frontend uses, and
/// the two headers it sends.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allowed_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([
            header::HeaderName::from_static("x-request-id"),
            header::HeaderName::from_static("x-response-time"),
        ])
        .max_age(3600)
}

/// Routes extractor failures through the envelope.
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(envelope::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(envelope::query_error_handler))
        .app_data(web::PathConfig::default().error_handler(envelope::path_error_handler));
}

pub fn health_body(service: &str) -> Value {
    json!({
        "status": "UP",
        "service": service,
        "timestamp": Utc::now().to_rfc3339(),
    })
}
