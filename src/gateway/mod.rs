//! Single entry point for the frontend: routes `/api/...` calls to the owning
//! service by path prefix.

pub mod proxy;
pub mod routes;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/health", web::get().to(proxy::health))
        .route("/status", web::get().to(proxy::status))
        .route("/{tail:.*}", web::route().to(proxy::forward));
}
