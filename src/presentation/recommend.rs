use crate::application::recommend_service::{DEFAULT_LIMIT, DEFAULT_SIMILAR_LIMIT, RecommendService};
use crate::data::behavior_repository::InMemoryBehaviorRepository;
use crate::domain::recommend::RecordBehavior;
use crate::domain::user::Role;
use crate::presentation::envelope::{ApiError, ApiResponse};
use crate::presentation::health_body;
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use tracing::instrument;

pub type RecommendApi = RecommendService<InMemoryBehaviorRepository>;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub async fn hot(
    service: web::Data<RecommendApi>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(ApiResponse::ok(service.hot(limit).await?))
}

#[instrument(skip(service), fields(user_id = %*path))]
pub async fn personal(
    service: web::Data<RecommendApi>,
    path: web::Path<u64>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(ApiResponse::ok(
        service.personal(path.into_inner(), limit).await?,
    ))
}

#[instrument(skip(service), fields(product_id = %*path))]
pub async fn similar(
    service: web::Data<RecommendApi>,
    path: web::Path<u64>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);
    Ok(ApiResponse::ok(
        service.similar(path.into_inner(), limit).await?,
    ))
}

pub async fn newest(
    service: web::Data<RecommendApi>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(ApiResponse::ok(service.newest(limit).await?))
}

/// A token is optional here; when present it must belong to the user the
/// behavior is recorded for.
#[instrument(skip(service, user, req), fields(user_id = req.user_id, action = ?req.action))]
pub async fn record_behavior(
    service: web::Data<RecommendApi>,
    user: Option<AuthenticatedUser>,
    req: web::Json<RecordBehavior>,
) -> Result<HttpResponse, ApiError> {
    if let Some(user) = user {
        if user.user_id != req.user_id && user.role != Role::Admin {
            return Err(ApiError::Forbidden(
                "Behavior can only be recorded for yourself".to_string(),
            ));
        }
    }
    let behavior = service.record_behavior(req.into_inner()).await?;
    Ok(ApiResponse::ok_with("Behavior recorded", behavior))
}

pub async fn statistics(
    service: web::Data<RecommendApi>,
    admin: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    Ok(ApiResponse::ok(service.statistics().await?))
}

pub async fn health() -> HttpResponse {
    ApiResponse::ok(health_body("recommend-service"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/recommend")
            .route("/hot", web::get().to(hot))
            .route("/personal/{user_id}", web::get().to(personal))
            .route("/products/{user_id}", web::get().to(personal))
            .route("/similar/{product_id}", web::get().to(similar))
            .route("/new", web::get().to(newest))
            .route("/behavior", web::post().to(record_behavior))
            .route("/health", web::get().to(health)),
    )
    .route(
        "/api/admin/recommend/statistics",
        web::get().to(statistics),
    );
}
