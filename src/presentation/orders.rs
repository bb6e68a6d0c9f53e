use crate::application::order_service::{DEFAULT_TREND_DAYS, OrderService};
use crate::data::order_repository::InMemoryOrderRepository;
use crate::domain::order::{CreateOrder, OrderStatus, RejectOrder, UpdateOrderStatus};
use crate::domain::page::PageRequest;
use crate::domain::user::Role;
use crate::presentation::envelope::{ApiError, ApiResponse};
use crate::presentation::health_body;
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use tracing::{error, info, instrument};

pub type OrderApi = OrderService<InMemoryOrderRepository>;

#[derive(Debug, Deserialize)]
pub struct OrderPageQuery {
    pub current: Option<u64>,
    pub size: Option<u64>,
    pub status: Option<OrderStatus>,
}

impl OrderPageQuery {
    fn page(&self) -> PageRequest {
        PageRequest::new(self.current, self.size)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdQuery {
    pub user_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<OrderStatus>,
}

#[instrument(skip(service, user, req), fields(user_id = user.user_id))]
pub async fn create(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    req: web::Json<CreateOrder>,
) -> Result<HttpResponse, ApiError> {
    info!(items = req.items.len(), "Order request received");
    let detail = service
        .create_order(user.user_id, req.into_inner())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create order");
            ApiError::from(e)
        })?;
    Ok(ApiResponse::ok_with("Order created", detail))
}

#[instrument(skip(service, user), fields(user_id = user.user_id))]
pub async fn my_orders(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    query: web::Query<OrderPageQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = service
        .user_orders_page(user.user_id, query.status, query.page())
        .await?;
    Ok(ApiResponse::ok(page))
}

pub async fn list_for_user_query(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    query: web::Query<UserIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let orders = service.orders_for_user(user.actor(), query.user_id).await?;
    Ok(ApiResponse::ok(orders))
}

pub async fn list_for_user(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let orders = service
        .orders_for_user(user.actor(), path.into_inner())
        .await?;
    Ok(ApiResponse::ok(orders))
}

pub async fn all_orders(
    service: web::Data<OrderApi>,
    admin: AuthenticatedUser,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    Ok(ApiResponse::ok(service.all_orders(query.status).await?))
}

#[instrument(skip(service, user), fields(order_id = %*path))]
pub async fn get_order(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let detail = service.order_detail(user.actor(), path.into_inner()).await?;
    Ok(ApiResponse::ok(detail.order))
}

#[instrument(skip(service, user), fields(order_id = %*path))]
pub async fn detail(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let detail = service.order_detail(user.actor(), path.into_inner()).await?;
    Ok(ApiResponse::ok(detail))
}

#[instrument(skip(service, user, req), fields(order_id = %*path, status = %req.status))]
pub async fn update_status(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<UpdateOrderStatus>,
) -> Result<HttpResponse, ApiError> {
    let order = service
        .update_status(user.actor(), path.into_inner(), req.status)
        .await?;
    Ok(ApiResponse::ok_with("Order status updated", order))
}

#[instrument(skip(service, user), fields(order_id = %*path))]
pub async fn pay(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let order = service.pay(user.actor(), path.into_inner()).await?;
    Ok(ApiResponse::ok_with("Payment successful", order))
}

#[instrument(skip(service, user), fields(order_id = %*path))]
pub async fn cancel(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let order = service.cancel(user.actor(), path.into_inner()).await?;
    Ok(ApiResponse::ok_with("Order cancelled", order))
}

#[instrument(skip(service, user), fields(order_id = %*path))]
pub async fn prepare(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let order = service.prepare(user.actor(), path.into_inner()).await?;
    Ok(ApiResponse::ok_with("Order is being prepared", order))
}

#[instrument(skip(service, user), fields(order_id = %*path))]
pub async fn ready(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let order = service.ready(user.actor(), path.into_inner()).await?;
    Ok(ApiResponse::ok_with("Order is ready for pickup", order))
}

#[instrument(skip(service, user), fields(order_id = %*path))]
pub async fn complete(
    service: web::Data<OrderApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let order = service.complete(user.actor(), path.into_inner()).await?;
    Ok(ApiResponse::ok_with("Order completed", order))
}

/// Called by the user service for profile figures.
pub async fn user_stats(
    service: web::Data<OrderApi>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    Ok(ApiResponse::ok(
        service.user_order_stats(path.into_inner()).await?,
    ))
}

pub async fn count(
    service: web::Data<OrderApi>,
    admin: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    Ok(ApiResponse::ok(service.count().await?))
}

pub async fn status_stats(
    service: web::Data<OrderApi>,
    admin: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    Ok(ApiResponse::ok(service.status_counts().await?))
}

pub async fn total_sales(
    service: web::Data<OrderApi>,
    admin: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    Ok(ApiResponse::ok(service.total_sales().await?))
}

pub async fn today_sales(
    service: web::Data<OrderApi>,
    admin: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    Ok(ApiResponse::ok(service.today_sales().await?))
}

#[instrument(skip(service, merchant), fields(merchant_id = merchant.user_id))]
pub async fn merchant_list(
    service: web::Data<OrderApi>,
    merchant: AuthenticatedUser,
    query: web::Query<OrderPageQuery>,
) -> Result<HttpResponse, ApiError> {
    merchant.require_role(Role::Merchant)?;
    let page = service
        .merchant_orders(merchant.user_id, query.status, query.page())
        .await?;
    Ok(ApiResponse::ok(page))
}

pub async fn merchant_stats(
    service: web::Data<OrderApi>,
    merchant: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    merchant.require_role(Role::Merchant)?;
    Ok(ApiResponse::ok(
        service.merchant_stats(merchant.user_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<u32>,
}

pub async fn merchant_trends(
    service: web::Data<OrderApi>,
    merchant: AuthenticatedUser,
    query: web::Query<TrendQuery>,
) -> Result<HttpResponse, ApiError> {
    merchant.require_role(Role::Merchant)?;
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    Ok(ApiResponse::ok(
        service.merchant_trends(merchant.user_id, days).await?,
    ))
}

#[instrument(skip(service, merchant), fields(order_id = %*path, merchant_id = merchant.user_id))]
pub async fn accept(
    service: web::Data<OrderApi>,
    merchant: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    merchant.require_role(Role::Merchant)?;
    let order = service.accept(merchant.user_id, path.into_inner()).await?;
    Ok(ApiResponse::ok_with("Order accepted", order))
}

#[instrument(skip(service, merchant, req), fields(order_id = %*path, merchant_id = merchant.user_id))]
pub async fn reject(
    service: web::Data<OrderApi>,
    merchant: AuthenticatedUser,
    path: web::Path<u64>,
    req: Option<web::Json<RejectOrder>>,
) -> Result<HttpResponse, ApiError> {
    merchant.require_role(Role::Merchant)?;
    let reason = req.and_then(|r| r.into_inner().reason);
    let order = service
        .reject(merchant.user_id, path.into_inner(), reason)
        .await?;
    Ok(ApiResponse::ok_with("Order rejected", order))
}

pub async fn health() -> HttpResponse {
    ApiResponse::ok(health_body("order-service"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/orders")
            .route("", web::post().to(create))
            .route("", web::get().to(all_orders))
            .route("/page", web::get().to(my_orders))
            .route("/list", web::get().to(list_for_user_query))
            .route("/user/{user_id}", web::get().to(list_for_user))
            .route("/count", web::get().to(count))
            .route("/stats/status", web::get().to(status_stats))
            .route("/sales/total", web::get().to(total_sales))
            .route("/sales/today", web::get().to(today_sales))
            .route("/merchant/list", web::get().to(merchant_list))
            .route("/merchant/stats", web::get().to(merchant_stats))
            .route("/merchant/trends", web::get().to(merchant_trends))
            .route("/merchant/{id}/accept", web::put().to(accept))
            .route("/merchant/{id}/reject", web::put().to(reject))
            .route("/health", web::get().to(health))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/detail", web::get().to(detail))
            .route("/{id}/status", web::put().to(update_status))
            .route("/{id}/pay", web::post().to(pay))
            .route("/{id}/cancel", web::post().to(cancel))
            .route("/{id}/prepare", web::post().to(prepare))
            .route("/{id}/ready", web::post().to(ready))
            .route("/{id}/complete", web::post().to(complete)),
    )
    .service(
        web::scope("/internal/orders").route("/stats/{user_id}", web::get().to(user_stats)),
    );
}
