use crate::application::catalog::ProductCatalog;
use crate::application::product_service::{DEFAULT_HOT_LIMIT, ProductService};
use crate::data::product_repository::InMemoryProductRepository;
use crate::domain::page::PageRequest;
use crate::domain::product::{
    CreateProduct, PriceRange, ProductFilter, ProductStatus, SetHot, SetProductStatus, SetStock,
    SortBy, StockChange, UpdateProduct,
};
use crate::domain::user::Role;
use crate::presentation::envelope::{ApiError, ApiResponse};
use crate::presentation::health_body;
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

pub type ProductApi = ProductService<InMemoryProductRepository>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    pub current: Option<u64>,
    pub size: Option<u64>,
    pub category_id: Option<u64>,
    pub keyword: Option<String>,
    pub price_range: Option<String>,
    pub sort_by: Option<String>,
}

impl ProductListQuery {
    fn filter(&self) -> Result<ProductFilter, ApiError> {
        let price_range = match self.price_range.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                PriceRange::parse(raw)
                    .ok_or_else(|| ApiError::Validation(format!("Unknown price range: {}", raw)))?,
            ),
        };
        let sort_by = match self.sort_by.as_deref() {
            None => SortBy::default(),
            Some(raw) => SortBy::parse(raw)
                .ok_or_else(|| ApiError::Validation(format!("Unknown sort order: {}", raw)))?,
        };
        Ok(ProductFilter {
            category_id: self.category_id,
            keyword: self.keyword.clone(),
            price_range,
            sort_by,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusPageQuery {
    pub current: Option<u64>,
    pub size: Option<u64>,
    pub status: Option<ProductStatus>,
    pub keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[instrument(skip(service))]
pub async fn list(
    service: web::Data<ProductApi>,
    query: web::Query<ProductListQuery>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.filter()?;
    let page = service
        .list_products(filter, PageRequest::new(query.current, query.size))
        .await?;
    Ok(ApiResponse::ok(page))
}

#[instrument(skip(service), fields(product_id = %*path))]
pub async fn detail(
    service: web::Data<ProductApi>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    Ok(ApiResponse::ok(service.get_product(path.into_inner()).await?))
}

pub async fn categories(service: web::Data<ProductApi>) -> Result<HttpResponse, ApiError> {
    Ok(ApiResponse::ok(service.categories().await?))
}

pub async fn by_category(
    service: web::Data<ProductApi>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    Ok(ApiResponse::ok(
        service.products_in_category(path.into_inner()).await?,
    ))
}

pub async fn hot(
    service: web::Data<ProductApi>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HOT_LIMIT);
    Ok(ApiResponse::ok(service.hot_products(limit).await?))
}

pub async fn stats(service: web::Data<ProductApi>) -> Result<HttpResponse, ApiError> {
    Ok(ApiResponse::ok(service.stats().await?))
}

pub async fn count(service: web::Data<ProductApi>) -> Result<HttpResponse, ApiError> {
    Ok(ApiResponse::ok(service.count().await?))
}

pub async fn health() -> HttpResponse {
    ApiResponse::ok(health_body("product-service"))
}

#[instrument(skip(service, merchant), fields(merchant_id = merchant.user_id))]
pub async fn merchant_list(
    service: web::Data<ProductApi>,
    merchant: AuthenticatedUser,
    query: web::Query<StatusPageQuery>,
) -> Result<HttpResponse, ApiError> {
    merchant.require_role(Role::Merchant)?;
    let page = service
        .merchant_products(
            merchant.user_id,
            query.status,
            PageRequest::new(query.current, query.size),
        )
        .await?;
    Ok(ApiResponse::ok(page))
}

pub async fn merchant_top(
    service: web::Data<ProductApi>,
    merchant: AuthenticatedUser,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    merchant.require_role(Role::Merchant)?;
    let limit = query.limit.unwrap_or(DEFAULT_HOT_LIMIT);
    Ok(ApiResponse::ok(
        service.merchant_top_products(merchant.user_id, limit).await?,
    ))
}

#[instrument(skip(service, merchant, req), fields(merchant_id = merchant.user_id))]
pub async fn create(
    service: web::Data<ProductApi>,
    merchant: AuthenticatedUser,
    req: web::Json<CreateProduct>,
) -> Result<HttpResponse, ApiError> {
    merchant.require_role(Role::Merchant)?;
    let product = service
        .create_product(merchant.user_id, req.into_inner())
        .await?;
    info!(product_id = product.id, "Product published");
    Ok(ApiResponse::ok_with("Product created", product))
}

#[instrument(skip(service, user, req), fields(product_id = %*path))]
pub async fn update(
    service: web::Data<ProductApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<UpdateProduct>,
) -> Result<HttpResponse, ApiError> {
    user.require_any(&[Role::Merchant, Role::Admin])?;
    let product = service
        .update_product(user.actor(), path.into_inner(), req.into_inner())
        .await?;
    Ok(ApiResponse::ok_with("Product updated", product))
}

#[instrument(skip(service, user), fields(product_id = %*path))]
pub async fn delete(
    service: web::Data<ProductApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    user.require_any(&[Role::Merchant, Role::Admin])?;
    service.delete_product(user.actor(), path.into_inner()).await?;
    Ok(ApiResponse::ok_with("Product deleted", ()))
}

#[instrument(skip(service, user, req), fields(product_id = %*path))]
pub async fn set_status(
    service: web::Data<ProductApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<SetProductStatus>,
) -> Result<HttpResponse, ApiError> {
    user.require_any(&[Role::Merchant, Role::Admin])?;
    let product = service
        .set_status(user.actor(), path.into_inner(), req.status)
        .await?;
    Ok(ApiResponse::ok_with("Status updated", product))
}

#[instrument(skip(service, user, req), fields(product_id = %*path))]
pub async fn set_stock(
    service: web::Data<ProductApi>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<SetStock>,
) -> Result<HttpResponse, ApiError> {
    user.require_any(&[Role::Merchant, Role::Admin])?;
    let product = service
        .set_stock(user.actor(), path.into_inner(), req.stock)
        .await?;
    Ok(ApiResponse::ok_with("Stock updated", product))
}

pub async fn admin_list(
    service: web::Data<ProductApi>,
    admin: AuthenticatedUser,
    query: web::Query<StatusPageQuery>,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    let query = query.into_inner();
    let page = service
        .admin_list(
            query.status,
            query.keyword,
            PageRequest::new(query.current, query.size),
        )
        .await?;
    Ok(ApiResponse::ok(page))
}

#[instrument(skip(service, admin, req), fields(product_id = %*path))]
pub async fn set_recommended(
    service: web::Data<ProductApi>,
    admin: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<SetHot>,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    let product = service.set_hot(path.into_inner(), req.is_hot).await?;
    Ok(ApiResponse::ok_with("Recommendation flag updated", product))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub approved: bool,
    pub reason: Option<String>,
}

#[instrument(skip(service, admin, query), fields(product_id = %*path, approved = query.approved))]
pub async fn audit(
    service: web::Data<ProductApi>,
    admin: AuthenticatedUser,
    path: web::Path<u64>,
    query: web::Query<AuditQuery>,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    let AuditQuery { approved, reason } = query.into_inner();
    let product = service
        .audit_product(path.into_inner(), approved, reason)
        .await?;
    Ok(ApiResponse::ok_with("Product audit recorded", product))
}

pub async fn internal_lookup(
    service: web::Data<ProductApi>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    Ok(ApiResponse::ok(service.get_product(path.into_inner()).await?))
}

pub async fn internal_menu(service: web::Data<ProductApi>) -> Result<HttpResponse, ApiError> {
    Ok(ApiResponse::ok(service.on_sale_products().await?))
}

#[instrument(skip(service, req), fields(product_id = %*path, quantity = req.quantity))]
pub async fn internal_reserve(
    service: web::Data<ProductApi>,
    path: web::Path<u64>,
    req: web::Json<StockChange>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    service.reserve_stock(id, req.quantity).await?;
    Ok(ApiResponse::ok(json!({ "productId": id, "reserved": req.quantity })))
}

#[instrument(skip(service, req), fields(product_id = %*path, quantity = req.quantity))]
pub async fn internal_release(
    service: web::Data<ProductApi>,
    path: web::Path<u64>,
    req: web::Json<StockChange>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    service.release_stock(id, req.quantity).await?;
    Ok(ApiResponse::ok(json!({ "productId": id, "released": req.quantity })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/products")
            .route("", web::get().to(list))
            .route("/categories", web::get().to(categories))
            .route("/category/{category_id}", web::get().to(by_category))
            .route("/hot", web::get().to(hot))
            .route("/stats", web::get().to(stats))
            .route("/count", web::get().to(count))
            .route("/health", web::get().to(health))
            .route("/merchant/list", web::get().to(merchant_list))
            .route("/merchant/top", web::get().to(merchant_top))
            .route("/merchant", web::post().to(create))
            .route("/merchant/{id}", web::put().to(update))
            .route("/merchant/{id}", web::delete().to(delete))
            .route("/merchant/{id}/status", web::put().to(set_status))
            .route("/merchant/{id}/stock", web::put().to(set_stock))
            .route("/admin/list", web::get().to(admin_list))
            .route("/admin/{id}/recommend", web::put().to(set_recommended))
            .route("/admin/{id}/audit", web::put().to(audit))
            .route("/{id}", web::get().to(detail)),
    )
    .service(
        web::scope("/internal/products")
            .route("", web::get().to(internal_menu))
            .route("/{id}", web::get().to(internal_lookup))
            .route("/{id}/reserve", web::post().to(internal_reserve))
            .route("/{id}/release", web::post().to(internal_release)),
    );
}
