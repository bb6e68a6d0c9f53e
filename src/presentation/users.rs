use crate::application::user_service::UserService;
use crate::data::user_repository::InMemoryUserRepository;
use crate::domain::page::PageRequest;
use crate::domain::user::{
    ChangePassword, CreateUser, LoginRequest, ResetPassword, Role, UpdateStatus, UpdateUser,
};
use crate::presentation::envelope::{ApiError, ApiResponse};
use crate::presentation::health_body;
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use tracing::{error, info, instrument};

pub type UserApi = UserService<InMemoryUserRepository>;

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub current: Option<u64>,
    pub size: Option<u64>,
    pub role: Option<String>,
    pub keyword: Option<String>,
}

#[instrument(skip(service, req), fields(username = %req.username))]
pub async fn register(
    service: web::Data<UserApi>,
    req: web::Json<CreateUser>,
) -> Result<HttpResponse, ApiError> {
    info!("Registration request received");
    let user = service.register(req.into_inner()).await.map_err(|e| {
        error!(error = %e, "Failed to register user");
        ApiError::from(e)
    })?;
    Ok(ApiResponse::ok_with("Registration successful", user))
}

#[instrument(skip(service, req), fields(username = %req.username))]
pub async fn login(
    service: web::Data<UserApi>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let login = service.login(req.into_inner(), None).await?;
    Ok(ApiResponse::ok_with("Login successful", login))
}

#[instrument(skip(service, user), fields(user_id = user.user_id))]
pub async fn info(
    service: web::Data<UserApi>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let profile = service.get_user(user.user_id).await?;
    Ok(ApiResponse::ok(profile))
}

#[instrument(skip(service, user, req), fields(user_id = user.user_id))]
pub async fn update_info(
    service: web::Data<UserApi>,
    user: AuthenticatedUser,
    req: web::Json<UpdateUser>,
) -> Result<HttpResponse, ApiError> {
    let profile = service.update_info(user.user_id, req.into_inner()).await?;
    Ok(ApiResponse::ok_with("Profile updated", profile))
}

#[instrument(skip(service, user, req), fields(user_id = user.user_id))]
pub async fn change_password(
    service: web::Data<UserApi>,
    user: AuthenticatedUser,
    req: web::Json<ChangePassword>,
) -> Result<HttpResponse, ApiError> {
    service.change_password(user.user_id, req.into_inner()).await?;
    Ok(ApiResponse::ok_with("Password changed", ()))
}

#[instrument(skip(service, user), fields(user_id = user.user_id))]
pub async fn stats(
    service: web::Data<UserApi>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let stats = service.user_stats(user.user_id).await?;
    Ok(ApiResponse::ok(stats))
}

/// Tokens are stateless, so logging out is the client dropping its token.
pub async fn logout(user: Option<AuthenticatedUser>) -> HttpResponse {
    if let Some(user) = user {
        info!(user_id = user.user_id, "User logged out");
    }
    ApiResponse::ok_with("Logged out", ())
}

pub async fn health() -> HttpResponse {
    ApiResponse::ok(health_body("user-service"))
}

#[instrument(skip(service, req), fields(username = %req.username))]
pub async fn admin_login(
    service: web::Data<UserApi>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let login = service.login(req.into_inner(), Some(Role::Admin)).await?;
    Ok(ApiResponse::ok_with("Login successful", login))
}

#[instrument(skip(service, admin, query))]
pub async fn list_users(
    service: web::Data<UserApi>,
    admin: AuthenticatedUser,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    let query = query.into_inner();
    let role = query
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(str::parse::<Role>)
        .transpose()
        .map_err(ApiError::Validation)?;

    let page = service
        .list_users(role, query.keyword, PageRequest::new(query.current, query.size))
        .await?;
    Ok(ApiResponse::ok(page))
}

#[instrument(skip(service, admin))]
pub async fn get_user(
    service: web::Data<UserApi>,
    admin: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    let user = service.get_user(path.into_inner()).await?;
    Ok(ApiResponse::ok(user))
}

#[instrument(skip(service, admin, req))]
pub async fn set_status(
    service: web::Data<UserApi>,
    admin: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<UpdateStatus>,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    let user = service
        .set_status(admin.user_id, path.into_inner(), req.status)
        .await?;
    Ok(ApiResponse::ok_with("Status updated", user))
}

#[instrument(skip(service, admin, req))]
pub async fn reset_password(
    service: web::Data<UserApi>,
    admin: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<ResetPassword>,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    service
        .reset_password(path.into_inner(), &req.new_password)
        .await?;
    Ok(ApiResponse::ok_with("Password reset", ()))
}

pub async fn statistics(
    service: web::Data<UserApi>,
    admin: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    Ok(ApiResponse::ok(service.statistics().await?))
}

pub async fn pending_merchants(
    service: web::Data<UserApi>,
    admin: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    Ok(ApiResponse::ok(service.pending_merchants().await?))
}

#[instrument(skip(service, admin))]
pub async fn approve_merchant(
    service: web::Data<UserApi>,
    admin: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    admin.require_role(Role::Admin)?;
    let merchant = service.approve_merchant(path.into_inner()).await?;
    Ok(ApiResponse::ok_with("Merchant approved", merchant))
}

#[instrument(skip(service, req), fields(username = %req.username))]
pub async fn merchant_register(
    service: web::Data<UserApi>,
    req: web::Json<CreateUser>,
) -> Result<HttpResponse, ApiError> {
    let merchant = service.register_merchant(req.into_inner()).await?;
    Ok(ApiResponse::ok_with(
        "Registration submitted, waiting for administrator approval",
        merchant,
    ))
}

#[instrument(skip(service, req), fields(username = %req.username))]
pub async fn merchant_login(
    service: web::Data<UserApi>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let login = service.login(req.into_inner(), Some(Role::Merchant)).await?;
    Ok(ApiResponse::ok_with("Login successful", login))
}

pub async fn merchant_info(
    service: web::Data<UserApi>,
    merchant: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    merchant.require_role(Role::Merchant)?;
    Ok(ApiResponse::ok(service.get_user(merchant.user_id).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/users")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/info", web::get().to(info))
            .route("/info", web::put().to(update_info))
            .route("/change-password", web::post().to(change_password))
            .route("/stats", web::get().to(stats))
            .route("/logout", web::post().to(logout))
            .route("/health", web::get().to(health)),
    )
    .service(
        web::scope("/api/admin")
            .route("/login", web::post().to(admin_login))
            .route("/users", web::get().to(list_users))
            .route("/users/statistics", web::get().to(statistics))
            .route("/users/merchants/pending", web::get().to(pending_merchants))
            .route("/users/merchants/{id}/approve", web::put().to(approve_merchant))
            .route("/users/{id}", web::get().to(get_user))
            .route("/users/{id}/status", web::put().to(set_status))
            .route("/users/{id}/password/reset", web::put().to(reset_password)),
    )
    .service(
        web::scope("/api/merchant")
            .route("/register", web::post().to(merchant_register))
            .route("/login", web::post().to(merchant_login))
            .route("/info", web::get().to(merchant_info)),
    );
}
