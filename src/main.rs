use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use canteen::application::catalog::{OrderStatsSource, ProductCatalog};
use canteen::application::order_service::OrderService;
use canteen::application::product_service::ProductService;
use canteen::application::recommend_service::RecommendService;
use canteen::application::user_service::UserService;
use canteen::data::behavior_repository::InMemoryBehaviorRepository;
use canteen::data::order_repository::InMemoryOrderRepository;
use canteen::data::product_repository::InMemoryProductRepository;
use canteen::data::seed::{DEMO_MERCHANT_ID, seed_catalog, seed_users};
use canteen::data::user_repository::InMemoryUserRepository;
use canteen::gateway::{self, proxy::GatewayState};
use canteen::infrastructure::config::{AppConfig, ServiceKind};
use canteen::infrastructure::http_client::{HttpOrderStats, HttpProductCatalog};
use canteen::infrastructure::logging::init_logging;
use canteen::presentation::middleware::{JwtAuthMiddleware, RequestIdMiddleware, TimingMiddleware};
use canteen::presentation::{cors, extractor_config, orders, products, recommend, users};
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::{info, instrument};

/// Builds an `App` with the middleware stack every server shares.
macro_rules! service_app {
    ($data:expr, $secret:expr, $configure:path) => {
        App::new()
            .app_data($data.clone())
            .configure(extractor_config)
            .configure($configure)
            .wrap(JwtAuthMiddleware::new(&$secret))
            .wrap(TimingMiddleware)
            .wrap(RequestIdMiddleware)
            .wrap(cors())
    };
}

/// Binds a server for `kind` on its configured port and starts it.
macro_rules! start {
    ($kind:expr, $config:expr, $server:expr) => {{
        let port = $config.port($kind);
        let server = $server
            .bind(($config.host.as_str(), port))
            .with_context(|| format!("Failed to bind the {} service to port {}", $kind.name(), port))?
            .run();
        info!(service = $kind.name(), host = %$config.host, port, "Server bound");
        server
    }};
}

#[tokio::main]
#[instrument]
async fn main() -> Result<()> {
    init_logging();
    let config = AppConfig::load().context("Failed to load configuration")?;
    info!(services = ?config.enabled_services, host = %config.host, "Configuration loaded");

    let user_repository = Arc::new(InMemoryUserRepository::new());
    let product_repository = Arc::new(InMemoryProductRepository::new());
    if config.seed_demo_data {
        if config.runs(ServiceKind::User) {
            seed_users(user_repository.as_ref()).await?;
        }
        if config.runs(ServiceKind::Product) {
            seed_catalog(product_repository.as_ref(), DEMO_MERCHANT_ID).await?;
        }
    }

    let product_service = Arc::new(ProductService::new(product_repository));
    // Peers running in this process are called directly, the rest over HTTP.
    let catalog: Arc<dyn ProductCatalog> = if config.runs(ServiceKind::Product) {
        product_service.clone()
    } else {
        Arc::new(HttpProductCatalog::new(
            config.service_url(ServiceKind::Product),
            config.upstream_timeout,
        )?)
    };

    let order_service = Arc::new(OrderService::new(
        Arc::new(InMemoryOrderRepository::new()),
        catalog.clone(),
    ));
    let order_stats: Arc<dyn OrderStatsSource> = if config.runs(ServiceKind::Order) {
        order_service.clone()
    } else {
        Arc::new(HttpOrderStats::new(
            config.service_url(ServiceKind::Order),
            config.upstream_timeout,
        )?)
    };

    let user_service = Arc::new(UserService::new(
        user_repository,
        order_stats,
        config.jwt_secret.clone(),
        config.token_ttl_secs,
    ));
    let recommend_service = Arc::new(RecommendService::new(
        Arc::new(InMemoryBehaviorRepository::new()),
        catalog,
    ));

    let mut servers: Vec<Server> = Vec::new();
    let secret = config.jwt_secret.clone();

    if config.runs(ServiceKind::User) {
        let data = web::Data::from(user_service);
        let secret = secret.clone();
        let server = HttpServer::new(move || service_app!(data, secret, users::configure));
        servers.push(start!(ServiceKind::User, config, server));
    }
    if config.runs(ServiceKind::Product) {
        let data = web::Data::from(product_service);
        let secret = secret.clone();
        let server = HttpServer::new(move || service_app!(data, secret, products::configure));
        servers.push(start!(ServiceKind::Product, config, server));
    }
    if config.runs(ServiceKind::Order) {
        let data = web::Data::from(order_service);
        let secret = secret.clone();
        let server = HttpServer::new(move || service_app!(data, secret, orders::configure));
        servers.push(start!(ServiceKind::Order, config, server));
    }
    if config.runs(ServiceKind::Recommend) {
        let data = web::Data::from(recommend_service);
        let secret = secret.clone();
        let server = HttpServer::new(move || service_app!(data, secret, recommend::configure));
        servers.push(start!(ServiceKind::Recommend, config, server));
    }
    if config.runs(ServiceKind::Gateway) {
        let data = web::Data::new(GatewayState::from_config(&config)?);
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .configure(gateway::configure)
                .wrap(TimingMiddleware)
                .wrap(RequestIdMiddleware)
                .wrap(cors())
        });
        servers.push(start!(ServiceKind::Gateway, config, server));
    }

    if servers.is_empty() {
        anyhow::bail!("CANTEEN_SERVICES selects no service to run");
    }

    info!(count = servers.len(), "Starting HTTP servers");
    try_join_all(servers).await?;
    info!("All servers stopped");
    Ok(())
}
