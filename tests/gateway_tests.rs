use actix_web::{App, HttpResponse, HttpServer, test, web};
use canteen::application::product_service::ProductService;
use canteen::data::product_repository::InMemoryProductRepository;
use canteen::data::seed::{DEMO_MERCHANT_ID, seed_catalog};
use canteen::domain::user::Role;
use canteen::gateway::{self, proxy::GatewayState};
use canteen::infrastructure::config::ServiceKind;
use canteen::infrastructure::security::generate_token;
use canteen::presentation::middleware::JwtAuthMiddleware;
use canteen::presentation::{extractor_config, products};
use serde_json::Value;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "test-secret-key-for-gateway-tests";

/// Starts a seeded product service on an ephemeral port and returns its URL.
async fn spawn_product_service() -> String {
    let repository = Arc::new(InMemoryProductRepository::new());
    seed_catalog(repository.as_ref(), DEMO_MERCHANT_ID).await.unwrap();
    let data = web::Data::new(ProductService::new(repository));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(extractor_config)
            .configure(products::configure)
            .wrap(JwtAuthMiddleware::new(SECRET))
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}

/// A service that answers every request, but only after `delay`.
fn spawn_slow_service(delay: Duration) -> String {
    let server = HttpServer::new(move || {
        App::new().default_service(web::to(move || async move {
            actix_web::rt::time::sleep(delay).await;
            HttpResponse::Ok().finish()
        }))
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}

/// A URL nothing listens on.
fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn gateway_state(product_url: &str, timeout: Duration, enforce_auth: bool) -> GatewayState {
    let dead = dead_url();
    let upstreams = HashMap::from([
        (ServiceKind::User, dead.clone()),
        (ServiceKind::Product, product_url.to_string()),
        (ServiceKind::Order, dead.clone()),
        (ServiceKind::Recommend, dead),
    ]);
    GatewayState::new(upstreams, timeout, enforce_auth, SECRET.to_string()).unwrap()
}

macro_rules! setup_gateway {
    ($state:expr) => {{
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(gateway::configure),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_forwards_to_product_service() {
    let product_url = spawn_product_service().await;
    let app = setup_gateway!(gateway_state(&product_url, Duration::from_secs(5), false));

    let req = test::TestRequest::get().uri("/api/products?size=3").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["total"], 18);
    assert_eq!(body["data"]["records"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::get().uri("/api/products/999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 404);
}

#[actix_web::test]
async fn test_duplicated_segment_is_collapsed() {
    let product_url = spawn_product_service().await;
    let app = setup_gateway!(gateway_state(&product_url, Duration::from_secs(5), false));

    let req = test::TestRequest::get()
        .uri("/api/products/products/categories")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 8);
}

#[actix_web::test]
async fn test_unknown_prefix_is_404_envelope() {
    let app = setup_gateway!(gateway_state(&dead_url(), Duration::from_secs(5), false));

    let req = test::TestRequest::get().uri("/api/payments/1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 404);
    assert!(body["data"].is_null());

    // Service-to-service routes are not exposed.
    let req = test::TestRequest::get().uri("/internal/orders/stats/3").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_unreachable_service_is_502() {
    let app = setup_gateway!(gateway_state(&dead_url(), Duration::from_secs(5), false));

    let req = test::TestRequest::get().uri("/api/orders/page").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 502);
    assert!(body["message"].as_str().unwrap().contains("order"));
}

#[actix_web::test]
async fn test_slow_service_is_504() {
    let slow_url = spawn_slow_service(Duration::from_secs(2));
    let app = setup_gateway!(gateway_state(&slow_url, Duration::from_millis(200), false));

    let req = test::TestRequest::get().uri("/api/products/hot").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 504);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 504);
}

#[actix_web::test]
async fn test_enforced_auth_guards_private_paths() {
    let product_url = spawn_product_service().await;
    let app = setup_gateway!(gateway_state(&product_url, Duration::from_secs(5), true));

    // Public menu reads pass without a token.
    let req = test::TestRequest::get().uri("/api/products/hot").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get().uri("/api/orders/page").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::get()
        .uri("/api/orders/page")
        .insert_header(("Authorization", "Bearer forged"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    // A valid token gets through to the (unreachable) order service.
    let token = generate_token(3, "student", Role::User, SECRET, 3600).unwrap();
    let req = test::TestRequest::get()
        .uri("/api/orders/page")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);
}

#[actix_web::test]
async fn test_enforced_auth_judges_the_rewritten_path() {
    let product_url = spawn_product_service().await;
    let app = setup_gateway!(gateway_state(&product_url, Duration::from_secs(5), true));

    // Login is public even when the client doubles the prefix; the user
    // service is down, so getting past auth shows up as a 502.
    let req = test::TestRequest::post()
        .uri("/api/users/users/login")
        .set_json(serde_json::json!({ "username": "student", "password": "student123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);

    let req = test::TestRequest::post()
        .uri("/api/users/users/register")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);

    let req = test::TestRequest::get()
        .uri("/api/products/products/hot")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // The doubled form of a merchant route is still private.
    let req = test::TestRequest::get()
        .uri("/api/products/products/merchant/list")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 401);
}

#[actix_web::test]
async fn test_authorization_header_reaches_upstream() {
    let product_url = spawn_product_service().await;
    let app = setup_gateway!(gateway_state(&product_url, Duration::from_secs(5), false));

    let req = test::TestRequest::get()
        .uri("/api/products/merchant/list")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let token = generate_token(DEMO_MERCHANT_ID, "merchant", Role::Merchant, SECRET, 3600).unwrap();
    let req = test::TestRequest::get()
        .uri("/api/products/merchant/list?size=100")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 18);
}

#[actix_web::test]
async fn test_health_and_status() {
    let app = setup_gateway!(gateway_state(&dead_url(), Duration::from_secs(5), false));

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["status"], "UP");
    assert!(body["data"]["services"]["product"].is_string());

    let req = test::TestRequest::get().uri("/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["gateway"], "UP");
    assert_eq!(body["routes"].as_array().unwrap().len(), 7);
}
