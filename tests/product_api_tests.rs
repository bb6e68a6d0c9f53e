use actix_web::{App, test, web};
use canteen::application::product_service::ProductService;
use canteen::data::product_repository::InMemoryProductRepository;
use canteen::data::seed::{DEMO_MERCHANT_ID, seed_catalog};
use canteen::domain::user::Role;
use canteen::infrastructure::security::generate_token;
use canteen::presentation::middleware::JwtAuthMiddleware;
use canteen::presentation::{extractor_config, products};
use serde_json::{Value, json};
use std::sync::Arc;

const SECRET: &str = "test-secret-key-for-product-tests";

fn bearer(user_id: u64, role: Role) -> (&'static str, String) {
    let token = generate_token(user_id, "tester", role, SECRET, 3600).unwrap();
    ("Authorization", format!("Bearer {}", token))
}

macro_rules! setup_product_app {
    () => {{
        let repository = Arc::new(InMemoryProductRepository::new());
        seed_catalog(repository.as_ref(), DEMO_MERCHANT_ID).await.unwrap();
        let service = ProductService::new(repository);

        test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(extractor_config)
                .configure(products::configure)
                .wrap(JwtAuthMiddleware::new(SECRET)),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_menu_is_paged() {
    let app = setup_product_app!();

    let req = test::TestRequest::get()
        .uri("/api/products?current=2&size=5")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["total"], 18);
    assert_eq!(body["data"]["current"], 2);
    assert_eq!(body["data"]["pages"], 4);
    assert_eq!(body["data"]["records"].as_array().unwrap().len(), 5);
}

#[actix_web::test]
async fn test_menu_filters_and_sorts() {
    let app = setup_product_app!();

    let req = test::TestRequest::get()
        .uri("/api/products?priceRange=0-10&sortBy=price_asc&size=50")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let records = body["data"]["records"].as_array().unwrap();
    assert_eq!(records.len(), 10);
    let prices: Vec<f64> = records.iter().map(|p| p["price"].as_f64().unwrap()).collect();
    assert!(prices.windows(2).all(|w| w[0] <= w[1]));
    assert!(prices.iter().all(|p| *p < 10.0));

    let req = test::TestRequest::get()
        .uri("/api/products?keyword=noodles")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 3);
}

#[actix_web::test]
async fn test_unknown_sort_is_a_validation_error() {
    let app = setup_product_app!();

    let req = test::TestRequest::get()
        .uri("/api/products?sortBy=cheapest")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_detail_categories_and_hot() {
    let app = setup_product_app!();

    let req = test::TestRequest::get().uri("/api/products/4").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["name"], "Lanzhou Beef Noodles");
    assert_eq!(body["data"]["price"], 12.0);

    let req = test::TestRequest::get().uri("/api/products/999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let req = test::TestRequest::get().uri("/api/products/categories").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 8);

    let req = test::TestRequest::get().uri("/api/products/category/2").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::get().uri("/api/products/category/99").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let req = test::TestRequest::get().uri("/api/products/hot").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let hot = body["data"].as_array().unwrap();
    assert_eq!(hot.len(), 5);
    assert!(hot.iter().all(|p| p["isHot"] == true));
}

#[actix_web::test]
async fn test_non_numeric_id_is_rejected_with_envelope() {
    let app = setup_product_app!();

    let req = test::TestRequest::get().uri("/api/products/abc").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
}

#[actix_web::test]
async fn test_merchant_publishes_and_manages_a_dish() {
    let app = setup_product_app!();

    let req = test::TestRequest::post()
        .uri("/api/products/merchant")
        .insert_header(bearer(DEMO_MERCHANT_ID, Role::Merchant))
        .set_json(json!({
            "name": "Dan Dan Noodles",
            "description": "Spicy sesame noodles",
            "price": "13.50",
            "categoryId": 2,
            "stock": 40
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["price"], 13.5);
    assert_eq!(body["data"]["status"], "ON_SALE");
    let id = body["data"]["id"].as_u64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/products/merchant/{}/status", id))
        .insert_header(bearer(DEMO_MERCHANT_ID, Role::Merchant))
        .set_json(json!({ "status": "OFF_SALE" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri("/api/products?keyword=dan%20dan")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 0);

    let req = test::TestRequest::get()
        .uri("/api/products/merchant/list?status=OFF_SALE")
        .insert_header(bearer(DEMO_MERCHANT_ID, Role::Merchant))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/products/merchant/{}", id))
        .insert_header(bearer(DEMO_MERCHANT_ID, Role::Merchant))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri(&format!("/api/products/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_create_rejects_zero_price_and_unknown_category() {
    let app = setup_product_app!();

    let req = test::TestRequest::post()
        .uri("/api/products/merchant")
        .insert_header(bearer(DEMO_MERCHANT_ID, Role::Merchant))
        .set_json(json!({ "name": "Air", "price": 0, "categoryId": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/products/merchant")
        .insert_header(bearer(DEMO_MERCHANT_ID, Role::Merchant))
        .set_json(json!({ "name": "Mystery", "price": 5, "categoryId": 42 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_other_merchants_cannot_touch_foreign_dishes() {
    let app = setup_product_app!();

    let req = test::TestRequest::put()
        .uri("/api/products/merchant/1/stock")
        .insert_header(bearer(77, Role::Merchant))
        .set_json(json!({ "stock": 0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::put()
        .uri("/api/products/merchant/1/stock")
        .insert_header(bearer(1, Role::Admin))
        .set_json(json!({ "stock": 0 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["stock"], 0);

    let req = test::TestRequest::post()
        .uri("/api/products/merchant")
        .insert_header(bearer(3, Role::User))
        .set_json(json!({ "name": "Toast", "price": 3, "categoryId": 8 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::post()
        .uri("/api/products/merchant")
        .set_json(json!({ "name": "Toast", "price": 3, "categoryId": 8 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_admin_recommend_switch() {
    let app = setup_product_app!();

    let req = test::TestRequest::put()
        .uri("/api/products/admin/2/recommend")
        .insert_header(bearer(1, Role::Admin))
        .set_json(json!({ "isHot": true }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["isHot"], true);

    let req = test::TestRequest::get()
        .uri("/api/products/admin/list?keyword=kung")
        .insert_header(bearer(1, Role::Admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["records"][0]["isHot"], true);
}

#[actix_web::test]
async fn test_internal_stock_reservation() {
    let app = setup_product_app!();

    let req = test::TestRequest::post()
        .uri("/internal/products/5/reserve")
        .set_json(json!({ "quantity": 30 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["reserved"], 30);

    let req = test::TestRequest::post()
        .uri("/internal/products/5/reserve")
        .set_json(json!({ "quantity": 80 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::get().uri("/internal/products/5").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["stock"], 70);

    let req = test::TestRequest::post()
        .uri("/internal/products/5/release")
        .set_json(json!({ "quantity": 30 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get().uri("/internal/products").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 18);
}

#[actix_web::test]
async fn test_stats_and_count() {
    let app = setup_product_app!();

    let req = test::TestRequest::get().uri("/api/products/stats").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["totalProducts"], 18);
    assert_eq!(body["data"]["totalCategories"], 8);
    assert_eq!(body["data"]["hotProducts"], 7);

    let req = test::TestRequest::get().uri("/api/products/count").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], 18);
}

#[actix_web::test]
async fn test_admin_audit_controls_sale_status() {
    let app = setup_product_app!();

    let req = test::TestRequest::put()
        .uri("/api/products/admin/3/audit?approved=false&reason=blurry%20photo")
        .insert_header(bearer(DEMO_MERCHANT_ID, Role::Merchant))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::put()
        .uri("/api/products/admin/3/audit?approved=false&reason=blurry%20photo")
        .insert_header(bearer(1, Role::Admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["status"], "OFF_SALE");

    let req = test::TestRequest::get().uri("/api/products?size=100").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 17);

    let req = test::TestRequest::put()
        .uri("/api/products/admin/3/audit?approved=true")
        .insert_header(bearer(1, Role::Admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["status"], "ON_SALE");

    let req = test::TestRequest::put()
        .uri("/api/products/admin/3/audit")
        .insert_header(bearer(1, Role::Admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_absurd_price_is_rejected() {
    let app = setup_product_app!();

    let req = test::TestRequest::post()
        .uri("/api/products/merchant")
        .insert_header(bearer(DEMO_MERCHANT_ID, Role::Merchant))
        .set_json(json!({ "name": "Gold Noodles", "price": 1e17, "categoryId": 2, "stock": 5 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
}
