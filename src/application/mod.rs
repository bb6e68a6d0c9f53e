pub mod catalog;
pub mod order_service;
pub mod product_service;
pub mod recommend_service;
pub mod user_service;
