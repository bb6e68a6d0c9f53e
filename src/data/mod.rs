pub mod behavior_repository;
pub mod order_repository;
pub mod product_repository;
pub mod seed;
pub mod user_repository;
