pub mod error;
pub mod money;
pub mod order;
pub mod page;
pub mod product;
pub mod recommend;
pub mod repository;
pub mod user;
