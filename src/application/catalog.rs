use crate::domain::product::Product;
use crate::domain::user::UserOrderStats;
use anyhow::Result;
use async_trait::async_trait;

/// What the order and recommend services need from the product service.
///
/// Implemented in-process by `ProductService` and over HTTP by
/// `HttpProductCatalog`.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Looks a product up regardless of its sale status.
    async fn find_product(&self, id: u64) -> Result<Option<Product>>;

    /// Every product currently on sale.
    async fn on_sale_products(&self) -> Result<Vec<Product>>;

    /// Fails with `InsufficientStock` or `NotFound`; nothing changes on failure.
    async fn reserve_stock(&self, id: u64, quantity: u32) -> Result<()>;

    async fn release_stock(&self, id: u64, quantity: u32) -> Result<()>;
}

/// Order figures the user service shows on a profile page.
#[async_trait]
pub trait OrderStatsSource: Send + Sync {
    async fn user_order_stats(&self, user_id: u64) -> Result<UserOrderStats>;
}
