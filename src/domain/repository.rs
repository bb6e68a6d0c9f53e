use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::product::{Category, Product};
use crate::domain::recommend::UserBehavior;
use crate::domain::user::User;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Stores a new user and returns it with its assigned id.
    async fn insert_user(&self, user: User) -> Result<User>;
    async fn update_user(&self, user: User) -> Result<()>;
    async fn find_user_by_id(&self, id: u64) -> Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_category(&self, category: Category) -> Result<Category>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn find_category(&self, id: u64) -> Result<Option<Category>>;

    async fn insert_product(&self, product: Product) -> Result<Product>;
    /// Runs `edit` on the stored product while holding the write lock, so an
    /// edit never overwrites a concurrent stock change. Returns `None` for
    /// unknown products; nothing is stored when `edit` fails.
    async fn modify_product<F>(&self, id: u64, edit: F) -> Result<Option<Product>>
    where
        F: FnOnce(&mut Product) -> Result<()> + Send;
    async fn delete_product(&self, id: u64) -> Result<bool>;
    async fn find_product(&self, id: u64) -> Result<Option<Product>>;
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Takes `quantity` units out of stock and adds them to sales in one step.
    /// Returns `None` when the product does not exist and `Some(false)` when
    /// stock is short; nothing changes in either case.
    async fn reserve_stock(&self, id: u64, quantity: u32) -> Result<Option<bool>>;
    /// Reverses `reserve_stock`. Returns `false` for unknown products.
    async fn release_stock(&self, id: u64, quantity: u32) -> Result<bool>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores an order with its items, assigning ids to both.
    async fn insert_order(&self, order: Order, items: Vec<OrderItem>) -> Result<Order>;
    async fn find_order(&self, id: u64) -> Result<Option<Order>>;
    async fn find_items(&self, order_id: u64) -> Result<Vec<OrderItem>>;
    async fn list_orders(&self) -> Result<Vec<Order>>;
    async fn list_items(&self) -> Result<Vec<OrderItem>>;
    /// Writes `order` only if the stored copy is still in `expected` status.
    async fn replace_if_status(&self, order: Order, expected: OrderStatus) -> Result<bool>;
}

#[async_trait]
pub trait BehaviorRepository: Send + Sync {
    async fn insert_behavior(&self, behavior: UserBehavior) -> Result<UserBehavior>;
    async fn behaviors_for_user(&self, user_id: u64) -> Result<Vec<UserBehavior>>;
    async fn list_behaviors(&self) -> Result<Vec<UserBehavior>>;
}
