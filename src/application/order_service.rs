use crate::application::catalog::{OrderStatsSource, ProductCatalog};
use crate::domain::error::DomainError;
use crate::domain::money::Money;
use crate::domain::order::{
    CreateOrder, DailyTrend, MerchantOrderStats, Order, OrderDetail, OrderItem, OrderStatus,
    StatusCount,
};
use crate::domain::page::{PageRequest, PageResult};
use crate::domain::repository::OrderRepository;
use crate::domain::user::{Actor, Role, UserOrderStats};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_TREND_DAYS: u32 = 7;
pub const MAX_TREND_DAYS: u32 = 90;

pub struct OrderService<R: OrderRepository> {
    repository: Arc<R>,
    catalog: Arc<dyn ProductCatalog>,
}

/// `CT` + timestamp to the second + four random digits.
pub fn generate_order_no(now: DateTime<Utc>) -> String {
    format!("CT{}{:04}", now.format("%Y%m%d%H%M%S"), fastrand::u32(..10_000))
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repository: Arc<R>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self {
            repository,
            catalog,
        }
    }

    /// Prices every line from the catalog, reserves stock line by line and
    /// gives back whatever was reserved if a later step fails.
    #[instrument(skip(self, req), fields(items = req.items.len()))]
    pub async fn create_order(&self, user_id: u64, req: CreateOrder) -> Result<OrderDetail> {
        if req.items.is_empty() {
            return Err(DomainError::Validation("Order must contain at least one item".to_string()).into());
        }
        if let Some(line) = req.items.iter().find(|i| i.quantity == 0) {
            return Err(DomainError::Validation(format!(
                "Quantity for product {} must be at least 1",
                line.product_id
            ))
            .into());
        }

        let mut items = Vec::with_capacity(req.items.len());
        for line in &req.items {
            let product = self
                .catalog
                .find_product(line.product_id)
                .await?
                .ok_or_else(|| DomainError::NotFound(format!("Product {} not found", line.product_id)))?;
            if !product.is_on_sale() {
                return Err(DomainError::Validation(format!(
                    "Product {} is not on sale",
                    product.name
                ))
                .into());
            }
            items.push(OrderItem {
                id: 0,
                order_id: 0,
                product_id: product.id,
                merchant_id: product.merchant_id,
                product_name: product.name,
                quantity: line.quantity,
                price: product.price,
                subtotal: product.price.times(line.quantity)?,
            });
        }
        let total_amount = Money::try_sum(items.iter().map(|i| i.subtotal))?;

        let mut reserved: Vec<(u64, u32)> = Vec::with_capacity(items.len());
        for item in &items {
            if let Err(e) = self.catalog.reserve_stock(item.product_id, item.quantity).await {
                warn!(product_id = item.product_id, error = %e, "Reservation failed, rolling back");
                self.release_all(&reserved).await;
                return Err(e);
            }
            reserved.push((item.product_id, item.quantity));
        }

        let now = Utc::now();
        let order = Order {
            id: 0,
            order_no: generate_order_no(now),
            user_id,
            total_amount,
            status: OrderStatus::Pending,
            remark: req.remark.filter(|r| !r.trim().is_empty()),
            create_time: now,
            update_time: now,
        };

        let order = match self.repository.insert_order(order, items).await {
            Ok(order) => order,
            Err(e) => {
                error!(error = %e, "Failed to save order, releasing stock");
                self.release_all(&reserved).await;
                return Err(e);
            }
        };
        let items = self.repository.find_items(order.id).await?;

        info!(
            order_id = order.id,
            order_no = %order.order_no,
            user_id,
            total = %order.total_amount,
            "Order created"
        );
        Ok(OrderDetail { order, items })
    }

    pub async fn user_orders_page(
        &self,
        user_id: u64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<PageResult<Order>> {
        let orders = self
            .newest_first(|o| o.user_id == user_id && status.is_none_or(|s| o.status == s))
            .await?;
        Ok(PageResult::paginate(orders, page))
    }

    pub async fn orders_for_user(&self, actor: Actor, user_id: u64) -> Result<Vec<Order>> {
        if actor.user_id != user_id && !actor.is_admin() {
            return Err(DomainError::Forbidden("You can only view your own orders".to_string()).into());
        }
        self.newest_first(|o| o.user_id == user_id).await
    }

    pub async fn all_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        self.newest_first(|o| status.is_none_or(|s| o.status == s)).await
    }

    #[instrument(skip(self))]
    pub async fn order_detail(&self, actor: Actor, order_id: u64) -> Result<OrderDetail> {
        let order = self.find(order_id).await?;
        let items = self.repository.find_items(order_id).await?;
        if !can_view(actor, &order, &items) {
            warn!(order_id, user_id = actor.user_id, "Order access denied");
            return Err(DomainError::Forbidden(format!("No access to order {}", order_id)).into());
        }
        Ok(OrderDetail { order, items })
    }

    /// Generic status change for merchants and administrators.
    #[instrument(skip(self))]
    pub async fn update_status(&self, actor: Actor, order_id: u64, next: OrderStatus) -> Result<Order> {
        match actor.role {
            Role::Admin => {}
            Role::Merchant => {
                self.require_merchant_items(actor.user_id, order_id).await?;
            }
            Role::User => {
                return Err(DomainError::Forbidden(
                    "Only merchants or administrators can change order status".to_string(),
                )
                .into());
            }
        }
        self.transition(order_id, next, None).await
    }

    #[instrument(skip(self))]
    pub async fn pay(&self, actor: Actor, order_id: u64) -> Result<Order> {
        let order = self.find(order_id).await?;
        if order.user_id != actor.user_id {
            return Err(DomainError::Forbidden("Only the customer can pay for an order".to_string()).into());
        }
        self.transition(order_id, OrderStatus::Paid, None).await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, actor: Actor, order_id: u64) -> Result<Order> {
        let order = self.find(order_id).await?;
        if order.user_id != actor.user_id && !actor.is_admin() {
            return Err(DomainError::Forbidden("You can only cancel your own orders".to_string()).into());
        }
        self.transition(order_id, OrderStatus::Cancelled, None).await
    }

    pub async fn prepare(&self, actor: Actor, order_id: u64) -> Result<Order> {
        self.kitchen_step(actor, order_id, OrderStatus::Preparing).await
    }

    pub async fn ready(&self, actor: Actor, order_id: u64) -> Result<Order> {
        self.kitchen_step(actor, order_id, OrderStatus::Ready).await
    }

    /// Pickup can be confirmed by the customer or by the kitchen.
    #[instrument(skip(self))]
    pub async fn complete(&self, actor: Actor, order_id: u64) -> Result<Order> {
        let order = self.find(order_id).await?;
        if order.user_id != actor.user_id {
            self.require_staff(actor, order_id).await?;
        }
        self.transition(order_id, OrderStatus::Completed, None).await
    }

    #[instrument(skip(self))]
    pub async fn accept(&self, merchant_id: u64, order_id: u64) -> Result<Order> {
        self.require_merchant_items(merchant_id, order_id).await?;
        self.transition(order_id, OrderStatus::Preparing, None).await
    }

    #[instrument(skip(self, reason))]
    pub async fn reject(&self, merchant_id: u64, order_id: u64, reason: Option<String>) -> Result<Order> {
        self.require_merchant_items(merchant_id, order_id).await?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "no reason given".to_string());
        self.transition(order_id, OrderStatus::Cancelled, Some(format!("[rejected: {}]", reason)))
            .await
    }

    pub async fn user_order_stats(&self, user_id: u64) -> Result<UserOrderStats> {
        let orders = self.newest_first(|o| o.user_id == user_id).await?;
        let spent: Money = orders
            .iter()
            .filter(|o| o.status.is_paid())
            .map(|o| o.total_amount)
            .sum();
        Ok(UserOrderStats {
            total_orders: orders.len() as u64,
            total_amount: spent.to_string(),
            favorite_count: 0,
        })
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.repository.list_orders().await?.len() as u64)
    }

    pub async fn status_counts(&self) -> Result<Vec<StatusCount>> {
        let orders = self.repository.list_orders().await?;
        Ok(OrderStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: orders.iter().filter(|o| o.status == status).count() as u64,
            })
            .collect())
    }

    pub async fn total_sales(&self) -> Result<Money> {
        let orders = self.repository.list_orders().await?;
        Ok(orders
            .iter()
            .filter(|o| o.status.is_paid())
            .map(|o| o.total_amount)
            .sum())
    }

    pub async fn today_sales(&self) -> Result<Money> {
        let today = Utc::now().date_naive();
        let orders = self.repository.list_orders().await?;
        Ok(orders
            .iter()
            .filter(|o| o.status.is_paid() && o.create_time.date_naive() == today)
            .map(|o| o.total_amount)
            .sum())
    }

    /// Orders holding at least one of the merchant's dishes, each carrying only
    /// that merchant's lines.
    #[instrument(skip(self))]
    pub async fn merchant_orders(
        &self,
        merchant_id: u64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<PageResult<OrderDetail>> {
        let details = self.merchant_details(merchant_id).await?;
        let filtered: Vec<OrderDetail> = details
            .into_iter()
            .filter(|d| status.is_none_or(|s| d.order.status == s))
            .collect();
        Ok(PageResult::paginate(filtered, page))
    }

    pub async fn merchant_stats(&self, merchant_id: u64) -> Result<MerchantOrderStats> {
        let details = self.merchant_details(merchant_id).await?;
        let today = Utc::now().date_naive();
        let revenue = |d: &OrderDetail| -> Money { d.items.iter().map(|i| i.subtotal).sum() };

        let paid: Vec<&OrderDetail> = details.iter().filter(|d| d.order.status.is_paid()).collect();
        let is_today = |d: &&OrderDetail| d.order.create_time.date_naive() == today;

        Ok(MerchantOrderStats {
            total_orders: details.len() as u64,
            pending_orders: details
                .iter()
                .filter(|d| d.order.status == OrderStatus::Paid)
                .count() as u64,
            today_orders: details.iter().filter(is_today).count() as u64,
            today_revenue: paid.iter().copied().filter(is_today).map(revenue).sum(),
            total_revenue: paid.iter().copied().map(revenue).sum(),
        })
    }

    /// Paid orders and revenue per day over the last `days` days, oldest
    /// first, with empty days included.
    #[instrument(skip(self))]
    pub async fn merchant_trends(&self, merchant_id: u64, days: u32) -> Result<Vec<DailyTrend>> {
        if !(1..=MAX_TREND_DAYS).contains(&days) {
            return Err(DomainError::Validation(format!(
                "days must be between 1 and {}",
                MAX_TREND_DAYS
            ))
            .into());
        }
        let details = self.merchant_details(merchant_id).await?;
        let today = Utc::now().date_naive();
        let first = today - Days::new(u64::from(days - 1));

        let trends = first
            .iter_days()
            .take(days as usize)
            .map(|date: NaiveDate| {
                let paid: Vec<&OrderDetail> = details
                    .iter()
                    .filter(|d| d.order.status.is_paid() && d.order.create_time.date_naive() == date)
                    .collect();
                DailyTrend {
                    date,
                    order_count: paid.len() as u64,
                    revenue: paid
                        .iter()
                        .flat_map(|d| d.items.iter().map(|i| i.subtotal))
                        .sum(),
                }
            })
            .collect();
        Ok(trends)
    }

    async fn merchant_details(&self, merchant_id: u64) -> Result<Vec<OrderDetail>> {
        let orders = self.newest_first(|_| true).await?;
        let mut details = Vec::new();
        for order in orders {
            let items: Vec<OrderItem> = self
                .repository
                .find_items(order.id)
                .await?
                .into_iter()
                .filter(|i| i.merchant_id == merchant_id)
                .collect();
            if !items.is_empty() {
                details.push(OrderDetail { order, items });
            }
        }
        Ok(details)
    }

    async fn kitchen_step(&self, actor: Actor, order_id: u64, next: OrderStatus) -> Result<Order> {
        self.require_staff(actor, order_id).await?;
        self.transition(order_id, next, None).await
    }

    async fn require_staff(&self, actor: Actor, order_id: u64) -> Result<()> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Merchant => self.require_merchant_items(actor.user_id, order_id).await,
            Role::User => Err(DomainError::Forbidden(format!("No access to order {}", order_id)).into()),
        }
    }

    async fn require_merchant_items(&self, merchant_id: u64, order_id: u64) -> Result<()> {
        self.find(order_id).await?;
        let items = self.repository.find_items(order_id).await?;
        if items.iter().any(|i| i.merchant_id == merchant_id) {
            Ok(())
        } else {
            warn!(order_id, merchant_id, "Order holds none of this merchant's dishes");
            Err(DomainError::Forbidden(format!("Order {} is not yours to handle", order_id)).into())
        }
    }

    /// Moves an order to `next` if the lifecycle allows it. The write only lands
    /// when the stored status is still the one that was checked.
    async fn transition(&self, order_id: u64, next: OrderStatus, note: Option<String>) -> Result<Order> {
        let current = self.find(order_id).await?;
        if !current.status.can_transition_to(next) {
            warn!(order_id, from = %current.status, to = %next, "Illegal status change");
            return Err(DomainError::InvalidTransition {
                from: current.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        let mut updated = current.clone();
        updated.status = next;
        updated.update_time = Utc::now();
        if let Some(note) = note {
            updated.remark = Some(match updated.remark.take() {
                Some(remark) if !remark.is_empty() => format!("{} {}", remark, note),
                _ => note,
            });
        }

        if !self
            .repository
            .replace_if_status(updated.clone(), current.status)
            .await?
        {
            warn!(order_id, "Order changed concurrently");
            return Err(DomainError::Conflict(format!(
                "Order {} was modified by another request",
                order_id
            ))
            .into());
        }

        if next == OrderStatus::Cancelled {
            let items = self.repository.find_items(order_id).await?;
            let lines: Vec<(u64, u32)> = items.iter().map(|i| (i.product_id, i.quantity)).collect();
            self.release_all(&lines).await;
        }

        info!(order_id, from = %current.status, to = %next, "Order status changed");
        Ok(updated)
    }

    /// Best effort: a line that cannot be released is logged and skipped.
    async fn release_all(&self, lines: &[(u64, u32)]) {
        for (product_id, quantity) in lines {
            match self.catalog.release_stock(*product_id, *quantity).await {
                Ok(()) => debug!(product_id, quantity, "Stock released"),
                Err(e) => error!(product_id, quantity, error = %e, "Failed to release stock"),
            }
        }
    }

    async fn find(&self, order_id: u64) -> Result<Order> {
        self.repository
            .find_order(order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Order {} not found", order_id)).into())
    }

    async fn newest_first<F>(&self, keep: F) -> Result<Vec<Order>>
    where
        F: Fn(&Order) -> bool,
    {
        let mut orders: Vec<Order> = self
            .repository
            .list_orders()
            .await?
            .into_iter()
            .filter(|o| keep(o))
            .collect();
        orders.sort_by(|a, b| b.create_time.cmp(&a.create_time).then(b.id.cmp(&a.id)));
        Ok(orders)
    }
}

fn can_view(actor: Actor, order: &Order, items: &[OrderItem]) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Merchant => {
            order.user_id == actor.user_id || items.iter().any(|i| i.merchant_id == actor.user_id)
        }
        Role::User => order.user_id == actor.user_id,
    }
}

#[async_trait]
impl<R: OrderRepository> OrderStatsSource for OrderService<R> {
    async fn user_order_stats(&self, user_id: u64) -> Result<UserOrderStats> {
        OrderService::user_order_stats(self, user_id).await
    }
}
