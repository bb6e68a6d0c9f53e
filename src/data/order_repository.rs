use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::repository::OrderRepository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Default)]
struct OrderTables {
    orders: HashMap<u64, Order>,
    items: HashMap<u64, Vec<OrderItem>>,
}

#[derive(Clone)]
pub struct InMemoryOrderRepository {
    tables: Arc<RwLock<OrderTables>>,
    next_order_id: Arc<AtomicU64>,
    next_item_id: Arc<AtomicU64>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(OrderTables::default())),
            next_order_id: Arc::new(AtomicU64::new(1)),
            next_item_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    #[instrument(skip(self, order, items), fields(order_no = %order.order_no))]
    async fn insert_order(&self, mut order: Order, items: Vec<OrderItem>) -> Result<Order> {
        let mut tables = self.tables.write().await;
        order.id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let items: Vec<OrderItem> = items
            .into_iter()
            .map(|mut item| {
                item.id = self.next_item_id.fetch_add(1, Ordering::SeqCst);
                item.order_id = order.id;
                item
            })
            .collect();
        debug!(order_id = order.id, items = items.len(), "Order saved to memory storage");
        tables.items.insert(order.id, items);
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: u64) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_items(&self, order_id: u64) -> Result<Vec<OrderItem>> {
        let tables = self.tables.read().await;
        Ok(tables.items.get(&order_id).cloned().unwrap_or_default())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().cloned().collect())
    }

    async fn list_items(&self) -> Result<Vec<OrderItem>> {
        let tables = self.tables.read().await;
        Ok(tables.items.values().flatten().cloned().collect())
    }

    #[instrument(skip(self, order), fields(order_id = order.id, next = %order.status))]
    async fn replace_if_status(&self, order: Order, expected: OrderStatus) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.orders.get(&order.id) {
            Some(current) if current.status == expected => {
                tables.orders.insert(order.id, order);
                Ok(true)
            }
            Some(current) => {
                debug!(current = %current.status, expected = %expected, "Order status moved underneath us");
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
