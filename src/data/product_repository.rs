use crate::domain::product::{Category, Product};
use crate::domain::repository::ProductRepository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct InMemoryProductRepository {
    categories: Arc<RwLock<HashMap<u64, Category>>>,
    products: Arc<RwLock<HashMap<u64, Product>>>,
    next_category_id: Arc<AtomicU64>,
    next_product_id: Arc<AtomicU64>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self {
            categories: Arc::new(RwLock::new(HashMap::new())),
            products: Arc::new(RwLock::new(HashMap::new())),
            next_category_id: Arc::new(AtomicU64::new(1)),
            next_product_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for InMemoryProductRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn insert_category(&self, mut category: Category) -> Result<Category> {
        let mut categories = self.categories.write().await;
        category.id = self.next_category_id.fetch_add(1, Ordering::SeqCst);
        categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let categories = self.categories.read().await;
        let mut list: Vec<Category> = categories.values().cloned().collect();
        list.sort_by_key(|c| (c.sort_order, c.id));
        Ok(list)
    }

    async fn find_category(&self, id: u64) -> Result<Option<Category>> {
        Ok(self.categories.read().await.get(&id).cloned())
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn insert_product(&self, mut product: Product) -> Result<Product> {
        let mut products = self.products.write().await;
        product.id = self.next_product_id.fetch_add(1, Ordering::SeqCst);
        products.insert(product.id, product.clone());
        debug!(product_id = product.id, "Product saved to memory storage");
        Ok(product)
    }

    async fn modify_product<F>(&self, id: u64, edit: F) -> Result<Option<Product>>
    where
        F: FnOnce(&mut Product) -> Result<()> + Send,
    {
        let mut products = self.products.write().await;
        let Some(stored) = products.get_mut(&id) else {
            return Ok(None);
        };
        let mut draft = stored.clone();
        edit(&mut draft)?;
        draft.update_time = chrono::Utc::now();
        *stored = draft.clone();
        Ok(Some(draft))
    }

    async fn delete_product(&self, id: u64) -> Result<bool> {
        Ok(self.products.write().await.remove(&id).is_some())
    }

    async fn find_product(&self, id: u64) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        let mut list: Vec<Product> = products.values().cloned().collect();
        list.sort_by_key(|p| p.id);
        Ok(list)
    }

    #[instrument(skip(self))]
    async fn reserve_stock(&self, id: u64, quantity: u32) -> Result<Option<bool>> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(None);
        };
        if product.stock < quantity {
            debug!(stock = product.stock, "Not enough stock to reserve");
            return Ok(Some(false));
        }
        product.stock -= quantity;
        product.sales = product.sales.saturating_add(quantity);
        product.update_time = chrono::Utc::now();
        Ok(Some(true))
    }

    #[instrument(skip(self))]
    async fn release_stock(&self, id: u64, quantity: u32) -> Result<bool> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&id) else {
            return Ok(false);
        };
        product.stock = product.stock.saturating_add(quantity);
        product.sales = product.sales.saturating_sub(quantity);
        product.update_time = chrono::Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::product::ProductStatus;
    use chrono::Utc;

    fn product(name: &str, stock: u32) -> Product {
        let now = Utc::now();
        Product {
            id: 0,
            name: name.to_string(),
            description: String::new(),
            price: Money::from_yuan(10),
            category_id: 1,
            merchant_id: 1,
            image_url: None,
            stock,
            sales: 0,
            status: ProductStatus::OnSale,
            is_hot: false,
            rating: 4.5,
            create_time: now,
            update_time: now,
        }
    }

    #[tokio::test]
    async fn test_reserve_stock_moves_units_to_sales() {
        let repo = InMemoryProductRepository::new();
        let stored = repo.insert_product(product("Dumplings", 5)).await.unwrap();

        assert_eq!(repo.reserve_stock(stored.id, 3).await.unwrap(), Some(true));

        let after = repo.find_product(stored.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 2);
        assert_eq!(after.sales, 3);
    }

    #[tokio::test]
    async fn test_reserve_stock_refuses_to_go_negative() {
        let repo = InMemoryProductRepository::new();
        let stored = repo.insert_product(product("Noodles", 2)).await.unwrap();

        assert_eq!(repo.reserve_stock(stored.id, 3).await.unwrap(), Some(false));
        assert_eq!(repo.reserve_stock(999, 1).await.unwrap(), None);

        let after = repo.find_product(stored.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 2);
        assert_eq!(after.sales, 0);
    }

    #[tokio::test]
    async fn test_release_stock_reverses_reservation() {
        let repo = InMemoryProductRepository::new();
        let stored = repo.insert_product(product("Soup", 4)).await.unwrap();

        repo.reserve_stock(stored.id, 4).await.unwrap();
        assert!(repo.release_stock(stored.id, 4).await.unwrap());

        let after = repo.find_product(stored.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 4);
        assert_eq!(after.sales, 0);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversell() {
        let repo = InMemoryProductRepository::new();
        let stored = repo.insert_product(product("Buns", 5)).await.unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let repo_clone = repo.clone();
                tokio::spawn(async move { repo_clone.reserve_stock(stored.id, 1).await })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == Some(true) {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
        assert_eq!(repo.find_product(stored.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_failed_edit_leaves_product_untouched() {
        let repo = InMemoryProductRepository::new();
        let stored = repo.insert_product(product("Rice", 5)).await.unwrap();

        let result = repo
            .modify_product(stored.id, |p| {
                p.stock = 0;
                anyhow::bail!("rejected")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(repo.find_product(stored.id).await.unwrap().unwrap().stock, 5);
        assert!(repo.modify_product(999, |_| Ok(())).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_edits_do_not_lose_concurrent_reservations() {
        let repo = InMemoryProductRepository::new();
        let stored = repo.insert_product(product("Buns", 10_000)).await.unwrap();

        let handles: Vec<_> = (0..2_000)
            .map(|i| {
                let repo_clone = repo.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        repo_clone.reserve_stock(stored.id, 1).await.map(|r| r == Some(true))
                    } else {
                        repo_clone
                            .modify_product(stored.id, |p| {
                                p.is_hot = true;
                                Ok(())
                            })
                            .await
                            .map(|_| false)
                    }
                })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                granted += 1;
            }
        }
        let after = repo.find_product(stored.id).await.unwrap().unwrap();
        assert_eq!(granted, 1_000);
        assert_eq!(after.stock, 9_000);
        assert_eq!(after.sales, 1_000);
        assert!(after.is_hot);
    }

    #[tokio::test]
    async fn test_categories_sorted_by_sort_order() {
        let repo = InMemoryProductRepository::new();
        for (name, order) in [("Drinks", 3), ("Noodles", 1), ("Soups", 2)] {
            repo.insert_category(Category {
                id: 0,
                name: name.to_string(),
                description: String::new(),
                sort_order: order,
                enabled: true,
            })
            .await
            .unwrap();
        }

        let names: Vec<String> = repo
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Noodles", "Soups", "Drinks"]);
    }
}
