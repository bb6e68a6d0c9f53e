use crate::application::catalog::ProductCatalog;
use crate::domain::error::DomainError;
use crate::domain::money::Money;
use crate::domain::page::{PageRequest, PageResult};
use crate::domain::product::{
    Category, CreateProduct, Product, ProductFilter, ProductStats, ProductStatus, SortBy,
    UpdateProduct,
};
use crate::domain::repository::ProductRepository;
use crate::domain::user::Actor;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_HOT_LIMIT: usize = 5;

pub struct ProductService<R: ProductRepository> {
    repository: Arc<R>,
}

impl<R: ProductRepository> ProductService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// The public menu: on-sale products after filtering and sorting.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<PageResult<Product>> {
        let keyword = filter
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase);

        let mut products: Vec<Product> = self
            .on_sale()
            .await?
            .into_iter()
            .filter(|p| filter.category_id.is_none_or(|c| p.category_id == c))
            .filter(|p| filter.price_range.is_none_or(|r| r.contains(p.price)))
            .filter(|p| match &keyword {
                Some(k) => p.name.to_lowercase().contains(k),
                None => true,
            })
            .collect();
        sort_products(&mut products, filter.sort_by);

        debug!(matched = products.len(), "Menu filtered");
        Ok(PageResult::paginate(products, page))
    }

    pub async fn get_product(&self, id: u64) -> Result<Product> {
        self.repository
            .find_product(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Product {} not found", id)).into())
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        Ok(self
            .repository
            .list_categories()
            .await?
            .into_iter()
            .filter(|c| c.enabled)
            .collect())
    }

    pub async fn products_in_category(&self, category_id: u64) -> Result<Vec<Product>> {
        self.repository
            .find_category(category_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Category {} not found", category_id)))?;

        let mut products: Vec<Product> = self
            .on_sale()
            .await?
            .into_iter()
            .filter(|p| p.category_id == category_id)
            .collect();
        sort_products(&mut products, SortBy::Newest);
        Ok(products)
    }

    /// On-sale products flagged hot, best sellers first.
    pub async fn hot_products(&self, limit: usize) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self
            .on_sale()
            .await?
            .into_iter()
            .filter(|p| p.is_hot)
            .collect();
        products.sort_by(by_sales_then_rating);
        products.truncate(limit);
        Ok(products)
    }

    pub async fn stats(&self) -> Result<ProductStats> {
        let products = self.on_sale().await?;
        let categories = self.categories().await?;
        let total_cents: u64 = products.iter().map(|p| p.price.cents()).sum();
        let average = match products.len() as u64 {
            0 => Money::ZERO,
            n => Money::from_cents(total_cents / n),
        };

        Ok(ProductStats {
            total_products: products.len() as u64,
            total_categories: categories.len() as u64,
            average_price: average.to_string(),
            hot_products: products.iter().filter(|p| p.is_hot).count() as u64,
        })
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.repository.list_products().await?.len() as u64)
    }

    #[instrument(skip(self))]
    pub async fn merchant_products(
        &self,
        merchant_id: u64,
        status: Option<ProductStatus>,
        page: PageRequest,
    ) -> Result<PageResult<Product>> {
        let mut products: Vec<Product> = self
            .repository
            .list_products()
            .await?
            .into_iter()
            .filter(|p| p.merchant_id == merchant_id)
            .filter(|p| status.is_none_or(|s| p.status == s))
            .collect();
        sort_products(&mut products, SortBy::Newest);
        Ok(PageResult::paginate(products, page))
    }

    pub async fn merchant_top_products(&self, merchant_id: u64, limit: usize) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self
            .repository
            .list_products()
            .await?
            .into_iter()
            .filter(|p| p.merchant_id == merchant_id)
            .collect();
        products.sort_by(by_sales_then_rating);
        products.truncate(limit);
        Ok(products)
    }

    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create_product(&self, merchant_id: u64, req: CreateProduct) -> Result<Product> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::Validation("Product name is required".to_string()).into());
        }
        if req.price == Money::ZERO {
            return Err(DomainError::Validation("Price must be greater than zero".to_string()).into());
        }
        self.require_category(req.category_id).await?;

        let now = Utc::now();
        let product = self
            .repository
            .insert_product(Product {
                id: 0,
                name,
                description: req.description,
                price: req.price,
                category_id: req.category_id,
                merchant_id,
                image_url: req.image_url,
                stock: req.stock,
                sales: 0,
                status: ProductStatus::OnSale,
                is_hot: false,
                rating: 5.0,
                create_time: now,
                update_time: now,
            })
            .await?;

        info!(product_id = product.id, merchant_id, "Product created");
        Ok(product)
    }

    #[instrument(skip(self, req))]
    pub async fn update_product(&self, actor: Actor, id: u64, req: UpdateProduct) -> Result<Product> {
        let name = match req.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(DomainError::Validation("Product name is required".to_string()).into());
                }
                Some(name)
            }
            None => None,
        };
        if req.price == Some(Money::ZERO) {
            return Err(DomainError::Validation("Price must be greater than zero".to_string()).into());
        }
        if let Some(category_id) = req.category_id {
            self.require_category(category_id).await?;
        }

        self.edit(id, move |product| {
            check_owner(actor, product)?;
            if let Some(name) = name {
                product.name = name;
            }
            if let Some(description) = req.description {
                product.description = description;
            }
            if let Some(price) = req.price {
                product.price = price;
            }
            if let Some(category_id) = req.category_id {
                product.category_id = category_id;
            }
            if let Some(image_url) = req.image_url {
                product.image_url = Some(image_url);
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, actor: Actor, id: u64) -> Result<()> {
        let product = self.get_product(id).await?;
        check_owner(actor, &product)?;
        if !self.repository.delete_product(id).await? {
            return Err(DomainError::NotFound(format!("Product {} not found", id)).into());
        }
        info!(product_id = id, "Product deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, actor: Actor, id: u64, status: ProductStatus) -> Result<Product> {
        self.edit(id, move |product| {
            check_owner(actor, product)?;
            product.status = status;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn set_stock(&self, actor: Actor, id: u64, stock: u32) -> Result<Product> {
        self.edit(id, move |product| {
            check_owner(actor, product)?;
            product.stock = stock;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn admin_list(
        &self,
        status: Option<ProductStatus>,
        keyword: Option<String>,
        page: PageRequest,
    ) -> Result<PageResult<Product>> {
        let keyword = keyword
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty());
        let mut products: Vec<Product> = self
            .repository
            .list_products()
            .await?
            .into_iter()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .filter(|p| match &keyword {
                Some(k) => p.name.to_lowercase().contains(k),
                None => true,
            })
            .collect();
        sort_products(&mut products, SortBy::Newest);
        Ok(PageResult::paginate(products, page))
    }

    /// The admin "recommend" switch, which is the hot flag.
    #[instrument(skip(self))]
    pub async fn set_hot(&self, id: u64, is_hot: bool) -> Result<Product> {
        self.edit(id, move |product| {
            product.is_hot = is_hot;
            Ok(())
        })
        .await
    }

    /// Admin review of a dish: approval puts it on sale, rejection takes it off.
    #[instrument(skip(self))]
    pub async fn audit_product(&self, id: u64, approved: bool, reason: Option<String>) -> Result<Product> {
        let status = if approved {
            ProductStatus::OnSale
        } else {
            ProductStatus::OffSale
        };
        let product = self
            .edit(id, move |product| {
                product.status = status;
                Ok(())
            })
            .await?;
        info!(
            product_id = id,
            approved,
            reason = reason.as_deref().unwrap_or(""),
            "Product audited"
        );
        Ok(product)
    }

    async fn on_sale(&self) -> Result<Vec<Product>> {
        Ok(self
            .repository
            .list_products()
            .await?
            .into_iter()
            .filter(Product::is_on_sale)
            .collect())
    }

    async fn require_category(&self, category_id: u64) -> Result<Category> {
        self.repository
            .find_category(category_id)
            .await?
            .ok_or_else(|| {
                DomainError::Validation(format!("Category {} does not exist", category_id)).into()
            })
    }

    async fn edit<F>(&self, id: u64, edit: F) -> Result<Product>
    where
        F: FnOnce(&mut Product) -> Result<()> + Send,
    {
        let product = self
            .repository
            .modify_product(id, edit)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Product {} not found", id)))?;
        info!(product_id = id, "Product updated");
        Ok(product)
    }
}

fn check_owner(actor: Actor, product: &Product) -> Result<()> {
    if !actor.is_admin() && product.merchant_id != actor.user_id {
        warn!(product_id = product.id, user_id = actor.user_id, "Product belongs to another merchant");
        return Err(DomainError::Forbidden(format!(
            "Product {} belongs to another merchant",
            product.id
        ))
        .into());
    }
    Ok(())
}

#[async_trait]
impl<R: ProductRepository> ProductCatalog for ProductService<R> {
    async fn find_product(&self, id: u64) -> Result<Option<Product>> {
        self.repository.find_product(id).await
    }

    async fn on_sale_products(&self) -> Result<Vec<Product>> {
        self.on_sale().await
    }

    #[instrument(skip(self))]
    async fn reserve_stock(&self, id: u64, quantity: u32) -> Result<()> {
        match self.repository.reserve_stock(id, quantity).await? {
            Some(true) => {
                debug!(product_id = id, quantity, "Stock reserved");
                Ok(())
            }
            Some(false) => {
                warn!(product_id = id, quantity, "Not enough stock");
                Err(DomainError::InsufficientStock { product_id: id }.into())
            }
            None => Err(DomainError::NotFound(format!("Product {} not found", id)).into()),
        }
    }

    #[instrument(skip(self))]
    async fn release_stock(&self, id: u64, quantity: u32) -> Result<()> {
        if !self.repository.release_stock(id, quantity).await? {
            return Err(DomainError::NotFound(format!("Product {} not found", id)).into());
        }
        debug!(product_id = id, quantity, "Stock released");
        Ok(())
    }
}

fn by_sales_then_rating(a: &Product, b: &Product) -> Ordering {
    b.sales
        .cmp(&a.sales)
        .then_with(|| b.rating.total_cmp(&a.rating))
        .then_with(|| a.id.cmp(&b.id))
}

fn sort_products(products: &mut [Product], sort_by: SortBy) {
    match sort_by {
        SortBy::Newest => products.sort_by(|a, b| {
            b.create_time
                .cmp(&a.create_time)
                .then_with(|| b.id.cmp(&a.id))
        }),
        SortBy::PriceAsc => products.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id))),
        SortBy::PriceDesc => products.sort_by(|a, b| b.price.cmp(&a.price).then(a.id.cmp(&b.id))),
        SortBy::Sales => products.sort_by(by_sales_then_rating),
        SortBy::Rating => products.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then_with(|| b.sales.cmp(&a.sales))
        }),
    }
}
