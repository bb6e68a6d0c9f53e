use crate::domain::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    OnSale,
    OffSale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub sort_order: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_id: u64,
    pub merchant_id: u64,
    pub image_url: Option<String>,
    pub stock: u32,
    pub sales: u32,
    pub status: ProductStatus,
    pub is_hot: bool,
    pub rating: f64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Product {
    pub fn is_on_sale(&self) -> bool {
        self.status == ProductStatus::OnSale
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub category_id: u64,
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub category_id: Option<u64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetProductStatus {
    pub status: ProductStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetStock {
    pub stock: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetHot {
    pub is_hot: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StockChange {
    pub quantity: u32,
}

/// Price buckets offered by the menu filter, in yuan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceRange {
    UpTo10,
    From10To20,
    From20To50,
    Above50,
}

impl PriceRange {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "0-10" => Some(PriceRange::UpTo10),
            "10-20" => Some(PriceRange::From10To20),
            "20-50" => Some(PriceRange::From20To50),
            "50+" | "50-" => Some(PriceRange::Above50),
            _ => None,
        }
    }

    pub fn contains(&self, price: Money) -> bool {
        let cents = price.cents();
        match self {
            PriceRange::UpTo10 => cents < 1000,
            PriceRange::From10To20 => (1000..2000).contains(&cents),
            PriceRange::From20To50 => (2000..5000).contains(&cents),
            PriceRange::Above50 => cents >= 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Sales,
    Rating,
}

impl SortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "newest" | "" => Some(SortBy::Newest),
            "price_asc" => Some(SortBy::PriceAsc),
            "price_desc" => Some(SortBy::PriceDesc),
            "sales" => Some(SortBy::Sales),
            "rating" => Some(SortBy::Rating),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<u64>,
    pub keyword: Option<String>,
    pub price_range: Option<PriceRange>,
    pub sort_by: SortBy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStats {
    pub total_products: u64,
    pub total_categories: u64,
    pub average_price: String,
    pub hot_products: u64,
}
