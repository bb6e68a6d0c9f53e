use crate::domain::money::Money;
use crate::domain::product::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorAction {
    View,
    Favorite,
    AddToCart,
    Purchase,
}

impl BehaviorAction {
    /// How strongly an action signals interest in the product's category.
    pub fn weight(&self) -> u64 {
        match self {
            BehaviorAction::View => 1,
            BehaviorAction::Favorite => 2,
            BehaviorAction::AddToCart => 3,
            BehaviorAction::Purchase => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBehavior {
    pub id: u64,
    pub user_id: u64,
    pub product_id: u64,
    pub action: BehaviorAction,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBehavior {
    pub user_id: u64,
    pub product_id: u64,
    pub action: BehaviorAction,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendProduct {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image_url: Option<String>,
    pub sales: u32,
    pub rating: f64,
    pub reason: String,
    pub score: f64,
}

impl RecommendProduct {
    pub fn from_product(product: &Product, reason: &str, score: f64) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
            sales: product.sales,
            rating: product.rating,
            reason: reason.to_string(),
            score: score.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorStatistics {
    pub total: u64,
    pub views: u64,
    pub favorites: u64,
    pub add_to_carts: u64,
    pub purchases: u64,
    pub distinct_users: u64,
}
