use crate::application::catalog::ProductCatalog;
use crate::domain::error::DomainError;
use crate::domain::product::Product;
use crate::domain::recommend::{
    BehaviorAction, BehaviorStatistics, RecommendProduct, RecordBehavior, UserBehavior,
};
use crate::domain::repository::BehaviorRepository;
use anyhow::Result;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_SIMILAR_LIMIT: usize = 5;

const HOT_REASON: &str = "best seller";
const FALLBACK_REASON: &str = "popular with other students";
const PERSONAL_REASON: &str = "based on what you have been ordering";
const NEW_REASON: &str = "new on the menu";
const NEW_SCORE: f64 = 0.8;

pub struct RecommendService<R: BehaviorRepository> {
    repository: Arc<R>,
    catalog: Arc<dyn ProductCatalog>,
}

impl<R: BehaviorRepository> RecommendService<R> {
    pub fn new(repository: Arc<R>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self {
            repository,
            catalog,
        }
    }

    #[instrument(skip(self))]
    pub async fn hot(&self, limit: usize) -> Result<Vec<RecommendProduct>> {
        let products = self.menu().await;
        Ok(rank_hot(&products, limit, HOT_REASON))
    }

    /// Weighs the user's history per category and suggests other dishes from
    /// the categories they lean towards. Users without history get the hot list.
    #[instrument(skip(self))]
    pub async fn personal(&self, user_id: u64, limit: usize) -> Result<Vec<RecommendProduct>> {
        let behaviors = self.repository.behaviors_for_user(user_id).await?;
        let products = self.menu().await;
        if behaviors.is_empty() {
            debug!(user_id, "No history, falling back to hot list");
            return Ok(rank_hot(&products, limit, FALLBACK_REASON));
        }

        let mut category_of: HashMap<u64, u64> =
            products.iter().map(|p| (p.id, p.category_id)).collect();
        for behavior in &behaviors {
            if category_of.contains_key(&behavior.product_id) {
                continue;
            }
            // Off-sale dishes still tell us what the user likes.
            match self.catalog.find_product(behavior.product_id).await {
                Ok(Some(product)) => {
                    category_of.insert(product.id, product.category_id);
                }
                Ok(None) => {}
                Err(e) => warn!(product_id = behavior.product_id, error = %e, "Catalog lookup failed"),
            }
        }

        let mut weights: HashMap<u64, u64> = HashMap::new();
        for behavior in &behaviors {
            if let Some(category_id) = category_of.get(&behavior.product_id) {
                *weights.entry(*category_id).or_default() += behavior.action.weight();
            }
        }
        let purchased: HashSet<u64> = behaviors
            .iter()
            .filter(|b| b.action == BehaviorAction::Purchase)
            .map(|b| b.product_id)
            .collect();
        let max_weight = weights.values().copied().max().unwrap_or(0);

        let mut scored: Vec<(&Product, f64)> = products
            .iter()
            .filter(|p| !purchased.contains(&p.id))
            .filter_map(|p| {
                let weight = *weights.get(&p.category_id)?;
                Some((p, 0.6 + 0.4 * ratio(weight, max_weight)))
            })
            .collect();
        scored.sort_by(|(a, sa), (b, sb)| {
            sb.total_cmp(sa)
                .then_with(|| b.sales.cmp(&a.sales))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut result: Vec<RecommendProduct> = scored
            .into_iter()
            .take(limit)
            .map(|(p, score)| RecommendProduct::from_product(p, PERSONAL_REASON, score))
            .collect();

        if result.len() < limit {
            let taken: HashSet<u64> = result.iter().map(|r| r.id).collect();
            let remaining: Vec<Product> = products
                .iter()
                .filter(|p| !taken.contains(&p.id) && !purchased.contains(&p.id))
                .cloned()
                .collect();
            result.extend(rank_hot(&remaining, limit - result.len(), FALLBACK_REASON));
        }

        info!(user_id, count = result.len(), "Personal recommendations built");
        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn similar(&self, product_id: u64, limit: usize) -> Result<Vec<RecommendProduct>> {
        let product = match self.catalog.find_product(product_id).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                return Err(DomainError::NotFound(format!("Product {} not found", product_id)).into());
            }
            Err(e) => {
                warn!(product_id, error = %e, "Catalog unavailable, no similar products");
                return Ok(Vec::new());
            }
        };

        let menu = self.menu().await;
        let mut siblings: Vec<&Product> = menu
            .iter()
            .filter(|p| p.category_id == product.category_id && p.id != product.id)
            .collect();
        let max_sales = siblings.iter().map(|p| p.sales).max().unwrap_or(0);
        siblings.sort_by(|a, b| b.sales.cmp(&a.sales).then_with(|| a.id.cmp(&b.id)));

        let reason = format!("similar to {}", product.name);
        Ok(siblings
            .into_iter()
            .take(limit)
            .map(|p| {
                let score = 0.7 + 0.2 * ratio(u64::from(p.sales), u64::from(max_sales));
                RecommendProduct::from_product(p, &reason, score)
            })
            .collect())
    }

    pub async fn newest(&self, limit: usize) -> Result<Vec<RecommendProduct>> {
        let mut products = self.menu().await;
        products.sort_by(|a, b| {
            b.create_time
                .cmp(&a.create_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(products
            .iter()
            .take(limit)
            .map(|p| RecommendProduct::from_product(p, NEW_REASON, NEW_SCORE))
            .collect())
    }

    #[instrument(skip(self, req), fields(user_id = req.user_id, product_id = req.product_id))]
    pub async fn record_behavior(&self, req: RecordBehavior) -> Result<UserBehavior> {
        if req.user_id == 0 || req.product_id == 0 {
            return Err(DomainError::Validation("userId and productId are required".to_string()).into());
        }
        let behavior = self
            .repository
            .insert_behavior(UserBehavior {
                id: 0,
                user_id: req.user_id,
                product_id: req.product_id,
                action: req.action,
                session_id: req.session_id,
                timestamp: Utc::now(),
            })
            .await?;
        debug!(behavior_id = behavior.id, action = ?behavior.action, "Behavior recorded");
        Ok(behavior)
    }

    pub async fn statistics(&self) -> Result<BehaviorStatistics> {
        let behaviors = self.repository.list_behaviors().await?;
        let count = |action: BehaviorAction| behaviors.iter().filter(|b| b.action == action).count() as u64;
        let users: HashSet<u64> = behaviors.iter().map(|b| b.user_id).collect();

        Ok(BehaviorStatistics {
            total: behaviors.len() as u64,
            views: count(BehaviorAction::View),
            favorites: count(BehaviorAction::Favorite),
            add_to_carts: count(BehaviorAction::AddToCart),
            purchases: count(BehaviorAction::Purchase),
            distinct_users: users.len() as u64,
        })
    }

    /// On-sale products, or nothing when the catalog cannot be reached.
    async fn menu(&self) -> Vec<Product> {
        match self.catalog.on_sale_products().await {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "Catalog unavailable, recommending nothing");
                Vec::new()
            }
        }
    }
}

fn ratio(value: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        value as f64 / max as f64
    }
}

fn rank_hot(products: &[Product], limit: usize, reason: &str) -> Vec<RecommendProduct> {
    let max_sales = products.iter().map(|p| p.sales).max().unwrap_or(0);
    let mut ranked: Vec<&Product> = products.iter().collect();
    ranked.sort_by(|a, b| {
        b.sales
            .cmp(&a.sales)
            .then_with(|| b.rating.total_cmp(&a.rating))
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
        .into_iter()
        .take(limit)
        .map(|p| {
            let score = 0.9 + 0.1 * ratio(u64::from(p.sales), u64::from(max_sales));
            RecommendProduct::from_product(p, reason, score)
        })
        .collect()
}
