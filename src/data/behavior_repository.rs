use crate::domain::recommend::UserBehavior;
use crate::domain::repository::BehaviorRepository;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct InMemoryBehaviorRepository {
    storage: Arc<RwLock<Vec<UserBehavior>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryBehaviorRepository {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for InMemoryBehaviorRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BehaviorRepository for InMemoryBehaviorRepository {
    async fn insert_behavior(&self, mut behavior: UserBehavior) -> Result<UserBehavior> {
        let mut storage = self.storage.write().await;
        behavior.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        storage.push(behavior.clone());
        Ok(behavior)
    }

    async fn behaviors_for_user(&self, user_id: u64) -> Result<Vec<UserBehavior>> {
        let storage = self.storage.read().await;
        Ok(storage
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_behaviors(&self) -> Result<Vec<UserBehavior>> {
        Ok(self.storage.read().await.clone())
    }
}
