use crate::domain::repository::UserRepository;
use crate::domain::user::User;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

#[derive(Clone)]
pub struct InMemoryUserRepository {
    storage: Arc<RwLock<HashMap<u64, User>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn insert_user(&self, mut user: User) -> Result<User> {
        trace!("Acquiring write lock for user storage");
        let mut storage = self.storage.write().await;
        user.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        storage.insert(user.id, user.clone());
        debug!(user_id = user.id, username = %user.username, "User saved to memory storage");
        Ok(user)
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update_user(&self, user: User) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.insert(user.id, user);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_user_by_id(&self, id: u64) -> Result<Option<User>> {
        let storage = self.storage.read().await;
        let user = storage.get(&id).cloned();
        if user.is_none() {
            trace!(user_id = id, "User not found in storage");
        }
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let storage = self.storage.read().await;
        let user = storage.values().find(|u| u.username == username).cloned();
        match &user {
            Some(u) => debug!(user_id = u.id, username = %u.username, "User found in storage"),
            None => trace!(username = username, "User not found in storage"),
        }
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let storage = self.storage.read().await;
        let mut users: Vec<User> = storage.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::{AccountStatus, Role};
    use chrono::Utc;

    fn user(username: &str, email: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: 0,
            username: username.to_string(),
            password_hash: "hash".to_string(),
            email: email.map(str::to_string),
            phone: None,
            real_name: None,
            college: None,
            address: None,
            avatar: None,
            role: Role::User,
            status: AccountStatus::Enabled,
            create_time: now,
            update_time: now,
        }
    }

    #[tokio::test]
    async fn test_insert_user_assigns_sequential_ids() {
        let repo = InMemoryUserRepository::new();

        let first = repo.insert_user(user("alice", None)).await.unwrap();
        let second = repo.insert_user(user("bob", None)).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        let found = repo.find_user_by_id(2).await.unwrap().unwrap();
        assert_eq!(found.username, "bob");
    }

    #[tokio::test]
    async fn test_find_user_by_username_is_exact() {
        let repo = InMemoryUserRepository::new();
        repo.insert_user(user("Alice", None)).await.unwrap();

        assert!(repo.find_user_by_username("Alice").await.unwrap().is_some());
        assert!(repo.find_user_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_user_by_email() {
        let repo = InMemoryUserRepository::new();
        repo.insert_user(user("carol", Some("carol@campus.edu")))
            .await
            .unwrap();
        repo.insert_user(user("dave", None)).await.unwrap();

        let found = repo
            .find_user_by_email("carol@campus.edu")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.username, "carol");
        assert!(repo.find_user_by_email("x@campus.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user_overwrites_existing_user() {
        let repo = InMemoryUserRepository::new();
        let mut stored = repo.insert_user(user("erin", None)).await.unwrap();

        stored.college = Some("Engineering".to_string());
        repo.update_user(stored.clone()).await.unwrap();

        let found = repo.find_user_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(found.college.as_deref(), Some("Engineering"));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_get_unique_ids() {
        let repo = InMemoryUserRepository::new();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let repo_clone = repo.clone();
                tokio::spawn(async move { repo_clone.insert_user(user(&format!("user{}", i), None)).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
        assert_eq!(repo.list_users().await.unwrap().len(), 10);
    }
}
