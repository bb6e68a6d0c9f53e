use crate::application::catalog::OrderStatsSource;
use crate::domain::error::DomainError;
use crate::domain::page::{PageRequest, PageResult};
use crate::domain::repository::UserRepository;
use crate::domain::user::{
    AccountStatus, ChangePassword, CreateUser, LoginRequest, LoginResponse, Role, UpdateUser, User,
    UserOrderStats, UserStatistics,
};
use crate::infrastructure::security::{generate_token, hash_password, verify_password};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 6..=100;
const BAD_CREDENTIALS: &str = "Invalid username or password";

pub struct UserService<R: UserRepository> {
    user_repository: Arc<R>,
    order_stats: Arc<dyn OrderStatsSource>,
    jwt_secret: String,
    token_ttl_secs: u64,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(
        user_repository: Arc<R>,
        order_stats: Arc<dyn OrderStatsSource>,
        jwt_secret: String,
        token_ttl_secs: u64,
    ) -> Self {
        Self {
            user_repository,
            order_stats,
            jwt_secret,
            token_ttl_secs,
        }
    }

    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn register(&self, req: CreateUser) -> Result<User> {
        self.create_account(req, Role::User, AccountStatus::Enabled)
            .await
    }

    /// Merchants start disabled and wait for an administrator's approval.
    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn register_merchant(&self, req: CreateUser) -> Result<User> {
        self.create_account(req, Role::Merchant, AccountStatus::Disabled)
            .await
    }

    async fn create_account(
        &self,
        req: CreateUser,
        role: Role,
        status: AccountStatus,
    ) -> Result<User> {
        trace!(role = %role, "Starting registration");

        let username = req.username.trim().to_string();
        validate_username(&username)?;
        validate_password(&req.password)?;
        let email = normalize_optional(req.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        if self
            .user_repository
            .find_user_by_username(&username)
            .await?
            .is_some()
        {
            warn!(username = %username, "Username already taken");
            return Err(DomainError::Conflict("Username already exists".to_string()).into());
        }
        if let Some(email) = &email {
            if self.user_repository.find_user_by_email(email).await?.is_some() {
                warn!(email = %email, "Email already registered");
                return Err(DomainError::Conflict("Email already registered".to_string()).into());
            }
        }

        let password_hash = hash_password(&req.password).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            DomainError::Internal(format!("Failed to hash password: {}", e))
        })?;

        let now = Utc::now();
        let user = User {
            id: 0,
            username,
            password_hash,
            email,
            phone: normalize_optional(req.phone),
            real_name: normalize_optional(req.real_name),
            college: None,
            address: None,
            avatar: None,
            role,
            status,
            create_time: now,
            update_time: now,
        };

        debug!(username = %user.username, "Saving user to repository");
        let user = self.user_repository.insert_user(user).await?;

        info!(
            user_id = user.id,
            username = %user.username,
            role = %user.role,
            "User registered successfully"
        );
        Ok(user)
    }

    /// Checks credentials and issues a token. `required_role` narrows the
    /// login to one kind of account (the admin and merchant portals).
    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn login(&self, req: LoginRequest, required_role: Option<Role>) -> Result<LoginResponse> {
        trace!("Starting login");

        let user = self
            .user_repository
            .find_user_by_username(req.username.trim())
            .await?
            .ok_or_else(|| {
                warn!(username = %req.username, "User not found during login");
                DomainError::Unauthorized(BAD_CREDENTIALS.to_string())
            })?;

        let is_valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            DomainError::Internal(format!("Failed to verify password: {}", e))
        })?;
        if !is_valid {
            warn!(user_id = user.id, "Invalid password during login");
            return Err(DomainError::Unauthorized(BAD_CREDENTIALS.to_string()).into());
        }

        if let Some(role) = required_role {
            if user.role != role {
                warn!(user_id = user.id, role = %user.role, required = %role, "Login with wrong role");
                return Err(DomainError::Forbidden(format!(
                    "Account is not a {} account",
                    role.as_str().to_lowercase()
                ))
                .into());
            }
        }

        if !user.is_enabled() {
            warn!(user_id = user.id, "Login attempt on disabled account");
            let message = if user.role == Role::Merchant {
                "Merchant account is awaiting approval or has been disabled"
            } else {
                "Account has been disabled"
            };
            return Err(DomainError::Forbidden(message.to_string()).into());
        }

        let token = generate_token(
            user.id,
            &user.username,
            user.role,
            &self.jwt_secret,
            self.token_ttl_secs,
        )
        .map_err(|e| {
            error!(error = %e, "Failed to generate token");
            DomainError::Internal(format!("Failed to generate token: {}", e))
        })?;

        info!(user_id = user.id, role = %user.role, "Login successful");

        Ok(LoginResponse {
            user_id: user.id,
            username: user.username,
            real_name: user.real_name,
            role: user.role,
            token,
        })
    }

    pub async fn get_user(&self, user_id: u64) -> Result<User> {
        self.user_repository
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", user_id)).into())
    }

    #[instrument(skip(self, req))]
    pub async fn update_info(&self, user_id: u64, req: UpdateUser) -> Result<User> {
        let mut user = self.get_user(user_id).await?;

        if let Some(email) = normalize_optional(req.email) {
            validate_email(&email)?;
            if let Some(owner) = self.user_repository.find_user_by_email(&email).await? {
                if owner.id != user_id {
                    warn!(email = %email, "Email belongs to another account");
                    return Err(DomainError::Conflict("Email already registered".to_string()).into());
                }
            }
            user.email = Some(email);
        }
        if let Some(phone) = req.phone {
            user.phone = Some(phone);
        }
        if let Some(real_name) = req.real_name {
            user.real_name = Some(real_name);
        }
        if let Some(college) = req.college {
            user.college = Some(college);
        }
        if let Some(address) = req.address {
            user.address = Some(address);
        }
        if let Some(avatar) = req.avatar {
            user.avatar = Some(avatar);
        }
        user.update_time = Utc::now();

        self.user_repository.update_user(user.clone()).await?;
        info!(user_id, "Profile updated");
        Ok(user)
    }

    #[instrument(skip(self, req))]
    pub async fn change_password(&self, user_id: u64, req: ChangePassword) -> Result<()> {
        let user = self.get_user(user_id).await?;

        let is_valid = verify_password(&req.old_password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            DomainError::Internal(format!("Failed to verify password: {}", e))
        })?;
        if !is_valid {
            warn!(user_id, "Wrong current password");
            return Err(DomainError::Validation("Current password is incorrect".to_string()).into());
        }

        self.store_password(user, &req.new_password).await?;
        info!(user_id, "Password changed");
        Ok(())
    }

    /// Profile figures from the order service. A failing order service must not
    /// break the profile page, so errors degrade to zeros.
    #[instrument(skip(self))]
    pub async fn user_stats(&self, user_id: u64) -> Result<UserOrderStats> {
        self.get_user(user_id).await?;
        match self.order_stats.user_order_stats(user_id).await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                warn!(user_id, error = %e, "Order statistics unavailable, returning zeros");
                Ok(UserOrderStats::empty())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        role: Option<Role>,
        keyword: Option<String>,
        page: PageRequest,
    ) -> Result<PageResult<User>> {
        let keyword = normalize_optional(keyword).map(|k| k.to_lowercase());
        let mut users: Vec<User> = self
            .user_repository
            .list_users()
            .await?
            .into_iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .filter(|u| match &keyword {
                Some(k) => matches_keyword(u, k),
                None => true,
            })
            .collect();
        users.sort_by(|a, b| b.create_time.cmp(&a.create_time).then(b.id.cmp(&a.id)));

        debug!(matched = users.len(), "Listing users");
        Ok(PageResult::paginate(users, page))
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, admin_id: u64, user_id: u64, status: AccountStatus) -> Result<User> {
        if admin_id == user_id && status == AccountStatus::Disabled {
            warn!(admin_id, "Administrator tried to disable their own account");
            return Err(
                DomainError::Validation("You cannot disable your own account".to_string()).into(),
            );
        }

        let mut user = self.get_user(user_id).await?;
        user.status = status;
        user.update_time = Utc::now();
        self.user_repository.update_user(user.clone()).await?;

        info!(user_id, status = ?status, "Account status changed");
        Ok(user)
    }

    #[instrument(skip(self, new_password))]
    pub async fn reset_password(&self, user_id: u64, new_password: &str) -> Result<()> {
        let user = self.get_user(user_id).await?;
        self.store_password(user, new_password).await?;
        info!(user_id, "Password reset by administrator");
        Ok(())
    }

    pub async fn statistics(&self) -> Result<UserStatistics> {
        let users = self.user_repository.list_users().await?;
        let count = |pred: fn(&User) -> bool| users.iter().filter(|u| pred(u)).count() as u64;

        Ok(UserStatistics {
            total_users: users.len() as u64,
            students: count(|u| u.role == Role::User),
            merchants: count(|u| u.role == Role::Merchant),
            admins: count(|u| u.role == Role::Admin),
            enabled: count(|u| u.is_enabled()),
            disabled: count(|u| !u.is_enabled()),
            pending_merchants: count(|u| u.role == Role::Merchant && !u.is_enabled()),
        })
    }

    pub async fn pending_merchants(&self) -> Result<Vec<User>> {
        let mut merchants: Vec<User> = self
            .user_repository
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.role == Role::Merchant && !u.is_enabled())
            .collect();
        merchants.sort_by_key(|u| u.create_time);
        Ok(merchants)
    }

    #[instrument(skip(self))]
    pub async fn approve_merchant(&self, user_id: u64) -> Result<User> {
        let mut user = self.get_user(user_id).await?;
        if user.role != Role::Merchant {
            return Err(DomainError::Validation(format!("User {} is not a merchant", user_id)).into());
        }
        user.status = AccountStatus::Enabled;
        user.update_time = Utc::now();
        self.user_repository.update_user(user.clone()).await?;

        info!(user_id, "Merchant approved");
        Ok(user)
    }

    async fn store_password(&self, mut user: User, new_password: &str) -> Result<()> {
        validate_password(new_password)?;
        user.password_hash = hash_password(new_password).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            DomainError::Internal(format!("Failed to hash password: {}", e))
        })?;
        user.update_time = Utc::now();
        self.user_repository.update_user(user).await
    }
}

fn validate_username(username: &str) -> Result<(), DomainError> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(DomainError::Validation(
            "Username must be between 3 and 50 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), DomainError> {
    if !PASSWORD_LEN.contains(&password.chars().count()) {
        return Err(DomainError::Validation(
            "Password must be between 6 and 100 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::Validation(format!("Invalid email address: {}", email))),
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn matches_keyword(user: &User, keyword: &str) -> bool {
    [Some(&user.username), user.real_name.as_ref(), user.email.as_ref()]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::user_repository::InMemoryUserRepository;
    use async_trait::async_trait;

    struct FixedStats(Option<UserOrderStats>);

    #[async_trait]
    impl OrderStatsSource for FixedStats {
        async fn user_order_stats(&self, _user_id: u64) -> Result<UserOrderStats> {
            self.0
                .clone()
                .ok_or_else(|| DomainError::Upstream("order service down".to_string()).into())
        }
    }

    fn service_with(stats: Option<UserOrderStats>) -> UserService<InMemoryUserRepository> {
        UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(FixedStats(stats)),
            "test-secret".to_string(),
            3600,
        )
    }

    fn create(username: &str, email: Option<&str>) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            password: "secret123".to_string(),
            email: email.map(str::to_string),
            phone: None,
            real_name: Some("Li Lei".to_string()),
        }
    }

    fn login_req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let service = service_with(None);
        let user = service.register(create("lilei", Some("li@campus.edu"))).await.unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.is_enabled());

        let login = service.login(login_req("lilei", "secret123"), None).await.unwrap();
        assert_eq!(login.user_id, user.id);
        assert!(!login.token.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_conflict() {
        let service = service_with(None);
        service.register(create("lilei", Some("li@campus.edu"))).await.unwrap();

        let err = service.register(create("lilei", None)).await.unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(DomainError::Conflict(_))));

        let err = service.register(create("hanmei", Some("li@campus.edu"))).await.unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = service_with(None);
        let err = service.register(create("ab", None)).await.unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(DomainError::Validation(_))));

        let err = service.register(create("valid", Some("not-an-email"))).await.unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(DomainError::Validation(_))));

        let mut short = create("valid", None);
        short.password = "123".to_string();
        let err = service.register(short).await.unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_failures_share_one_message() {
        let service = service_with(None);
        service.register(create("lilei", None)).await.unwrap();

        let unknown = service.login(login_req("nobody", "secret123"), None).await.unwrap_err();
        let wrong = service.login(login_req("lilei", "wrong-pass"), None).await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(wrong.downcast_ref(), Some(DomainError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_merchant_needs_approval_before_login() {
        let service = service_with(None);
        let merchant = service.register_merchant(create("noodlebar", None)).await.unwrap();
        assert_eq!(merchant.status, AccountStatus::Disabled);

        let err = service
            .login(login_req("noodlebar", "secret123"), Some(Role::Merchant))
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(DomainError::Forbidden(_))));
        assert_eq!(service.pending_merchants().await.unwrap().len(), 1);

        service.approve_merchant(merchant.id).await.unwrap();
        let login = service
            .login(login_req("noodlebar", "secret123"), Some(Role::Merchant))
            .await
            .unwrap();
        assert_eq!(login.role, Role::Merchant);
        assert!(service.pending_merchants().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_portal_login_rejects_other_roles() {
        let service = service_with(None);
        service.register(create("lilei", None)).await.unwrap();

        let err = service
            .login(login_req("lilei", "secret123"), Some(Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_change_password_requires_current_one() {
        let service = service_with(None);
        let user = service.register(create("lilei", None)).await.unwrap();

        let bad = ChangePassword {
            old_password: "nope".to_string(),
            new_password: "newsecret".to_string(),
        };
        assert!(service.change_password(user.id, bad).await.is_err());

        let good = ChangePassword {
            old_password: "secret123".to_string(),
            new_password: "newsecret".to_string(),
        };
        service.change_password(user.id, good).await.unwrap();
        assert!(service.login(login_req("lilei", "newsecret"), None).await.is_ok());
        assert!(service.login(login_req("lilei", "secret123"), None).await.is_err());
    }

    #[tokio::test]
    async fn test_admin_cannot_disable_self_and_disabled_users_cannot_login() {
        let service = service_with(None);
        let admin = service.register(create("root", None)).await.unwrap();
        let user = service.register(create("lilei", None)).await.unwrap();

        let err = service
            .set_status(admin.id, admin.id, AccountStatus::Disabled)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(DomainError::Validation(_))));

        service.set_status(admin.id, user.id, AccountStatus::Disabled).await.unwrap();
        let err = service.login(login_req("lilei", "secret123"), None).await.unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_user_stats_fall_back_to_zeros() {
        let service = service_with(None);
        let user = service.register(create("lilei", None)).await.unwrap();
        assert_eq!(service.user_stats(user.id).await.unwrap(), UserOrderStats::empty());

        let stats = UserOrderStats {
            total_orders: 3,
            total_amount: "42.50".to_string(),
            favorite_count: 0,
        };
        let service = service_with(Some(stats.clone()));
        let user = service.register(create("lilei", None)).await.unwrap();
        assert_eq!(service.user_stats(user.id).await.unwrap(), stats);
    }

    #[tokio::test]
    async fn test_list_users_filters_and_counts() {
        let service = service_with(None);
        service.register(create("lilei", Some("li@campus.edu"))).await.unwrap();
        service.register(create("hanmei", None)).await.unwrap();
        service.register_merchant(create("noodlebar", None)).await.unwrap();

        let merchants = service
            .list_users(Some(Role::Merchant), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(merchants.total, 1);

        let by_email = service
            .list_users(None, Some("CAMPUS".to_string()), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(by_email.records[0].username, "lilei");

        let stats = service.statistics().await.unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.students, 2);
        assert_eq!(stats.pending_merchants, 1);
        assert_eq!(stats.disabled, 1);
    }
}
