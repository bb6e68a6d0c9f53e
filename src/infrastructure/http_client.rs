//! Clients for calling peer services over HTTP.
//!
//! Every peer answers with the `{ code, message, data }` envelope; failures
//! come back as [`DomainError::Remote`] carrying the peer's status and message,
//! and unreachable peers as [`DomainError::Upstream`].

use crate::application::catalog::{OrderStatsSource, ProductCatalog};
use crate::domain::error::DomainError;
use crate::domain::product::{Product, StockChange};
use crate::domain::user::UserOrderStats;
use crate::presentation::envelope::ApiResponse;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn unreachable(service: &str, err: reqwest::Error) -> DomainError {
    warn!(service, error = %err, "Peer service unreachable");
    DomainError::Upstream(format!("{} service unavailable: {}", service, err))
}

async fn read_envelope<T: DeserializeOwned>(
    service: &str,
    response: reqwest::Response,
) -> Result<Option<T>> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| unreachable(service, e))?;

    match serde_json::from_slice::<ApiResponse<T>>(&body) {
        Ok(envelope) => Ok(envelope.into_result()?),
        Err(e) if status.is_success() => Err(DomainError::Upstream(format!(
            "{} service sent an unreadable response: {}",
            service, e
        ))
        .into()),
        Err(_) => Err(DomainError::Remote {
            status: status.as_u16(),
            message: String::from_utf8_lossy(&body).into_owned(),
        }
        .into()),
    }
}

/// The product service seen from the order and recommend services.
pub struct HttpProductCatalog {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProductCatalog {
    const SERVICE: &'static str = "product";

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn change_stock(&self, id: u64, quantity: u32, action: &str) -> Result<()> {
        let url = format!("{}/internal/products/{}/{}", self.base_url, id, action);
        let response = self
            .http
            .post(&url)
            .json(&StockChange { quantity })
            .send()
            .await
            .map_err(|e| unreachable(Self::SERVICE, e))?;
        read_envelope::<serde_json::Value>(Self::SERVICE, response).await?;
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    #[instrument(skip(self))]
    async fn find_product(&self, id: u64) -> Result<Option<Product>> {
        let url = format!("{}/internal/products/{}", self.base_url, id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(Self::SERVICE, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(product_id = id, "Product not found in catalog");
            return Ok(None);
        }
        read_envelope(Self::SERVICE, response).await
    }

    async fn on_sale_products(&self) -> Result<Vec<Product>> {
        let url = format!("{}/internal/products", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(Self::SERVICE, e))?;
        Ok(read_envelope(Self::SERVICE, response)
            .await?
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn reserve_stock(&self, id: u64, quantity: u32) -> Result<()> {
        self.change_stock(id, quantity, "reserve").await
    }

    #[instrument(skip(self))]
    async fn release_stock(&self, id: u64, quantity: u32) -> Result<()> {
        self.change_stock(id, quantity, "release").await
    }
}

/// The order service seen from the user service.
pub struct HttpOrderStats {
    http: reqwest::Client,
    base_url: String,
}

impl HttpOrderStats {
    const SERVICE: &'static str = "order";

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OrderStatsSource for HttpOrderStats {
    #[instrument(skip(self))]
    async fn user_order_stats(&self, user_id: u64) -> Result<UserOrderStats> {
        let url = format!("{}/internal/orders/stats/{}", self.base_url, user_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(Self::SERVICE, e))?;
        Ok(read_envelope(Self::SERVICE, response)
            .await?
            .unwrap_or_else(UserOrderStats::empty))
    }
}
