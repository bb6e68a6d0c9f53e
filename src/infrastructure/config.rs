use crate::infrastructure::security::DEFAULT_TOKEN_TTL_SECS;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "canteen-development-secret-change-me-before-deploying";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("Unknown service in CANTEEN_SERVICES: {0}")]
    UnknownService(String),
}

/// The five HTTP servers this binary can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Gateway,
    User,
    Product,
    Order,
    Recommend,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::Gateway,
        ServiceKind::User,
        ServiceKind::Product,
        ServiceKind::Order,
        ServiceKind::Recommend,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Gateway => "gateway",
            ServiceKind::User => "user",
            ServiceKind::Product => "product",
            ServiceKind::Order => "order",
            ServiceKind::Recommend => "recommend",
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            ServiceKind::Gateway => 8080,
            ServiceKind::User => 8081,
            ServiceKind::Product => 8082,
            ServiceKind::Order => 8083,
            ServiceKind::Recommend => 8084,
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            ServiceKind::Gateway => "GATEWAY",
            ServiceKind::User => "USER_SERVICE",
            ServiceKind::Product => "PRODUCT_SERVICE",
            ServiceKind::Order => "ORDER_SERVICE",
            ServiceKind::Recommend => "RECOMMEND_SERVICE",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownService(s.trim().to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub ports: HashMap<ServiceKind, u16>,
    pub service_urls: HashMap<ServiceKind, String>,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub upstream_timeout: Duration,
    pub gateway_enforce_auth: bool,
    pub seed_demo_data: bool,
    pub enabled_services: Vec<ServiceKind>,
}

impl AppConfig {
    /// Reads `.env` (when present) and then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenv::dotenv() {
            Ok(path) => info!(path = %path.display(), "Loaded environment file"),
            Err(_) => info!("No .env file found, using process environment"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("CANTEEN_HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let mut ports = HashMap::new();
        let mut service_urls = HashMap::new();
        for kind in ServiceKind::ALL {
            let port_key = format!("{}_PORT", kind.env_prefix());
            let port: u16 = parse_or(&lookup, &port_key, kind.default_port())?;
            ports.insert(kind, port);

            let url_key = format!("{}_URL", kind.env_prefix());
            let url = lookup(&url_key).unwrap_or_else(|| format!("http://{host}:{port}"));
            service_urls.insert(kind, url.trim_end_matches('/').to_string());
        }

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.trim().is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let enabled_services = match lookup("CANTEEN_SERVICES") {
            Some(list) if !list.trim().eq_ignore_ascii_case("all") && !list.trim().is_empty() => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<ServiceKind>, _>>()?,
            _ => ServiceKind::ALL.to_vec(),
        };

        Ok(Self {
            host,
            ports,
            service_urls,
            jwt_secret,
            token_ttl_secs: parse_or(&lookup, "JWT_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            upstream_timeout: Duration::from_secs(parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", 10u64)?),
            gateway_enforce_auth: parse_or(&lookup, "GATEWAY_ENFORCE_AUTH", false)?,
            seed_demo_data: parse_or(&lookup, "SEED_DEMO_DATA", true)?,
            enabled_services,
        })
    }

    pub fn port(&self, kind: ServiceKind) -> u16 {
        self.ports
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_port())
    }

    pub fn service_url(&self, kind: ServiceKind) -> String {
        self.service_urls
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port(kind)))
    }

    pub fn runs(&self, kind: ServiceKind) -> bool {
        self.enabled_services.contains(&kind)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
