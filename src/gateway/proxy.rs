use crate::gateway::routes::{RouteTable, is_public, rewrite_path};
use crate::infrastructure::config::{AppConfig, ServiceKind};
use crate::infrastructure::security::validate_token;
use crate::presentation::envelope::{ApiError, ApiResponse};
use crate::presentation::middleware::{REQUEST_ID_HEADER, RequestId, bearer_token};
use actix_web::http::{StatusCode, header};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, web};
use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Headers copied from the client request to the upstream request.
const FORWARDED_HEADERS: [header::HeaderName; 3] =
    [header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT];

pub struct GatewayState {
    table: RouteTable,
    upstreams: HashMap<ServiceKind, String>,
    client: reqwest::Client,
    enforce_auth: bool,
    jwt_secret: String,
    started_at: Instant,
}

impl GatewayState {
    pub fn new(
        upstreams: HashMap<ServiceKind, String>,
        timeout: Duration,
        enforce_auth: bool,
        jwt_secret: String,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let upstreams = upstreams
            .into_iter()
            .map(|(kind, url)| (kind, url.trim_end_matches('/').to_string()))
            .collect();
        Ok(Self {
            table: RouteTable::standard(),
            upstreams,
            client,
            enforce_auth,
            jwt_secret,
            started_at: Instant::now(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let upstreams = ServiceKind::ALL
            .into_iter()
            .filter(|kind| *kind != ServiceKind::Gateway)
            .map(|kind| (kind, config.service_url(kind)))
            .collect();
        Self::new(
            upstreams,
            config.upstream_timeout,
            config.gateway_enforce_auth,
            config.jwt_secret.clone(),
        )
    }

    fn service_map(&self) -> BTreeMap<&'static str, &str> {
        self.upstreams
            .iter()
            .map(|(kind, url)| (kind.name(), url.as_str()))
            .collect()
    }
}

fn authorize(req: &HttpRequest, secret: &str) -> Result<(), ApiError> {
    let token = bearer_token(req.headers())
        .unwrap_or_else(|| Err(ApiError::Unauthorized("Please log in first".to_string())))?;
    validate_token(token, secret).map(|_| ()).map_err(|e| {
        warn!(error = %e, "Gateway rejected bearer token");
        ApiError::Unauthorized("Token is invalid or has expired".to_string())
    })
}

fn upstream_error(service: ServiceKind, err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        error!(service = service.name(), error = %err, "Upstream timed out");
        ApiError::GatewayTimeout(format!("{} service timed out", service.name()))
    } else {
        error!(service = service.name(), error = %err, "Upstream unreachable");
        ApiError::BadGateway(format!("{} service is unavailable", service.name()))
    }
}

/// Forwards any request under a known prefix to its service and relays the
/// answer unchanged.
#[instrument(skip(state, req, body), fields(method = %req.method(), path = %req.path()))]
pub async fn forward(
    state: web::Data<GatewayState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let path = req.path();
    let route = state.table.resolve(path).ok_or_else(|| {
        warn!("No route matches");
        ApiError::NotFound(format!("No service handles {}", path))
    })?;

    // Access is decided on the path the service will actually see.
    let upstream_path = rewrite_path(route.prefix, path);
    if state.enforce_auth && !is_public(req.method(), &upstream_path) {
        authorize(&req, &state.jwt_secret)?;
    }

    let base = state.upstreams.get(&route.service).ok_or_else(|| {
        ApiError::BadGateway(format!("{} service is not configured", route.service.name()))
    })?;
    let mut target = format!("{}{}", base, upstream_path);
    if !req.query_string().is_empty() {
        target.push('?');
        target.push_str(req.query_string());
    }

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|_| ApiError::Validation(format!("Unsupported method {}", req.method())))?;
    debug!(target = %target, service = route.service.name(), "Forwarding request");

    let mut upstream = state.client.request(method, &target);
    for name in &FORWARDED_HEADERS {
        if let Some(value) = req.headers().get(name).and_then(|v| v.to_str().ok()) {
            upstream = upstream.header(name.as_str(), value);
        }
    }
    if let Some(id) = req.extensions().get::<RequestId>() {
        upstream = upstream.header(REQUEST_ID_HEADER, id.0.as_str());
    }
    if !body.is_empty() {
        upstream = upstream.body(body.to_vec());
    }

    let response = upstream
        .send()
        .await
        .map_err(|e| upstream_error(route.service, e))?;

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| upstream_error(route.service, e))?;

    info!(
        service = route.service.name(),
        status = status.as_u16(),
        bytes = bytes.len(),
        "Upstream answered"
    );

    let mut builder = HttpResponse::build(status);
    if let Some(content_type) = content_type {
        builder.insert_header((header::CONTENT_TYPE, content_type));
    }
    Ok(builder.body(bytes))
}

pub async fn health(state: web::Data<GatewayState>) -> HttpResponse {
    ApiResponse::ok(json!({
        "status": "UP",
        "service": "gateway",
        "services": state.service_map(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn status(state: web::Data<GatewayState>) -> HttpResponse {
    let routes: Vec<_> = state
        .table
        .routes()
        .iter()
        .map(|(prefix, kind)| json!({ "prefix": prefix, "service": kind.name() }))
        .collect();

    HttpResponse::Ok().json(json!({
        "gateway": "UP",
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "enforceAuth": state.enforce_auth,
        "services": state.service_map(),
        "routes": routes,
    }))
}
