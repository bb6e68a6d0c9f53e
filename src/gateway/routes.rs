use crate::infrastructure::config::ServiceKind;
use actix_web::http::Method;

/// Prefix table, longest prefix first.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<(String, ServiceKind)>,
}

/// A matched route: which service and which prefix selected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub prefix: &'a str,
    pub service: ServiceKind,
}

impl RouteTable {
    pub fn new(routes: impl IntoIterator<Item = (String, ServiceKind)>) -> Self {
        let mut routes: Vec<(String, ServiceKind)> = routes
            .into_iter()
            .map(|(prefix, kind)| (prefix.trim_end_matches('/').to_string(), kind))
            .collect();
        routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { routes }
    }

    pub fn standard() -> Self {
        Self::new(
            [
                ("/api/users", ServiceKind::User),
                ("/api/admin", ServiceKind::User),
                ("/api/merchant", ServiceKind::User),
                ("/api/products", ServiceKind::Product),
                ("/api/orders", ServiceKind::Order),
                ("/api/recommend", ServiceKind::Recommend),
                ("/api/admin/recommend", ServiceKind::Recommend),
            ]
            .map(|(prefix, kind)| (prefix.to_string(), kind)),
        )
    }

    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .find(|(prefix, _)| has_prefix(path, prefix))
            .map(|(prefix, service)| RouteMatch {
                prefix,
                service: *service,
            })
    }

    pub fn routes(&self) -> &[(String, ServiceKind)] {
        &self.routes
    }
}

/// `path` equals `prefix` or continues it at a segment boundary.
fn has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Collapses one repeated last segment of the prefix, which older frontend
/// builds put in front of every call: `/api/users/users/login` becomes
/// `/api/users/login`. Other paths are returned unchanged.
pub fn rewrite_path(prefix: &str, path: &str) -> String {
    let Some(segment) = prefix.rsplit('/').find(|s| !s.is_empty()) else {
        return path.to_string();
    };
    let Some(rest) = path.strip_prefix(prefix) else {
        return path.to_string();
    };
    let duplicated = format!("/{}", segment);
    match rest.strip_prefix(&duplicated) {
        Some(tail) if tail.is_empty() || tail.starts_with('/') => format!("{}{}", prefix, tail),
        _ => path.to_string(),
    }
}

/// Paths reachable without a token when the gateway enforces authentication.
pub fn is_public(method: &Method, path: &str) -> bool {
    const OPEN: [&str; 7] = [
        "/api/users/register",
        "/api/users/login",
        "/api/users/logout",
        "/api/admin/login",
        "/api/merchant/register",
        "/api/merchant/login",
        "/api/health",
    ];

    if OPEN.contains(&path) || path.ends_with("/health") || path == "/status" {
        return true;
    }
    if has_prefix(path, "/api/recommend") {
        return true;
    }
    *method == Method::GET
        && has_prefix(path, "/api/products")
        && !has_prefix(path, "/api/products/merchant")
        && !has_prefix(path, "/api/products/admin")
}
