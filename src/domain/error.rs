use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: u64 },
    #[error("Upstream error: {0}")]
    Upstream(String),
    /// Failure reported by a peer service, passed through as-is.
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("Internal error: {0}")]
    Internal(String),
}
