use thiserror::Error;

use crate::repository::RepositoryError;

/// Caller input rejected before it reaches the service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("quantity must be > 0")]
    Quantity(f64),
    #[error("productType must be ELECTRICITY, got `{0}`")]
    ProductType(String),
    #[error("timestamp {0} is out of range")]
    Timestamp(i64),
}

/// Errors from [`crate::service::OrderService`].
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("start {0} cannot be represented as a UTC timestamp")]
    InvalidTimestamp(i64),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type OrderResult<T> = Result<T, OrderError>;
